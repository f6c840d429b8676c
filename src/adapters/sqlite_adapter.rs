//! SQLite store adapter: settlement ledger and cached price history.

use crate::domain::error::TradeArenaError;
use crate::domain::ledger::DailySettlement;
use crate::domain::ohlcv::PriceBar;
use crate::domain::signal::Signal;
use crate::ports::config_port::ConfigPort;
use crate::ports::store_port::{PriceStore, SettlementStore};
use chrono::NaiveDate;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

const DATE_FORMAT: &str = "%Y-%m-%d";

const SETTLEMENT_COLUMNS: &str = "strategy_name, pocket_name, date, price, signal, action, \
                                  shares, cash, total_assets, roi_pct, initial_capital";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn query_err(e: rusqlite::Error) -> TradeArenaError {
    TradeArenaError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn parse_date_column(value: String) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(&value, DATE_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            value.len(),
            rusqlite::types::Type::Text,
            Box::new(e),
        )
    })
}

fn settlement_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DailySettlement> {
    let signal_text: String = row.get(4)?;
    let signal: Signal = signal_text.parse().map_err(|e: String| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, e.into())
    })?;
    let shares: i64 = row.get(6)?;
    Ok(DailySettlement {
        strategy: row.get(0)?,
        pocket: row.get(1)?,
        date: parse_date_column(row.get(2)?)?,
        price: row.get(3)?,
        signal,
        action: row.get(5)?,
        shares: shares.max(0) as u64,
        cash: row.get(7)?,
        total_assets: row.get(8)?,
        roi_pct: row.get(9)?,
        initial_capital: row.get(10)?,
    })
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, TradeArenaError> {
        let db_path =
            config
                .get_string("store", "path")
                .ok_or_else(|| TradeArenaError::ConfigMissing {
                    section: "store".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("store", "pool_size", 4).max(1) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(|e: r2d2::Error| TradeArenaError::Database {
                reason: e.to_string(),
            })?;

        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    pub fn in_memory() -> Result<Self, TradeArenaError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| TradeArenaError::Database {
                reason: e.to_string(),
            })?;

        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, TradeArenaError> {
        self.pool
            .get()
            .map_err(|e: r2d2::Error| TradeArenaError::Database {
                reason: e.to_string(),
            })
    }

    pub fn initialize_schema(&self) -> Result<(), TradeArenaError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS price_history (
                    symbol TEXT NOT NULL,
                    date TEXT NOT NULL,
                    open REAL NOT NULL,
                    high REAL NOT NULL,
                    low REAL NOT NULL,
                    close REAL NOT NULL,
                    volume INTEGER NOT NULL,
                    PRIMARY KEY (symbol, date)
                );
                CREATE TABLE IF NOT EXISTS paper_trading (
                    strategy_name TEXT NOT NULL,
                    pocket_name TEXT NOT NULL,
                    date TEXT NOT NULL,
                    price REAL NOT NULL,
                    signal TEXT NOT NULL,
                    action TEXT NOT NULL,
                    shares INTEGER NOT NULL,
                    cash REAL NOT NULL,
                    total_assets REAL NOT NULL,
                    roi_pct REAL NOT NULL,
                    initial_capital REAL NOT NULL,
                    PRIMARY KEY (strategy_name, pocket_name, date)
                );
                CREATE INDEX IF NOT EXISTS idx_paper_trading_date ON paper_trading(date);",
            )
            .map_err(query_err)
    }

    fn query_settlements(
        &self,
        sql: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<DailySettlement>, TradeArenaError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql).map_err(query_err)?;
        let rows = stmt
            .query_map(args, settlement_from_row)
            .map_err(query_err)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(query_err)?);
        }
        Ok(out)
    }
}

impl SettlementStore for SqliteAdapter {
    fn latest_before(
        &self,
        strategy: &str,
        pocket: &str,
        date: NaiveDate,
    ) -> Result<Option<DailySettlement>, TradeArenaError> {
        let sql = format!(
            "SELECT {SETTLEMENT_COLUMNS} FROM paper_trading
             WHERE strategy_name = ?1 AND pocket_name = ?2 AND date < ?3
             ORDER BY date DESC LIMIT 1"
        );
        let date = date.format(DATE_FORMAT).to_string();
        Ok(self
            .query_settlements(&sql, &[&strategy, &pocket, &date])?
            .into_iter()
            .next())
    }

    fn upsert(&self, record: &DailySettlement) -> Result<(), TradeArenaError> {
        self.conn()?
            .execute(
                &format!(
                    "INSERT INTO paper_trading ({SETTLEMENT_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                     ON CONFLICT (strategy_name, pocket_name, date) DO UPDATE SET
                        price = excluded.price,
                        signal = excluded.signal,
                        action = excluded.action,
                        shares = excluded.shares,
                        cash = excluded.cash,
                        total_assets = excluded.total_assets,
                        roi_pct = excluded.roi_pct,
                        initial_capital = excluded.initial_capital"
                ),
                params![
                    record.strategy,
                    record.pocket,
                    record.date.format(DATE_FORMAT).to_string(),
                    record.price,
                    record.signal.to_string(),
                    record.action,
                    record.shares as i64,
                    record.cash,
                    record.total_assets,
                    record.roi_pct,
                    record.initial_capital
                ],
            )
            .map_err(query_err)?;
        Ok(())
    }

    fn query_by_date(&self, date: NaiveDate) -> Result<Vec<DailySettlement>, TradeArenaError> {
        let sql = format!(
            "SELECT {SETTLEMENT_COLUMNS} FROM paper_trading WHERE date = ?1
             ORDER BY roi_pct DESC, strategy_name, pocket_name"
        );
        let date = date.format(DATE_FORMAT).to_string();
        self.query_settlements(&sql, &[&date])
    }

    fn history(
        &self,
        strategy: &str,
        pocket: &str,
    ) -> Result<Vec<DailySettlement>, TradeArenaError> {
        let sql = format!(
            "SELECT {SETTLEMENT_COLUMNS} FROM paper_trading
             WHERE strategy_name = ?1 AND pocket_name = ?2 ORDER BY date ASC"
        );
        self.query_settlements(&sql, &[&strategy, &pocket])
    }
}

impl PriceStore for SqliteAdapter {
    fn bulk_insert(&self, symbol: &str, bars: &[PriceBar]) -> Result<usize, TradeArenaError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        let mut inserted = 0;
        for bar in bars {
            inserted += tx
                .execute(
                    "INSERT OR IGNORE INTO price_history (symbol, date, open, high, low, close, volume)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        symbol,
                        bar.date.format(DATE_FORMAT).to_string(),
                        bar.open,
                        bar.high,
                        bar.low,
                        bar.close,
                        bar.volume
                    ],
                )
                .map_err(query_err)?;
        }

        tx.commit().map_err(query_err)?;
        Ok(inserted)
    }

    fn load_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, TradeArenaError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT date, open, high, low, close, volume FROM price_history
                 WHERE symbol = ?1 AND date >= ?2 AND date <= ?3
                 ORDER BY date ASC",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map(
                params![
                    symbol,
                    start.format(DATE_FORMAT).to_string(),
                    end.format(DATE_FORMAT).to_string()
                ],
                |row| {
                    Ok(PriceBar {
                        date: parse_date_column(row.get(0)?)?,
                        open: row.get(1)?,
                        high: row.get(2)?,
                        low: row.get(3)?,
                        close: row.get(4)?,
                        volume: row.get(5)?,
                    })
                },
            )
            .map_err(query_err)?;

        let mut bars = Vec::new();
        for row in rows {
            bars.push(row.map_err(query_err)?);
        }
        Ok(bars)
    }
}
