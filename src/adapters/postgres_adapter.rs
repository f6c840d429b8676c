//! PostgreSQL store adapter.

use crate::domain::error::TradeArenaError;
use crate::domain::ledger::DailySettlement;
use crate::domain::ohlcv::PriceBar;
use crate::domain::signal::Signal;
use crate::ports::config_port::ConfigPort;
use crate::ports::store_port::{PriceStore, SettlementStore};
use chrono::NaiveDate;
use postgres::types::ToSql;
use postgres::{NoTls, Row};
use r2d2::{Pool, PooledConnection};
use r2d2_postgres::PostgresConnectionManager;

const SETTLEMENT_COLUMNS: &str = "strategy_name, pocket_name, date, price, signal, action, \
                                  shares, cash, total_assets, roi_pct, initial_capital";

pub struct PostgresAdapter {
    pool: Pool<PostgresConnectionManager<NoTls>>,
}

fn query_err(e: postgres::Error) -> TradeArenaError {
    TradeArenaError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn settlement_from_row(row: &Row) -> Result<DailySettlement, TradeArenaError> {
    let signal_text: String = row.get(4);
    let signal: Signal = signal_text
        .parse()
        .map_err(|reason| TradeArenaError::DatabaseQuery { reason })?;
    let shares: i64 = row.get(6);
    Ok(DailySettlement {
        strategy: row.get(0),
        pocket: row.get(1),
        date: row.get(2),
        price: row.get(3),
        signal,
        action: row.get(5),
        shares: shares.max(0) as u64,
        cash: row.get(7),
        total_assets: row.get(8),
        roi_pct: row.get(9),
        initial_capital: row.get(10),
    })
}

impl PostgresAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, TradeArenaError> {
        let conninfo =
            config
                .get_string("store", "conninfo")
                .ok_or_else(|| TradeArenaError::ConfigMissing {
                    section: "store".into(),
                    key: "conninfo".into(),
                })?;
        let pg_config: postgres::Config =
            conninfo
                .parse()
                .map_err(|e: postgres::Error| TradeArenaError::ConfigInvalid {
                    section: "store".into(),
                    key: "conninfo".into(),
                    reason: e.to_string(),
                })?;
        let pool_size = config.get_int("store", "pool_size", 4).max(1) as u32;

        let manager = PostgresConnectionManager::new(pg_config, NoTls);
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

    fn conn(
        &self,
    ) -> Result<PooledConnection<PostgresConnectionManager<NoTls>>, TradeArenaError> {
        self.pool
            .get()
            .map_err(|e: r2d2::Error| TradeArenaError::Database {
                reason: e.to_string(),
            })
    }

    pub fn initialize_schema(&self) -> Result<(), TradeArenaError> {
        self.conn()?
            .batch_execute(
                "CREATE TABLE IF NOT EXISTS price_history (
                    symbol TEXT NOT NULL,
                    date DATE NOT NULL,
                    open DOUBLE PRECISION NOT NULL,
                    high DOUBLE PRECISION NOT NULL,
                    low DOUBLE PRECISION NOT NULL,
                    close DOUBLE PRECISION NOT NULL,
                    volume BIGINT NOT NULL,
                    PRIMARY KEY (symbol, date)
                );
                CREATE TABLE IF NOT EXISTS paper_trading (
                    strategy_name TEXT NOT NULL,
                    pocket_name TEXT NOT NULL,
                    date DATE NOT NULL,
                    price DOUBLE PRECISION NOT NULL,
                    signal TEXT NOT NULL,
                    action TEXT NOT NULL,
                    shares BIGINT NOT NULL,
                    cash DOUBLE PRECISION NOT NULL,
                    total_assets DOUBLE PRECISION NOT NULL,
                    roi_pct DOUBLE PRECISION NOT NULL,
                    initial_capital DOUBLE PRECISION NOT NULL,
                    PRIMARY KEY (strategy_name, pocket_name, date)
                );",
            )
            .map_err(query_err)
    }

    fn query_settlements(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<DailySettlement>, TradeArenaError> {
        self.conn()?
            .query(sql, params)
            .map_err(query_err)?
            .iter()
            .map(settlement_from_row)
            .collect()
    }
}

impl SettlementStore for PostgresAdapter {
    fn latest_before(
        &self,
        strategy: &str,
        pocket: &str,
        date: NaiveDate,
    ) -> Result<Option<DailySettlement>, TradeArenaError> {
        let sql = format!(
            "SELECT {SETTLEMENT_COLUMNS} FROM paper_trading \
             WHERE strategy_name = $1 AND pocket_name = $2 AND date < $3 \
             ORDER BY date DESC LIMIT 1"
        );
        Ok(self
            .query_settlements(&sql, &[&strategy, &pocket, &date])?
            .into_iter()
            .next())
    }

    fn upsert(&self, record: &DailySettlement) -> Result<(), TradeArenaError> {
        let sql = format!(
            "INSERT INTO paper_trading ({SETTLEMENT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             ON CONFLICT (strategy_name, pocket_name, date) DO UPDATE SET \
                price = EXCLUDED.price, signal = EXCLUDED.signal, action = EXCLUDED.action, \
                shares = EXCLUDED.shares, cash = EXCLUDED.cash, \
                total_assets = EXCLUDED.total_assets, roi_pct = EXCLUDED.roi_pct, \
                initial_capital = EXCLUDED.initial_capital"
        );
        let signal = record.signal.to_string();
        let shares = record.shares as i64;
        self.conn()?
            .execute(
                sql.as_str(),
                &[
                    &record.strategy,
                    &record.pocket,
                    &record.date,
                    &record.price,
                    &signal,
                    &record.action,
                    &shares,
                    &record.cash,
                    &record.total_assets,
                    &record.roi_pct,
                    &record.initial_capital,
                ],
            )
            .map_err(query_err)?;
        Ok(())
    }

    fn query_by_date(&self, date: NaiveDate) -> Result<Vec<DailySettlement>, TradeArenaError> {
        let sql = format!(
            "SELECT {SETTLEMENT_COLUMNS} FROM paper_trading WHERE date = $1 \
             ORDER BY roi_pct DESC, strategy_name, pocket_name"
        );
        self.query_settlements(&sql, &[&date])
    }

    fn history(
        &self,
        strategy: &str,
        pocket: &str,
    ) -> Result<Vec<DailySettlement>, TradeArenaError> {
        let sql = format!(
            "SELECT {SETTLEMENT_COLUMNS} FROM paper_trading \
             WHERE strategy_name = $1 AND pocket_name = $2 ORDER BY date ASC"
        );
        self.query_settlements(&sql, &[&strategy, &pocket])
    }
}

impl PriceStore for PostgresAdapter {
    fn bulk_insert(&self, symbol: &str, bars: &[PriceBar]) -> Result<usize, TradeArenaError> {
        let mut conn = self.conn()?;
        let mut tx = conn.transaction().map_err(query_err)?;

        let mut inserted = 0u64;
        for bar in bars {
            inserted += tx
                .execute(
                    "INSERT INTO price_history (symbol, date, open, high, low, close, volume) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7) \
                     ON CONFLICT (symbol, date) DO NOTHING",
                    &[
                        &symbol,
                        &bar.date,
                        &bar.open,
                        &bar.high,
                        &bar.low,
                        &bar.close,
                        &bar.volume,
                    ],
                )
                .map_err(query_err)?;
        }

        tx.commit().map_err(query_err)?;
        Ok(inserted as usize)
    }

    fn load_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, TradeArenaError> {
        let rows = self
            .conn()?
            .query(
                "SELECT date, open, high, low, close, volume FROM price_history \
                 WHERE symbol = $1 AND date >= $2 AND date <= $3 ORDER BY date ASC",
                &[&symbol, &start, &end],
            )
            .map_err(query_err)?;

        Ok(rows
            .into_iter()
            .map(|row| PriceBar {
                date: row.get(0),
                open: row.get(1),
                high: row.get(2),
                low: row.get(3),
                close: row.get(4),
                volume: row.get(5),
            })
            .collect())
    }
}
