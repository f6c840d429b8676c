//! Persistence ports for settlements and cached price history.

use crate::domain::error::TradeArenaError;
use crate::domain::ledger::DailySettlement;
use crate::domain::ohlcv::PriceBar;
use chrono::NaiveDate;

/// Ledger rows keyed by (strategy, pocket, date).
pub trait SettlementStore {
    /// Most recent settlement strictly before `date`.
    fn latest_before(
        &self,
        strategy: &str,
        pocket: &str,
        date: NaiveDate,
    ) -> Result<Option<DailySettlement>, TradeArenaError>;

    /// Inserts or replaces the row for the record's key.
    fn upsert(&self, record: &DailySettlement) -> Result<(), TradeArenaError>;

    fn query_by_date(&self, date: NaiveDate) -> Result<Vec<DailySettlement>, TradeArenaError>;

    /// Every settlement of one (strategy, pocket), oldest first.
    fn history(
        &self,
        strategy: &str,
        pocket: &str,
    ) -> Result<Vec<DailySettlement>, TradeArenaError>;
}

/// Raw price history keyed by (symbol, date).
pub trait PriceStore {
    /// Inserts bars, ignoring dates already stored. Returns the number inserted.
    fn bulk_insert(&self, symbol: &str, bars: &[PriceBar]) -> Result<usize, TradeArenaError>;

    fn load_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, TradeArenaError>;
}
