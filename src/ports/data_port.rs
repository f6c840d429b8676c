//! Market data provider port.

use crate::domain::error::TradeArenaError;
use crate::domain::ohlcv::PriceBar;
use chrono::NaiveDate;

pub trait MarketDataPort {
    /// Daily bars for `symbol` in `[start, end]`.
    ///
    /// `adjusted` selects the corporate-action adjusted series. `Ok(vec![])`
    /// means the provider has no data; `Err` means the fetch itself failed.
    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        adjusted: bool,
    ) -> Result<Vec<PriceBar>, TradeArenaError>;
}
