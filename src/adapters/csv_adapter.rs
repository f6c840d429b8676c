//! CSV file market data adapter.
//!
//! Reads `<symbol>_raw.csv` and `<symbol>_adj.csv` from a directory, each with
//! a `date,open,high,low,close,volume` header.

use crate::domain::error::TradeArenaError;
use crate::domain::ohlcv::PriceBar;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::MarketDataPort;
use chrono::NaiveDate;
use std::path::PathBuf;
use tracing::debug;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, TradeArenaError> {
        let dir = config
            .get_string("data", "dir")
            .ok_or_else(|| TradeArenaError::ConfigMissing {
                section: "data".into(),
                key: "dir".into(),
            })?;
        Ok(Self::new(PathBuf::from(dir)))
    }

    pub fn csv_path(&self, symbol: &str, adjusted: bool) -> PathBuf {
        let kind = if adjusted { "adj" } else { "raw" };
        self.base_path.join(format!("{}_{}.csv", symbol, kind))
    }
}

impl MarketDataPort for CsvAdapter {
    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        adjusted: bool,
    ) -> Result<Vec<PriceBar>, TradeArenaError> {
        let path = self.csv_path(symbol, adjusted);
        if !path.exists() {
            debug!(path = %path.display(), "no price file");
            return Ok(Vec::new());
        }

        let fetch_err = |reason: String| TradeArenaError::ProviderFetch {
            symbol: symbol.to_string(),
            reason,
        };

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&path)
            .map_err(|e| fetch_err(format!("failed to read {}: {}", path.display(), e)))?;

        let mut bars = Vec::new();
        for result in rdr.deserialize::<PriceBar>() {
            let bar = result.map_err(|e| fetch_err(format!("CSV parse error: {}", e)))?;
            if bar.date >= start && bar.date <= end {
                bars.push(bar);
            }
        }

        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }
}
