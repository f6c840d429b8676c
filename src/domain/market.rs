//! Loading a symbol's price history from the provider, with cache fallback.

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::domain::corporate_action::{reconcile, CorporateActionPatch, ReconciledSeries};
use crate::domain::error::TradeArenaError;
use crate::domain::ohlcv::PriceSeries;
use crate::ports::data_port::MarketDataPort;
use crate::ports::store_port::PriceStore;

fn from_cache(
    cache: Option<&dyn PriceStore>,
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Option<PriceSeries>, TradeArenaError> {
    let Some(cache) = cache else {
        return Ok(None);
    };
    let bars = cache.load_bars(symbol, start, end)?;
    if bars.is_empty() {
        Ok(None)
    } else {
        Ok(Some(PriceSeries::new(symbol, bars)))
    }
}

/// Builds the display and calc series for `symbol` over `[start, end]`.
///
/// Display comes from the unadjusted fetch (cached on success, read from the
/// cache on failure). Calc comes from the adjusted fetch; when that fails or
/// is empty, cached bars stand in, then the display series itself. Known
/// corporate-action patches are applied to the calc side.
///
/// With no bars from any source, a fetch failure is returned as-is; `NoData`
/// means every source answered and none had bars.
pub fn load_series(
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
    provider: &dyn MarketDataPort,
    cache: Option<&dyn PriceStore>,
    patches: &[CorporateActionPatch],
) -> Result<ReconciledSeries, TradeArenaError> {
    let mut failure = None;
    let display = match provider.fetch(symbol, start, end, false) {
        Ok(bars) if !bars.is_empty() => {
            if let Some(cache) = cache {
                let inserted = cache.bulk_insert(symbol, &bars)?;
                info!(symbol, inserted, "cached raw price history");
            }
            Some(PriceSeries::new(symbol, bars))
        }
        Ok(_) => None,
        Err(e) => {
            warn!(symbol, error = %e, "raw fetch failed, trying cache");
            failure = Some(e);
            from_cache(cache, symbol, start, end)?
        }
    };

    let adjusted = match provider.fetch(symbol, start, end, true) {
        Ok(bars) if !bars.is_empty() => Some(PriceSeries::new(symbol, bars)),
        Ok(_) => None,
        Err(e) => {
            warn!(symbol, error = %e, "adjusted fetch failed");
            if failure.is_none() {
                failure = Some(e);
            }
            None
        }
    };

    let calc_source = match adjusted {
        Some(series) => Some(series),
        None => match from_cache(cache, symbol, start, end)? {
            Some(cached) => {
                warn!(symbol, "using cached bars for indicator calculation");
                Some(cached)
            }
            None => display.clone(),
        },
    };

    // Nothing usable: a failed fetch outranks an empty answer.
    let (Some(calc_source), display) = (calc_source, display) else {
        return Err(failure.unwrap_or_else(|| TradeArenaError::NoData {
            symbol: symbol.to_string(),
        }));
    };

    let reconciled = reconcile(&calc_source, patches);
    Ok(match display {
        Some(display) => reconciled.with_display(display),
        None => reconciled,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::PriceBar;
    use std::cell::RefCell;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn bars(prices: &[f64]) -> Vec<PriceBar> {
        prices
            .iter()
            .enumerate()
            .map(|(i, &p)| PriceBar::flat(day(i as u32 + 1), p, 100))
            .collect()
    }

    struct Provider {
        raw: Result<Vec<PriceBar>, ()>,
        adjusted: Result<Vec<PriceBar>, ()>,
    }

    impl MarketDataPort for Provider {
        fn fetch(
            &self,
            symbol: &str,
            _start: NaiveDate,
            _end: NaiveDate,
            adjusted: bool,
        ) -> Result<Vec<PriceBar>, TradeArenaError> {
            let source = if adjusted { &self.adjusted } else { &self.raw };
            source.clone().map_err(|_| TradeArenaError::ProviderFetch {
                symbol: symbol.to_string(),
                reason: "timeout".into(),
            })
        }
    }

    #[derive(Default)]
    struct Cache {
        bars: RefCell<Vec<PriceBar>>,
    }

    impl PriceStore for Cache {
        fn bulk_insert(&self, _symbol: &str, bars: &[PriceBar]) -> Result<usize, TradeArenaError> {
            let mut stored = self.bars.borrow_mut();
            let before = stored.len();
            for bar in bars {
                if !stored.iter().any(|b| b.date == bar.date) {
                    stored.push(bar.clone());
                }
            }
            Ok(stored.len() - before)
        }

        fn load_bars(
            &self,
            _symbol: &str,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<Vec<PriceBar>, TradeArenaError> {
            Ok(self.bars.borrow().clone())
        }
    }

    #[test]
    fn uses_adjusted_for_calc_and_raw_for_display() {
        let provider = Provider {
            raw: Ok(bars(&[10.0, 11.0])),
            adjusted: Ok(bars(&[9.0, 10.0])),
        };
        let cache = Cache::default();
        let series = load_series("X", day(1), day(2), &provider, Some(&cache), &[]).unwrap();
        assert_eq!(series.display.closes(), vec![10.0, 11.0]);
        assert_eq!(series.calc.closes(), vec![9.0, 10.0]);
        assert_eq!(cache.bars.borrow().len(), 2);
    }

    #[test]
    fn adjusted_failure_falls_back_to_cache() {
        let cache = Cache::default();
        cache.bulk_insert("X", &bars(&[5.0, 6.0])).unwrap();
        let provider = Provider {
            raw: Err(()),
            adjusted: Err(()),
        };
        let series = load_series("X", day(1), day(2), &provider, Some(&cache), &[]).unwrap();
        assert_eq!(series.calc.closes(), vec![5.0, 6.0]);
        assert_eq!(series.display.closes(), vec![5.0, 6.0]);
    }

    #[test]
    fn empty_adjusted_without_cache_uses_raw() {
        let provider = Provider {
            raw: Ok(bars(&[10.0, 11.0])),
            adjusted: Ok(vec![]),
        };
        let series = load_series("X", day(1), day(2), &provider, None, &[]).unwrap();
        assert_eq!(series.calc.closes(), vec![10.0, 11.0]);
    }

    #[test]
    fn nothing_anywhere_is_no_data() {
        let provider = Provider {
            raw: Ok(vec![]),
            adjusted: Ok(vec![]),
        };
        let cache = Cache::default();
        let err = load_series("X", day(1), day(2), &provider, Some(&cache), &[]).unwrap_err();
        assert!(matches!(err, TradeArenaError::NoData { .. }));
    }

    #[test]
    fn failed_fetches_without_cache_are_provider_errors() {
        let provider = Provider {
            raw: Err(()),
            adjusted: Err(()),
        };
        let err = load_series("X", day(1), day(2), &provider, None, &[]).unwrap_err();
        assert!(matches!(err, TradeArenaError::ProviderFetch { ref symbol, .. } if symbol == "X"));
        assert_eq!(std::process::ExitCode::from(&err), std::process::ExitCode::from(6));
    }

    #[test]
    fn empty_raw_with_failed_adjusted_is_provider_error() {
        let provider = Provider {
            raw: Ok(vec![]),
            adjusted: Err(()),
        };
        let err = load_series("X", day(1), day(2), &provider, None, &[]).unwrap_err();
        assert!(matches!(err, TradeArenaError::ProviderFetch { .. }));
    }

    #[test]
    fn cache_hides_fetch_failure() {
        let cache = Cache::default();
        cache.bulk_insert("X", &bars(&[5.0])).unwrap();
        let provider = Provider {
            raw: Err(()),
            adjusted: Ok(vec![]),
        };
        assert!(load_series("X", day(1), day(2), &provider, Some(&cache), &[]).is_ok());
    }
}
