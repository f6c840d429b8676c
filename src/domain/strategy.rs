//! Strategy configuration and dispatch.
//!
//! Strategies are a closed set of variants, each with its own parameters.
//! The display name (`MACD(12,26,9)`, `KD(9,3,20,80)`, `TRENDKD(200,9,3)`)
//! encodes every parameter and is the identifier used for persistence; it
//! parses back into the same configuration.

use std::fmt;
use std::str::FromStr;

use crate::domain::error::TradeArenaError;
use crate::domain::indicator::{
    calculate_macd, calculate_sma, calculate_stochastic, stochastic, IndicatorSeries, MacdValue,
    StochasticValue, MIN_RELIABLE_BARS,
};
use crate::domain::ohlcv::PriceSeries;
use crate::domain::signal::{
    detect_crossover, detect_threshold, detect_trend, PositionState, Signal,
};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StrategyParseError {
    #[error("unknown strategy family in '{0}'")]
    UnknownFamily(String),

    #[error("malformed strategy name '{0}' (expected FAMILY(p1,p2,...))")]
    Malformed(String),

    #[error("strategy '{name}' expects {expected} parameters, got {got}")]
    ParamCount {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("invalid parameter in '{name}': {reason}")]
    InvalidParam { name: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdParams {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KdParams {
    pub k_period: usize,
    pub d_period: usize,
    pub buy_threshold: f64,
    pub sell_threshold: f64,
}

impl Default for KdParams {
    fn default() -> Self {
        KdParams {
            k_period: 9,
            d_period: 3,
            buy_threshold: 20.0,
            sell_threshold: 80.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendKdParams {
    pub ma_period: usize,
    pub k_period: usize,
    pub d_period: usize,
}

impl Default for TrendKdParams {
    fn default() -> Self {
        TrendKdParams {
            ma_period: 200,
            k_period: 9,
            d_period: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StrategyKind {
    Macd(MacdParams),
    Kd(KdParams),
    TrendKd(TrendKdParams),
}

/// Indicator state a strategy looks at on one bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Snapshot {
    Macd(MacdValue),
    Kd(StochasticValue),
    TrendKd {
        stochastic: StochasticValue,
        close: f64,
        moving_average: f64,
    },
}

/// Precomputed indicator series for one strategy over one calc series.
#[derive(Debug, Clone)]
pub enum StrategyIndicators {
    Macd(IndicatorSeries),
    Kd(IndicatorSeries),
    TrendKd {
        stochastic: IndicatorSeries,
        moving_average: IndicatorSeries,
        closes: Vec<f64>,
    },
}

impl StrategyIndicators {
    pub fn len(&self) -> usize {
        match self {
            StrategyIndicators::Macd(s) | StrategyIndicators::Kd(s) => s.len(),
            StrategyIndicators::TrendKd { closes, .. } => closes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot at `index`, or `None` inside the warm-up window.
    pub fn snapshot(&self, index: usize) -> Option<Snapshot> {
        match self {
            StrategyIndicators::Macd(s) => s.values.get(index)?.macd().map(Snapshot::Macd),
            StrategyIndicators::Kd(s) => s.values.get(index)?.stochastic().map(Snapshot::Kd),
            StrategyIndicators::TrendKd {
                stochastic,
                moving_average,
                closes,
            } => Some(Snapshot::TrendKd {
                stochastic: stochastic.values.get(index)?.stochastic()?,
                close: *closes.get(index)?,
                moving_average: moving_average.values.get(index)?.simple()?,
            }),
        }
    }
}

impl StrategyKind {
    /// Bars required before a run of this strategy is considered meaningful.
    pub fn min_bars(&self) -> usize {
        let needed = match self {
            StrategyKind::Macd(p) => p.slow + p.signal,
            StrategyKind::Kd(p) => stochastic::required_bars(p.k_period, p.d_period),
            StrategyKind::TrendKd(p) => p
                .ma_period
                .max(stochastic::required_bars(p.k_period, p.d_period)),
        };
        needed.max(MIN_RELIABLE_BARS)
    }

    /// Classifies the transition from `prev` to `curr`.
    ///
    /// Snapshots of a different family than the strategy yield `Hold`.
    pub fn detect(&self, prev: &Snapshot, curr: &Snapshot, position: PositionState) -> Signal {
        match (self, prev, curr) {
            (StrategyKind::Macd(_), Snapshot::Macd(p), Snapshot::Macd(c)) => detect_crossover(p, c),
            (StrategyKind::Kd(params), _, Snapshot::Kd(c)) => detect_threshold(
                c,
                position,
                params.buy_threshold,
                params.sell_threshold,
            ),
            (
                StrategyKind::TrendKd(_),
                _,
                Snapshot::TrendKd {
                    stochastic,
                    close,
                    moving_average,
                },
            ) => detect_trend(stochastic, *close, *moving_average, position),
            _ => Signal::Hold,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyConfig {
    pub name: String,
    pub kind: StrategyKind,
}

impl StrategyConfig {
    pub fn new(kind: StrategyKind) -> Self {
        StrategyConfig {
            name: format_name(&kind),
            kind,
        }
    }

    pub fn macd(fast: usize, slow: usize, signal: usize) -> Self {
        Self::new(StrategyKind::Macd(MacdParams { fast, slow, signal }))
    }

    pub fn min_bars(&self) -> usize {
        self.kind.min_bars()
    }

    /// Computes the indicators this strategy needs over `calc`.
    pub fn compute(&self, calc: &PriceSeries) -> Result<StrategyIndicators, TradeArenaError> {
        let minimum = self.min_bars();
        if calc.len() < minimum {
            return Err(TradeArenaError::InsufficientData {
                symbol: calc.symbol.clone(),
                bars: calc.len(),
                minimum,
            });
        }

        Ok(match self.kind {
            StrategyKind::Macd(p) => {
                StrategyIndicators::Macd(calculate_macd(calc, p.fast, p.slow, p.signal)?)
            }
            StrategyKind::Kd(p) => {
                StrategyIndicators::Kd(calculate_stochastic(&calc.bars, p.k_period, p.d_period))
            }
            StrategyKind::TrendKd(p) => StrategyIndicators::TrendKd {
                stochastic: calculate_stochastic(&calc.bars, p.k_period, p.d_period),
                moving_average: calculate_sma(&calc.bars, p.ma_period),
                closes: calc.closes(),
            },
        })
    }

    /// Signal on bar `index`, comparing it with bar `index - 1`.
    pub fn signal_at(
        &self,
        indicators: &StrategyIndicators,
        index: usize,
        position: PositionState,
    ) -> Signal {
        if index == 0 {
            return Signal::Hold;
        }
        match (indicators.snapshot(index - 1), indicators.snapshot(index)) {
            (Some(prev), Some(curr)) => self.kind.detect(&prev, &curr, position),
            _ => Signal::Hold,
        }
    }
}

impl fmt::Display for StrategyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

fn format_name(kind: &StrategyKind) -> String {
    match kind {
        StrategyKind::Macd(p) => format!("MACD({},{},{})", p.fast, p.slow, p.signal),
        StrategyKind::Kd(p) => format!(
            "KD({},{},{},{})",
            p.k_period, p.d_period, p.buy_threshold, p.sell_threshold
        ),
        StrategyKind::TrendKd(p) => {
            format!("TRENDKD({},{},{})", p.ma_period, p.k_period, p.d_period)
        }
    }
}

impl FromStr for StrategyConfig {
    type Err = StrategyParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let name = input.trim();
        let (family, rest) = name
            .split_once('(')
            .ok_or_else(|| StrategyParseError::Malformed(name.to_string()))?;
        let args = rest
            .strip_suffix(')')
            .ok_or_else(|| StrategyParseError::Malformed(name.to_string()))?;

        let params: Vec<f64> = args
            .split(',')
            .map(|a| {
                a.trim()
                    .parse::<f64>()
                    .map_err(|e| StrategyParseError::InvalidParam {
                        name: name.to_string(),
                        reason: format!("'{}': {}", a.trim(), e),
                    })
            })
            .collect::<Result<_, _>>()?;

        let period = |i: usize| -> Result<usize, StrategyParseError> {
            let v = params[i];
            if v < 1.0 || v.fract() != 0.0 {
                return Err(StrategyParseError::InvalidParam {
                    name: name.to_string(),
                    reason: format!("period must be a positive integer, got {v}"),
                });
            }
            Ok(v as usize)
        };
        let expect = |n: usize| -> Result<(), StrategyParseError> {
            if params.len() != n {
                return Err(StrategyParseError::ParamCount {
                    name: name.to_string(),
                    expected: n,
                    got: params.len(),
                });
            }
            Ok(())
        };

        let kind = match family.trim().to_ascii_uppercase().as_str() {
            "MACD" => {
                expect(3)?;
                let p = MacdParams {
                    fast: period(0)?,
                    slow: period(1)?,
                    signal: period(2)?,
                };
                if p.fast >= p.slow {
                    return Err(StrategyParseError::InvalidParam {
                        name: name.to_string(),
                        reason: "fast period must be shorter than slow period".into(),
                    });
                }
                StrategyKind::Macd(p)
            }
            "KD" => {
                expect(4)?;
                let p = KdParams {
                    k_period: period(0)?,
                    d_period: period(1)?,
                    buy_threshold: params[2],
                    sell_threshold: params[3],
                };
                if !(0.0..=100.0).contains(&p.buy_threshold)
                    || !(0.0..=100.0).contains(&p.sell_threshold)
                    || p.buy_threshold >= p.sell_threshold
                {
                    return Err(StrategyParseError::InvalidParam {
                        name: name.to_string(),
                        reason: "thresholds must satisfy 0 <= buy < sell <= 100".into(),
                    });
                }
                StrategyKind::Kd(p)
            }
            "TRENDKD" => {
                expect(3)?;
                StrategyKind::TrendKd(TrendKdParams {
                    ma_period: period(0)?,
                    k_period: period(1)?,
                    d_period: period(2)?,
                })
            }
            _ => return Err(StrategyParseError::UnknownFamily(name.to_string())),
        };

        Ok(StrategyConfig::new(kind))
    }
}

/// Splits a comma-separated list of strategy names, respecting parentheses.
pub fn parse_strategy_list(input: &str) -> Result<Vec<StrategyConfig>, StrategyParseError> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();

    for c in input.chars() {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => {
                if !current.trim().is_empty() {
                    out.push(current.trim().parse()?);
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        out.push(current.trim().parse()?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::PriceBar;
    use chrono::NaiveDate;

    fn series(prices: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        PriceSeries::new(
            "0050.TW",
            prices
                .iter()
                .enumerate()
                .map(|(i, &p)| PriceBar::flat(start + chrono::Duration::days(i as i64), p, 10))
                .collect(),
        )
    }

    #[test]
    fn names_encode_parameters() {
        assert_eq!(StrategyConfig::macd(11, 45, 9).name, "MACD(11,45,9)");
        assert_eq!(
            StrategyConfig::new(StrategyKind::Kd(KdParams::default())).name,
            "KD(9,3,20,80)"
        );
        assert_eq!(
            StrategyConfig::new(StrategyKind::TrendKd(TrendKdParams::default())).name,
            "TRENDKD(200,9,3)"
        );
    }

    #[test]
    fn names_parse_back() {
        for name in ["MACD(14,40,9)", "KD(9,3,20,80)", "TRENDKD(200,9,3)", "KD(5,3,25.5,75)"] {
            let parsed: StrategyConfig = name.parse().unwrap();
            assert_eq!(parsed.name, name);
        }
        let lower: StrategyConfig = " macd( 5 , 35 , 9 ) ".parse().unwrap();
        assert_eq!(lower, StrategyConfig::macd(5, 35, 9));
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert!(matches!(
            "RSI(14)".parse::<StrategyConfig>(),
            Err(StrategyParseError::UnknownFamily(_))
        ));
        assert!(matches!(
            "MACD(12,26)".parse::<StrategyConfig>(),
            Err(StrategyParseError::ParamCount { expected: 3, got: 2, .. })
        ));
        assert!(matches!(
            "MACD 12,26,9".parse::<StrategyConfig>(),
            Err(StrategyParseError::Malformed(_))
        ));
        assert!("MACD(26,12,9)".parse::<StrategyConfig>().is_err());
        assert!("MACD(0,12,9)".parse::<StrategyConfig>().is_err());
        assert!("KD(9,3,80,20)".parse::<StrategyConfig>().is_err());
        assert!("MACD(1.5,12,9)".parse::<StrategyConfig>().is_err());
    }

    #[test]
    fn strategy_list_respects_parentheses() {
        let list = parse_strategy_list("MACD(11,45,9), KD(9,3,20,80),TRENDKD(200,9,3)").unwrap();
        let names: Vec<_> = list.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["MACD(11,45,9)", "KD(9,3,20,80)", "TRENDKD(200,9,3)"]);
        assert!(parse_strategy_list("").unwrap().is_empty());
    }

    #[test]
    fn min_bars_has_floor() {
        assert_eq!(StrategyConfig::macd(5, 20, 9).min_bars(), MIN_RELIABLE_BARS);
        assert_eq!(StrategyConfig::macd(11, 45, 9).min_bars(), 54);
        let trend = StrategyConfig::new(StrategyKind::TrendKd(TrendKdParams::default()));
        assert_eq!(trend.min_bars(), 200);
    }

    #[test]
    fn compute_rejects_short_series() {
        let err = StrategyConfig::macd(12, 26, 9)
            .compute(&series(&[100.0; 10]))
            .unwrap_err();
        assert!(matches!(
            err,
            TradeArenaError::InsufficientData { bars: 10, minimum: 35, .. }
        ));
    }

    #[test]
    fn flat_series_never_signals() {
        let strategy = StrategyConfig::macd(12, 26, 9);
        let indicators = strategy.compute(&series(&[100.0; 60])).unwrap();
        for i in 0..60 {
            assert_eq!(strategy.signal_at(&indicators, i, PositionState::Flat), Signal::Hold);
        }
    }

    #[test]
    fn warmup_bars_hold() {
        let prices: Vec<f64> = (0..60).map(|i| if i % 2 == 0 { 90.0 } else { 110.0 }).collect();
        let strategy = StrategyConfig::macd(12, 26, 9);
        let indicators = strategy.compute(&series(&prices)).unwrap();
        assert!(indicators.snapshot(24).is_none());
        assert_eq!(strategy.signal_at(&indicators, 25, PositionState::Flat), Signal::Hold);
        assert_eq!(strategy.signal_at(&indicators, 0, PositionState::Flat), Signal::Hold);
    }

    #[test]
    fn kd_buys_when_oversold() {
        let mut prices = vec![100.0; 40];
        prices.extend((0..10).map(|i| 99.0 - i as f64 * 2.0));
        let strategy = StrategyConfig::new(StrategyKind::Kd(KdParams::default()));
        let indicators = strategy.compute(&series(&prices)).unwrap();
        let last = prices.len() - 1;
        assert_eq!(strategy.signal_at(&indicators, last, PositionState::Flat), Signal::Buy);
        assert_eq!(strategy.signal_at(&indicators, last, PositionState::Long), Signal::Hold);
    }

    #[test]
    fn mismatched_snapshot_holds() {
        let kind = StrategyKind::Macd(MacdParams {
            fast: 12,
            slow: 26,
            signal: 9,
        });
        let kd = Snapshot::Kd(StochasticValue { k: 1.0, d: 2.0 });
        assert_eq!(kind.detect(&kd, &kd, PositionState::Flat), Signal::Hold);
    }
}
