//! Historical replay of a single strategy, and the MACD parameter grid search.
//!
//! Signals are evaluated on the calc series; fills happen at the display
//! close of the same bar.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info};

use crate::domain::corporate_action::ReconciledSeries;
use crate::domain::error::TradeArenaError;
use crate::domain::execution::{simulate, Action, FeeSchedule};
use crate::domain::metrics::{compute_drawdown, EquityPoint, Metrics};
use crate::domain::signal::{PositionState, Signal};
use crate::domain::strategy::StrategyConfig;

#[derive(Debug, Clone)]
pub struct BacktestConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: f64,
    pub fees: FeeSchedule,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeRecord {
    pub date: NaiveDate,
    pub action: Signal,
    pub size: u64,
    pub price: f64,
    /// Gross trade value.
    pub cost: f64,
    pub fee: f64,
    pub tax: f64,
}

#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub strategy: String,
    pub equity_curve: Vec<EquityPoint>,
    pub trade_log: Vec<TradeRecord>,
    pub final_value: f64,
    pub roi_pct: f64,
    pub max_drawdown: f64,
    pub metrics: Metrics,
}

pub fn run_backtest(
    series: &ReconciledSeries,
    strategy: &StrategyConfig,
    config: &BacktestConfig,
) -> Result<BacktestResult, TradeArenaError> {
    let indicators = strategy.compute(&series.calc)?;
    let prices = series.execution_prices();

    let mut cash = config.initial_capital;
    let mut shares = 0u64;
    let mut entry_outlay = 0.0;
    let mut equity_curve = Vec::with_capacity(prices.len());
    let mut trade_log = Vec::new();
    let mut round_trip_pnls = Vec::new();

    for (i, (bar, &price)) in series.calc.bars.iter().zip(&prices).enumerate() {
        let position = PositionState::from_shares(shares);
        let signal = strategy.signal_at(&indicators, i, position);
        let exec = simulate(signal, cash, shares, price, &config.fees);

        match exec.action {
            Action::Bought {
                shares: size,
                cost,
                fee,
            } => {
                entry_outlay = cost + fee;
                trade_log.push(TradeRecord {
                    date: bar.date,
                    action: Signal::Buy,
                    size,
                    price,
                    cost,
                    fee,
                    tax: 0.0,
                });
            }
            Action::Sold {
                shares: size,
                revenue,
                fee,
                tax,
            } => {
                round_trip_pnls.push(revenue - fee - tax - entry_outlay);
                trade_log.push(TradeRecord {
                    date: bar.date,
                    action: Signal::Sell,
                    size,
                    price,
                    cost: revenue,
                    fee,
                    tax,
                });
            }
            other if signal != Signal::Hold => {
                debug!(date = %bar.date, %signal, action = %other, "signal not executed");
            }
            _ => {}
        }

        cash = exec.cash;
        shares = exec.shares;
        equity_curve.push(EquityPoint {
            date: bar.date,
            price,
            cash,
            shares,
            equity: cash + shares as f64 * price,
        });
    }

    let final_value = equity_curve
        .last()
        .map(|p| p.equity)
        .unwrap_or(config.initial_capital);
    let roi_pct = crate::domain::ledger::roi_pct(final_value, config.initial_capital);
    let (max_drawdown, _) = compute_drawdown(&equity_curve);
    let metrics = Metrics::compute(&equity_curve, &round_trip_pnls, config.initial_capital);

    Ok(BacktestResult {
        strategy: strategy.name.clone(),
        equity_curve,
        trade_log,
        final_value,
        roi_pct,
        max_drawdown,
        metrics,
    })
}

/// Inclusive integer range with a step, written `start..end:step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamRange {
    pub start: usize,
    pub end: usize,
    pub step: usize,
}

impl ParamRange {
    pub fn values(&self) -> impl Iterator<Item = usize> + '_ {
        (self.start..=self.end).step_by(self.step.max(1))
    }
}

impl fmt::Display for ParamRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}:{}", self.start, self.end, self.step)
    }
}

impl FromStr for ParamRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (span, step) = match s.trim().split_once(':') {
            Some((span, step)) => (span, step.trim()),
            None => (s.trim(), "1"),
        };
        let (start, end) = span
            .split_once("..")
            .ok_or_else(|| format!("expected start..end[:step], got '{s}'"))?;
        let parse = |v: &str| {
            v.trim()
                .parse::<usize>()
                .map_err(|e| format!("'{}': {}", v.trim(), e))
        };
        let range = ParamRange {
            start: parse(start)?,
            end: parse(end)?,
            step: parse(step)?,
        };
        if range.step == 0 || range.start == 0 || range.start > range.end {
            return Err(format!("empty or invalid range '{s}'"));
        }
        Ok(range)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizeConfig {
    pub fast: ParamRange,
    pub slow: ParamRange,
    pub signal: usize,
    /// Drawdowns above this fraction are flagged as high risk.
    pub max_drawdown_flag: f64,
}

impl Default for OptimizeConfig {
    fn default() -> Self {
        OptimizeConfig {
            fast: ParamRange {
                start: 5,
                end: 20,
                step: 3,
            },
            slow: ParamRange {
                start: 20,
                end: 60,
                step: 5,
            },
            signal: 9,
            max_drawdown_flag: 0.30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationResult {
    pub strategy: String,
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
    pub final_value: f64,
    pub roi_pct: f64,
    pub max_drawdown: f64,
    pub trades: usize,
    pub high_risk: bool,
}

/// Backtests every MACD(fast, slow, signal) with `fast < slow`, best ROI first.
///
/// Combinations the series is too short for are skipped; if every
/// combination is too short the insufficiency error is returned.
pub fn optimize(
    series: &ReconciledSeries,
    grid: &OptimizeConfig,
    config: &BacktestConfig,
) -> Result<Vec<OptimizationResult>, TradeArenaError> {
    let mut results = Vec::new();
    let mut insufficient = None;

    for fast in grid.fast.values() {
        for slow in grid.slow.values() {
            if fast >= slow {
                continue;
            }
            let strategy = StrategyConfig::macd(fast, slow, grid.signal);
            let result = match run_backtest(series, &strategy, config) {
                Ok(result) => result,
                Err(e @ TradeArenaError::InsufficientData { .. }) => {
                    debug!(strategy = %strategy, error = %e, "skipping combination");
                    insufficient = Some(e);
                    continue;
                }
                Err(e) => return Err(e),
            };
            results.push(OptimizationResult {
                strategy: strategy.name,
                fast,
                slow,
                signal: grid.signal,
                final_value: result.final_value,
                roi_pct: result.roi_pct,
                max_drawdown: result.max_drawdown,
                trades: result.trade_log.len(),
                high_risk: result.max_drawdown > grid.max_drawdown_flag,
            });
        }
    }

    if results.is_empty() {
        if let Some(e) = insufficient {
            return Err(e);
        }
    }

    results.sort_by(|a, b| b.roi_pct.total_cmp(&a.roi_pct));
    info!(combinations = results.len(), "optimization complete");
    Ok(results)
}
