//! MACD (Moving Average Convergence Divergence) indicator.
//!
//! DIF        = EMA(fast) - EMA(slow)
//! Signal     = EMA(signal) of DIF
//! Oscillator = DIF - Signal
//!
//! Every EMA is seeded with its first input, so values exist from bar 0.
//! A point is valid once `max(fast, slow, signal)` bars have been seen.
//! Fewer than `slow + signal` input bars is an error rather than a short series.

use crate::domain::error::TradeArenaError;
use crate::domain::indicator::{
    ema_values, IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue, MacdValue,
};
use crate::domain::ohlcv::PriceSeries;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

/// Minimum number of bars `calculate_macd` accepts.
pub fn required_bars(slow: usize, signal: usize) -> usize {
    slow + signal
}

pub fn calculate_macd(
    series: &PriceSeries,
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> Result<IndicatorSeries, TradeArenaError> {
    let minimum = required_bars(slow, signal_period).max(1);
    if series.len() < minimum || fast == 0 || slow == 0 || signal_period == 0 {
        return Err(TradeArenaError::InsufficientData {
            symbol: series.symbol.clone(),
            bars: series.len(),
            minimum,
        });
    }

    let closes = series.closes();
    let ema_fast = ema_values(&closes, fast);
    let ema_slow = ema_values(&closes, slow);

    let dif: Vec<f64> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| f - s)
        .collect();
    let signal_line = ema_values(&dif, signal_period);

    let warmup = fast.max(slow).max(signal_period);

    let values = series
        .bars
        .iter()
        .enumerate()
        .map(|(i, bar)| IndicatorPoint {
            date: bar.date,
            valid: i + 1 >= warmup,
            value: IndicatorValue::Macd(MacdValue {
                fast: ema_fast[i],
                slow: ema_slow[i],
                dif: dif[i],
                signal: signal_line[i],
                oscillator: dif[i] - signal_line[i],
            }),
        })
        .collect();

    Ok(IndicatorSeries {
        indicator_type: IndicatorType::Macd {
            fast,
            slow,
            signal: signal_period,
        },
        values,
    })
}

pub fn calculate_macd_default(series: &PriceSeries) -> Result<IndicatorSeries, TradeArenaError> {
    calculate_macd(series, DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL)
}
