//! Stochastic oscillator (%K / %D).
//!
//! %K = 100 * (C - LL) / (HH - LL) over the last `k_period` bars,
//! 50 when the window has no range.
//! %D = SMA(%K, d_period).
//! Warmup: a point is valid once both %K and %D are defined,
//! i.e. from index `k_period + d_period - 2`.

use crate::domain::indicator::{
    IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue, StochasticValue,
};
use crate::domain::ohlcv::PriceBar;

const NEUTRAL_K: f64 = 50.0;

pub fn required_bars(k_period: usize, d_period: usize) -> usize {
    k_period + d_period - 1
}

pub fn calculate_stochastic(bars: &[PriceBar], k_period: usize, d_period: usize) -> IndicatorSeries {
    let indicator_type = IndicatorType::Stochastic { k_period, d_period };
    if k_period == 0 || d_period == 0 {
        return IndicatorSeries {
            indicator_type,
            values: Vec::new(),
        };
    }

    let mut k_values = vec![0.0; bars.len()];
    for i in (k_period - 1)..bars.len() {
        let window = &bars[i + 1 - k_period..=i];
        let highest = window.iter().map(|b| b.high).fold(f64::MIN, f64::max);
        let lowest = window.iter().map(|b| b.low).fold(f64::MAX, f64::min);
        let range = highest - lowest;
        k_values[i] = if range > 0.0 {
            100.0 * (bars[i].close - lowest) / range
        } else {
            NEUTRAL_K
        };
    }

    let warmup = k_period + d_period - 2;
    let mut values = Vec::with_capacity(bars.len());
    for (i, bar) in bars.iter().enumerate() {
        let valid = i >= warmup;
        let d = if valid {
            k_values[i + 1 - d_period..=i].iter().sum::<f64>() / d_period as f64
        } else {
            0.0
        };
        values.push(IndicatorPoint {
            date: bar.date,
            valid,
            value: IndicatorValue::Stochastic(StochasticValue { k: k_values[i], d }),
        });
    }

    IndicatorSeries {
        indicator_type,
        values,
    }
}
