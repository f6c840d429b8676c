//! Exponential Moving Average indicator.
//!
//! k = 2/(n+1), EMA[0] = C[0], then EMA[i] = C[i]*k + EMA[i-1]*(1-k),
//! evaluated as EMA[i-1] + k*(C[i] - EMA[i-1]) so a constant input stays
//! exactly constant.
//! The recurrence is defined from the first bar; points before index n-1 are
//! marked invalid because they have not seen a full period yet.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::PriceBar;

/// Raw EMA recurrence over `values`. Empty input or period 0 yields an empty vec.
pub fn ema_values(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.is_empty() {
        return Vec::new();
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut ema = values[0];
    out.push(ema);
    for &v in &values[1..] {
        ema += k * (v - ema);
        out.push(ema);
    }
    out
}

pub fn calculate_ema(bars: &[PriceBar], period: usize) -> IndicatorSeries {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let ema = ema_values(&closes, period);

    let values = bars
        .iter()
        .zip(ema)
        .enumerate()
        .map(|(i, (bar, v))| IndicatorPoint {
            date: bar.date,
            valid: i + 1 >= period,
            value: IndicatorValue::Simple(v),
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Ema(period),
        values,
    }
}
