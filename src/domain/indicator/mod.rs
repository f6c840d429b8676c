//! Technical indicator implementations.
//!
//! - `IndicatorPoint`: a single point in an indicator time series
//! - `IndicatorValue`: enum for the different indicator output shapes
//! - `IndicatorType`: indicator identity + parameters
//! - `IndicatorSeries`: one point per input bar; warm-up points are present
//!   but marked invalid

pub mod ema;
pub mod macd;
pub mod sma;
pub mod stochastic;

pub use ema::{calculate_ema, ema_values};
pub use macd::calculate_macd;
pub use sma::calculate_sma;
pub use stochastic::calculate_stochastic;

use chrono::NaiveDate;
use std::fmt;

/// Shortest history any strategy run accepts, regardless of its periods.
pub const MIN_RELIABLE_BARS: usize = 35;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorPoint {
    pub date: NaiveDate,
    pub valid: bool,
    pub value: IndicatorValue,
}

impl IndicatorPoint {
    pub fn simple(&self) -> Option<f64> {
        match (&self.value, self.valid) {
            (IndicatorValue::Simple(v), true) => Some(*v),
            _ => None,
        }
    }

    pub fn macd(&self) -> Option<MacdValue> {
        match (&self.value, self.valid) {
            (IndicatorValue::Macd(v), true) => Some(*v),
            _ => None,
        }
    }

    pub fn stochastic(&self) -> Option<StochasticValue> {
        match (&self.value, self.valid) {
            (IndicatorValue::Stochastic(v), true) => Some(*v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdValue {
    pub fast: f64,
    pub slow: f64,
    pub dif: f64,
    pub signal: f64,
    pub oscillator: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StochasticValue {
    pub k: f64,
    pub d: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IndicatorValue {
    Simple(f64),
    Macd(MacdValue),
    Stochastic(StochasticValue),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    Ema(usize),
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    Stochastic {
        k_period: usize,
        d_period: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
            IndicatorType::Stochastic { k_period, d_period } => {
                write!(f, "STOCHASTIC({},{})", k_period, d_period)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(valid: bool, value: IndicatorValue) -> IndicatorPoint {
        IndicatorPoint {
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            valid,
            value,
        }
    }

    #[test]
    fn indicator_type_display_macd() {
        let macd = IndicatorType::Macd {
            fast: 12,
            slow: 26,
            signal: 9,
        };
        assert_eq!(macd.to_string(), "MACD(12,26,9)");
    }

    #[test]
    fn indicator_type_display_stochastic() {
        let kd = IndicatorType::Stochastic {
            k_period: 9,
            d_period: 3,
        };
        assert_eq!(kd.to_string(), "STOCHASTIC(9,3)");
        assert_eq!(IndicatorType::Sma(200).to_string(), "SMA(200)");
    }

    #[test]
    fn invalid_points_expose_nothing() {
        let p = point(false, IndicatorValue::Simple(1.0));
        assert_eq!(p.simple(), None);

        let p = point(
            false,
            IndicatorValue::Stochastic(StochasticValue { k: 10.0, d: 20.0 }),
        );
        assert_eq!(p.stochastic(), None);
    }

    #[test]
    fn accessors_match_shape() {
        let p = point(true, IndicatorValue::Simple(4.5));
        assert_eq!(p.simple(), Some(4.5));
        assert_eq!(p.macd(), None);
        assert_eq!(p.stochastic(), None);
    }
}
