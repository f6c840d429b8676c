//! Signal detection rules.
//!
//! Every rule is a pure function of the indicator instants passed in. Rules
//! that depend on whether the account is holding take the position state as an
//! argument; nothing is remembered between calls.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::indicator::{MacdValue, StochasticValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Buy => write!(f, "BUY"),
            Signal::Sell => write!(f, "SELL"),
            Signal::Hold => write!(f, "HOLD"),
        }
    }
}

impl FromStr for Signal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(Signal::Buy),
            "SELL" => Ok(Signal::Sell),
            "HOLD" => Ok(Signal::Hold),
            other => Err(format!("unknown signal: {other}")),
        }
    }
}

/// Single-position state of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionState {
    Flat,
    Long,
}

impl PositionState {
    pub fn from_shares(shares: u64) -> Self {
        if shares > 0 {
            PositionState::Long
        } else {
            PositionState::Flat
        }
    }
}

/// Golden/death cross of DIF against its signal line.
///
/// A tie on the current bar never produces a signal.
pub fn detect_crossover(prev: &MacdValue, curr: &MacdValue) -> Signal {
    if prev.dif <= prev.signal && curr.dif > curr.signal {
        Signal::Buy
    } else if prev.dif >= prev.signal && curr.dif < curr.signal {
        Signal::Sell
    } else {
        Signal::Hold
    }
}

/// Oversold entry / overbought exit on %K.
pub fn detect_threshold(
    curr: &StochasticValue,
    position: PositionState,
    buy_threshold: f64,
    sell_threshold: f64,
) -> Signal {
    match position {
        PositionState::Flat if curr.k < buy_threshold => Signal::Buy,
        PositionState::Long if curr.k > sell_threshold => Signal::Sell,
        _ => Signal::Hold,
    }
}

/// %K over %D, only while price trades above its long moving average.
pub fn detect_trend(
    curr: &StochasticValue,
    close: f64,
    moving_average: f64,
    position: PositionState,
) -> Signal {
    match position {
        PositionState::Flat if close > moving_average && curr.k > curr.d => Signal::Buy,
        PositionState::Long if curr.k < curr.d || close < moving_average => Signal::Sell,
        _ => Signal::Hold,
    }
}
