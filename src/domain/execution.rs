//! Order execution simulation.
//!
//! All-in/all-out on a single long position: a BUY spends as much of the
//! cash as the reserve ratio allows, a SELL liquidates every share. Execution
//! infeasibility is reported through `Action`, never as an error.

use std::fmt;

use crate::domain::signal::Signal;

/// Fee and tax model applied to every fill.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeeSchedule {
    pub fee_rate: f64,
    pub minimum_fee: f64,
    pub tax_rate: f64,
    /// Fraction of cash usable for share purchase; the rest covers fees.
    pub reserve_ratio: f64,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        FeeSchedule {
            fee_rate: 0.001425,
            minimum_fee: 20.0,
            tax_rate: 0.001,
            reserve_ratio: 0.995,
        }
    }
}

impl FeeSchedule {
    /// Broker fee: `max(minimum_fee, value * fee_rate)`.
    pub fn fee(&self, trade_value: f64) -> f64 {
        (trade_value * self.fee_rate).max(self.minimum_fee)
    }

    pub fn tax(&self, trade_value: f64) -> f64 {
        trade_value * self.tax_rate
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    Bought {
        shares: u64,
        cost: f64,
        fee: f64,
    },
    Sold {
        shares: u64,
        revenue: f64,
        fee: f64,
        tax: f64,
    },
    InsufficientFunds,
    CannotAffordShare,
    Holding,
    Flat,
}

impl Action {
    pub fn is_trade(&self) -> bool {
        matches!(self, Action::Bought { .. } | Action::Sold { .. })
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Bought { shares, cost, fee } => {
                write!(f, "BOUGHT {} shares (cost {:.2}, fee {:.2})", shares, cost, fee)
            }
            Action::Sold {
                shares,
                revenue,
                fee,
                tax,
            } => write!(
                f,
                "SOLD {} shares (revenue {:.2}, fee {:.2}, tax {:.2})",
                shares, revenue, fee, tax
            ),
            Action::InsufficientFunds => write!(f, "INSUFFICIENT FUNDS"),
            Action::CannotAffordShare => write!(f, "CANNOT AFFORD ONE SHARE"),
            Action::Holding => write!(f, "HOLDING"),
            Action::Flat => write!(f, "FLAT"),
        }
    }
}

/// Account state after applying one signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Execution {
    pub cash: f64,
    pub shares: u64,
    pub action: Action,
}

/// Applies `signal` to the account at `price`.
///
/// Steps:
/// 1. BUY while flat with `cash > price`: size `floor(cash / price * reserve)`
///    shares, charge `cost + fee` when cash covers it
/// 2. SELL while long: sell everything, credit `revenue - fee - tax`
/// 3. anything else leaves the account unchanged
pub fn simulate(
    signal: Signal,
    cash: f64,
    shares: u64,
    price: f64,
    fees: &FeeSchedule,
) -> Execution {
    let unchanged = |action| Execution {
        cash,
        shares,
        action,
    };
    let idle = if shares > 0 {
        Action::Holding
    } else {
        Action::Flat
    };

    if !(price > 0.0) {
        return unchanged(idle);
    }

    match signal {
        Signal::Buy if shares > 0 => unchanged(Action::Holding),
        Signal::Buy if cash <= price => unchanged(Action::CannotAffordShare),
        Signal::Buy => {
            let max_shares = (cash / price * fees.reserve_ratio).floor() as u64;
            if max_shares == 0 {
                return unchanged(Action::CannotAffordShare);
            }
            let cost = max_shares as f64 * price;
            let fee = fees.fee(cost);
            if cash < cost + fee {
                return unchanged(Action::InsufficientFunds);
            }
            Execution {
                cash: cash - cost - fee,
                shares: max_shares,
                action: Action::Bought {
                    shares: max_shares,
                    cost,
                    fee,
                },
            }
        }
        Signal::Sell if shares > 0 => {
            let revenue = shares as f64 * price;
            let fee = fees.fee(revenue);
            let tax = fees.tax(revenue);
            Execution {
                cash: cash + revenue - fee - tax,
                shares: 0,
                action: Action::Sold {
                    shares,
                    revenue,
                    fee,
                    tax,
                },
            }
        }
        Signal::Sell | Signal::Hold => unchanged(idle),
    }
}
