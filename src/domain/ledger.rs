//! Paper-trading ledger.
//!
//! One account per (strategy, pocket). Each settlement reads the state left
//! by the most recent row strictly before its date, so settling the same date
//! twice is idempotent and back-filling an earlier date never compounds.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::error::TradeArenaError;
use crate::domain::execution::{simulate, FeeSchedule};
use crate::domain::signal::{PositionState, Signal};
use crate::ports::store_port::SettlementStore;

/// A configured capital pocket.
#[derive(Debug, Clone, PartialEq)]
pub struct PocketSpec {
    pub name: String,
    pub initial_capital: f64,
}

impl PocketSpec {
    pub fn new(name: impl Into<String>, initial_capital: f64) -> Self {
        PocketSpec {
            name: name.into(),
            initial_capital,
        }
    }
}

/// Default pockets, smallest first.
pub fn default_pockets() -> Vec<PocketSpec> {
    vec![
        PocketSpec::new("micro", 1_000.0),
        PocketSpec::new("small", 10_000.0),
        PocketSpec::new("standard", 100_000.0),
        PocketSpec::new("advanced", 500_000.0),
        PocketSpec::new("whale", 1_000_000.0),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySettlement {
    pub strategy: String,
    pub pocket: String,
    pub date: NaiveDate,
    pub price: f64,
    pub signal: Signal,
    pub action: String,
    pub shares: u64,
    pub cash: f64,
    pub total_assets: f64,
    pub roi_pct: f64,
    pub initial_capital: f64,
}

/// Account state going into a settlement date.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpeningState {
    pub cash: f64,
    pub shares: u64,
    pub initial_capital: f64,
}

impl OpeningState {
    pub fn position(&self) -> PositionState {
        PositionState::from_shares(self.shares)
    }
}

/// Derived view of one ledger lineage.
#[derive(Debug, Clone, PartialEq)]
pub struct PocketAccount {
    pub pocket: String,
    pub strategy: String,
    pub initial_capital: f64,
    pub cash: f64,
    pub shares: u64,
    pub total_assets: f64,
    pub roi_pct: f64,
    pub history: Vec<DailySettlement>,
}

pub fn roi_pct(total_assets: f64, initial_capital: f64) -> f64 {
    if initial_capital > 0.0 {
        (total_assets - initial_capital) / initial_capital * 100.0
    } else {
        0.0
    }
}

pub struct Ledger<'a> {
    store: &'a dyn SettlementStore,
    fees: FeeSchedule,
}

impl<'a> Ledger<'a> {
    pub fn new(store: &'a dyn SettlementStore, fees: FeeSchedule) -> Self {
        Ledger { store, fees }
    }

    pub fn fees(&self) -> &FeeSchedule {
        &self.fees
    }

    /// State left by the latest settlement before `date`, or a fresh flat
    /// account holding the pocket's initial capital.
    pub fn opening_state(
        &self,
        strategy: &str,
        pocket: &PocketSpec,
        date: NaiveDate,
    ) -> Result<OpeningState, TradeArenaError> {
        Ok(
            match self.store.latest_before(strategy, &pocket.name, date)? {
                Some(prev) => OpeningState {
                    cash: prev.cash,
                    shares: prev.shares,
                    initial_capital: prev.initial_capital,
                },
                None => OpeningState {
                    cash: pocket.initial_capital,
                    shares: 0,
                    initial_capital: pocket.initial_capital,
                },
            },
        )
    }

    pub fn settle(
        &self,
        strategy: &str,
        pocket: &PocketSpec,
        date: NaiveDate,
        price: f64,
        signal: Signal,
    ) -> Result<DailySettlement, TradeArenaError> {
        let opening = self.opening_state(strategy, pocket, date)?;
        let exec = simulate(signal, opening.cash, opening.shares, price, &self.fees);

        let total_assets = exec.cash + exec.shares as f64 * price;
        let record = DailySettlement {
            strategy: strategy.to_string(),
            pocket: pocket.name.clone(),
            date,
            price,
            signal,
            action: exec.action.to_string(),
            shares: exec.shares,
            cash: exec.cash,
            total_assets,
            roi_pct: roi_pct(total_assets, opening.initial_capital),
            initial_capital: opening.initial_capital,
        };

        debug!(
            strategy,
            pocket = %pocket.name,
            %date,
            %signal,
            action = %record.action,
            "settled"
        );

        self.store.upsert(&record)?;
        Ok(record)
    }

    pub fn account(
        &self,
        strategy: &str,
        pocket: &PocketSpec,
    ) -> Result<PocketAccount, TradeArenaError> {
        let history = self.store.history(strategy, &pocket.name)?;
        let account = match history.last() {
            Some(last) => PocketAccount {
                pocket: pocket.name.clone(),
                strategy: strategy.to_string(),
                initial_capital: last.initial_capital,
                cash: last.cash,
                shares: last.shares,
                total_assets: last.total_assets,
                roi_pct: last.roi_pct,
                history: Vec::new(),
            },
            None => PocketAccount {
                pocket: pocket.name.clone(),
                strategy: strategy.to_string(),
                initial_capital: pocket.initial_capital,
                cash: pocket.initial_capital,
                shares: 0,
                total_assets: pocket.initial_capital,
                roi_pct: 0.0,
                history: Vec::new(),
            },
        };
        Ok(PocketAccount { history, ..account })
    }
}
