//! Daily settlement of every strategy across every pocket.

use chrono::{Duration, NaiveDate};
use std::fmt::Write as _;
use tracing::{info, warn};

use crate::domain::corporate_action::CorporateActionPatch;
use crate::domain::error::TradeArenaError;
use crate::domain::execution::FeeSchedule;
use crate::domain::ledger::{DailySettlement, Ledger, PocketSpec};
use crate::domain::market::load_series;
use crate::domain::strategy::StrategyConfig;
use crate::ports::data_port::MarketDataPort;
use crate::ports::notify_port::Notifier;
use crate::ports::store_port::{PriceStore, SettlementStore};

#[derive(Debug, Clone, PartialEq)]
pub struct BatchEntry {
    pub settlement: DailySettlement,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedStrategy {
    pub strategy: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub symbol: String,
    /// Date of the bar actually evaluated (the last one on or before the request).
    pub date: NaiveDate,
    pub price: f64,
    /// Ranked by ROI, best first.
    pub entries: Vec<BatchEntry>,
    pub skipped: Vec<SkippedStrategy>,
}

impl BatchReport {
    /// Plain-text summary used as the notification body.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{} on {} at {:.2}", self.symbol, self.date, self.price);
        for (rank, entry) in self.entries.iter().enumerate() {
            let s = &entry.settlement;
            let _ = writeln!(
                out,
                "{:>3}. {:<16} {:<10} {:>4} {:>10.2}% {}",
                rank + 1,
                s.strategy,
                s.pocket,
                s.signal,
                s.roi_pct,
                s.action
            );
        }
        for skipped in &self.skipped {
            let _ = writeln!(out, "skipped {}: {}", skipped.strategy, skipped.reason);
        }
        out
    }
}

pub struct BatchRunner<'a> {
    pub provider: &'a dyn MarketDataPort,
    pub settlements: &'a dyn SettlementStore,
    pub prices: Option<&'a dyn PriceStore>,
    pub notifier: &'a dyn Notifier,
    pub strategies: Vec<StrategyConfig>,
    pub pockets: Vec<PocketSpec>,
    pub patches: Vec<CorporateActionPatch>,
    pub fees: FeeSchedule,
    pub lookback_days: i64,
}

impl BatchRunner<'_> {
    pub fn run(&self, symbol: &str, date: NaiveDate) -> Result<BatchReport, TradeArenaError> {
        let start = date - Duration::days(self.lookback_days);
        let series = load_series(
            symbol,
            start,
            date,
            self.provider,
            self.prices,
            &self.patches,
        )?
        .truncated_to(date);

        let Some(last_bar) = series.calc.bars.last() else {
            return Err(TradeArenaError::NoData {
                symbol: symbol.to_string(),
            });
        };
        let eval_date = last_bar.date;
        let index = series.calc.len() - 1;
        let price = series
            .execution_prices()
            .last()
            .copied()
            .unwrap_or(last_bar.close);

        info!(symbol, date = %eval_date, price, bars = series.calc.len(), "running daily batch");

        let ledger = Ledger::new(self.settlements, self.fees);
        let mut entries = Vec::new();
        let mut skipped = Vec::new();

        for strategy in &self.strategies {
            let indicators = match strategy.compute(&series.calc) {
                Ok(indicators) => indicators,
                Err(e @ TradeArenaError::InsufficientData { .. }) => {
                    warn!(strategy = %strategy, error = %e, "skipping strategy");
                    skipped.push(SkippedStrategy {
                        strategy: strategy.name.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
                Err(e) => return Err(e),
            };

            for pocket in &self.pockets {
                let opening = ledger.opening_state(&strategy.name, pocket, eval_date)?;
                let signal = strategy.signal_at(&indicators, index, opening.position());
                let settlement = ledger.settle(&strategy.name, pocket, eval_date, price, signal)?;
                entries.push(BatchEntry { settlement });
            }
        }

        entries.sort_by(|a, b| b.settlement.roi_pct.total_cmp(&a.settlement.roi_pct));

        let report = BatchReport {
            symbol: symbol.to_string(),
            date: eval_date,
            price,
            entries,
            skipped,
        };

        let subject = format!("tradearena {} {}", symbol, eval_date);
        if let Err(e) = self.notifier.notify(&subject, &report.summary()) {
            warn!(error = %e, "notification failed");
        }

        Ok(report)
    }
}
