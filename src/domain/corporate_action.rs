//! Corporate-action price reconciliation.
//!
//! The upstream provider is known to retroactively adjust some historical
//! windows inconsistently. Each known anomaly is described by an explicit
//! [`CorporateActionPatch`]; the reconciler applies a patch only when the
//! discontinuity it describes is actually present in the data, so running it
//! over an already corrected series is a no-op.

use chrono::NaiveDate;
use tracing::debug;

use super::ohlcv::{PriceBar, PriceSeries};

pub const DEFAULT_JUMP_RATIO: f64 = 3.0;

/// A known price discontinuity for one symbol over `[start, end)`.
#[derive(Debug, Clone, PartialEq)]
pub struct CorporateActionPatch {
    pub symbol: String,
    /// Inclusive; `None` covers everything before `end`.
    pub start: Option<NaiveDate>,
    /// Exclusive. The gate compares the bars on either side of this date.
    pub end: NaiveDate,
    pub price_multiplier: f64,
    /// When absent, volume is divided by `price_multiplier`.
    pub volume_multiplier: Option<f64>,
    /// Close before the boundary must exceed this multiple of the close after it.
    pub jump_ratio: f64,
}

impl CorporateActionPatch {
    pub fn covers(&self, date: NaiveDate) -> bool {
        date < self.end && self.start.is_none_or(|s| date >= s)
    }

    fn volume_factor(&self) -> f64 {
        self.volume_multiplier
            .unwrap_or(1.0 / self.price_multiplier)
    }

    /// True when the series shows the discontinuity this patch corrects.
    pub fn is_triggered(&self, bars: &[PriceBar]) -> bool {
        let split = bars.partition_point(|b| b.date < self.end);
        if split == 0 || split == bars.len() {
            return false;
        }
        let before = &bars[split - 1];
        let after = &bars[split];
        before.close > after.close * self.jump_ratio
    }

    fn apply(&self, bar: &mut PriceBar) {
        bar.open *= self.price_multiplier;
        bar.high *= self.price_multiplier;
        bar.low *= self.price_multiplier;
        bar.close *= self.price_multiplier;
        bar.volume = (bar.volume as f64 * self.volume_factor()).round() as i64;
    }

    fn overlaps(&self, other: &CorporateActionPatch) -> bool {
        if self.symbol != other.symbol {
            return false;
        }
        let starts_before = |a: Option<NaiveDate>, end: NaiveDate| a.is_none_or(|s| s < end);
        starts_before(self.start, other.end) && starts_before(other.start, self.end)
    }
}

/// Returns the indices of the first pair of overlapping patches, if any.
pub fn find_overlap(patches: &[CorporateActionPatch]) -> Option<(usize, usize)> {
    for i in 0..patches.len() {
        for j in (i + 1)..patches.len() {
            if patches[i].overlaps(&patches[j]) {
                return Some((i, j));
            }
        }
    }
    None
}

/// Display series (as quoted) and calculation series (patched), same symbol.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReconciledSeries {
    pub display: PriceSeries,
    pub calc: PriceSeries,
}

impl ReconciledSeries {
    /// Replaces the display side with a separately fetched raw series.
    pub fn with_display(mut self, display: PriceSeries) -> Self {
        self.display = display;
        self
    }

    /// Execution price for each calc bar: the display close on the same date,
    /// or the calc close when the display series has no bar that day.
    pub fn execution_prices(&self) -> Vec<f64> {
        self.calc
            .bars
            .iter()
            .map(|bar| {
                self.display
                    .bar_on(bar.date)
                    .map(|d| d.close)
                    .unwrap_or(bar.close)
            })
            .collect()
    }

    pub fn truncated_to(&self, date: NaiveDate) -> ReconciledSeries {
        ReconciledSeries {
            display: self.display.truncated_to(date),
            calc: self.calc.truncated_to(date),
        }
    }
}

pub fn reconcile(series: &PriceSeries, patches: &[CorporateActionPatch]) -> ReconciledSeries {
    let mut calc = series.clone();

    for patch in patches.iter().filter(|p| p.symbol == series.symbol) {
        if !patch.is_triggered(&calc.bars) {
            debug!(
                symbol = %patch.symbol,
                end = %patch.end,
                "corporate action patch not triggered, skipping"
            );
            continue;
        }
        debug!(
            symbol = %patch.symbol,
            end = %patch.end,
            multiplier = patch.price_multiplier,
            "applying corporate action patch"
        );
        for bar in calc.bars.iter_mut().filter(|b| patch.covers(b.date)) {
            patch.apply(bar);
        }
    }

    ReconciledSeries {
        display: series.clone(),
        calc,
    }
}
