//! Daily price bars and ordered price series.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl PriceBar {
    /// Bar with every price field set to `close`.
    pub fn flat(date: NaiveDate, close: f64, volume: i64) -> Self {
        PriceBar {
            date,
            open: close,
            high: close,
            low: close,
            close,
            volume,
        }
    }
}

/// Bars for one symbol, strictly increasing by date.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PriceSeries {
    pub symbol: String,
    pub bars: Vec<PriceBar>,
}

impl PriceSeries {
    /// Sorts by date and keeps the last occurrence of any duplicated date.
    pub fn new(symbol: impl Into<String>, bars: Vec<PriceBar>) -> Self {
        let mut indexed: Vec<(usize, PriceBar)> = bars.into_iter().enumerate().collect();
        indexed.sort_by(|a, b| a.1.date.cmp(&b.1.date).then(a.0.cmp(&b.0)));

        let mut out: Vec<PriceBar> = Vec::with_capacity(indexed.len());
        for (_, bar) in indexed {
            match out.last_mut() {
                Some(last) if last.date == bar.date => *last = bar,
                _ => out.push(bar),
            }
        }

        PriceSeries {
            symbol: symbol.into(),
            bars: out,
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn bar_on(&self, date: NaiveDate) -> Option<&PriceBar> {
        self.bars
            .binary_search_by_key(&date, |b| b.date)
            .ok()
            .map(|i| &self.bars[i])
    }

    /// Bars dated on or before `date`.
    pub fn truncated_to(&self, date: NaiveDate) -> PriceSeries {
        let end = self.bars.partition_point(|b| b.date <= date);
        PriceSeries {
            symbol: self.symbol.clone(),
            bars: self.bars[..end].to_vec(),
        }
    }
}

/// Appends `suffix` to purely numeric symbols ("0050" -> "0050.TW").
pub fn normalize_symbol(symbol: &str, suffix: &str) -> String {
    let trimmed = symbol.trim();
    if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
        format!("{trimmed}{suffix}")
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    #[test]
    fn new_sorts_by_date() {
        let series = PriceSeries::new(
            "0050.TW",
            vec![
                PriceBar::flat(d(3), 12.0, 10),
                PriceBar::flat(d(1), 10.0, 10),
                PriceBar::flat(d(2), 11.0, 10),
            ],
        );
        let dates: Vec<_> = series.bars.iter().map(|b| b.date).collect();
        assert_eq!(dates, vec![d(1), d(2), d(3)]);
    }

    #[test]
    fn duplicate_dates_keep_last_write() {
        let series = PriceSeries::new(
            "0050.TW",
            vec![
                PriceBar::flat(d(1), 10.0, 10),
                PriceBar::flat(d(2), 11.0, 10),
                PriceBar::flat(d(1), 99.0, 10),
            ],
        );
        assert_eq!(series.len(), 2);
        assert_eq!(series.bars[0].close, 99.0);
    }

    #[test]
    fn bar_on_finds_exact_date() {
        let series = PriceSeries::new(
            "X",
            vec![PriceBar::flat(d(1), 10.0, 1), PriceBar::flat(d(4), 14.0, 1)],
        );
        assert_eq!(series.bar_on(d(4)).map(|b| b.close), Some(14.0));
        assert!(series.bar_on(d(2)).is_none());
    }

    #[test]
    fn truncated_to_is_inclusive() {
        let series = PriceSeries::new(
            "X",
            (1..=5).map(|i| PriceBar::flat(d(i), i as f64, 1)).collect(),
        );
        let cut = series.truncated_to(d(3));
        assert_eq!(cut.len(), 3);
        assert_eq!(cut.bars.last().unwrap().date, d(3));
    }

    #[test]
    fn numeric_symbols_get_suffix() {
        assert_eq!(normalize_symbol("0050", ".TW"), "0050.TW");
        assert_eq!(normalize_symbol(" 2330 ", ".TW"), "2330.TW");
        assert_eq!(normalize_symbol("0050.TW", ".TW"), "0050.TW");
        assert_eq!(normalize_symbol("AAPL", ".TW"), "AAPL");
    }
}
