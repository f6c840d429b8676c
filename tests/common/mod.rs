#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use tradearena::domain::batch::BatchRunner;
use tradearena::domain::corporate_action::CorporateActionPatch;
use tradearena::domain::error::TradeArenaError;
use tradearena::domain::execution::FeeSchedule;
use tradearena::domain::ledger::{DailySettlement, PocketSpec};
pub use tradearena::domain::ohlcv::PriceBar;
use tradearena::domain::strategy::StrategyConfig;
use tradearena::ports::data_port::MarketDataPort;
use tradearena::ports::notify_port::{NotifyError, Notifier};
use tradearena::ports::store_port::{PriceStore, SettlementStore};

pub const SYMBOL: &str = "0050.TW";

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn first_day() -> NaiveDate {
    date(2024, 1, 1)
}

/// One bar per calendar day starting at [`first_day`].
pub fn daily_bars(closes: &[f64]) -> Vec<PriceBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| PriceBar::flat(first_day() + Duration::days(i as i64), c, 1_000))
        .collect()
}

pub fn bar_date(index: usize) -> NaiveDate {
    first_day() + Duration::days(index as i64)
}

/// Flat at 100 for 40 bars, +1 per bar for 20 bars, then -2 per bar for 20 bars.
pub fn rise_and_fall() -> Vec<f64> {
    let mut closes = vec![100.0; 40];
    closes.extend((1..=20).map(|i| 100.0 + i as f64));
    closes.extend((1..=20).map(|i| 120.0 - 2.0 * i as f64));
    closes
}

pub struct MockDataPort {
    pub raw: HashMap<String, Vec<PriceBar>>,
    pub adjusted: HashMap<String, Vec<PriceBar>>,
    pub raw_error: Option<String>,
    pub adjusted_error: Option<String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            raw: HashMap::new(),
            adjusted: HashMap::new(),
            raw_error: None,
            adjusted_error: None,
        }
    }

    pub fn with_raw(mut self, symbol: &str, bars: Vec<PriceBar>) -> Self {
        self.raw.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_adjusted(mut self, symbol: &str, bars: Vec<PriceBar>) -> Self {
        self.adjusted.insert(symbol.to_string(), bars);
        self
    }

    pub fn failing_raw(mut self, reason: &str) -> Self {
        self.raw_error = Some(reason.to_string());
        self
    }

    pub fn failing_adjusted(mut self, reason: &str) -> Self {
        self.adjusted_error = Some(reason.to_string());
        self
    }
}

impl MarketDataPort for MockDataPort {
    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        adjusted: bool,
    ) -> Result<Vec<PriceBar>, TradeArenaError> {
        let (source, error) = if adjusted {
            (&self.adjusted, &self.adjusted_error)
        } else {
            (&self.raw, &self.raw_error)
        };
        if let Some(reason) = error {
            return Err(TradeArenaError::ProviderFetch {
                symbol: symbol.to_string(),
                reason: reason.clone(),
            });
        }
        Ok(source
            .get(symbol)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.date >= start && b.date <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    pub settlements: RefCell<BTreeMap<(String, String, NaiveDate), DailySettlement>>,
    pub prices: RefCell<BTreeMap<(String, NaiveDate), PriceBar>>,
    pub fail_writes: Cell<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn settlement_count(&self) -> usize {
        self.settlements.borrow().len()
    }
}

impl SettlementStore for MemoryStore {
    fn latest_before(
        &self,
        strategy: &str,
        pocket: &str,
        date: NaiveDate,
    ) -> Result<Option<DailySettlement>, TradeArenaError> {
        Ok(self
            .settlements
            .borrow()
            .values()
            .filter(|r| r.strategy == strategy && r.pocket == pocket && r.date < date)
            .max_by_key(|r| r.date)
            .cloned())
    }

    fn upsert(&self, record: &DailySettlement) -> Result<(), TradeArenaError> {
        if self.fail_writes.get() {
            return Err(TradeArenaError::Storage {
                reason: "write rejected".into(),
            });
        }
        self.settlements.borrow_mut().insert(
            (record.strategy.clone(), record.pocket.clone(), record.date),
            record.clone(),
        );
        Ok(())
    }

    fn query_by_date(&self, date: NaiveDate) -> Result<Vec<DailySettlement>, TradeArenaError> {
        let mut rows: Vec<DailySettlement> = self
            .settlements
            .borrow()
            .values()
            .filter(|r| r.date == date)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.roi_pct.total_cmp(&a.roi_pct));
        Ok(rows)
    }

    fn history(
        &self,
        strategy: &str,
        pocket: &str,
    ) -> Result<Vec<DailySettlement>, TradeArenaError> {
        Ok(self
            .settlements
            .borrow()
            .values()
            .filter(|r| r.strategy == strategy && r.pocket == pocket)
            .cloned()
            .collect())
    }
}

impl PriceStore for MemoryStore {
    fn bulk_insert(&self, symbol: &str, bars: &[PriceBar]) -> Result<usize, TradeArenaError> {
        let mut prices = self.prices.borrow_mut();
        let mut inserted = 0;
        for bar in bars {
            let key = (symbol.to_string(), bar.date);
            if !prices.contains_key(&key) {
                prices.insert(key, bar.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    fn load_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, TradeArenaError> {
        Ok(self
            .prices
            .borrow()
            .iter()
            .filter(|((s, d), _)| s == symbol && *d >= start && *d <= end)
            .map(|(_, bar)| bar.clone())
            .collect())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: RefCell<Vec<(String, String)>>,
    pub fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            sent: RefCell::new(Vec::new()),
            fail: true,
        }
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        if self.fail {
            return Err(NotifyError::Delivery("relay unreachable".into()));
        }
        self.sent
            .borrow_mut()
            .push((subject.to_string(), body.to_string()));
        Ok(())
    }
}

pub fn macd(fast: usize, slow: usize, signal: usize) -> StrategyConfig {
    StrategyConfig::macd(fast, slow, signal)
}

pub fn pockets() -> Vec<PocketSpec> {
    vec![
        PocketSpec::new("micro", 1_000.0),
        PocketSpec::new("standard", 100_000.0),
    ]
}

pub fn runner<'a>(
    provider: &'a MockDataPort,
    store: &'a MemoryStore,
    notifier: &'a RecordingNotifier,
    strategies: Vec<StrategyConfig>,
) -> BatchRunner<'a> {
    BatchRunner {
        provider,
        settlements: store,
        prices: Some(store),
        notifier,
        strategies,
        pockets: pockets(),
        patches: Vec::<CorporateActionPatch>::new(),
        fees: FeeSchedule::default(),
        lookback_days: 365,
    }
}
