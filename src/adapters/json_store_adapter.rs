//! JSON file store.
//!
//! The whole document is rewritten on every change: serialized to a sibling
//! temp file, then renamed over the original. A mutex serializes
//! read-modify-write cycles within the process.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::error::TradeArenaError;
use crate::domain::ledger::DailySettlement;
use crate::domain::ohlcv::PriceBar;
use crate::ports::config_port::ConfigPort;
use crate::ports::store_port::{PriceStore, SettlementStore};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    #[serde(default)]
    settlements: Vec<DailySettlement>,
    #[serde(default)]
    prices: BTreeMap<String, Vec<PriceBar>>,
}

pub struct JsonStoreAdapter {
    path: PathBuf,
    lock: Mutex<()>,
}

fn storage_err(e: impl std::fmt::Display) -> TradeArenaError {
    TradeArenaError::Storage {
        reason: e.to_string(),
    }
}

impl JsonStoreAdapter {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, TradeArenaError> {
        let path = config
            .get_string("store", "path")
            .ok_or_else(|| TradeArenaError::ConfigMissing {
                section: "store".into(),
                key: "path".into(),
            })?;
        Ok(Self::new(path))
    }

    fn read(&self) -> Result<Document, TradeArenaError> {
        if !self.path.exists() {
            return Ok(Document::default());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Document::default());
        }
        serde_json::from_str(&content).map_err(storage_err)
    }

    fn write(&self, doc: &Document) -> Result<(), TradeArenaError> {
        let json = serde_json::to_string_pretty(doc).map_err(storage_err)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn with_document<T>(
        &self,
        f: impl FnOnce(&mut Document) -> T,
        persist: bool,
    ) -> Result<T, TradeArenaError> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| storage_err("json store lock poisoned"))?;
        let mut doc = self.read()?;
        let out = f(&mut doc);
        if persist {
            self.write(&doc)?;
        }
        Ok(out)
    }
}

impl SettlementStore for JsonStoreAdapter {
    fn latest_before(
        &self,
        strategy: &str,
        pocket: &str,
        date: NaiveDate,
    ) -> Result<Option<DailySettlement>, TradeArenaError> {
        self.with_document(
            |doc| {
                doc.settlements
                    .iter()
                    .filter(|r| r.strategy == strategy && r.pocket == pocket && r.date < date)
                    .max_by_key(|r| r.date)
                    .cloned()
            },
            false,
        )
    }

    fn upsert(&self, record: &DailySettlement) -> Result<(), TradeArenaError> {
        self.with_document(
            |doc| {
                match doc.settlements.iter_mut().find(|r| {
                    r.strategy == record.strategy
                        && r.pocket == record.pocket
                        && r.date == record.date
                }) {
                    Some(existing) => *existing = record.clone(),
                    None => doc.settlements.push(record.clone()),
                }
            },
            true,
        )
    }

    fn query_by_date(&self, date: NaiveDate) -> Result<Vec<DailySettlement>, TradeArenaError> {
        self.with_document(
            |doc| {
                let mut rows: Vec<DailySettlement> = doc
                    .settlements
                    .iter()
                    .filter(|r| r.date == date)
                    .cloned()
                    .collect();
                rows.sort_by(|a, b| b.roi_pct.total_cmp(&a.roi_pct));
                rows
            },
            false,
        )
    }

    fn history(
        &self,
        strategy: &str,
        pocket: &str,
    ) -> Result<Vec<DailySettlement>, TradeArenaError> {
        self.with_document(
            |doc| {
                let mut rows: Vec<DailySettlement> = doc
                    .settlements
                    .iter()
                    .filter(|r| r.strategy == strategy && r.pocket == pocket)
                    .cloned()
                    .collect();
                rows.sort_by_key(|r| r.date);
                rows
            },
            false,
        )
    }
}

impl PriceStore for JsonStoreAdapter {
    fn bulk_insert(&self, symbol: &str, bars: &[PriceBar]) -> Result<usize, TradeArenaError> {
        self.with_document(
            |doc| {
                let stored = doc.prices.entry(symbol.to_string()).or_default();
                let mut inserted = 0;
                for bar in bars {
                    if let Err(pos) = stored.binary_search_by_key(&bar.date, |b| b.date) {
                        stored.insert(pos, bar.clone());
                        inserted += 1;
                    }
                }
                inserted
            },
            true,
        )
    }

    fn load_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, TradeArenaError> {
        self.with_document(
            |doc| {
                doc.prices
                    .get(symbol)
                    .map(|bars| {
                        bars.iter()
                            .filter(|b| b.date >= start && b.date <= end)
                            .cloned()
                            .collect()
                    })
                    .unwrap_or_default()
            },
            false,
        )
    }
}
