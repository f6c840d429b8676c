//! CSV report writer.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::backtest::{BacktestResult, OptimizationResult, TradeRecord};
use crate::domain::error::TradeArenaError;
use crate::domain::ledger::DailySettlement;
use crate::domain::signal::Signal;
use crate::ports::report_port::ReportPort;

pub struct CsvReportAdapter;

#[derive(Serialize)]
struct LeaderboardRow<'a> {
    rank: usize,
    strategy: &'a str,
    pocket: &'a str,
    date: NaiveDate,
    price: f64,
    signal: Signal,
    action: &'a str,
    shares: u64,
    cash: f64,
    total_assets: f64,
    roi_pct: f64,
    initial_capital: f64,
}

impl<'a> LeaderboardRow<'a> {
    fn new(rank: usize, s: &'a DailySettlement) -> Self {
        LeaderboardRow {
            rank,
            strategy: &s.strategy,
            pocket: &s.pocket,
            date: s.date,
            price: s.price,
            signal: s.signal,
            action: &s.action,
            shares: s.shares,
            cash: s.cash,
            total_assets: s.total_assets,
            roi_pct: s.roi_pct,
            initial_capital: s.initial_capital,
        }
    }
}

#[derive(Serialize)]
struct TradeRow<'a> {
    strategy: &'a str,
    date: NaiveDate,
    action: Signal,
    size: u64,
    price: f64,
    cost: f64,
    fee: f64,
    tax: f64,
}

impl<'a> TradeRow<'a> {
    fn new(strategy: &'a str, t: &TradeRecord) -> Self {
        TradeRow {
            strategy,
            date: t.date,
            action: t.action,
            size: t.size,
            price: t.price,
            cost: t.cost,
            fee: t.fee,
            tax: t.tax,
        }
    }
}

fn report_err(e: csv::Error) -> TradeArenaError {
    TradeArenaError::Storage {
        reason: format!("failed to write report: {e}"),
    }
}

fn write_rows<T: Serialize>(path: &Path, rows: impl IntoIterator<Item = T>) -> Result<(), TradeArenaError> {
    let mut wtr = csv::Writer::from_path(path).map_err(report_err)?;
    for row in rows {
        wtr.serialize(row).map_err(report_err)?;
    }
    wtr.flush()?;
    Ok(())
}

/// `out/report.csv` -> `out/report_trades.csv`.
pub fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report".to_string());
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "csv".to_string());
    path.with_file_name(format!("{stem}_{suffix}.{ext}"))
}

impl ReportPort for CsvReportAdapter {
    fn write_leaderboard(
        &self,
        rows: &[DailySettlement],
        output_path: &str,
    ) -> Result<(), TradeArenaError> {
        write_rows(
            Path::new(output_path),
            rows
                .iter()
                .enumerate()
                .map(|(i, settlement)| LeaderboardRow::new(i + 1, settlement)),
        )
    }

    /// Equity curve at `output_path`, trade log beside it with a `_trades` suffix.
    fn write_backtest(
        &self,
        result: &BacktestResult,
        strategy: &str,
        output_path: &str,
    ) -> Result<(), TradeArenaError> {
        let path = Path::new(output_path);
        write_rows(path, &result.equity_curve)?;
        write_rows(
            &sibling_path(path, "trades"),
            result
                .trade_log
                .iter()
                .map(|trade| TradeRow::new(strategy, trade)),
        )
    }

    fn write_optimization(
        &self,
        results: &[OptimizationResult],
        output_path: &str,
    ) -> Result<(), TradeArenaError> {
        write_rows(Path::new(output_path), results)
    }
}
