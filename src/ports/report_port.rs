//! Report generation port.

use crate::domain::backtest::{BacktestResult, OptimizationResult};
use crate::domain::batch::BatchReport;
use crate::domain::error::TradeArenaError;
use crate::domain::ledger::DailySettlement;

pub trait ReportPort {
    /// Ranked settlements for one date.
    fn write_leaderboard(
        &self,
        rows: &[DailySettlement],
        output_path: &str,
    ) -> Result<(), TradeArenaError>;

    /// Equity curve and trade log of one backtest.
    fn write_backtest(
        &self,
        result: &BacktestResult,
        strategy: &str,
        output_path: &str,
    ) -> Result<(), TradeArenaError>;

    fn write_optimization(
        &self,
        results: &[OptimizationResult],
        output_path: &str,
    ) -> Result<(), TradeArenaError>;

    /// Default implementation: ranks the batch entries into a leaderboard.
    fn write_batch(&self, report: &BatchReport, output_path: &str) -> Result<(), TradeArenaError> {
        let rows: Vec<DailySettlement> =
            report.entries.iter().map(|e| e.settlement.clone()).collect();
        self.write_leaderboard(&rows, output_path)
    }
}
