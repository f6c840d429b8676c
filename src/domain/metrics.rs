//! Backtest summary statistics.

use chrono::NaiveDate;
use serde::Serialize;

const DAYS_PER_YEAR: f64 = 365.25;

/// Account value at the close of one bar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    /// Display (execution) price of the bar.
    pub price: f64,
    pub cash: f64,
    pub shares: u64,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metrics {
    pub total_return: f64,
    pub annualized_return: f64,
    pub max_drawdown: f64,
    /// Longest run of bars spent below a prior peak.
    pub max_drawdown_duration: i64,
    pub round_trips: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
}

impl Metrics {
    /// `round_trip_pnls` holds the net result of every closed buy/sell pair.
    pub fn compute(equity_curve: &[EquityPoint], round_trip_pnls: &[f64], initial_capital: f64) -> Self {
        let final_equity = equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(initial_capital);

        let total_return = if initial_capital > 0.0 {
            (final_equity - initial_capital) / initial_capital
        } else {
            0.0
        };

        // Calendar span between the first and last points, not the bar count.
        let years = match (equity_curve.first(), equity_curve.last()) {
            (Some(first), Some(last)) => (last.date - first.date).num_days() as f64 / DAYS_PER_YEAR,
            _ => 0.0,
        };
        let annualized_return = if years > 0.0 && total_return > -1.0 {
            (1.0 + total_return).powf(1.0 / years) - 1.0
        } else {
            0.0
        };

        let (max_drawdown, max_drawdown_duration) = compute_drawdown(equity_curve);

        let trades_won = round_trip_pnls.iter().filter(|p| **p > 0.0).count();
        let trades_lost = round_trip_pnls.iter().filter(|p| **p < 0.0).count();
        let total_wins: f64 = round_trip_pnls.iter().filter(|p| **p > 0.0).sum();
        let total_losses: f64 = round_trip_pnls
            .iter()
            .filter(|p| **p < 0.0)
            .map(|p| p.abs())
            .sum();

        let round_trips = round_trip_pnls.len();
        let win_rate = if round_trips > 0 {
            trades_won as f64 / round_trips as f64
        } else {
            0.0
        };

        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        Metrics {
            total_return,
            annualized_return,
            max_drawdown,
            max_drawdown_duration,
            round_trips,
            trades_won,
            trades_lost,
            win_rate,
            profit_factor,
        }
    }
}

/// Maximum of `(peak - equity) / peak` and the longest underwater stretch.
pub fn compute_drawdown(equity_curve: &[EquityPoint]) -> (f64, i64) {
    let Some(first) = equity_curve.first() else {
        return (0.0, 0);
    };

    let mut peak = first.equity;
    let mut max_dd = 0.0_f64;
    let mut max_dd_duration = 0i64;
    let mut current_dd_duration = 0i64;

    for point in equity_curve {
        if point.equity >= peak {
            peak = point.equity;
            current_dd_duration = 0;
        } else if peak > 0.0 {
            let dd = (peak - point.equity) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
            current_dd_duration += 1;
            if current_dd_duration > max_dd_duration {
                max_dd_duration = current_dd_duration;
            }
        }
    }

    (max_dd, max_dd_duration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn curve(values: &[f64]) -> Vec<EquityPoint> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, &equity)| EquityPoint {
                date: start + chrono::Duration::days(i as i64),
                price: 1.0,
                cash: equity,
                shares: 0,
                equity,
            })
            .collect()
    }

    #[test]
    fn drawdown_from_running_peak() {
        let (dd, duration) = compute_drawdown(&curve(&[100.0, 120.0, 90.0, 110.0, 130.0, 117.0]));
        assert_relative_eq!(dd, 0.25);
        assert_eq!(duration, 2);
    }

    #[test]
    fn flat_curve_has_no_drawdown() {
        assert_eq!(compute_drawdown(&curve(&[100.0; 5])), (0.0, 0));
        assert_eq!(compute_drawdown(&[]), (0.0, 0));
    }

    #[test]
    fn trade_statistics() {
        let m = Metrics::compute(&curve(&[1000.0, 1100.0]), &[50.0, -20.0, 30.0], 1000.0);
        assert_relative_eq!(m.total_return, 0.1);
        assert_eq!(m.round_trips, 3);
        assert_eq!(m.trades_won, 2);
        assert_eq!(m.trades_lost, 1);
        assert_relative_eq!(m.win_rate, 2.0 / 3.0);
        assert_relative_eq!(m.profit_factor, 4.0);
    }

    #[test]
    fn no_trades() {
        let m = Metrics::compute(&curve(&[1000.0; 3]), &[], 1000.0);
        assert_eq!(m.round_trips, 0);
        assert_eq!(m.win_rate, 0.0);
        assert_eq!(m.profit_factor, 0.0);
        assert_eq!(m.total_return, 0.0);
    }

    #[test]
    fn only_wins_is_infinite_profit_factor() {
        let m = Metrics::compute(&curve(&[1000.0]), &[10.0], 1000.0);
        assert!(m.profit_factor.is_infinite());
    }

    fn point(date: NaiveDate, equity: f64) -> EquityPoint {
        EquityPoint {
            date,
            price: 1.0,
            cash: equity,
            shares: 0,
            equity,
        }
    }

    #[test]
    fn annualized_return_uses_calendar_days() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        // Quadrupling over two calendar years is 100% a year, however few bars there are.
        let sparse = [
            point(start, 1000.0),
            point(start + chrono::Duration::days(730), 4000.0),
        ];
        let m = Metrics::compute(&sparse, &[], 1000.0);
        assert_relative_eq!(m.total_return, 3.0);
        assert_relative_eq!(m.annualized_return, 1.0, epsilon = 2e-3);

        let dense: Vec<EquityPoint> = (0..=730)
            .map(|i| {
                let equity = if i == 730 { 4000.0 } else { 1000.0 };
                point(start + chrono::Duration::days(i), equity)
            })
            .collect();
        let m_dense = Metrics::compute(&dense, &[], 1000.0);
        assert_relative_eq!(m_dense.annualized_return, m.annualized_return);
    }

    #[test]
    fn single_day_has_no_annualized_return() {
        let m = Metrics::compute(&curve(&[1000.0]), &[], 1000.0);
        assert_eq!(m.annualized_return, 0.0);
        let m = Metrics::compute(&[], &[], 1000.0);
        assert_eq!(m.annualized_return, 0.0);
    }
}
