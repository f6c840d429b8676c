//! CLI definition and dispatch.

use chrono::{Duration, Local, NaiveDate};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::{sibling_path, CsvReportAdapter};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_store_adapter::JsonStoreAdapter;
use crate::adapters::log_notifier::LogNotifier;
use crate::domain::backtest::{self as backtest_engine, BacktestConfig, OptimizeConfig, ParamRange};
use crate::domain::batch::BatchRunner;
use crate::domain::config::{
    default_strategies, parse_pockets, EngineConfig, DEFAULT_LOOKBACK_DAYS, DEFAULT_SUFFIX,
};
use crate::domain::config_validation::{
    parse_date, read_patches, validate_backtest_config, validate_engine_config,
    validate_optimize_config,
};
use crate::domain::error::TradeArenaError;
use crate::domain::execution::FeeSchedule;
use crate::domain::ledger::{default_pockets, Ledger};
use crate::domain::market::load_series;
use crate::domain::ohlcv::normalize_symbol;
use crate::domain::strategy::{parse_strategy_list, StrategyConfig};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::MarketDataPort;
use crate::ports::notify_port::Notifier;
use crate::ports::report_port::ReportPort;
use crate::ports::store_port::{PriceStore, SettlementStore};

#[derive(Parser, Debug)]
#[command(name = "tradearena", about = "Paper-trading arena for technical strategies")]
pub struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Ingest raw price history into the store
    Fetch {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
    },
    /// Backtest strategies over the configured date range
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        /// Comma-separated strategy names, e.g. "MACD(12,26,9), KD(9,3,20,80)"
        #[arg(short, long)]
        strategy: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Grid-search MACD parameters
    Optimize {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run the daily settlement for every strategy and pocket
    Settle {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        /// Defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show settlements of one date ranked by ROI
    Leaderboard {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show one pocket's account history
    Account {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        strategy: String,
        #[arg(short, long)]
        pocket: String,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Fetch {
            config,
            symbol,
            start,
            end,
        } => run_fetch(&config, symbol.as_deref(), start, end),
        Command::Backtest {
            config,
            symbol,
            strategy,
            output,
        } => run_backtest(&config, symbol.as_deref(), strategy.as_deref(), output.as_deref()),
        Command::Optimize {
            config,
            symbol,
            output,
        } => run_optimize(&config, symbol.as_deref(), output.as_deref()),
        Command::Settle {
            config,
            symbol,
            date,
            output,
        } => run_settle(&config, symbol.as_deref(), date, output.as_deref()),
        Command::Leaderboard {
            config,
            date,
            output,
        } => run_leaderboard(&config, date, output.as_deref()),
        Command::Account {
            config,
            strategy,
            pocket,
        } => run_account(&config, &strategy, &pocket),
        Command::Validate { config } => run_validate(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, TradeArenaError> {
    eprintln!("Loading config from {}", path.display());
    FileConfigAdapter::from_file(path)
}

/// Both store roles served by one backend.
pub trait ArenaStore {
    fn settlements(&self) -> &dyn SettlementStore;
    fn prices(&self) -> &dyn PriceStore;
}

impl<T: SettlementStore + PriceStore> ArenaStore for T {
    fn settlements(&self) -> &dyn SettlementStore {
        self
    }

    fn prices(&self) -> &dyn PriceStore {
        self
    }
}

/// Opens the backend named by `[store] backend` (default `sqlite`).
pub fn open_store(config: &dyn ConfigPort) -> Result<Box<dyn ArenaStore>, TradeArenaError> {
    let backend = config
        .get_string("store", "backend")
        .unwrap_or_else(|| "sqlite".to_string())
        .trim()
        .to_ascii_lowercase();
    match backend.as_str() {
        "json" => Ok(Box::new(JsonStoreAdapter::from_config(config)?)),
        #[cfg(feature = "sqlite")]
        "sqlite" => Ok(Box::new(
            crate::adapters::sqlite_adapter::SqliteAdapter::from_config(config)?,
        )),
        #[cfg(feature = "postgres")]
        "postgres" => Ok(Box::new(
            crate::adapters::postgres_adapter::PostgresAdapter::from_config(config)?,
        )),
        other => Err(TradeArenaError::ConfigInvalid {
            section: "store".into(),
            key: "backend".into(),
            reason: format!("backend '{other}' is not available in this build"),
        }),
    }
}

/// Builds the notifier named by `[notify] backend` (default `log`).
pub fn build_notifier(config: &dyn ConfigPort) -> Result<Box<dyn Notifier>, TradeArenaError> {
    let backend = config
        .get_string("notify", "backend")
        .unwrap_or_else(|| "log".to_string())
        .trim()
        .to_ascii_lowercase();
    match backend.as_str() {
        "log" => Ok(Box::new(LogNotifier)),
        #[cfg(feature = "smtp")]
        "smtp" => {
            use crate::adapters::smtp_notifier::{SmtpConfig, SmtpNotifier};
            let smtp = SmtpConfig::from_config(config)?;
            let notifier =
                SmtpNotifier::new(smtp).map_err(|e| TradeArenaError::ConfigInvalid {
                    section: "notify".into(),
                    key: "backend".into(),
                    reason: e.to_string(),
                })?;
            Ok(Box::new(notifier))
        }
        other => Err(TradeArenaError::ConfigInvalid {
            section: "notify".into(),
            key: "backend".into(),
            reason: format!("backend '{other}' is not available in this build"),
        }),
    }
}

pub fn build_fee_schedule(config: &dyn ConfigPort) -> FeeSchedule {
    let defaults = FeeSchedule::default();
    FeeSchedule {
        fee_rate: config.get_double("fees", "fee_rate", defaults.fee_rate),
        minimum_fee: config.get_double("fees", "minimum_fee", defaults.minimum_fee),
        tax_rate: config.get_double("fees", "tax_rate", defaults.tax_rate),
        reserve_ratio: config.get_double("fees", "reserve_ratio", defaults.reserve_ratio),
    }
}

pub fn build_engine_config(config: &dyn ConfigPort) -> Result<EngineConfig, TradeArenaError> {
    let pockets = match config.get_string("pockets", "accounts") {
        Some(raw) => parse_pockets(&raw).map_err(|reason| TradeArenaError::ConfigInvalid {
            section: "pockets".into(),
            key: "accounts".into(),
            reason,
        })?,
        None => default_pockets(),
    };
    let strategies = match config.get_string("strategies", "names") {
        Some(raw) => parse_strategy_list(&raw)?,
        None => default_strategies(),
    };

    Ok(EngineConfig {
        symbol: config
            .get_string("engine", "symbol")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
        default_suffix: config
            .get_string("engine", "default_suffix")
            .unwrap_or_else(|| DEFAULT_SUFFIX.to_string()),
        lookback_days: config.get_int("engine", "lookback_days", DEFAULT_LOOKBACK_DAYS),
        fees: build_fee_schedule(config),
        pockets,
        strategies,
        patches: read_patches(config)?,
    })
}

pub fn build_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, TradeArenaError> {
    Ok(BacktestConfig {
        start_date: parse_date(config, "backtest", "start_date")?,
        end_date: parse_date(config, "backtest", "end_date")?,
        initial_capital: config.get_double("backtest", "initial_capital", 100_000.0),
        fees: build_fee_schedule(config),
    })
}

pub fn build_optimize_config(config: &dyn ConfigPort) -> Result<OptimizeConfig, TradeArenaError> {
    let defaults = OptimizeConfig::default();
    let range = |key: &str, default: ParamRange| -> Result<ParamRange, TradeArenaError> {
        match config.get_string("optimize", key) {
            Some(raw) => raw.parse().map_err(|reason| TradeArenaError::ConfigInvalid {
                section: "optimize".into(),
                key: key.into(),
                reason,
            }),
            None => Ok(default),
        }
    };

    Ok(OptimizeConfig {
        fast: range("fast", defaults.fast)?,
        slow: range("slow", defaults.slow)?,
        signal: config
            .get_int("optimize", "signal", defaults.signal as i64)
            .max(1) as usize,
        max_drawdown_flag: config.get_double(
            "optimize",
            "max_drawdown_flag",
            defaults.max_drawdown_flag,
        ),
    })
}

/// `--symbol` wins over `[engine] symbol`; numeric codes get the exchange suffix.
pub fn resolve_symbol(
    symbol_override: Option<&str>,
    engine: &EngineConfig,
) -> Result<String, TradeArenaError> {
    let symbol = symbol_override
        .map(str::to_string)
        .or_else(|| engine.symbol.clone())
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| TradeArenaError::ConfigMissing {
            section: "engine".into(),
            key: "symbol".into(),
        })?;
    Ok(normalize_symbol(&symbol, &engine.default_suffix))
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn run_fetch(
    config_path: &Path,
    symbol: Option<&str>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<(), TradeArenaError> {
    let config = load_config(config_path)?;
    validate_engine_config(&config)?;
    let engine = build_engine_config(&config)?;
    let symbol = resolve_symbol(symbol, &engine)?;

    let end = end.unwrap_or_else(today);
    let start = start.unwrap_or(end - Duration::days(engine.lookback_days));

    let provider = CsvAdapter::from_config(&config)?;
    let store = open_store(&config)?;

    let bars = provider.fetch(&symbol, start, end, false)?;
    if bars.is_empty() {
        return Err(TradeArenaError::NoData { symbol });
    }
    let inserted = store.prices().bulk_insert(&symbol, &bars)?;
    info!(%symbol, fetched = bars.len(), inserted, "ingested price history");
    println!(
        "{}: fetched {} bars ({} to {}), {} new",
        symbol,
        bars.len(),
        start,
        end,
        inserted
    );
    Ok(())
}

fn run_backtest(
    config_path: &Path,
    symbol: Option<&str>,
    strategy: Option<&str>,
    output: Option<&Path>,
) -> Result<(), TradeArenaError> {
    let config = load_config(config_path)?;
    validate_engine_config(&config)?;
    validate_backtest_config(&config)?;
    let engine = build_engine_config(&config)?;
    let bt_config = build_backtest_config(&config)?;
    let symbol = resolve_symbol(symbol, &engine)?;
    let strategies = match strategy {
        Some(list) => parse_strategy_list(list)?,
        None => engine.strategies.clone(),
    };

    let provider = CsvAdapter::from_config(&config)?;
    let store = open_store(&config)?;
    let series = load_series(
        &symbol,
        bt_config.start_date,
        bt_config.end_date,
        &provider,
        Some(store.prices()),
        &engine.patches,
    )?;
    eprintln!(
        "Backtesting {} strategies on {} ({} bars)",
        strategies.len(),
        symbol,
        series.calc.len()
    );

    let single = strategies.len() == 1;
    for strategy in &strategies {
        let result = match backtest_engine::run_backtest(&series, strategy, &bt_config) {
            Ok(r) => r,
            Err(e @ TradeArenaError::InsufficientData { .. }) if !single => {
                eprintln!("skipping {strategy}: {e}");
                continue;
            }
            Err(e) => return Err(e),
        };

        let m = &result.metrics;
        println!(
            "{:<18} final {:>14.2}  roi {:>8.2}%  max dd {:>6.2}%  trips {:>3}  win {:>5.1}%",
            result.strategy,
            result.final_value,
            result.roi_pct,
            result.max_drawdown * 100.0,
            m.round_trips,
            m.win_rate * 100.0
        );

        if let Some(path) = output {
            let path = if single {
                path.to_path_buf()
            } else {
                sibling_path(path, &file_slug(&result.strategy))
            };
            CsvReportAdapter.write_backtest(&result, &result.strategy, &path_str(&path))?;
            eprintln!("Report written to {}", path.display());
        }
    }
    Ok(())
}

/// `MACD(12,26,9)` -> `macd_12_26_9`.
fn file_slug(name: &str) -> String {
    name.to_ascii_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

fn run_optimize(
    config_path: &Path,
    symbol: Option<&str>,
    output: Option<&Path>,
) -> Result<(), TradeArenaError> {
    let config = load_config(config_path)?;
    validate_engine_config(&config)?;
    validate_backtest_config(&config)?;
    validate_optimize_config(&config)?;
    let engine = build_engine_config(&config)?;
    let bt_config = build_backtest_config(&config)?;
    let grid = build_optimize_config(&config)?;
    let symbol = resolve_symbol(symbol, &engine)?;

    let provider = CsvAdapter::from_config(&config)?;
    let store = open_store(&config)?;
    let series = load_series(
        &symbol,
        bt_config.start_date,
        bt_config.end_date,
        &provider,
        Some(store.prices()),
        &engine.patches,
    )?;
    eprintln!(
        "Optimizing {} fast={} slow={} signal={}",
        symbol, grid.fast, grid.slow, grid.signal
    );

    let results = backtest_engine::optimize(&series, &grid, &bt_config)?;
    for (rank, r) in results.iter().enumerate() {
        println!(
            "{:>3}. {:<16} roi {:>8.2}%  max dd {:>6.2}%  trades {:>3}{}",
            rank + 1,
            r.strategy,
            r.roi_pct,
            r.max_drawdown * 100.0,
            r.trades,
            if r.high_risk { "  HIGH RISK" } else { "" }
        );
    }

    if let Some(path) = output {
        CsvReportAdapter.write_optimization(&results, &path_str(path))?;
        eprintln!("Report written to {}", path.display());
    }
    Ok(())
}

fn run_settle(
    config_path: &Path,
    symbol: Option<&str>,
    date: Option<NaiveDate>,
    output: Option<&Path>,
) -> Result<(), TradeArenaError> {
    let config = load_config(config_path)?;
    validate_engine_config(&config)?;
    let engine = build_engine_config(&config)?;
    let symbol = resolve_symbol(symbol, &engine)?;
    let date = date.unwrap_or_else(today);

    let provider = CsvAdapter::from_config(&config)?;
    let store = open_store(&config)?;
    let notifier = build_notifier(&config)?;

    let runner = BatchRunner {
        provider: &provider,
        settlements: store.settlements(),
        prices: Some(store.prices()),
        notifier: notifier.as_ref(),
        strategies: engine.strategies,
        pockets: engine.pockets,
        patches: engine.patches,
        fees: engine.fees,
        lookback_days: engine.lookback_days,
    };
    let report = runner.run(&symbol, date)?;
    print!("{}", report.summary());

    if let Some(path) = output {
        CsvReportAdapter.write_batch(&report, &path_str(path))?;
        eprintln!("Report written to {}", path.display());
    }
    Ok(())
}

fn run_leaderboard(
    config_path: &Path,
    date: Option<NaiveDate>,
    output: Option<&Path>,
) -> Result<(), TradeArenaError> {
    let config = load_config(config_path)?;
    let store = open_store(&config)?;
    let date = date.unwrap_or_else(today);

    let rows = store.settlements().query_by_date(date)?;
    if rows.is_empty() {
        eprintln!("No settlements on {}", date);
    }
    for (rank, s) in rows.iter().enumerate() {
        println!(
            "{:>3}. {:<16} {:<10} {:>14.2} {:>8.2}%  {}",
            rank + 1,
            s.strategy,
            s.pocket,
            s.total_assets,
            s.roi_pct,
            s.action
        );
    }

    if let Some(path) = output {
        CsvReportAdapter.write_leaderboard(&rows, &path_str(path))?;
        eprintln!("Report written to {}", path.display());
    }
    Ok(())
}

fn run_account(config_path: &Path, strategy: &str, pocket: &str) -> Result<(), TradeArenaError> {
    let config = load_config(config_path)?;
    let engine = build_engine_config(&config)?;
    let strategy: StrategyConfig = strategy.parse()?;
    let pocket = engine
        .pocket(pocket)
        .ok_or_else(|| TradeArenaError::ConfigInvalid {
            section: "pockets".into(),
            key: "accounts".into(),
            reason: format!("unknown pocket '{pocket}'"),
        })?;

    let store = open_store(&config)?;
    let ledger = Ledger::new(store.settlements(), engine.fees);
    let account = ledger.account(&strategy.name, pocket)?;

    println!(
        "{} / {}: cash {:.2}, {} shares, total {:.2}, roi {:.2}% (initial {:.2})",
        account.strategy,
        account.pocket,
        account.cash,
        account.shares,
        account.total_assets,
        account.roi_pct,
        account.initial_capital
    );
    for s in &account.history {
        println!(
            "  {}  {:>10.2}  {:<4}  {:>14.2}  {:>8.2}%  {}",
            s.date, s.price, s.signal, s.total_assets, s.roi_pct, s.action
        );
    }
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), TradeArenaError> {
    let config = load_config(config_path)?;
    validate_engine_config(&config)?;
    let has_backtest = config.get_string("backtest", "start_date").is_some()
        || config.get_string("backtest", "end_date").is_some();
    if has_backtest {
        validate_backtest_config(&config)?;
    }
    validate_optimize_config(&config)?;

    let engine = build_engine_config(&config)?;
    eprintln!("\nStrategies:");
    for strategy in &engine.strategies {
        eprintln!("  {} (needs {} bars)", strategy, strategy.min_bars());
    }
    eprintln!("\nPockets:");
    for pocket in &engine.pockets {
        eprintln!("  {}: {:.2}", pocket.name, pocket.initial_capital);
    }
    if !engine.patches.is_empty() {
        eprintln!("\nCorporate-action patches:");
        for patch in &engine.patches {
            eprintln!(
                "  {} through {}: x{}",
                patch.symbol, patch.end, patch.price_multiplier
            );
        }
    }

    eprintln!("\nConfiguration is valid.");
    Ok(())
}
