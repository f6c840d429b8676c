//! Configuration validation.
//!
//! Validates every config field before any fetch, settlement or backtest runs.

use crate::domain::backtest::ParamRange;
use crate::domain::config::{parse_pockets, NotifyTls, PATCH_SECTION_PREFIX};
use crate::domain::corporate_action::{find_overlap, CorporateActionPatch, DEFAULT_JUMP_RATIO};
use crate::domain::error::TradeArenaError;
use crate::domain::strategy::parse_strategy_list;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;
use std::collections::HashSet;

pub fn validate_engine_config(config: &dyn ConfigPort) -> Result<(), TradeArenaError> {
    validate_lookback(config)?;
    validate_fees(config)?;
    validate_pockets(config)?;
    validate_strategies(config)?;
    validate_store(config)?;
    validate_notify(config)?;
    read_patches(config)?;
    Ok(())
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), TradeArenaError> {
    validate_initial_capital(config)?;
    validate_dates(config)?;
    Ok(())
}

pub fn validate_optimize_config(config: &dyn ConfigPort) -> Result<(), TradeArenaError> {
    for key in ["fast", "slow"] {
        if let Some(value) = config.get_string("optimize", key) {
            value
                .parse::<ParamRange>()
                .map_err(|reason| invalid("optimize", key, reason))?;
        }
    }
    if number(config, "optimize", "signal")?.is_some_and(|v| v < 1.0 || v.fract() != 0.0) {
        return Err(invalid("optimize", "signal", "signal must be a positive integer"));
    }
    if number(config, "optimize", "max_drawdown_flag")?.is_some_and(|v| !(0.0..=1.0).contains(&v))
    {
        return Err(invalid(
            "optimize",
            "max_drawdown_flag",
            "max_drawdown_flag must be between 0 and 1",
        ));
    }
    Ok(())
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> TradeArenaError {
    TradeArenaError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// The key as a number, `None` when absent, an error when present but malformed.
fn number(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Option<f64>, TradeArenaError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| invalid(section, key, format!("'{raw}' is not a number"))),
    }
}

fn validate_lookback(config: &dyn ConfigPort) -> Result<(), TradeArenaError> {
    if number(config, "engine", "lookback_days")?.is_some_and(|v| v < 1.0) {
        return Err(invalid("engine", "lookback_days", "lookback_days must be positive"));
    }
    Ok(())
}

fn validate_fees(config: &dyn ConfigPort) -> Result<(), TradeArenaError> {
    for key in ["fee_rate", "minimum_fee", "tax_rate"] {
        if number(config, "fees", key)?.is_some_and(|v| v < 0.0) {
            return Err(invalid("fees", key, format!("{key} must be non-negative")));
        }
    }
    if number(config, "fees", "reserve_ratio")?.is_some_and(|v| v <= 0.0 || v > 1.0) {
        return Err(invalid(
            "fees",
            "reserve_ratio",
            "reserve_ratio must be in (0, 1]",
        ));
    }
    Ok(())
}

fn validate_pockets(config: &dyn ConfigPort) -> Result<(), TradeArenaError> {
    let Some(raw) = config.get_string("pockets", "accounts") else {
        return Ok(());
    };
    let pockets = parse_pockets(&raw).map_err(|reason| invalid("pockets", "accounts", reason))?;
    if pockets.is_empty() {
        return Err(invalid("pockets", "accounts", "at least one pocket is required"));
    }
    let mut seen = HashSet::new();
    for pocket in &pockets {
        if pocket.initial_capital <= 0.0 {
            return Err(invalid(
                "pockets",
                "accounts",
                format!("pocket '{}' must have positive capital", pocket.name),
            ));
        }
        if !seen.insert(pocket.name.to_ascii_lowercase()) {
            return Err(invalid(
                "pockets",
                "accounts",
                format!("duplicate pocket '{}'", pocket.name),
            ));
        }
    }
    Ok(())
}

fn validate_strategies(config: &dyn ConfigPort) -> Result<(), TradeArenaError> {
    let Some(raw) = config.get_string("strategies", "names") else {
        return Ok(());
    };
    let strategies = parse_strategy_list(&raw)?;
    if strategies.is_empty() {
        return Err(invalid("strategies", "names", "at least one strategy is required"));
    }
    let mut seen = HashSet::new();
    for strategy in &strategies {
        if !seen.insert(strategy.name.clone()) {
            return Err(invalid(
                "strategies",
                "names",
                format!("duplicate strategy '{}'", strategy.name),
            ));
        }
    }
    Ok(())
}

fn validate_store(config: &dyn ConfigPort) -> Result<(), TradeArenaError> {
    let backend = config
        .get_string("store", "backend")
        .unwrap_or_else(|| "sqlite".to_string());
    match backend.trim().to_ascii_lowercase().as_str() {
        "sqlite" | "json" => match config.get_string("store", "path") {
            Some(p) if !p.trim().is_empty() => Ok(()),
            _ => Err(TradeArenaError::ConfigMissing {
                section: "store".into(),
                key: "path".into(),
            }),
        },
        "postgres" => match config.get_string("store", "conninfo") {
            Some(c) if !c.trim().is_empty() => Ok(()),
            _ => Err(TradeArenaError::ConfigMissing {
                section: "store".into(),
                key: "conninfo".into(),
            }),
        },
        other => Err(invalid(
            "store",
            "backend",
            format!("unknown backend '{other}' (expected sqlite, json or postgres)"),
        )),
    }
}

fn validate_notify(config: &dyn ConfigPort) -> Result<(), TradeArenaError> {
    let backend = config
        .get_string("notify", "backend")
        .unwrap_or_else(|| "log".to_string());
    match backend.trim().to_ascii_lowercase().as_str() {
        "log" => Ok(()),
        "smtp" => {
            for key in ["host", "from", "to"] {
                if config.get_string("notify", key).is_none_or(|v| v.trim().is_empty()) {
                    return Err(TradeArenaError::ConfigMissing {
                        section: "notify".into(),
                        key: key.into(),
                    });
                }
            }
            if let Some(tls) = config.get_string("notify", "tls") {
                tls.parse::<NotifyTls>()
                    .map_err(|reason| invalid("notify", "tls", reason))?;
            }
            if number(config, "notify", "port")?
                .is_some_and(|v| v < 1.0 || v > f64::from(u16::MAX) || v.fract() != 0.0)
            {
                return Err(invalid("notify", "port", "port must be between 1 and 65535"));
            }
            Ok(())
        }
        other => Err(invalid(
            "notify",
            "backend",
            format!("unknown backend '{other}' (expected log or smtp)"),
        )),
    }
}

fn validate_initial_capital(config: &dyn ConfigPort) -> Result<(), TradeArenaError> {
    if number(config, "backtest", "initial_capital")?.is_some_and(|v| v <= 0.0) {
        return Err(invalid(
            "backtest",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }
    Ok(())
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), TradeArenaError> {
    let start_date = parse_date(config, "backtest", "start_date")?;
    let end_date = parse_date(config, "backtest", "end_date")?;

    if start_date >= end_date {
        return Err(invalid(
            "backtest",
            "start_date",
            "start_date must be before end_date",
        ));
    }
    Ok(())
}

pub fn parse_date(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<NaiveDate, TradeArenaError> {
    match config.get_string(section, key) {
        None => Err(TradeArenaError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
            invalid(
                section,
                key,
                format!("invalid {key} format, expected YYYY-MM-DD"),
            )
        }),
    }
}

/// Reads every `[patch.<id>]` section and rejects overlapping windows.
pub fn read_patches(config: &dyn ConfigPort) -> Result<Vec<CorporateActionPatch>, TradeArenaError> {
    let mut sections: Vec<String> = config
        .sections()
        .into_iter()
        .filter(|s| s.starts_with(PATCH_SECTION_PREFIX))
        .collect();
    sections.sort();

    let mut patches = Vec::with_capacity(sections.len());
    for section in &sections {
        let symbol = match config.get_string(section, "symbol") {
            Some(s) if !s.trim().is_empty() => s.trim().to_string(),
            _ => {
                return Err(TradeArenaError::ConfigMissing {
                    section: section.clone(),
                    key: "symbol".into(),
                })
            }
        };
        let end = parse_date(config, section, "end")?;
        let start = match config.get_string(section, "start") {
            Some(_) => Some(parse_date(config, section, "start")?),
            None => None,
        };
        if start.is_some_and(|s| s >= end) {
            return Err(invalid(section, "start", "start must be before end"));
        }

        let price_multiplier = number(config, section, "price_multiplier")?.ok_or_else(|| {
            TradeArenaError::ConfigMissing {
                section: section.clone(),
                key: "price_multiplier".into(),
            }
        })?;
        if price_multiplier <= 0.0 {
            return Err(invalid(
                section,
                "price_multiplier",
                "price_multiplier must be positive",
            ));
        }
        let volume_multiplier = number(config, section, "volume_multiplier")?;
        if volume_multiplier.is_some_and(|v| v <= 0.0) {
            return Err(invalid(
                section,
                "volume_multiplier",
                "volume_multiplier must be positive",
            ));
        }
        let jump_ratio = number(config, section, "jump_ratio")?.unwrap_or(DEFAULT_JUMP_RATIO);
        if jump_ratio <= 1.0 {
            return Err(invalid(section, "jump_ratio", "jump_ratio must exceed 1"));
        }

        patches.push(CorporateActionPatch {
            symbol,
            start,
            end,
            price_multiplier,
            volume_multiplier,
            jump_ratio,
        });
    }

    if let Some((a, b)) = find_overlap(&patches) {
        return Err(invalid(
            &sections[b],
            "start",
            format!("window overlaps [{}]", sections[a]),
        ));
    }

    Ok(patches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    const VALID: &str = r#"
[engine]
symbol = 0050
lookback_days = 400

[store]
backend = sqlite
path = arena.db

[fees]
fee_rate = 0.001425
minimum_fee = 20
tax_rate = 0.001
reserve_ratio = 0.995

[pockets]
accounts = micro:1000, small:10000

[strategies]
names = MACD(11,45,9), KD(9,3,20,80)

[patch.split2014]
symbol = 0050.TW
end = 2014-01-02
price_multiplier = 0.25
volume_multiplier = 4
"#;

    #[test]
    fn valid_engine_config_passes() {
        assert!(validate_engine_config(&make_config(VALID)).is_ok());
    }

    #[test]
    fn empty_config_uses_defaults_except_store() {
        let err = validate_engine_config(&make_config("[engine]\n")).unwrap_err();
        assert!(matches!(err, TradeArenaError::ConfigMissing { key, .. } if key == "path"));
    }

    #[test]
    fn negative_fee_fails() {
        let config = make_config("[store]\npath = a.db\n[fees]\nfee_rate = -0.1\n");
        let err = validate_engine_config(&config).unwrap_err();
        assert!(matches!(err, TradeArenaError::ConfigInvalid { key, .. } if key == "fee_rate"));
    }

    #[test]
    fn malformed_number_fails() {
        let config = make_config("[store]\npath = a.db\n[fees]\nminimum_fee = twenty\n");
        let err = validate_engine_config(&config).unwrap_err();
        assert!(matches!(err, TradeArenaError::ConfigInvalid { key, .. } if key == "minimum_fee"));
    }

    #[test]
    fn reserve_ratio_above_one_fails() {
        let config = make_config("[store]\npath = a.db\n[fees]\nreserve_ratio = 1.5\n");
        let err = validate_engine_config(&config).unwrap_err();
        assert!(matches!(err, TradeArenaError::ConfigInvalid { key, .. } if key == "reserve_ratio"));
    }

    #[test]
    fn duplicate_pocket_fails() {
        let config = make_config("[store]\npath = a.db\n[pockets]\naccounts = a:1, A:2\n");
        let err = validate_engine_config(&config).unwrap_err();
        assert!(matches!(err, TradeArenaError::ConfigInvalid { reason, .. } if reason.contains("duplicate")));
    }

    #[test]
    fn zero_capital_pocket_fails() {
        let config = make_config("[store]\npath = a.db\n[pockets]\naccounts = a:0\n");
        assert!(validate_engine_config(&config).is_err());
    }

    #[test]
    fn bad_strategy_name_fails() {
        let config = make_config("[store]\npath = a.db\n[strategies]\nnames = MACD(12,26)\n");
        let err = validate_engine_config(&config).unwrap_err();
        assert!(matches!(err, TradeArenaError::StrategyParse(_)));
    }

    #[test]
    fn unknown_store_backend_fails() {
        let config = make_config("[store]\nbackend = redis\n");
        let err = validate_engine_config(&config).unwrap_err();
        assert!(matches!(err, TradeArenaError::ConfigInvalid { key, .. } if key == "backend"));
    }

    #[test]
    fn smtp_requires_addresses() {
        let config = make_config("[store]\npath = a.db\n[notify]\nbackend = smtp\nhost = mail\n");
        let err = validate_engine_config(&config).unwrap_err();
        assert!(matches!(err, TradeArenaError::ConfigMissing { key, .. } if key == "from"));
    }

    #[test]
    fn smtp_tls_mode_is_checked() {
        let base = "[store]\npath = a.db\n[notify]\nbackend = smtp\nhost = mail\nfrom = a@x.tw\nto = b@x.tw\n";
        for mode in ["none", "starttls", "SSL"] {
            let config = make_config(&format!("{base}tls = {mode}\n"));
            assert!(validate_engine_config(&config).is_ok(), "{mode}");
        }
        let err = validate_engine_config(&make_config(&format!("{base}tls = yes\n"))).unwrap_err();
        assert!(matches!(err, TradeArenaError::ConfigInvalid { key, .. } if key == "tls"));
        let err =
            validate_engine_config(&make_config(&format!("{base}port = 70000\n"))).unwrap_err();
        assert!(matches!(err, TradeArenaError::ConfigInvalid { key, .. } if key == "port"));
    }

    #[test]
    fn patches_are_read() {
        let patches = read_patches(&make_config(VALID)).unwrap();
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].symbol, "0050.TW");
        assert_eq!(patches[0].start, None);
        assert_eq!(patches[0].volume_multiplier, Some(4.0));
        assert_eq!(patches[0].jump_ratio, DEFAULT_JUMP_RATIO);
    }

    #[test]
    fn overlapping_patches_fail() {
        let config = make_config(
            r#"
[patch.a]
symbol = 0050.TW
end = 2014-01-02
price_multiplier = 0.25

[patch.b]
symbol = 0050.TW
start = 2013-06-01
end = 2014-06-01
price_multiplier = 0.5
"#,
        );
        let err = read_patches(&config).unwrap_err();
        assert!(matches!(err, TradeArenaError::ConfigInvalid { reason, .. } if reason.contains("overlaps")));
    }

    #[test]
    fn patches_for_different_symbols_may_share_dates() {
        let config = make_config(
            "[patch.a]\nsymbol = A\nend = 2014-01-02\nprice_multiplier = 0.25\n\n[patch.b]\nsymbol = B\nend = 2014-01-02\nprice_multiplier = 0.25\n",
        );
        assert_eq!(read_patches(&config).unwrap().len(), 2);
    }

    #[test]
    fn patch_missing_multiplier_fails() {
        let config = make_config("[patch.a]\nsymbol = A\nend = 2014-01-02\n");
        let err = read_patches(&config).unwrap_err();
        assert!(matches!(err, TradeArenaError::ConfigMissing { key, .. } if key == "price_multiplier"));
    }

    #[test]
    fn backtest_dates_validated() {
        let config = make_config("[backtest]\ninitial_capital = 100\nstart_date = 2024-12-31\nend_date = 2020-01-01\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, TradeArenaError::ConfigInvalid { key, .. } if key == "start_date"));

        let config = make_config("[backtest]\nstart_date = 2020/01/01\nend_date = 2024-12-31\n");
        assert!(validate_backtest_config(&config).is_err());

        let config = make_config("[backtest]\ninitial_capital = 0\nstart_date = 2020-01-01\nend_date = 2024-12-31\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, TradeArenaError::ConfigInvalid { key, .. } if key == "initial_capital"));
    }

    #[test]
    fn optimize_ranges_validated() {
        let config = make_config("[optimize]\nfast = 5..20:3\nslow = 20..60:5\nsignal = 9\n");
        assert!(validate_optimize_config(&config).is_ok());
        let config = make_config("[optimize]\nfast = 20..5\n");
        assert!(validate_optimize_config(&config).is_err());
        let config = make_config("[optimize]\nmax_drawdown_flag = 3\n");
        assert!(validate_optimize_config(&config).is_err());
    }
}
