//! Typed engine configuration.
//!
//! Built from a [`ConfigPort`](crate::ports::config_port::ConfigPort) by the
//! builders in `cli` and passed explicitly into the drivers.

use crate::domain::corporate_action::CorporateActionPatch;
use crate::domain::execution::FeeSchedule;
use crate::domain::ledger::{default_pockets, PocketSpec};
use crate::domain::strategy::StrategyConfig;

pub const DEFAULT_SUFFIX: &str = ".TW";
pub const DEFAULT_LOOKBACK_DAYS: i64 = 365;
pub const PATCH_SECTION_PREFIX: &str = "patch.";

/// Default arena strategy set.
pub const DEFAULT_STRATEGIES: [(usize, usize, usize); 10] = [
    (11, 45, 9),
    (5, 35, 9),
    (14, 45, 9),
    (14, 40, 9),
    (8, 25, 9),
    (5, 45, 9),
    (8, 40, 9),
    (11, 40, 9),
    (20, 45, 9),
    (17, 35, 9),
];

pub fn default_strategies() -> Vec<StrategyConfig> {
    DEFAULT_STRATEGIES
        .iter()
        .map(|&(fast, slow, signal)| StrategyConfig::macd(fast, slow, signal))
        .collect()
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub symbol: Option<String>,
    pub default_suffix: String,
    /// Calendar days of history loaded before the evaluation date.
    pub lookback_days: i64,
    pub fees: FeeSchedule,
    pub pockets: Vec<PocketSpec>,
    pub strategies: Vec<StrategyConfig>,
    pub patches: Vec<CorporateActionPatch>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            symbol: None,
            default_suffix: DEFAULT_SUFFIX.to_string(),
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            fees: FeeSchedule::default(),
            pockets: default_pockets(),
            strategies: default_strategies(),
            patches: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn pocket(&self, name: &str) -> Option<&PocketSpec> {
        self.pockets.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }
}

/// Parses `name:capital, name:capital, ...`.
pub fn parse_pockets(input: &str) -> Result<Vec<PocketSpec>, String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| {
            let (name, capital) = entry
                .split_once(':')
                .ok_or_else(|| format!("expected name:capital, got '{entry}'"))?;
            let capital: f64 = capital
                .trim()
                .parse()
                .map_err(|e| format!("invalid capital in '{entry}': {e}"))?;
            Ok(PocketSpec::new(name.trim(), capital))
        })
        .collect()
}

/// Transport security for the SMTP notifier, `[notify] tls`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotifyTls {
    /// Plaintext; only for a trusted local relay.
    None,
    #[default]
    StartTls,
    /// Implicit TLS from the first byte (SMTPS).
    Ssl,
}

impl NotifyTls {
    pub fn default_port(self) -> u16 {
        match self {
            NotifyTls::None => 25,
            NotifyTls::StartTls => 587,
            NotifyTls::Ssl => 465,
        }
    }
}

impl std::str::FromStr for NotifyTls {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(NotifyTls::None),
            "starttls" => Ok(NotifyTls::StartTls),
            "ssl" => Ok(NotifyTls::Ssl),
            other => Err(format!(
                "unknown tls mode '{other}' (expected none, starttls or ssl)"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pockets_parse() {
        let pockets = parse_pockets("micro:1000, whale : 1000000").unwrap();
        assert_eq!(pockets.len(), 2);
        assert_eq!(pockets[1].name, "whale");
        assert_eq!(pockets[1].initial_capital, 1_000_000.0);
        assert!(parse_pockets("micro").is_err());
        assert!(parse_pockets("micro:lots").is_err());
    }

    #[test]
    fn notify_tls_modes() {
        assert_eq!("SSL".parse::<NotifyTls>(), Ok(NotifyTls::Ssl));
        assert_eq!(" starttls ".parse::<NotifyTls>(), Ok(NotifyTls::StartTls));
        assert_eq!("none".parse::<NotifyTls>().map(NotifyTls::default_port), Ok(25));
        assert!("tls".parse::<NotifyTls>().is_err());
        assert_eq!(NotifyTls::default(), NotifyTls::StartTls);
    }

    #[test]
    fn defaults_are_arena_set() {
        let config = EngineConfig::default();
        assert_eq!(config.strategies.len(), 10);
        assert_eq!(config.strategies[0].name, "MACD(11,45,9)");
        assert_eq!(config.pocket("WHALE").map(|p| p.initial_capital), Some(1_000_000.0));
        assert!(config.strategies.iter().all(|s| s.min_bars() <= 54));
    }
}
