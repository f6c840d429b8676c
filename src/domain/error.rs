//! Domain error types.

/// Top-level error type for tradearena.
#[derive(Debug, thiserror::Error)]
pub enum TradeArenaError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("storage error: {reason}")]
    Storage { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    StrategyParse(#[from] crate::domain::strategy::StrategyParseError),

    #[error("provider fetch failed for {symbol}: {reason}")]
    ProviderFetch { symbol: String, reason: String },

    #[error("no data for {symbol}")]
    NoData { symbol: String },

    #[error("insufficient data for {symbol}: have {bars} bars, need {minimum}")]
    InsufficientData {
        symbol: String,
        bars: usize,
        minimum: usize,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&TradeArenaError> for std::process::ExitCode {
    fn from(err: &TradeArenaError) -> Self {
        let code: u8 = match err {
            TradeArenaError::Io(_) => 1,
            TradeArenaError::ConfigParse { .. }
            | TradeArenaError::ConfigMissing { .. }
            | TradeArenaError::ConfigInvalid { .. } => 2,
            TradeArenaError::Database { .. }
            | TradeArenaError::DatabaseQuery { .. }
            | TradeArenaError::Storage { .. } => 3,
            TradeArenaError::StrategyParse(_) => 4,
            TradeArenaError::NoData { .. } | TradeArenaError::InsufficientData { .. } => 5,
            TradeArenaError::ProviderFetch { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_data_message_names_counts() {
        let err = TradeArenaError::InsufficientData {
            symbol: "0050.TW".into(),
            bars: 10,
            minimum: 35,
        };
        assert_eq!(
            err.to_string(),
            "insufficient data for 0050.TW: have 10 bars, need 35"
        );
    }

    #[test]
    fn exit_codes_group_by_family() {
        use std::process::ExitCode;

        let config = TradeArenaError::ConfigMissing {
            section: "fees".into(),
            key: "fee_rate".into(),
        };
        let storage = TradeArenaError::Storage {
            reason: "disk full".into(),
        };
        let data = TradeArenaError::NoData {
            symbol: "2330.TW".into(),
        };
        assert_eq!(ExitCode::from(&config), ExitCode::from(2));
        assert_eq!(ExitCode::from(&storage), ExitCode::from(3));
        assert_eq!(ExitCode::from(&data), ExitCode::from(5));
    }
}
