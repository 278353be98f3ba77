//! Domain error types.

/// Top-level error type for sigtrader.
#[derive(Debug, thiserror::Error)]
pub enum SigtraderError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

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

    #[error("malformed input for {symbol}: {reason}")]
    MalformedInput { symbol: String, reason: String },

    #[error("no data for {symbol}")]
    NoData { symbol: String },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SigtraderError {
    pub fn malformed(symbol: &str, reason: impl Into<String>) -> Self {
        SigtraderError::MalformedInput {
            symbol: symbol.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&SigtraderError> for std::process::ExitCode {
    fn from(err: &SigtraderError) -> Self {
        let code: u8 = match err {
            SigtraderError::Io(_) | SigtraderError::Report { .. } => 1,
            SigtraderError::ConfigParse { .. }
            | SigtraderError::ConfigMissing { .. }
            | SigtraderError::ConfigInvalid { .. } => 2,
            SigtraderError::Database { .. } | SigtraderError::DatabaseQuery { .. } => 3,
            SigtraderError::MalformedInput { .. } => 4,
            SigtraderError::NoData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
