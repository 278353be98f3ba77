//! Configuration validation.
//!
//! Checks every config field before any pipeline stage runs. Missing keys in
//! `[strategy]` and `[backtest]` fall back to their documented defaults; the
//! checks apply to the effective value.

use chrono::NaiveDate;

use crate::domain::error::SigtraderError;
use crate::domain::simulator::{
    SimulationMode, DEFAULT_INITIAL_CAPITAL, DEFAULT_INVESTMENT_FRACTION,
};
use crate::domain::strategy::StrategyParams;
use crate::domain::universe::parse_symbols;
use crate::ports::config_port::ConfigPort;

pub const DATA_SOURCES: [&str; 3] = ["csv", "sqlite", "postgres"];
pub const STORAGE_BACKENDS: [&str; 2] = ["sqlite", "postgres"];

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), SigtraderError> {
    validate_data_config(config)?;
    validate_pipeline_config(config)?;
    validate_strategy_config(config)?;
    validate_backtest_config(config)?;
    Ok(())
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), SigtraderError> {
    let source = config
        .get_string("data", "source")
        .unwrap_or_else(|| "csv".to_string());
    if !DATA_SOURCES.contains(&source.trim()) {
        return Err(invalid(
            "data",
            "source",
            format!("unknown data source '{}' (expected csv, sqlite or postgres)", source),
        ));
    }

    let backend = config
        .get_string("storage", "backend")
        .unwrap_or_else(|| "sqlite".to_string());
    if !STORAGE_BACKENDS.contains(&backend.trim()) {
        return Err(invalid(
            "storage",
            "backend",
            format!("unknown storage backend '{}' (expected sqlite or postgres)", backend),
        ));
    }

    if config.get_int("sqlite", "pool_size", 4) < 1 {
        return Err(invalid("sqlite", "pool_size", "pool_size must be at least 1"));
    }
    Ok(())
}

pub fn validate_pipeline_config(config: &dyn ConfigPort) -> Result<(), SigtraderError> {
    let (start_date, end_date) = pipeline_dates(config)?;
    if start_date > end_date {
        return Err(invalid(
            "pipeline",
            "start_date",
            "start_date must not be after end_date",
        ));
    }

    if let Some(symbols) = config.get_string("pipeline", "symbols") {
        parse_symbols(&symbols).map_err(|e| invalid("pipeline", "symbols", e.to_string()))?;
    }
    Ok(())
}

/// The inclusive date range of the pipeline. Both keys are required.
pub fn pipeline_dates(config: &dyn ConfigPort) -> Result<(NaiveDate, NaiveDate), SigtraderError> {
    let start = parse_date(config.get_string("pipeline", "start_date").as_deref(), "start_date")?;
    let end = parse_date(config.get_string("pipeline", "end_date").as_deref(), "end_date")?;
    Ok((start, end))
}

fn parse_date(value: Option<&str>, field: &str) -> Result<NaiveDate, SigtraderError> {
    match value {
        None => Err(SigtraderError::ConfigMissing {
            section: "pipeline".to_string(),
            key: field.to_string(),
        }),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
            invalid(
                "pipeline",
                field,
                format!("invalid {} format, expected YYYY-MM-DD", field),
            )
        }),
    }
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), SigtraderError> {
    let defaults = StrategyParams::default();
    let window = |key: &str, default: usize| -> Result<i64, SigtraderError> {
        let value = config.get_int("strategy", key, default as i64);
        if value < 1 {
            return Err(invalid("strategy", key, format!("{} must be at least 1", key)));
        }
        Ok(value)
    };

    let short = window("short_window", defaults.short_window)?;
    let long = window("long_window", defaults.long_window)?;
    window("trend_window", defaults.trend_window)?;
    window("oscillator_lookback", defaults.oscillator_lookback)?;
    window("bollinger_period", defaults.bollinger_period)?;
    let fast = window("macd_fast", defaults.macd_fast)?;
    let slow = window("macd_slow", defaults.macd_slow)?;
    window("macd_signal", defaults.macd_signal)?;

    if short >= long {
        return Err(invalid(
            "strategy",
            "short_window",
            "short_window must be less than long_window",
        ));
    }
    if fast >= slow {
        return Err(invalid(
            "strategy",
            "macd_fast",
            "macd_fast must be less than macd_slow",
        ));
    }

    let oversold = config.get_double("strategy", "oversold", defaults.oversold);
    let overbought = config.get_double("strategy", "overbought", defaults.overbought);
    if !(0.0..=100.0).contains(&oversold) {
        return Err(invalid("strategy", "oversold", "oversold must be between 0 and 100"));
    }
    if !(0.0..=100.0).contains(&overbought) {
        return Err(invalid(
            "strategy",
            "overbought",
            "overbought must be between 0 and 100",
        ));
    }
    if oversold >= overbought {
        return Err(invalid(
            "strategy",
            "oversold",
            "oversold must be less than overbought",
        ));
    }

    let buy = config.get_int("strategy", "buy_threshold", defaults.buy_threshold as i64);
    let sell = config.get_int("strategy", "sell_threshold", defaults.sell_threshold as i64);
    if sell >= buy {
        return Err(invalid(
            "strategy",
            "sell_threshold",
            "sell_threshold must be less than buy_threshold",
        ));
    }

    let multiplier =
        config.get_double("strategy", "bollinger_multiplier", defaults.bollinger_multiplier);
    if !multiplier.is_finite() || multiplier < 0.0 {
        return Err(invalid(
            "strategy",
            "bollinger_multiplier",
            "bollinger_multiplier must be non-negative",
        ));
    }

    Ok(())
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), SigtraderError> {
    let capital = config.get_double("backtest", "initial_capital", DEFAULT_INITIAL_CAPITAL);
    if !capital.is_finite() || capital <= 0.0 {
        return Err(invalid(
            "backtest",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }

    let fraction = config.get_double(
        "backtest",
        "investment_fraction",
        DEFAULT_INVESTMENT_FRACTION,
    );
    if !fraction.is_finite() || fraction <= 0.0 || fraction > 1.0 {
        return Err(invalid(
            "backtest",
            "investment_fraction",
            "investment_fraction must be in (0, 1]",
        ));
    }

    if let Some(mode) = config.get_string("backtest", "mode") {
        mode.parse::<SimulationMode>()
            .map_err(|reason| invalid("backtest", "mode", reason))?;
    }
    Ok(())
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> SigtraderError {
    SigtraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    const PIPELINE: &str = "[pipeline]\nstart_date = 2018-09-01\nend_date = 2023-09-01\n";

    #[test]
    fn full_config_passes() {
        let config = make_config(
            r#"
[data]
source = csv
csv_dir = ./data

[storage]
backend = sqlite

[sqlite]
path = sigtrader.db
pool_size = 4

[pipeline]
symbols = BTC/USDT,ETH/USDT
start_date = 2018-09-01
end_date = 2023-09-01

[strategy]
short_window = 10
long_window = 50
trend_window = 200
oscillator_lookback = 14
oversold = 30
overbought = 70
buy_threshold = 1
sell_threshold = -1

[backtest]
initial_capital = 50000
investment_fraction = 0.4
mode = chronological
"#,
        );
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn defaults_alone_pass() {
        assert!(validate_config(&make_config(PIPELINE)).is_ok());
    }

    #[test]
    fn unknown_data_source_fails() {
        let config = make_config("[data]\nsource = ftp\n");
        let err = validate_data_config(&config).unwrap_err();
        assert!(matches!(err, SigtraderError::ConfigInvalid { key, .. } if key == "source"));
    }

    #[test]
    fn unknown_storage_backend_fails() {
        let config = make_config("[storage]\nbackend = redis\n");
        let err = validate_data_config(&config).unwrap_err();
        assert!(matches!(err, SigtraderError::ConfigInvalid { key, .. } if key == "backend"));
    }

    #[test]
    fn missing_end_date_fails() {
        let config = make_config("[pipeline]\nstart_date = 2018-09-01\n");
        let err = validate_pipeline_config(&config).unwrap_err();
        assert!(matches!(err, SigtraderError::ConfigMissing { key, .. } if key == "end_date"));
    }

    #[test]
    fn bad_date_format_fails() {
        let config = make_config("[pipeline]\nstart_date = 2018/09/01\nend_date = 2023-09-01\n");
        let err = validate_pipeline_config(&config).unwrap_err();
        assert!(matches!(err, SigtraderError::ConfigInvalid { key, .. } if key == "start_date"));
    }

    #[test]
    fn reversed_dates_fail() {
        let config = make_config("[pipeline]\nstart_date = 2023-09-01\nend_date = 2018-09-01\n");
        assert!(validate_pipeline_config(&config).is_err());
    }

    #[test]
    fn single_day_range_passes() {
        let config = make_config("[pipeline]\nstart_date = 2023-09-01\nend_date = 2023-09-01\n");
        assert!(validate_pipeline_config(&config).is_ok());
    }

    #[test]
    fn bad_symbol_list_fails() {
        let config = make_config(&format!("{PIPELINE}symbols = BTC/USDT,,ETH/USDT\n"));
        let err = validate_pipeline_config(&config).unwrap_err();
        assert!(matches!(err, SigtraderError::ConfigInvalid { key, .. } if key == "symbols"));
    }

    #[test]
    fn zero_window_fails() {
        let config = make_config("[strategy]\nshort_window = 0\n");
        let err = validate_strategy_config(&config).unwrap_err();
        assert!(matches!(err, SigtraderError::ConfigInvalid { key, .. } if key == "short_window"));
    }

    #[test]
    fn short_not_below_long_fails() {
        let config = make_config("[strategy]\nshort_window = 50\nlong_window = 50\n");
        let err = validate_strategy_config(&config).unwrap_err();
        assert!(matches!(err, SigtraderError::ConfigInvalid { key, .. } if key == "short_window"));
    }

    #[test]
    fn macd_fast_not_below_slow_fails() {
        let config = make_config("[strategy]\nmacd_fast = 30\nmacd_slow = 26\n");
        let err = validate_strategy_config(&config).unwrap_err();
        assert!(matches!(err, SigtraderError::ConfigInvalid { key, .. } if key == "macd_fast"));
    }

    #[test]
    fn oscillator_bounds_checked() {
        let config = make_config("[strategy]\noversold = 80\noverbought = 70\n");
        let err = validate_strategy_config(&config).unwrap_err();
        assert!(matches!(err, SigtraderError::ConfigInvalid { key, .. } if key == "oversold"));

        let config = make_config("[strategy]\noverbought = 120\n");
        let err = validate_strategy_config(&config).unwrap_err();
        assert!(matches!(err, SigtraderError::ConfigInvalid { key, .. } if key == "overbought"));
    }

    #[test]
    fn thresholds_ordered() {
        let config = make_config("[strategy]\nbuy_threshold = 0\nsell_threshold = 0\n");
        let err = validate_strategy_config(&config).unwrap_err();
        assert!(
            matches!(err, SigtraderError::ConfigInvalid { key, .. } if key == "sell_threshold")
        );
    }

    #[test]
    fn negative_multiplier_fails() {
        let config = make_config("[strategy]\nbollinger_multiplier = -1\n");
        assert!(validate_strategy_config(&config).is_err());
    }

    #[test]
    fn initial_capital_must_be_positive() {
        let config = make_config("[backtest]\ninitial_capital = 0\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(
            matches!(err, SigtraderError::ConfigInvalid { key, .. } if key == "initial_capital")
        );
    }

    #[test]
    fn fraction_range_checked() {
        for bad in ["0", "-0.1", "1.01"] {
            let config = make_config(&format!("[backtest]\ninvestment_fraction = {bad}\n"));
            let err = validate_backtest_config(&config).unwrap_err();
            assert!(
                matches!(err, SigtraderError::ConfigInvalid { ref key, .. } if key == "investment_fraction"),
                "{bad} should be rejected"
            );
        }
        let config = make_config("[backtest]\ninvestment_fraction = 1.0\n");
        assert!(validate_backtest_config(&config).is_ok());
    }

    #[test]
    fn unknown_mode_fails() {
        let config = make_config("[backtest]\nmode = fifo\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, SigtraderError::ConfigInvalid { key, .. } if key == "mode"));
    }
}
