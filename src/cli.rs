//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::config_validation::{
    self, pipeline_dates, validate_config, validate_data_config, validate_strategy_config,
};
use crate::domain::error::SigtraderError;
use crate::domain::pipeline::{self, PipelineReport};
use crate::domain::signal::{Signal, SignalTable};
use crate::domain::simulator::{
    backtest_signals, BacktestConfig, BacktestResult, SimulationMode, DEFAULT_INITIAL_CAPITAL,
    DEFAULT_INVESTMENT_FRACTION,
};
use crate::domain::strategy::StrategyParams;
use crate::domain::universe::{default_symbols, parse_symbols};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;
use crate::ports::storage_port::StoragePort;

#[derive(Parser, Debug)]
#[command(name = "sigtrader", about = "Technical-indicator signal generator and backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compute indicators and signals and persist them
    Signals {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
    },
    /// Backtest persisted signals
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        mode: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Compute signals in memory and backtest them without persisting
    Run {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        mode: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show candle range for symbol(s)
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
    },
    /// List symbols available from the data source
    ListSymbols {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Signals { config, symbol } => run_signals(&config, symbol.as_deref()),
        Command::Backtest {
            config,
            symbol,
            mode,
            output,
        } => run_backtest(&config, symbol.as_deref(), mode.as_deref(), output.as_deref()),
        Command::Run {
            config,
            symbol,
            mode,
            output,
        } => run_in_memory(&config, symbol.as_deref(), mode.as_deref(), output.as_deref()),
        Command::Validate { config } => run_validate(&config),
        Command::Info { config, symbol } => run_info(&config, symbol.as_deref()),
        Command::ListSymbols { config } => run_list_symbols(&config),
    }
}

fn fail(e: SigtraderError) -> ExitCode {
    eprintln!("error: {e}");
    (&e).into()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(fail)
}

/// Strategy parameters from `[strategy]`, defaults filling missing keys.
pub fn build_strategy_params(config: &dyn ConfigPort) -> Result<StrategyParams, SigtraderError> {
    validate_strategy_config(config)?;
    let d = StrategyParams::default();
    // Validated above: every window is at least 1.
    let window = |key: &str, default: usize| config.get_int("strategy", key, default as i64) as usize;

    Ok(StrategyParams {
        short_window: window("short_window", d.short_window),
        long_window: window("long_window", d.long_window),
        trend_window: window("trend_window", d.trend_window),
        oscillator_lookback: window("oscillator_lookback", d.oscillator_lookback),
        oversold: config.get_double("strategy", "oversold", d.oversold),
        overbought: config.get_double("strategy", "overbought", d.overbought),
        buy_threshold: config.get_int("strategy", "buy_threshold", d.buy_threshold as i64) as i32,
        sell_threshold: config.get_int("strategy", "sell_threshold", d.sell_threshold as i64)
            as i32,
        bollinger_period: window("bollinger_period", d.bollinger_period),
        bollinger_multiplier: config.get_double(
            "strategy",
            "bollinger_multiplier",
            d.bollinger_multiplier,
        ),
        macd_fast: window("macd_fast", d.macd_fast),
        macd_slow: window("macd_slow", d.macd_slow),
        macd_signal: window("macd_signal", d.macd_signal),
    })
}

/// Backtest settings from `[backtest]`; `mode_override` wins over the file.
pub fn build_backtest_config(
    config: &dyn ConfigPort,
    mode_override: Option<&str>,
) -> Result<BacktestConfig, SigtraderError> {
    config_validation::validate_backtest_config(config)?;

    let mode = mode_override
        .map(str::to_string)
        .or_else(|| config.get_string("backtest", "mode"));
    let mode = match mode {
        Some(m) => m
            .parse::<SimulationMode>()
            .map_err(|reason| SigtraderError::ConfigInvalid {
                section: "backtest".into(),
                key: "mode".into(),
                reason,
            })?,
        None => SimulationMode::default(),
    };

    Ok(BacktestConfig {
        initial_capital: config.get_double("backtest", "initial_capital", DEFAULT_INITIAL_CAPITAL),
        investment_fraction: config.get_double(
            "backtest",
            "investment_fraction",
            DEFAULT_INVESTMENT_FRACTION,
        ),
        mode,
    })
}

/// `--symbol` (comma-separated) overrides `[pipeline] symbols`; the default
/// pairs apply when neither is given.
pub fn resolve_symbols(
    symbol_override: Option<&str>,
    config: &dyn ConfigPort,
) -> Result<Vec<String>, SigtraderError> {
    let raw = match symbol_override {
        Some(s) => s.to_string(),
        None => match config.get_string("pipeline", "symbols") {
            Some(s) => s,
            None => return Ok(default_symbols()),
        },
    };
    parse_symbols(&raw).map_err(|e| SigtraderError::ConfigInvalid {
        section: "pipeline".into(),
        key: "symbols".into(),
        reason: e.to_string(),
    })
}

fn unsupported(section: &str, key: &str, value: &str) -> SigtraderError {
    SigtraderError::ConfigInvalid {
        section: section.into(),
        key: key.into(),
        reason: format!("{} support is not compiled in", value),
    }
}

/// The candle source named by `[data] source`.
pub fn open_data_port(config: &dyn ConfigPort) -> Result<Box<dyn DataPort>, SigtraderError> {
    let source = config
        .get_string("data", "source")
        .unwrap_or_else(|| "csv".to_string());

    match source.as_str() {
        "csv" => {
            let dir = config
                .get_string("data", "csv_dir")
                .unwrap_or_else(|| "./data".to_string());
            Ok(Box::new(CsvAdapter::new(PathBuf::from(dir))))
        }
        #[cfg(feature = "sqlite")]
        "sqlite" => Ok(Box::new(
            crate::adapters::sqlite_adapter::SqliteAdapter::from_config(config)?,
        )),
        #[cfg(feature = "postgres")]
        "postgres" => Ok(Box::new(
            crate::adapters::postgres_adapter::PostgresAdapter::from_config(config)?,
        )),
        other => Err(unsupported("data", "source", other)),
    }
}

/// The signal store named by `[storage] backend`.
pub fn open_store(config: &dyn ConfigPort) -> Result<Box<dyn StoragePort>, SigtraderError> {
    let backend = config
        .get_string("storage", "backend")
        .unwrap_or_else(|| "sqlite".to_string());

    match backend.as_str() {
        #[cfg(feature = "sqlite")]
        "sqlite" => Ok(Box::new(
            crate::adapters::sqlite_adapter::SqliteAdapter::from_config(config)?,
        )),
        #[cfg(feature = "postgres")]
        "postgres" => Ok(Box::new(
            crate::adapters::postgres_adapter::PostgresAdapter::from_config(config)?,
        )),
        other => Err(unsupported("storage", "backend", other)),
    }
}

fn print_pipeline_report(report: &PipelineReport) {
    for skipped in &report.skipped {
        eprintln!("warning: skipping {} ({})", skipped.symbol, skipped.error);
    }
    for analysis in &report.analyses {
        eprintln!(
            "  {}: {} candles, {} buy signals, {} sell signals",
            analysis.symbol,
            analysis.candles.len(),
            analysis.buys.len(),
            analysis.sells.len()
        );
    }
}

fn print_backtest(result: &BacktestResult) {
    println!(
        "Backtest for {}: Initial Capital: {}, Final Portfolio Value: {:.2}",
        result.symbol, result.initial_capital, result.final_value
    );
}

fn run_signals(config_path: &Path, symbol_override: Option<&str>) -> ExitCode {
    // Stage 1: Load and validate config
    eprintln!("Loading config from {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    if let Err(e) = validate_config(&config) {
        return fail(e);
    }

    // Stage 2: Resolve parameters
    let params = match build_strategy_params(&config) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };
    let symbols = match resolve_symbols(symbol_override, &config) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    let (start, end) = match pipeline_dates(&config) {
        Ok(d) => d,
        Err(e) => return fail(e),
    };

    // Stage 3: Open ports
    let data_port = match open_data_port(&config) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };
    let store = match open_store(&config) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    // Stage 4: Fetch, analyze, persist
    eprintln!(
        "Computing signals for {} symbols from {} to {}...",
        symbols.len(),
        start,
        end
    );
    let report = match pipeline::run_pipeline(
        data_port.as_ref(),
        Some(store.as_ref()),
        &symbols,
        start,
        end,
        &params,
    ) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };
    print_pipeline_report(&report);

    match report.into_failure() {
        Some(e) => fail(e),
        None => {
            eprintln!("Signals persisted");
            ExitCode::SUCCESS
        }
    }
}

fn write_report(
    output: Option<&Path>,
    result: &BacktestResult,
    buys: &[Signal],
    sells: &[Signal],
) -> Result<(), SigtraderError> {
    let Some(dir) = output else {
        return Ok(());
    };
    CsvReportAdapter::new().write(result, buys, sells, &dir.to_string_lossy())?;
    eprintln!("Report for {} written to: {}", result.symbol, dir.display());
    Ok(())
}

fn run_backtest(
    config_path: &Path,
    symbol_override: Option<&str>,
    mode_override: Option<&str>,
    output: Option<&Path>,
) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    if let Err(e) = validate_data_config(&config) {
        return fail(e);
    }

    let bt_config = match build_backtest_config(&config, mode_override) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };
    let symbols = match resolve_symbols(symbol_override, &config) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    let store = match open_store(&config) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    eprintln!(
        "Backtesting {} symbols ({} mode)...",
        symbols.len(),
        bt_config.mode
    );
    for symbol in &symbols {
        let loaded = store
            .load_signals(symbol, SignalTable::Buy)
            .and_then(|buys| Ok((buys, store.load_signals(symbol, SignalTable::Sell)?)));
        let (buys, sells) = match loaded {
            Ok(streams) => streams,
            Err(e) => return fail(e),
        };
        eprintln!(
            "  {}: {} buy signals, {} sell signals",
            symbol,
            buys.len(),
            sells.len()
        );

        let result = match backtest_signals(symbol, &buys, &sells, &bt_config) {
            Ok((result, _)) => result,
            Err(e) => return fail(e),
        };
        print_backtest(&result);

        if let Err(e) = write_report(output, &result, &buys, &sells) {
            return fail(e);
        }
    }
    ExitCode::SUCCESS
}

fn run_in_memory(
    config_path: &Path,
    symbol_override: Option<&str>,
    mode_override: Option<&str>,
    output: Option<&Path>,
) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    if let Err(e) = validate_config(&config) {
        return fail(e);
    }

    let params = match build_strategy_params(&config) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };
    let bt_config = match build_backtest_config(&config, mode_override) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };
    let symbols = match resolve_symbols(symbol_override, &config) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    let (start, end) = match pipeline_dates(&config) {
        Ok(d) => d,
        Err(e) => return fail(e),
    };
    let data_port = match open_data_port(&config) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };

    eprintln!(
        "Computing signals for {} symbols from {} to {}...",
        symbols.len(),
        start,
        end
    );
    let report = match pipeline::run_pipeline(data_port.as_ref(), None, &symbols, start, end, &params)
    {
        Ok(r) => r,
        Err(e) => return fail(e),
    };
    print_pipeline_report(&report);
    if report.is_empty() {
        return match report.into_failure() {
            Some(e) => fail(e),
            None => ExitCode::SUCCESS,
        };
    }

    for analysis in &report.analyses {
        let result =
            match backtest_signals(&analysis.symbol, &analysis.buys, &analysis.sells, &bt_config) {
                Ok((result, _)) => result,
                Err(e) => return fail(e),
            };
        print_backtest(&result);

        if let Err(e) = write_report(output, &result, &analysis.buys, &analysis.sells) {
            return fail(e);
        }
    }
    ExitCode::SUCCESS
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    if let Err(e) = validate_config(&config) {
        return fail(e);
    }

    let summary = build_strategy_params(&config).and_then(|params| {
        let bt = build_backtest_config(&config, None)?;
        let symbols = resolve_symbols(None, &config)?;
        let dates = pipeline_dates(&config)?;
        Ok((params, bt, symbols, dates))
    });
    let (params, bt, symbols, (start, end)) = match summary {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    eprintln!("\nUniverse:");
    eprintln!("  symbols: {}", symbols.join(", "));
    eprintln!("  range:   {} to {}", start, end);

    eprintln!("\nIndicators to compute:");
    for indicator in params.indicator_types() {
        eprintln!("  {}", indicator);
    }
    eprintln!("  voting warmup: {} candles", params.voting_warmup());

    eprintln!("\nBacktest:");
    eprintln!("  initial capital:     {}", bt.initial_capital);
    eprintln!("  investment fraction: {}", bt.investment_fraction);
    eprintln!("  mode:                {}", bt.mode);

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

fn run_info(config_path: &Path, symbol_override: Option<&str>) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    if let Err(e) = validate_data_config(&config) {
        return fail(e);
    }

    let symbols = match resolve_symbols(symbol_override, &config) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    let data_port = match open_data_port(&config) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };

    for symbol in &symbols {
        match data_port.get_data_range(symbol) {
            Ok(Some((first, last, count))) => {
                println!("{}: {} to {} ({} candles)", symbol, first, last, count);
            }
            Ok(None) => println!("{}: no data", symbol),
            Err(e) => return fail(e),
        }
    }
    ExitCode::SUCCESS
}

fn run_list_symbols(config_path: &Path) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    if let Err(e) = validate_data_config(&config) {
        return fail(e);
    }

    let data_port = match open_data_port(&config) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };

    let symbols = match data_port.list_symbols() {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    if symbols.is_empty() {
        eprintln!("No symbols found");
    } else {
        for symbol in &symbols {
            println!("{}", symbol);
        }
        eprintln!("{} symbols found", symbols.len());
    }
    ExitCode::SUCCESS
}
