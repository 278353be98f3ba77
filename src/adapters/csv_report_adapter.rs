//! CSV report adapter implementing ReportPort.
//!
//! Writes three files per symbol into the output directory:
//! `{SYMBOL}_buy_signals.csv`, `{SYMBOL}_sell_signals.csv` and
//! `{SYMBOL}_summary.csv` (symbol with `/` replaced by `_`).

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::domain::error::SigtraderError;
use crate::domain::signal::{Signal, SignalTable};
use crate::domain::simulator::BacktestResult;
use crate::domain::universe::symbol_file_stem;
use crate::ports::report_port::ReportPort;

#[derive(Debug, Default)]
pub struct CsvReportAdapter;

#[derive(Serialize)]
struct SummaryRecord<'a> {
    symbol: &'a str,
    initial_capital: f64,
    final_value: String,
    total_return_pct: String,
    buy_signals: usize,
    sell_signals: usize,
}

fn report_err(path: &Path, e: impl std::fmt::Display) -> SigtraderError {
    SigtraderError::Report {
        reason: format!("failed to write {}: {}", path.display(), e),
    }
}

fn write_records<T: Serialize>(path: &Path, records: &[T]) -> Result<(), SigtraderError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| report_err(path, e))?;
    for record in records {
        writer.serialize(record).map_err(|e| report_err(path, e))?;
    }
    writer.flush().map_err(|e| report_err(path, e))
}

impl CsvReportAdapter {
    pub fn new() -> Self {
        CsvReportAdapter
    }

    pub fn signals_path(output_dir: &Path, symbol: &str, table: SignalTable) -> PathBuf {
        output_dir.join(format!("{}_{}.csv", symbol_file_stem(symbol), table.table_name()))
    }

    pub fn summary_path(output_dir: &Path, symbol: &str) -> PathBuf {
        output_dir.join(format!("{}_summary.csv", symbol_file_stem(symbol)))
    }
}

impl ReportPort for CsvReportAdapter {
    fn write(
        &self,
        result: &BacktestResult,
        buys: &[Signal],
        sells: &[Signal],
        output_dir: &str,
    ) -> Result<(), SigtraderError> {
        let dir = Path::new(output_dir);
        fs::create_dir_all(dir).map_err(|e| report_err(dir, e))?;

        let buy_path = Self::signals_path(dir, &result.symbol, SignalTable::Buy);
        // csv skips the header row when there are no records; write it explicitly.
        if buys.is_empty() {
            write_header_only(&buy_path)?;
        } else {
            write_records(&buy_path, buys)?;
        }

        let sell_path = Self::signals_path(dir, &result.symbol, SignalTable::Sell);
        if sells.is_empty() {
            write_header_only(&sell_path)?;
        } else {
            write_records(&sell_path, sells)?;
        }

        let summary = SummaryRecord {
            symbol: &result.symbol,
            initial_capital: result.initial_capital,
            final_value: format!("{:.2}", result.final_value),
            total_return_pct: format!("{:.2}", result.total_return() * 100.0),
            buy_signals: buys.len(),
            sell_signals: sells.len(),
        };
        write_records(&Self::summary_path(dir, &result.symbol), &[summary])
    }
}

const SIGNAL_HEADER: [&str; 12] = [
    "symbol",
    "date",
    "price",
    "short_mavg",
    "long_mavg",
    "sma_signal",
    "bb_signal",
    "macd_signal_line_cross",
    "composite_signal",
    "buy_signal",
    "sell_signal",
    "reason",
];

fn write_header_only(path: &Path) -> Result<(), SigtraderError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| report_err(path, e))?;
    writer
        .write_record(SIGNAL_HEADER)
        .map_err(|e| report_err(path, e))?;
    writer.flush().map_err(|e| report_err(path, e))
}
