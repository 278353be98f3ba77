//! Per-symbol orchestration: fetch, validate, compute indicators and signals,
//! persist.
//!
//! Ports are only touched from the calling thread. The compute stage is pure
//! and runs across symbols on the rayon pool; results keep input symbol order.

use chrono::NaiveDate;
use rayon::prelude::*;

use crate::domain::candle::{validate_series, Candle};
use crate::domain::error::SigtraderError;
use crate::domain::indicator::{compute_frame, IndicatorFrame};
use crate::domain::signal::{generate_signals, split_signals, Signal, SignalTable};
use crate::domain::strategy::StrategyParams;
use crate::ports::data_port::DataPort;
use crate::ports::storage_port::StoragePort;

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolAnalysis {
    pub symbol: String,
    pub candles: Vec<Candle>,
    pub frame: IndicatorFrame,
    /// Every fully-defined row, neutral ones included.
    pub signals: Vec<Signal>,
    pub buys: Vec<Signal>,
    pub sells: Vec<Signal>,
}

/// A symbol dropped from the run, with the error that dropped it.
#[derive(Debug)]
pub struct SkippedSymbol {
    pub symbol: String,
    pub error: SigtraderError,
}

#[derive(Debug, Default)]
pub struct PipelineReport {
    pub analyses: Vec<SymbolAnalysis>,
    pub skipped: Vec<SkippedSymbol>,
}

impl PipelineReport {
    pub fn is_empty(&self) -> bool {
        self.analyses.is_empty()
    }

    /// The error to surface when no symbol survived; `None` if one did.
    pub fn into_failure(mut self) -> Option<SigtraderError> {
        if !self.analyses.is_empty() {
            return None;
        }
        if self.skipped.is_empty() {
            return Some(SigtraderError::NoData {
                symbol: "all".to_string(),
            });
        }
        Some(self.skipped.remove(0).error)
    }
}

/// Validate one symbol's candles and derive its indicator frame and signals.
pub fn analyze(
    symbol: &str,
    candles: Vec<Candle>,
    params: &StrategyParams,
) -> Result<SymbolAnalysis, SigtraderError> {
    if candles.is_empty() {
        return Err(SigtraderError::NoData {
            symbol: symbol.to_string(),
        });
    }
    if let Some(other) = candles.iter().find(|c| c.symbol != symbol) {
        return Err(SigtraderError::malformed(
            symbol,
            format!("received candles for {}", other.symbol),
        ));
    }
    validate_series(&candles)?;

    let frame = compute_frame(&candles, params);
    let signals = generate_signals(&frame, params);
    let (buys, sells) = split_signals(&signals);

    Ok(SymbolAnalysis {
        symbol: symbol.to_string(),
        candles,
        frame,
        signals,
        buys,
        sells,
    })
}

/// Fetch every symbol through the data port, in order.
pub fn fetch_all(
    data_port: &dyn DataPort,
    symbols: &[String],
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Vec<(String, Result<Vec<Candle>, SigtraderError>)> {
    symbols
        .iter()
        .map(|symbol| {
            let fetched = data_port.fetch_candles(symbol, start_date, end_date);
            (symbol.clone(), fetched)
        })
        .collect()
}

/// Analyze fetched series in parallel. Fetch failures pass through unchanged.
pub fn analyze_all(
    fetched: Vec<(String, Result<Vec<Candle>, SigtraderError>)>,
    params: &StrategyParams,
) -> PipelineReport {
    let results: Vec<(String, Result<SymbolAnalysis, SigtraderError>)> = fetched
        .into_par_iter()
        .map(|(symbol, candles)| {
            let analysis = candles.and_then(|c| analyze(&symbol, c, params));
            (symbol, analysis)
        })
        .collect();

    let mut report = PipelineReport::default();
    for (symbol, result) in results {
        match result {
            Ok(analysis) => report.analyses.push(analysis),
            Err(error) => report.skipped.push(SkippedSymbol { symbol, error }),
        }
    }
    report
}

/// Append candles, indicator rows and buy/sell signals of one symbol.
pub fn persist(store: &dyn StoragePort, analysis: &SymbolAnalysis) -> Result<(), SigtraderError> {
    store.append_candles(&analysis.candles)?;
    store.append_indicator_frame(&analysis.frame)?;
    store.append_signals(SignalTable::Buy, &analysis.buys)?;
    store.append_signals(SignalTable::Sell, &analysis.sells)?;
    Ok(())
}

/// Fetch, analyze and (when a store is given) persist every symbol.
///
/// Per-symbol failures are collected in [`PipelineReport::skipped`]; a storage
/// failure aborts the run.
pub fn run_pipeline(
    data_port: &dyn DataPort,
    store: Option<&dyn StoragePort>,
    symbols: &[String],
    start_date: NaiveDate,
    end_date: NaiveDate,
    params: &StrategyParams,
) -> Result<PipelineReport, SigtraderError> {
    let fetched = fetch_all(data_port, symbols, start_date, end_date);
    let report = analyze_all(fetched, params);

    if let Some(store) = store {
        for analysis in &report.analyses {
            persist(store, analysis)?;
        }
    }

    Ok(report)
}
