#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use sigtrader::domain::candle::{datetime_to_millis, Candle};
use sigtrader::domain::error::SigtraderError;
use sigtrader::domain::indicator::{IndicatorFrame, IndicatorRow};
use sigtrader::domain::signal::{Signal, SignalTable, BUY_REASON, SELL_REASON};
use sigtrader::domain::strategy::StrategyParams;
use sigtrader::ports::data_port::DataPort;
use sigtrader::ports::storage_port::StoragePort;
use std::cell::RefCell;
use std::collections::HashMap;
use std::process::ExitCode;

pub const DAY_MS: i64 = 24 * 60 * 60 * 1000;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<Candle>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_candles(mut self, symbol: &str, candles: Vec<Candle>) -> Self {
        self.data.insert(symbol.to_string(), candles);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_candles(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Candle>, SigtraderError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(SigtraderError::Database {
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(symbol)
            .map(|candles| {
                candles
                    .iter()
                    .filter(|c| {
                        let d = c.datetime().date();
                        d >= start_date && d <= end_date
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn list_symbols(&self) -> Result<Vec<String>, SigtraderError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }

    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, SigtraderError> {
        match self.data.get(symbol) {
            Some(candles) if !candles.is_empty() => {
                let first = candles[0].datetime();
                let last = candles[candles.len() - 1].datetime();
                Ok(Some((first, last, candles.len())))
            }
            _ => Ok(None),
        }
    }
}

/// In-memory `StoragePort`; signals load back in date order.
#[derive(Default)]
pub struct MemoryStore {
    pub candles: RefCell<Vec<Candle>>,
    pub rows: RefCell<Vec<IndicatorRow>>,
    pub signals: RefCell<HashMap<SignalTable, Vec<Signal>>>,
}

impl StoragePort for MemoryStore {
    // Rows already stored for the same symbol and time are skipped, as in the
    // database adapters.
    fn append_candles(&self, candles: &[Candle]) -> Result<(), SigtraderError> {
        let mut stored = self.candles.borrow_mut();
        for c in candles {
            if !stored.iter().any(|s| s.symbol == c.symbol && s.timestamp == c.timestamp) {
                stored.push(c.clone());
            }
        }
        Ok(())
    }

    fn append_indicator_frame(&self, frame: &IndicatorFrame) -> Result<(), SigtraderError> {
        let mut stored = self.rows.borrow_mut();
        for r in &frame.rows {
            if !stored.iter().any(|s| s.symbol == r.symbol && s.timestamp == r.timestamp) {
                stored.push(r.clone());
            }
        }
        Ok(())
    }

    fn append_signals(&self, table: SignalTable, signals: &[Signal]) -> Result<(), SigtraderError> {
        let mut all = self.signals.borrow_mut();
        let stored = all.entry(table).or_default();
        for sig in signals {
            if !stored.iter().any(|s| s.symbol == sig.symbol && s.date == sig.date) {
                stored.push(sig.clone());
            }
        }
        Ok(())
    }

    fn load_signals(&self, symbol: &str, table: SignalTable) -> Result<Vec<Signal>, SigtraderError> {
        let mut loaded: Vec<Signal> = self
            .signals
            .borrow()
            .get(&table)
            .map(|all| all.iter().filter(|s| s.symbol == symbol).cloned().collect())
            .unwrap_or_default();
        loaded.sort_by_key(|s| s.date);
        Ok(loaded)
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// One candle per day from 2021-01-01 00:00 UTC.
pub fn daily_candles(symbol: &str, closes: &[f64]) -> Vec<Candle> {
    let start = datetime_to_millis(date(2021, 1, 1).and_hms_opt(0, 0, 0).unwrap());
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Candle {
            symbol: symbol.to_string(),
            timestamp: start + i as i64 * DAY_MS,
            open: close,
            high: close * 1.01,
            low: close * 0.99,
            close,
            volume: 1000.0 + i as f64,
        })
        .collect()
}

/// Oscillating closes around 100 that produce both buy and sell signals.
pub fn wave_closes(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 100.0 + (i as f64 * 0.21).sin() * 15.0 + i as f64 * 0.02)
        .collect()
}

pub fn wave(symbol: &str, n: usize) -> Vec<Candle> {
    daily_candles(symbol, &wave_closes(n))
}

/// Short windows so a few dozen candles are enough to vote.
pub fn fast_params() -> StrategyParams {
    StrategyParams {
        short_window: 3,
        long_window: 8,
        trend_window: 12,
        oscillator_lookback: 5,
        bollinger_period: 5,
        macd_fast: 3,
        macd_slow: 6,
        macd_signal: 3,
        ..StrategyParams::default()
    }
}

pub fn make_signal(symbol: &str, day: NaiveDate, price: f64, buy: bool) -> Signal {
    Signal {
        symbol: symbol.to_string(),
        date: day.and_hms_opt(0, 0, 0).unwrap(),
        price,
        short_mavg: price,
        long_mavg: price,
        sma_signal: if buy { 1 } else { -1 },
        bb_signal: 0,
        macd_signal_line_cross: if buy { 1 } else { -1 },
        composite_signal: if buy { 2 } else { -2 },
        buy_signal: buy,
        sell_signal: !buy,
        reason: if buy { BUY_REASON } else { SELL_REASON }.to_string(),
    }
}

pub fn buy(symbol: &str, day: NaiveDate, price: f64) -> Signal {
    make_signal(symbol, day, price, true)
}

pub fn sell(symbol: &str, day: NaiveDate, price: f64) -> Signal {
    make_signal(symbol, day, price, false)
}

/// `ExitCode` has no `PartialEq` on older toolchains; compare debug output.
pub fn exit_code_is(code: ExitCode, expected: u8) -> bool {
    format!("{:?}", code) == format!("{:?}", ExitCode::from(expected))
}
