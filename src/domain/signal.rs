//! Signal generation: per-row indicator votes fused into a composite score.
//!
//! Three independent votes are taken on every fully-defined indicator row:
//!
//! - MA crossover: short SMA against long SMA.
//! - Band + oscillator: close outside a Bollinger band confirmed by RSI.
//! - Trend cross: MACD line against its signal line.
//!
//! The composite is their integer sum. Rows whose composite clears the buy or
//! sell threshold are classified; everything else is neutral.

use std::fmt;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::domain::candle::millis_to_datetime;
use crate::domain::indicator::{IndicatorFrame, IndicatorRow};
use crate::domain::strategy::StrategyParams;

pub const BUY_REASON: &str = "Multiple positive indicators";
pub const SELL_REASON: &str = "Multiple negative indicators";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Signal {
    pub symbol: String,
    pub date: NaiveDateTime,
    pub price: f64,
    pub short_mavg: f64,
    pub long_mavg: f64,
    pub sma_signal: i32,
    pub bb_signal: i32,
    pub macd_signal_line_cross: i32,
    pub composite_signal: i32,
    pub buy_signal: bool,
    pub sell_signal: bool,
    pub reason: String,
}

impl Signal {
    pub fn is_neutral(&self) -> bool {
        !self.buy_signal && !self.sell_signal
    }
}

/// The two persisted signal sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalTable {
    Buy,
    Sell,
}

impl SignalTable {
    pub fn table_name(&self) -> &'static str {
        match self {
            SignalTable::Buy => "buy_signals",
            SignalTable::Sell => "sell_signals",
        }
    }
}

impl fmt::Display for SignalTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

pub fn vote_ma_crossover(short: f64, long: f64) -> i32 {
    if short > long {
        1
    } else if short < long {
        -1
    } else {
        0
    }
}

pub fn vote_band_oscillator(
    price: f64,
    lower: f64,
    upper: f64,
    rsi: f64,
    params: &StrategyParams,
) -> i32 {
    if price < lower && rsi < params.oversold {
        1
    } else if price > upper && rsi > params.overbought {
        -1
    } else {
        0
    }
}

/// +1 when the MACD line is strictly above its signal line. A tie is bearish.
pub fn vote_trend_cross(macd: f64, signal: f64) -> i32 {
    if macd > signal { 1 } else { -1 }
}

/// Vote on one row. Returns `None` when any voting input is still undefined.
pub fn evaluate_row(row: &IndicatorRow, params: &StrategyParams) -> Option<Signal> {
    let short = row.sma_short?;
    let long = row.sma_long?;
    let rsi = row.rsi?;
    let macd = row.macd?;
    let macd_signal = row.macd_signal?;
    let lower = row.bb_lower?;
    let upper = row.bb_upper?;

    let sma_signal = vote_ma_crossover(short, long);
    let bb_signal = vote_band_oscillator(row.price, lower, upper, rsi, params);
    let macd_signal_line_cross = vote_trend_cross(macd, macd_signal);
    let composite_signal = sma_signal + bb_signal + macd_signal_line_cross;

    let buy_signal = composite_signal > params.buy_threshold;
    let sell_signal = !buy_signal && composite_signal < params.sell_threshold;
    let reason = if buy_signal {
        BUY_REASON
    } else if sell_signal {
        SELL_REASON
    } else {
        ""
    };

    Some(Signal {
        symbol: row.symbol.clone(),
        date: millis_to_datetime(row.timestamp),
        price: row.price,
        short_mavg: short,
        long_mavg: long,
        sma_signal,
        bb_signal,
        macd_signal_line_cross,
        composite_signal,
        buy_signal,
        sell_signal,
        reason: reason.to_string(),
    })
}

/// One signal per fully-defined row, in frame order. Neutral rows are included.
pub fn generate_signals(frame: &IndicatorFrame, params: &StrategyParams) -> Vec<Signal> {
    frame
        .rows
        .iter()
        .filter_map(|row| evaluate_row(row, params))
        .collect()
}

/// Partition into (buys, sells), dropping neutral rows. Order is preserved.
pub fn split_signals(signals: &[Signal]) -> (Vec<Signal>, Vec<Signal>) {
    let buys = signals.iter().filter(|s| s.buy_signal).cloned().collect();
    let sells = signals.iter().filter(|s| s.sell_signal).cloned().collect();
    (buys, sells)
}
