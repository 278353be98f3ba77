//! Technical indicator implementations.
//!
//! Batch calculators produce an [`IndicatorSeries`] aligned to the input candles.
//! Leading points inside the warm-up window carry `valid: false`; their values are
//! placeholders and must not be read. [`frame`] assembles the series into
//! per-candle rows with `Option` fields, and [`incremental`] produces the same rows
//! one candle at a time.

pub mod bollinger;
pub mod ema;
pub mod frame;
pub mod incremental;
pub mod macd;
pub mod rsi;
pub mod sma;
pub mod stddev;

pub use bollinger::calculate_bollinger;
pub use frame::{compute_frame, IndicatorFrame, IndicatorRow};
pub use incremental::IncrementalEngine;
pub use macd::calculate_macd;
pub use rsi::calculate_rsi;
pub use sma::calculate_sma;

use std::fmt;

#[derive(Debug, Clone)]
pub struct IndicatorPoint {
    pub timestamp: i64,
    pub valid: bool,
    pub value: IndicatorValue,
}

impl IndicatorPoint {
    pub(crate) fn invalid(timestamp: i64, value: IndicatorValue) -> Self {
        IndicatorPoint {
            timestamp,
            valid: false,
            value,
        }
    }

    /// The scalar value, or `None` while warming up.
    pub(crate) fn simple(&self) -> Option<f64> {
        match self.value {
            IndicatorValue::Simple(v) if self.valid => Some(v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum IndicatorValue {
    Simple(f64),
    Macd {
        line: f64,
        signal: f64,
        histogram: f64,
    },
    Bollinger {
        upper: f64,
        middle: f64,
        lower: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    Rsi(usize),
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    Bollinger {
        period: usize,
        stddev_mult_x100: u32,
    },
}

impl IndicatorType {
    /// Number of leading points that are undefined.
    pub fn warmup(&self) -> usize {
        match *self {
            IndicatorType::Sma(n) | IndicatorType::Bollinger { period: n, .. } => n.saturating_sub(1),
            IndicatorType::Rsi(n) => n,
            IndicatorType::Macd { slow, signal, .. } => {
                slow.saturating_sub(1) + signal.saturating_sub(1)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    #[cfg(test)]
    pub(crate) fn valid_count(&self) -> usize {
        self.values.iter().filter(|p| p.valid).count()
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => {
                let mult = *stddev_mult_x100 as f64 / 100.0;
                write!(f, "BOLLINGER({},{})", period, mult)
            }
        }
    }
}
