//! MACD (Moving Average Convergence Divergence) indicator.
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of MACD Line
//! Histogram = MACD Line - Signal Line
//!
//! Default parameters: fast=12, slow=26, signal=9
//! Warmup: slow - 1 + signal - 1 candles, after which line, signal and histogram
//! are all valid.

use crate::domain::candle::Candle;
use crate::domain::indicator::ema::ema_of;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

pub fn calculate_macd(
    candles: &[Candle],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> IndicatorSeries {
    let indicator_type = IndicatorType::Macd {
        fast,
        slow,
        signal: signal_period,
    };

    if candles.is_empty() || fast == 0 || slow == 0 || signal_period == 0 {
        return IndicatorSeries {
            indicator_type,
            values: Vec::new(),
        };
    }

    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let ema_fast = ema_of(&closes, fast);
    let ema_slow = ema_of(&closes, slow);

    let macd_line: Vec<Option<f64>> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| Some((*f)? - (*s)?))
        .collect();

    // The signal EMA starts at the first defined MACD value.
    let first_defined = macd_line.iter().position(Option::is_some);
    let mut signal_line: Vec<Option<f64>> = vec![None; candles.len()];
    if let Some(start) = first_defined {
        let defined: Vec<f64> = macd_line[start..].iter().flatten().copied().collect();
        for (offset, value) in ema_of(&defined, signal_period).into_iter().enumerate() {
            signal_line[start + offset] = value;
        }
    }

    let values = candles
        .iter()
        .enumerate()
        .map(|(i, candle)| match (macd_line[i], signal_line[i]) {
            (Some(line), Some(signal)) => IndicatorPoint {
                timestamp: candle.timestamp,
                valid: true,
                value: IndicatorValue::Macd {
                    line,
                    signal,
                    histogram: line - signal,
                },
            },
            _ => IndicatorPoint::invalid(
                candle.timestamp,
                IndicatorValue::Macd {
                    line: 0.0,
                    signal: 0.0,
                    histogram: 0.0,
                },
            ),
        })
        .collect();

    IndicatorSeries {
        indicator_type,
        values,
    }
}
