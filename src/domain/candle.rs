//! OHLCV candle representation and series validation.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

use crate::domain::error::SigtraderError;

/// One OHLCV observation. `timestamp` is epoch milliseconds (UTC).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candle {
    pub symbol: String,
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn datetime(&self) -> NaiveDateTime {
        millis_to_datetime(self.timestamp)
    }
}

/// Epoch milliseconds to a UTC wall-clock time. Out-of-range values map to the epoch;
/// adapters and `validate_series` reject them before they get this far.
pub fn millis_to_datetime(millis: i64) -> NaiveDateTime {
    DateTime::from_timestamp_millis(millis)
        .map(|dt| dt.naive_utc())
        .unwrap_or_default()
}

/// Whether `millis` is representable as a calendar date and time.
pub fn millis_in_range(millis: i64) -> bool {
    DateTime::from_timestamp_millis(millis).is_some()
}

pub fn datetime_to_millis(dt: NaiveDateTime) -> i64 {
    dt.and_utc().timestamp_millis()
}

/// Millisecond bounds of the UTC days `start..=end`, as a half-open range.
pub fn day_range_millis(start: NaiveDate, end: NaiveDate) -> (i64, i64) {
    let lower = datetime_to_millis(start.and_time(NaiveTime::MIN));
    let upper = end
        .succ_opt()
        .map(|next| datetime_to_millis(next.and_time(NaiveTime::MIN)))
        .unwrap_or(i64::MAX);
    (lower, upper)
}

/// Reject series that would silently produce wrong indicators: mixed symbols,
/// non-increasing or duplicate timestamps, and non-positive or non-finite prices.
pub fn validate_series(candles: &[Candle]) -> Result<(), SigtraderError> {
    let Some(first) = candles.first() else {
        return Ok(());
    };

    let mut prev = None;
    for (i, candle) in candles.iter().enumerate() {
        check_candle(&first.symbol, candle, prev, i)?;
        prev = Some(candle.timestamp);
    }

    Ok(())
}

/// Check one candle against the series symbol and the previous timestamp.
pub(crate) fn check_candle(
    symbol: &str,
    candle: &Candle,
    prev_timestamp: Option<i64>,
    index: usize,
) -> Result<(), SigtraderError> {
    if candle.symbol != symbol {
        return Err(SigtraderError::malformed(
            symbol,
            format!("mixed symbols in series: found {} at index {}", candle.symbol, index),
        ));
    }

    if !millis_in_range(candle.timestamp) {
        return Err(SigtraderError::malformed(
            symbol,
            format!("timestamp {} out of range at index {}", candle.timestamp, index),
        ));
    }

    for (name, value) in [
        ("open", candle.open),
        ("high", candle.high),
        ("low", candle.low),
        ("close", candle.close),
    ] {
        if !value.is_finite() || value <= 0.0 {
            return Err(SigtraderError::malformed(
                symbol,
                format!("non-positive {} price {} at timestamp {}", name, value, candle.timestamp),
            ));
        }
    }

    if !candle.volume.is_finite() || candle.volume < 0.0 {
        return Err(SigtraderError::malformed(
            symbol,
            format!("invalid volume {} at timestamp {}", candle.volume, candle.timestamp),
        ));
    }

    match prev_timestamp {
        Some(prev) if candle.timestamp == prev => Err(SigtraderError::malformed(
            symbol,
            format!("duplicate timestamp {}", candle.timestamp),
        )),
        Some(prev) if candle.timestamp < prev => Err(SigtraderError::malformed(
            symbol,
            format!(
                "timestamps not increasing: {} follows {} at index {}",
                candle.timestamp, prev, index
            ),
        )),
        _ => Ok(()),
    }
}
