//! RSI (Relative Strength Index).
//!
//! Uses Wilder's smoothing for average gain/loss calculation:
//! - First average: simple mean of gains/losses over the first n changes
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100
//!
//! Warmup: first n candles are invalid (need n price changes to seed the averages).

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub const DEFAULT_PERIOD: usize = 14;

pub fn calculate_rsi(candles: &[Candle], period: usize) -> IndicatorSeries {
    let mut values = Vec::with_capacity(candles.len());

    if period == 0 || candles.len() < 2 {
        values.extend(
            candles
                .iter()
                .map(|c| IndicatorPoint::invalid(c.timestamp, IndicatorValue::Simple(0.0))),
        );
        return IndicatorSeries {
            indicator_type: IndicatorType::Rsi(period),
            values,
        };
    }

    values.push(IndicatorPoint::invalid(
        candles[0].timestamp,
        IndicatorValue::Simple(0.0),
    ));

    let mut sum_gain = 0.0;
    let mut sum_loss = 0.0;
    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;

    for (i, pair) in candles.windows(2).enumerate() {
        let (gain, loss) = split_change(pair[1].close - pair[0].close);
        let timestamp = pair[1].timestamp;

        if i + 1 < period {
            sum_gain += gain;
            sum_loss += loss;
            values.push(IndicatorPoint::invalid(timestamp, IndicatorValue::Simple(0.0)));
            continue;
        }

        if i + 1 == period {
            avg_gain = (sum_gain + gain) / period as f64;
            avg_loss = (sum_loss + loss) / period as f64;
        } else {
            avg_gain = wilder(avg_gain, gain, period);
            avg_loss = wilder(avg_loss, loss, period);
        }

        values.push(IndicatorPoint {
            timestamp,
            valid: true,
            value: IndicatorValue::Simple(rsi_from_averages(avg_gain, avg_loss)),
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Rsi(period),
        values,
    }
}

pub(crate) fn split_change(change: f64) -> (f64, f64) {
    if change > 0.0 {
        (change, 0.0)
    } else {
        (0.0, -change)
    }
}

pub(crate) fn wilder(prev: f64, current: f64, period: usize) -> f64 {
    (prev * (period - 1) as f64 + current) / period as f64
}

pub(crate) fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
    }
}
