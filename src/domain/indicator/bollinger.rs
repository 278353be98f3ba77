//! Bollinger Bands indicator.
//!
//! Bollinger Bands consist of:
//! - Middle: Simple Moving Average (SMA) over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//!
//! Where StdDev is population standard deviation (divides by N, not N-1).
//!
//! Default parameters: period=20, multiplier=2.0
//! Warmup: first (period-1) candles are invalid.

use crate::domain::candle::Candle;
use crate::domain::indicator::stddev::window_mean_stddev;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub const DEFAULT_PERIOD: usize = 20;
pub const DEFAULT_MULTIPLIER: f64 = 2.0;

pub fn calculate_bollinger(candles: &[Candle], period: usize, multiplier: f64) -> IndicatorSeries {
    let mut values = Vec::with_capacity(candles.len());
    let warmup = period.saturating_sub(1);

    for (i, candle) in candles.iter().enumerate() {
        if period == 0 || i < warmup {
            values.push(IndicatorPoint::invalid(
                candle.timestamp,
                IndicatorValue::Bollinger {
                    upper: 0.0,
                    middle: 0.0,
                    lower: 0.0,
                },
            ));
            continue;
        }

        let (middle, stddev) = window_mean_stddev(&candles[i + 1 - period..=i]);
        values.push(IndicatorPoint {
            timestamp: candle.timestamp,
            valid: true,
            value: IndicatorValue::Bollinger {
                upper: middle + multiplier * stddev,
                middle,
                lower: middle - multiplier * stddev,
            },
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Bollinger {
            period,
            stddev_mult_x100: (multiplier * 100.0).round() as u32,
        },
        values,
    }
}
