//! Simple Moving Average.
//!
//! SMA(n)[i] = mean(C[i-n+1..=i]). Warmup: first (n-1) candles are invalid.

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub fn calculate_sma(candles: &[Candle], period: usize) -> IndicatorSeries {
    if period == 0 {
        return IndicatorSeries {
            indicator_type: IndicatorType::Sma(period),
            values: Vec::new(),
        };
    }

    let values = candles
        .iter()
        .enumerate()
        .map(|(i, candle)| {
            if i + 1 < period {
                return IndicatorPoint::invalid(candle.timestamp, IndicatorValue::Simple(0.0));
            }
            let window = &candles[i + 1 - period..=i];
            let mean = window.iter().map(|c| c.close).sum::<f64>() / period as f64;
            IndicatorPoint {
                timestamp: candle.timestamp,
                valid: true,
                value: IndicatorValue::Simple(mean),
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Sma(period),
        values,
    }
}
