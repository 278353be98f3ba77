//! Per-candle indicator rows assembled from the batch calculators.

use serde::Serialize;

use crate::domain::candle::Candle;
use crate::domain::indicator::{
    calculate_bollinger, calculate_macd, calculate_rsi, calculate_sma, IndicatorPoint,
    IndicatorSeries, IndicatorValue,
};
use crate::domain::strategy::StrategyParams;

/// Indicator values aligned to one candle. `None` means the indicator is still
/// inside its warm-up window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorRow {
    pub symbol: String,
    pub timestamp: i64,
    pub price: f64,
    pub sma_short: Option<f64>,
    pub sma_long: Option<f64>,
    pub sma_trend: Option<f64>,
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_diff: Option<f64>,
    pub bb_upper: Option<f64>,
    pub bb_middle: Option<f64>,
    pub bb_lower: Option<f64>,
}

impl IndicatorRow {
    pub(crate) fn empty(candle: &Candle) -> Self {
        IndicatorRow {
            symbol: candle.symbol.clone(),
            timestamp: candle.timestamp,
            price: candle.close,
            sma_short: None,
            sma_long: None,
            sma_trend: None,
            rsi: None,
            macd: None,
            macd_signal: None,
            macd_diff: None,
            bb_upper: None,
            bb_middle: None,
            bb_lower: None,
        }
    }

    pub(crate) fn set_macd(&mut self, point: &IndicatorPoint) {
        if !point.valid {
            return;
        }
        if let IndicatorValue::Macd {
            line,
            signal,
            histogram,
        } = point.value
        {
            self.macd = Some(line);
            self.macd_signal = Some(signal);
            self.macd_diff = Some(histogram);
        }
    }

    pub(crate) fn set_bollinger(&mut self, point: &IndicatorPoint) {
        if !point.valid {
            return;
        }
        if let IndicatorValue::Bollinger {
            upper,
            middle,
            lower,
        } = point.value
        {
            self.bb_upper = Some(upper);
            self.bb_middle = Some(middle);
            self.bb_lower = Some(lower);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndicatorFrame {
    pub rows: Vec<IndicatorRow>,
}

impl IndicatorFrame {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn symbol(&self) -> Option<&str> {
        self.rows.first().map(|r| r.symbol.as_str())
    }
}

/// Compute every indicator column over the whole series.
///
/// The series is expected to have passed `validate_series`. A series shorter than
/// a window yields `None` for that column everywhere; this is not an error.
pub fn compute_frame(candles: &[Candle], params: &StrategyParams) -> IndicatorFrame {
    let sma_short = calculate_sma(candles, params.short_window);
    let sma_long = calculate_sma(candles, params.long_window);
    let sma_trend = calculate_sma(candles, params.trend_window);
    let rsi = calculate_rsi(candles, params.oscillator_lookback);
    let macd = calculate_macd(candles, params.macd_fast, params.macd_slow, params.macd_signal);
    let bollinger =
        calculate_bollinger(candles, params.bollinger_period, params.bollinger_multiplier);

    let rows = candles
        .iter()
        .enumerate()
        .map(|(i, candle)| {
            let mut row = IndicatorRow::empty(candle);
            row.sma_short = simple_at(&sma_short, i);
            row.sma_long = simple_at(&sma_long, i);
            row.sma_trend = simple_at(&sma_trend, i);
            row.rsi = simple_at(&rsi, i);
            if let Some(point) = macd.values.get(i) {
                row.set_macd(point);
            }
            if let Some(point) = bollinger.values.get(i) {
                row.set_bollinger(point);
            }
            row
        })
        .collect();

    IndicatorFrame { rows }
}

fn simple_at(series: &IndicatorSeries, i: usize) -> Option<f64> {
    series.values.get(i).and_then(IndicatorPoint::simple)
}
