//! Streaming indicator engine.
//!
//! Consumes one candle at a time and emits the same [`IndicatorRow`] the batch
//! [`compute_frame`](super::compute_frame) would produce for that position. Only
//! the trailing closes needed by the longest window are retained, together with
//! running EMA and Wilder averages.

use std::collections::VecDeque;

use crate::domain::candle::{check_candle, Candle};
use crate::domain::error::SigtraderError;
use crate::domain::indicator::rsi::{rsi_from_averages, split_change, wilder};
use crate::domain::indicator::stddev::mean_stddev;
use crate::domain::indicator::IndicatorRow;
use crate::domain::strategy::StrategyParams;

/// SMA-seeded EMA, one value at a time.
#[derive(Debug, Clone)]
struct EmaState {
    period: usize,
    k: f64,
    seen: usize,
    sum: f64,
    ema: Option<f64>,
}

impl EmaState {
    fn new(period: usize) -> Self {
        EmaState {
            period,
            k: 2.0 / (period as f64 + 1.0),
            seen: 0,
            sum: 0.0,
            ema: None,
        }
    }

    fn push(&mut self, value: f64) -> Option<f64> {
        if self.period == 0 {
            return None;
        }
        self.seen += 1;
        match self.ema {
            Some(prev) => self.ema = Some(value * self.k + prev * (1.0 - self.k)),
            None => {
                self.sum += value;
                if self.seen == self.period {
                    self.ema = Some(self.sum / self.period as f64);
                }
            }
        }
        self.ema
    }
}

/// Wilder-smoothed average gain and loss.
#[derive(Debug, Clone)]
struct RsiState {
    period: usize,
    prev_close: Option<f64>,
    changes: usize,
    sum_gain: f64,
    sum_loss: f64,
    avg_gain: f64,
    avg_loss: f64,
}

impl RsiState {
    fn new(period: usize) -> Self {
        RsiState {
            period,
            prev_close: None,
            changes: 0,
            sum_gain: 0.0,
            sum_loss: 0.0,
            avg_gain: 0.0,
            avg_loss: 0.0,
        }
    }

    fn push(&mut self, close: f64) -> Option<f64> {
        let prev = self.prev_close.replace(close)?;
        if self.period == 0 {
            return None;
        }

        let (gain, loss) = split_change(close - prev);
        self.changes += 1;

        if self.changes < self.period {
            self.sum_gain += gain;
            self.sum_loss += loss;
            return None;
        }

        if self.changes == self.period {
            self.avg_gain = (self.sum_gain + gain) / self.period as f64;
            self.avg_loss = (self.sum_loss + loss) / self.period as f64;
        } else {
            self.avg_gain = wilder(self.avg_gain, gain, self.period);
            self.avg_loss = wilder(self.avg_loss, loss, self.period);
        }

        Some(rsi_from_averages(self.avg_gain, self.avg_loss))
    }
}

#[derive(Debug, Clone)]
pub struct IncrementalEngine {
    params: StrategyParams,
    closes: VecDeque<f64>,
    capacity: usize,
    rsi: RsiState,
    ema_fast: EmaState,
    ema_slow: EmaState,
    macd_signal: EmaState,
    symbol: Option<String>,
    last_timestamp: Option<i64>,
    processed: usize,
}

impl IncrementalEngine {
    pub fn new(params: &StrategyParams) -> Self {
        let capacity = [
            params.short_window,
            params.long_window,
            params.trend_window,
            params.bollinger_period,
        ]
        .into_iter()
        .max()
        .unwrap_or(0);

        IncrementalEngine {
            params: params.clone(),
            closes: VecDeque::with_capacity(capacity),
            capacity,
            rsi: RsiState::new(params.oscillator_lookback),
            ema_fast: EmaState::new(params.macd_fast),
            ema_slow: EmaState::new(params.macd_slow),
            macd_signal: EmaState::new(params.macd_signal),
            symbol: None,
            last_timestamp: None,
            processed: 0,
        }
    }

    /// Number of candles accepted so far.
    pub fn processed(&self) -> usize {
        self.processed
    }

    /// Feed the next candle. The candle must belong to the same symbol as the
    /// previous ones and carry a strictly later timestamp; a rejected candle
    /// leaves the engine state untouched.
    pub fn push(&mut self, candle: &Candle) -> Result<IndicatorRow, SigtraderError> {
        let symbol = self.symbol.as_deref().unwrap_or(&candle.symbol);
        check_candle(symbol, candle, self.last_timestamp, self.processed)?;

        if self.symbol.is_none() {
            self.symbol = Some(candle.symbol.clone());
        }
        self.last_timestamp = Some(candle.timestamp);
        self.processed += 1;

        if self.capacity > 0 {
            if self.closes.len() == self.capacity {
                self.closes.pop_front();
            }
            self.closes.push_back(candle.close);
        }

        let mut row = IndicatorRow::empty(candle);
        row.sma_short = self.trailing_mean(self.params.short_window);
        row.sma_long = self.trailing_mean(self.params.long_window);
        row.sma_trend = self.trailing_mean(self.params.trend_window);
        row.rsi = self.rsi.push(candle.close);

        let line = match (
            self.ema_fast.push(candle.close),
            self.ema_slow.push(candle.close),
        ) {
            (Some(fast), Some(slow)) => Some(fast - slow),
            _ => None,
        };
        if let Some(line) = line {
            if let Some(signal) = self.macd_signal.push(line) {
                row.macd = Some(line);
                row.macd_signal = Some(signal);
                row.macd_diff = Some(line - signal);
            }
        }

        if let Some((middle, stddev)) = self.trailing_mean_stddev(self.params.bollinger_period) {
            let width = self.params.bollinger_multiplier * stddev;
            row.bb_upper = Some(middle + width);
            row.bb_middle = Some(middle);
            row.bb_lower = Some(middle - width);
        }

        Ok(row)
    }

    fn trailing(&self, period: usize) -> Option<impl Iterator<Item = f64> + Clone + '_> {
        if period == 0 || self.closes.len() < period {
            return None;
        }
        Some(self.closes.iter().skip(self.closes.len() - period).copied())
    }

    fn trailing_mean(&self, period: usize) -> Option<f64> {
        self.trailing(period)
            .map(|window| window.sum::<f64>() / period as f64)
    }

    fn trailing_mean_stddev(&self, period: usize) -> Option<(f64, f64)> {
        self.trailing(period).map(mean_stddev)
    }
}
