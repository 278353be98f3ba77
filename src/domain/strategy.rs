//! Strategy parameters for indicator windows and vote thresholds.

use crate::domain::indicator::{bollinger, macd, rsi, IndicatorType};

pub const DEFAULT_SHORT_WINDOW: usize = 10;
pub const DEFAULT_LONG_WINDOW: usize = 50;
pub const DEFAULT_TREND_WINDOW: usize = 200;
pub const DEFAULT_OVERSOLD: f64 = 30.0;
pub const DEFAULT_OVERBOUGHT: f64 = 70.0;
pub const DEFAULT_BUY_THRESHOLD: i32 = 1;
pub const DEFAULT_SELL_THRESHOLD: i32 = -1;

/// Every tunable of the indicator engine and signal generator.
///
/// A row is a buy when its composite vote is strictly greater than
/// `buy_threshold` and a sell when strictly less than `sell_threshold`.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyParams {
    pub short_window: usize,
    pub long_window: usize,
    pub trend_window: usize,
    pub oscillator_lookback: usize,
    pub oversold: f64,
    pub overbought: f64,
    pub buy_threshold: i32,
    pub sell_threshold: i32,
    pub bollinger_period: usize,
    pub bollinger_multiplier: f64,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
}

impl Default for StrategyParams {
    fn default() -> Self {
        StrategyParams {
            short_window: DEFAULT_SHORT_WINDOW,
            long_window: DEFAULT_LONG_WINDOW,
            trend_window: DEFAULT_TREND_WINDOW,
            oscillator_lookback: rsi::DEFAULT_PERIOD,
            oversold: DEFAULT_OVERSOLD,
            overbought: DEFAULT_OVERBOUGHT,
            buy_threshold: DEFAULT_BUY_THRESHOLD,
            sell_threshold: DEFAULT_SELL_THRESHOLD,
            bollinger_period: bollinger::DEFAULT_PERIOD,
            bollinger_multiplier: bollinger::DEFAULT_MULTIPLIER,
            macd_fast: macd::DEFAULT_FAST,
            macd_slow: macd::DEFAULT_SLOW,
            macd_signal: macd::DEFAULT_SIGNAL,
        }
    }
}

impl StrategyParams {
    /// Indicators computed into the frame, in column order.
    pub fn indicator_types(&self) -> Vec<IndicatorType> {
        vec![
            IndicatorType::Sma(self.short_window),
            IndicatorType::Sma(self.long_window),
            IndicatorType::Sma(self.trend_window),
            IndicatorType::Rsi(self.oscillator_lookback),
            self.macd_type(),
            self.bollinger_type(),
        ]
    }

    /// Candles needed before every voting input is defined.
    /// SMA(trend) is reported but never votes.
    pub fn voting_warmup(&self) -> usize {
        [
            IndicatorType::Sma(self.short_window),
            IndicatorType::Sma(self.long_window),
            IndicatorType::Rsi(self.oscillator_lookback),
            self.macd_type(),
            self.bollinger_type(),
        ]
        .iter()
        .map(IndicatorType::warmup)
        .max()
        .unwrap_or(0)
    }

    fn macd_type(&self) -> IndicatorType {
        IndicatorType::Macd {
            fast: self.macd_fast,
            slow: self.macd_slow,
            signal: self.macd_signal,
        }
    }

    fn bollinger_type(&self) -> IndicatorType {
        IndicatorType::Bollinger {
            period: self.bollinger_period,
            stddev_mult_x100: (self.bollinger_multiplier * 100.0).round() as u32,
        }
    }
}
