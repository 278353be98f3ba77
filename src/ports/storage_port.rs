//! Persistence port for candles, indicator frames and signals.
//!
//! Writes are append-only and keyed by symbol and time: appending a row that is
//! already stored leaves the store unchanged. Reads return rows ordered by time.

use crate::domain::candle::Candle;
use crate::domain::error::SigtraderError;
use crate::domain::indicator::IndicatorFrame;
use crate::domain::signal::{Signal, SignalTable};

pub trait StoragePort {
    fn append_candles(&self, candles: &[Candle]) -> Result<(), SigtraderError>;

    fn append_indicator_frame(&self, frame: &IndicatorFrame) -> Result<(), SigtraderError>;

    fn append_signals(&self, table: SignalTable, signals: &[Signal]) -> Result<(), SigtraderError>;

    fn load_signals(&self, symbol: &str, table: SignalTable) -> Result<Vec<Signal>, SigtraderError>;
}
