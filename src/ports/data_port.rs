//! Market data access port.

use chrono::{NaiveDate, NaiveDateTime};

use crate::domain::candle::Candle;
use crate::domain::error::SigtraderError;

pub trait DataPort {
    /// Candles for `symbol` whose timestamps fall on `start_date..=end_date`
    /// (UTC), in ascending timestamp order.
    fn fetch_candles(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Candle>, SigtraderError>;

    fn list_symbols(&self) -> Result<Vec<String>, SigtraderError>;

    /// First and last candle time plus candle count, or `None` if the symbol has no data.
    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, SigtraderError>;
}
