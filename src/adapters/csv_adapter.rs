//! CSV file data adapter.
//!
//! One file per symbol, named after the pair with `/` replaced by `_`
//! (`BTC_USDT.csv`), with a header row and columns
//! `timestamp,open,high,low,close,volume`. The timestamp is epoch milliseconds
//! or a UTC `YYYY-MM-DD HH:MM:SS` string.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use chrono::{NaiveDate, NaiveDateTime};

use crate::domain::candle::{datetime_to_millis, millis_in_range, Candle};
use crate::domain::error::SigtraderError;
use crate::domain::universe::symbol_file_stem;
use crate::ports::data_port::DataPort;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", symbol_file_stem(symbol)))
    }

    fn read_all(&self, symbol: &str) -> Result<Vec<Candle>, SigtraderError> {
        let path = self.csv_path(symbol);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SigtraderError::NoData {
                    symbol: symbol.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut candles = Vec::new();

        for (line, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| {
                SigtraderError::malformed(symbol, format!("CSV parse error: {}", e))
            })?;
            let row = line + 2;

            let timestamp = parse_timestamp(field(symbol, &record, 0, "timestamp", row)?)
                .ok_or_else(|| {
                    SigtraderError::malformed(symbol, format!("invalid timestamp on line {}", row))
                })?;

            candles.push(Candle {
                symbol: symbol.to_string(),
                timestamp,
                open: number(symbol, &record, 1, "open", row)?,
                high: number(symbol, &record, 2, "high", row)?,
                low: number(symbol, &record, 3, "low", row)?,
                close: number(symbol, &record, 4, "close", row)?,
                volume: number(symbol, &record, 5, "volume", row)?,
            });
        }

        candles.sort_by_key(|c| c.timestamp);
        Ok(candles)
    }
}

fn field<'r>(
    symbol: &str,
    record: &'r csv::StringRecord,
    index: usize,
    name: &str,
    row: usize,
) -> Result<&'r str, SigtraderError> {
    record
        .get(index)
        .map(str::trim)
        .ok_or_else(|| SigtraderError::malformed(symbol, format!("missing {} column on line {}", name, row)))
}

fn number(
    symbol: &str,
    record: &csv::StringRecord,
    index: usize,
    name: &str,
    row: usize,
) -> Result<f64, SigtraderError> {
    field(symbol, record, index, name, row)?
        .parse()
        .map_err(|e| {
            SigtraderError::malformed(symbol, format!("invalid {} value on line {}: {}", name, row, e))
        })
}

fn parse_timestamp(value: &str) -> Option<i64> {
    if let Ok(millis) = value.parse::<i64>() {
        return Some(millis).filter(|&m| millis_in_range(m));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(datetime_to_millis)
}

impl DataPort for CsvAdapter {
    fn fetch_candles(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Candle>, SigtraderError> {
        let candles = self.read_all(symbol)?;
        Ok(candles
            .into_iter()
            .filter(|c| {
                let date = c.datetime().date();
                date >= start_date && date <= end_date
            })
            .collect())
    }

    fn list_symbols(&self) -> Result<Vec<String>, SigtraderError> {
        let entries = fs::read_dir(&self.base_path)?;

        let mut symbols = Vec::new();
        for entry in entries {
            let name = entry?.file_name();
            let name_str = name.to_string_lossy();

            if let Some(stem) = name_str.strip_suffix(".csv") {
                if let Some((base, quote)) = stem.split_once('_') {
                    symbols.push(format!("{}/{}", base, quote));
                }
            }
        }

        symbols.sort();
        Ok(symbols)
    }

    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, SigtraderError> {
        let candles = match self.read_all(symbol) {
            Ok(candles) => candles,
            Err(SigtraderError::NoData { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        match (candles.first(), candles.last()) {
            (Some(first), Some(last)) => {
                Ok(Some((first.datetime(), last.datetime(), candles.len())))
            }
            _ => Ok(None),
        }
    }
}
