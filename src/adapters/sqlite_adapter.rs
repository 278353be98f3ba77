//! SQLite data and storage adapter.
//!
//! Tables: `crypto_data` (candles), `ta_data` (indicator rows), `buy_signals`
//! and `sell_signals`. All writes are appends; a row already stored for the same
//! symbol and time is left in place.

use chrono::{NaiveDate, NaiveDateTime};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

use crate::domain::candle::{day_range_millis, millis_to_datetime, Candle};
use crate::domain::error::SigtraderError;
use crate::domain::indicator::IndicatorFrame;
use crate::domain::signal::{Signal, SignalTable};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::storage_port::StoragePort;

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn pool_err(e: r2d2::Error) -> SigtraderError {
    SigtraderError::Database {
        reason: e.to_string(),
    }
}

fn query_err(e: rusqlite::Error) -> SigtraderError {
    SigtraderError::DatabaseQuery {
        reason: e.to_string(),
    }
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, SigtraderError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| SigtraderError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4).max(1) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(pool_err)?;

        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    pub fn in_memory() -> Result<Self, SigtraderError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager).map_err(pool_err)?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, SigtraderError> {
        self.pool.get().map_err(pool_err)
    }

    pub fn initialize_schema(&self) -> Result<(), SigtraderError> {
        let conn = self.conn()?;

        let mut ddl = String::from(
            "CREATE TABLE IF NOT EXISTS crypto_data (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                volume REAL NOT NULL
            );
            CREATE UNIQUE INDEX IF NOT EXISTS uq_crypto_data_symbol_ts ON crypto_data(symbol, timestamp);
            CREATE TABLE IF NOT EXISTS ta_data (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                price REAL NOT NULL,
                sma_short REAL,
                sma_long REAL,
                sma_trend REAL,
                rsi REAL,
                macd REAL,
                macd_signal REAL,
                macd_diff REAL,
                bb_upper REAL,
                bb_middle REAL,
                bb_lower REAL
            );
            CREATE UNIQUE INDEX IF NOT EXISTS uq_ta_data_symbol_ts ON ta_data(symbol, timestamp);",
        );
        for table in [SignalTable::Buy, SignalTable::Sell] {
            ddl.push_str(&format!(
                "CREATE TABLE IF NOT EXISTS {t} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    symbol TEXT NOT NULL,
                    date TEXT NOT NULL,
                    price REAL NOT NULL,
                    short_mavg REAL NOT NULL,
                    long_mavg REAL NOT NULL,
                    sma_signal INTEGER NOT NULL,
                    bb_signal INTEGER NOT NULL,
                    macd_signal_line_cross INTEGER NOT NULL,
                    composite_signal INTEGER NOT NULL,
                    buy_signal INTEGER NOT NULL,
                    sell_signal INTEGER NOT NULL,
                    reason TEXT NOT NULL
                );
                CREATE UNIQUE INDEX IF NOT EXISTS uq_{t}_symbol_date ON {t}(symbol, date);",
                t = table.table_name()
            ));
        }

        conn.execute_batch(&ddl).map_err(query_err)?;
        Ok(())
    }
}

impl StoragePort for SqliteAdapter {
    fn append_candles(&self, candles: &[Candle]) -> Result<(), SigtraderError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR IGNORE INTO crypto_data (symbol, timestamp, open, high, low, close, volume)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )
                .map_err(query_err)?;
            for c in candles {
                stmt.execute(params![
                    c.symbol,
                    c.timestamp,
                    c.open,
                    c.high,
                    c.low,
                    c.close,
                    c.volume
                ])
                .map_err(query_err)?;
            }
        }
        tx.commit().map_err(query_err)?;
        Ok(())
    }

    fn append_indicator_frame(&self, frame: &IndicatorFrame) -> Result<(), SigtraderError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR IGNORE INTO ta_data (symbol, timestamp, price, sma_short, sma_long, sma_trend,
                        rsi, macd, macd_signal, macd_diff, bb_upper, bb_middle, bb_lower)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                )
                .map_err(query_err)?;
            for r in &frame.rows {
                stmt.execute(params![
                    r.symbol,
                    r.timestamp,
                    r.price,
                    r.sma_short,
                    r.sma_long,
                    r.sma_trend,
                    r.rsi,
                    r.macd,
                    r.macd_signal,
                    r.macd_diff,
                    r.bb_upper,
                    r.bb_middle,
                    r.bb_lower
                ])
                .map_err(query_err)?;
            }
        }
        tx.commit().map_err(query_err)?;
        Ok(())
    }

    fn append_signals(&self, table: SignalTable, signals: &[Signal]) -> Result<(), SigtraderError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        {
            let mut stmt = tx
                .prepare(&format!(
                    "INSERT OR IGNORE INTO {} (symbol, date, price, short_mavg, long_mavg, sma_signal,
                        bb_signal, macd_signal_line_cross, composite_signal, buy_signal,
                        sell_signal, reason)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                    table.table_name()
                ))
                .map_err(query_err)?;
            for s in signals {
                stmt.execute(params![
                    s.symbol,
                    s.date.format(DATE_FORMAT).to_string(),
                    s.price,
                    s.short_mavg,
                    s.long_mavg,
                    s.sma_signal,
                    s.bb_signal,
                    s.macd_signal_line_cross,
                    s.composite_signal,
                    s.buy_signal,
                    s.sell_signal,
                    s.reason
                ])
                .map_err(query_err)?;
            }
        }
        tx.commit().map_err(query_err)?;
        Ok(())
    }

    fn load_signals(&self, symbol: &str, table: SignalTable) -> Result<Vec<Signal>, SigtraderError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT symbol, date, price, short_mavg, long_mavg, sma_signal, bb_signal,
                        macd_signal_line_cross, composite_signal, buy_signal, sell_signal, reason
                 FROM {}
                 WHERE symbol = ?1
                 ORDER BY date ASC, id ASC",
                table.table_name()
            ))
            .map_err(query_err)?;

        let rows = stmt
            .query_map(params![symbol], |row| {
                let date_str: String = row.get(1)?;
                let date = NaiveDateTime::parse_from_str(&date_str, DATE_FORMAT).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        1,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?;
                Ok(Signal {
                    symbol: row.get(0)?,
                    date,
                    price: row.get(2)?,
                    short_mavg: row.get(3)?,
                    long_mavg: row.get(4)?,
                    sma_signal: row.get(5)?,
                    bb_signal: row.get(6)?,
                    macd_signal_line_cross: row.get(7)?,
                    composite_signal: row.get(8)?,
                    buy_signal: row.get(9)?,
                    sell_signal: row.get(10)?,
                    reason: row.get(11)?,
                })
            })
            .map_err(query_err)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(query_err)
    }
}

impl DataPort for SqliteAdapter {
    fn fetch_candles(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Candle>, SigtraderError> {
        let conn = self.conn()?;
        let (lower, upper) = day_range_millis(start_date, end_date);

        let mut stmt = conn
            .prepare(
                "SELECT symbol, timestamp, open, high, low, close, volume
                 FROM crypto_data
                 WHERE symbol = ?1 AND timestamp >= ?2 AND timestamp < ?3
                 ORDER BY timestamp ASC, id ASC",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map(params![symbol, lower, upper], |row| {
                Ok(Candle {
                    symbol: row.get(0)?,
                    timestamp: row.get(1)?,
                    open: row.get(2)?,
                    high: row.get(3)?,
                    low: row.get(4)?,
                    close: row.get(5)?,
                    volume: row.get(6)?,
                })
            })
            .map_err(query_err)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(query_err)
    }

    fn list_symbols(&self) -> Result<Vec<String>, SigtraderError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT symbol FROM crypto_data ORDER BY symbol")
            .map_err(query_err)?;

        let rows = stmt.query_map([], |row| row.get(0)).map_err(query_err)?;
        rows.collect::<Result<Vec<String>, _>>().map_err(query_err)
    }

    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, SigtraderError> {
        let conn = self.conn()?;

        let result: (Option<i64>, Option<i64>, i64) = conn
            .query_row(
                "SELECT MIN(timestamp), MAX(timestamp), COUNT(*) FROM crypto_data WHERE symbol = ?1",
                params![symbol],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(query_err)?;

        match result {
            (Some(min), Some(max), count) if count > 0 => Ok(Some((
                millis_to_datetime(min),
                millis_to_datetime(max),
                count as usize,
            ))),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::IndicatorRow;
    use crate::domain::signal::BUY_REASON;

    struct EmptyConfig;

    impl ConfigPort for EmptyConfig {
        fn get_string(&self, _section: &str, _key: &str) -> Option<String> {
            None
        }
        fn get_int(&self, _section: &str, _key: &str, default: i64) -> i64 {
            default
        }
        fn get_double(&self, _section: &str, _key: &str, default: f64) -> f64 {
            default
        }
        fn get_bool(&self, _section: &str, _key: &str, default: bool) -> bool {
            default
        }
    }

    // 2024-01-01 00:00 UTC; candles are 30 minutes apart.
    const T0: i64 = 1_704_067_200_000;
    const STEP: i64 = 30 * 60 * 1000;

    fn adapter() -> SqliteAdapter {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter.initialize_schema().unwrap();
        adapter
    }

    fn candle(symbol: &str, timestamp: i64, close: f64) -> Candle {
        Candle {
            symbol: symbol.to_string(),
            timestamp,
            open: close - 0.5,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 3.75,
        }
    }

    fn signal(symbol: &str, date: NaiveDateTime, price: f64) -> Signal {
        Signal {
            symbol: symbol.to_string(),
            date,
            price,
            short_mavg: price + 1.0,
            long_mavg: price - 1.0,
            sma_signal: 1,
            bb_signal: 0,
            macd_signal_line_cross: 1,
            composite_signal: 2,
            buy_signal: true,
            sell_signal: false,
            reason: BUY_REASON.to_string(),
        }
    }

    fn jan(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn from_config_missing_path() {
        let result = SqliteAdapter::from_config(&EmptyConfig);
        match result {
            Err(SigtraderError::ConfigMissing { section, key }) => {
                assert_eq!(section, "sqlite");
                assert_eq!(key, "path");
            }
            Err(other) => panic!("expected ConfigMissing, got: {other}"),
            Ok(_) => panic!("expected error, got Ok"),
        }
    }

    #[test]
    fn schema_initialization_is_repeatable() {
        let adapter = adapter();
        adapter.initialize_schema().unwrap();
    }

    #[test]
    fn candles_round_trip_through_crypto_data() {
        let adapter = adapter();
        let candles = vec![
            candle("BTC/USDT", T0, 42000.0),
            candle("BTC/USDT", T0 + STEP, 42100.0),
            candle("BTC/USDT", T0 + 48 * STEP, 42200.0),
            candle("ETH/USDT", T0, 2300.0),
        ];
        adapter.append_candles(&candles).unwrap();

        let fetched = adapter.fetch_candles("BTC/USDT", jan(1), jan(1)).unwrap();
        assert_eq!(fetched, candles[..2].to_vec());

        let fetched = adapter.fetch_candles("BTC/USDT", jan(1), jan(2)).unwrap();
        assert_eq!(fetched.len(), 3);
    }

    #[test]
    fn list_symbols_distinct_sorted() {
        let adapter = adapter();
        adapter
            .append_candles(&[
                candle("ETH/USDT", T0, 2300.0),
                candle("BTC/USDT", T0, 42000.0),
                candle("BTC/USDT", T0 + STEP, 42010.0),
            ])
            .unwrap();

        assert_eq!(adapter.list_symbols().unwrap(), vec!["BTC/USDT", "ETH/USDT"]);
    }

    #[test]
    fn data_range() {
        let adapter = adapter();
        adapter
            .append_candles(&[
                candle("BTC/USDT", T0, 42000.0),
                candle("BTC/USDT", T0 + 4 * STEP, 42010.0),
            ])
            .unwrap();

        let (min, max, count) = adapter.get_data_range("BTC/USDT").unwrap().unwrap();
        assert_eq!(min, millis_to_datetime(T0));
        assert_eq!(max.to_string(), "2024-01-01 02:00:00");
        assert_eq!(count, 2);

        assert!(adapter.get_data_range("ADA/USDT").unwrap().is_none());
    }

    #[test]
    fn indicator_rows_keep_nulls() {
        let adapter = adapter();
        let c = candle("BTC/USDT", T0, 42000.0);
        let mut row = IndicatorRow::empty(&c);
        row.sma_short = Some(41990.0);
        adapter
            .append_indicator_frame(&IndicatorFrame { rows: vec![row] })
            .unwrap();

        let conn = adapter.conn().unwrap();
        let (short, long): (Option<f64>, Option<f64>) = conn
            .query_row("SELECT sma_short, sma_long FROM ta_data", [], |r| {
                Ok((r.get(0)?, r.get(1)?))
            })
            .unwrap();
        assert_eq!(short, Some(41990.0));
        assert_eq!(long, None);
    }

    #[test]
    fn signals_round_trip_per_table_and_symbol() {
        let adapter = adapter();
        let d1 = millis_to_datetime(T0);
        let d2 = millis_to_datetime(T0 + STEP);
        let buys = vec![signal("BTC/USDT", d2, 101.0), signal("BTC/USDT", d1, 100.0)];
        adapter.append_signals(SignalTable::Buy, &buys).unwrap();
        adapter
            .append_signals(SignalTable::Buy, &[signal("ETH/USDT", d1, 5.0)])
            .unwrap();

        let loaded = adapter.load_signals("BTC/USDT", SignalTable::Buy).unwrap();
        assert_eq!(loaded, vec![buys[1].clone(), buys[0].clone()]);

        assert!(adapter
            .load_signals("BTC/USDT", SignalTable::Sell)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn repeated_signal_appends_keep_one_row() {
        let adapter = adapter();
        let s = signal("BTC/USDT", millis_to_datetime(T0), 100.0);
        let later = signal("BTC/USDT", millis_to_datetime(T0 + STEP), 101.0);
        adapter.append_signals(SignalTable::Sell, &[s.clone()]).unwrap();
        adapter.append_signals(SignalTable::Sell, &[s, later]).unwrap();
        assert_eq!(
            adapter.load_signals("BTC/USDT", SignalTable::Sell).unwrap().len(),
            2
        );
    }

    #[test]
    fn candles_read_back_and_stored_again_do_not_duplicate() {
        let adapter = adapter();
        let candles = vec![
            candle("BTC/USDT", T0, 42000.0),
            candle("BTC/USDT", T0 + STEP, 42100.0),
        ];
        adapter.append_candles(&candles).unwrap();

        let fetched = adapter.fetch_candles("BTC/USDT", jan(1), jan(1)).unwrap();
        adapter.append_candles(&fetched).unwrap();
        adapter
            .append_indicator_frame(&IndicatorFrame {
                rows: fetched.iter().map(IndicatorRow::empty).collect(),
            })
            .unwrap();
        adapter
            .append_indicator_frame(&IndicatorFrame {
                rows: fetched.iter().map(IndicatorRow::empty).collect(),
            })
            .unwrap();

        assert_eq!(adapter.fetch_candles("BTC/USDT", jan(1), jan(1)).unwrap(), candles);
        let conn = adapter.conn().unwrap();
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM ta_data", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 2);
    }
}
