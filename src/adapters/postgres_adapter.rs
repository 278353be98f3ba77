//! PostgreSQL data and storage adapter.
//!
//! Same tables and unique keys as the SQLite adapter; signal dates are
//! `TIMESTAMP` columns.

use std::cell::RefCell;

use chrono::{NaiveDate, NaiveDateTime};
use postgres::types::ToSql;
use postgres::{Client, NoTls};

use crate::domain::candle::{day_range_millis, millis_to_datetime, Candle};
use crate::domain::error::SigtraderError;
use crate::domain::indicator::IndicatorFrame;
use crate::domain::signal::{Signal, SignalTable};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::storage_port::StoragePort;

pub struct PostgresAdapter {
    client: RefCell<Client>,
}

fn query_err(e: postgres::Error) -> SigtraderError {
    SigtraderError::DatabaseQuery {
        reason: e.to_string(),
    }
}

impl PostgresAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, SigtraderError> {
        let connection_string = config
            .get_string("postgres", "connection_string")
            .ok_or_else(|| SigtraderError::ConfigMissing {
                section: "postgres".into(),
                key: "connection_string".into(),
            })?;

        let client =
            Client::connect(&connection_string, NoTls).map_err(|e| SigtraderError::Database {
                reason: e.to_string(),
            })?;

        let adapter = Self {
            client: RefCell::new(client),
        };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    pub fn initialize_schema(&self) -> Result<(), SigtraderError> {
        let mut ddl = String::from(
            "CREATE TABLE IF NOT EXISTS crypto_data (
                id SERIAL PRIMARY KEY,
                symbol TEXT NOT NULL,
                timestamp BIGINT NOT NULL,
                open DOUBLE PRECISION NOT NULL,
                high DOUBLE PRECISION NOT NULL,
                low DOUBLE PRECISION NOT NULL,
                close DOUBLE PRECISION NOT NULL,
                volume DOUBLE PRECISION NOT NULL
            );
            CREATE UNIQUE INDEX IF NOT EXISTS uq_crypto_data_symbol_ts ON crypto_data(symbol, timestamp);
            CREATE TABLE IF NOT EXISTS ta_data (
                id SERIAL PRIMARY KEY,
                symbol TEXT NOT NULL,
                timestamp BIGINT NOT NULL,
                price DOUBLE PRECISION NOT NULL,
                sma_short DOUBLE PRECISION,
                sma_long DOUBLE PRECISION,
                sma_trend DOUBLE PRECISION,
                rsi DOUBLE PRECISION,
                macd DOUBLE PRECISION,
                macd_signal DOUBLE PRECISION,
                macd_diff DOUBLE PRECISION,
                bb_upper DOUBLE PRECISION,
                bb_middle DOUBLE PRECISION,
                bb_lower DOUBLE PRECISION
            );
            CREATE UNIQUE INDEX IF NOT EXISTS uq_ta_data_symbol_ts ON ta_data(symbol, timestamp);",
        );
        for table in [SignalTable::Buy, SignalTable::Sell] {
            ddl.push_str(&format!(
                "CREATE TABLE IF NOT EXISTS {t} (
                    id SERIAL PRIMARY KEY,
                    symbol TEXT NOT NULL,
                    date TIMESTAMP NOT NULL,
                    price DOUBLE PRECISION NOT NULL,
                    short_mavg DOUBLE PRECISION NOT NULL,
                    long_mavg DOUBLE PRECISION NOT NULL,
                    sma_signal INTEGER NOT NULL,
                    bb_signal INTEGER NOT NULL,
                    macd_signal_line_cross INTEGER NOT NULL,
                    composite_signal INTEGER NOT NULL,
                    buy_signal BOOLEAN NOT NULL,
                    sell_signal BOOLEAN NOT NULL,
                    reason TEXT NOT NULL
                );
                CREATE UNIQUE INDEX IF NOT EXISTS uq_{t}_symbol_date ON {t}(symbol, date);",
                t = table.table_name()
            ));
        }

        self.client.borrow_mut().batch_execute(&ddl).map_err(query_err)
    }
}

impl StoragePort for PostgresAdapter {
    fn append_candles(&self, candles: &[Candle]) -> Result<(), SigtraderError> {
        let mut client = self.client.borrow_mut();
        let mut tx = client.transaction().map_err(query_err)?;
        let stmt = tx
            .prepare(
                "INSERT INTO crypto_data (symbol, timestamp, open, high, low, close, volume)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)
                 ON CONFLICT DO NOTHING",
            )
            .map_err(query_err)?;
        for c in candles {
            let params: &[&(dyn ToSql + Sync)] = &[
                &c.symbol,
                &c.timestamp,
                &c.open,
                &c.high,
                &c.low,
                &c.close,
                &c.volume,
            ];
            tx.execute(&stmt, params).map_err(query_err)?;
        }
        tx.commit().map_err(query_err)
    }

    fn append_indicator_frame(&self, frame: &IndicatorFrame) -> Result<(), SigtraderError> {
        let mut client = self.client.borrow_mut();
        let mut tx = client.transaction().map_err(query_err)?;
        let stmt = tx
            .prepare(
                "INSERT INTO ta_data (symbol, timestamp, price, sma_short, sma_long, sma_trend,
                    rsi, macd, macd_signal, macd_diff, bb_upper, bb_middle, bb_lower)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                 ON CONFLICT DO NOTHING",
            )
            .map_err(query_err)?;
        for r in &frame.rows {
            let params: &[&(dyn ToSql + Sync)] = &[
                &r.symbol,
                &r.timestamp,
                &r.price,
                &r.sma_short,
                &r.sma_long,
                &r.sma_trend,
                &r.rsi,
                &r.macd,
                &r.macd_signal,
                &r.macd_diff,
                &r.bb_upper,
                &r.bb_middle,
                &r.bb_lower,
            ];
            tx.execute(&stmt, params).map_err(query_err)?;
        }
        tx.commit().map_err(query_err)
    }

    fn append_signals(&self, table: SignalTable, signals: &[Signal]) -> Result<(), SigtraderError> {
        let mut client = self.client.borrow_mut();
        let mut tx = client.transaction().map_err(query_err)?;
        let stmt = tx
            .prepare(&format!(
                "INSERT INTO {} (symbol, date, price, short_mavg, long_mavg, sma_signal,
                    bb_signal, macd_signal_line_cross, composite_signal, buy_signal,
                    sell_signal, reason)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                 ON CONFLICT DO NOTHING",
                table.table_name()
            ))
            .map_err(query_err)?;
        for s in signals {
            let params: &[&(dyn ToSql + Sync)] = &[
                &s.symbol,
                &s.date,
                &s.price,
                &s.short_mavg,
                &s.long_mavg,
                &s.sma_signal,
                &s.bb_signal,
                &s.macd_signal_line_cross,
                &s.composite_signal,
                &s.buy_signal,
                &s.sell_signal,
                &s.reason,
            ];
            tx.execute(&stmt, params).map_err(query_err)?;
        }
        tx.commit().map_err(query_err)
    }

    fn load_signals(&self, symbol: &str, table: SignalTable) -> Result<Vec<Signal>, SigtraderError> {
        let query = format!(
            "SELECT symbol, date, price, short_mavg, long_mavg, sma_signal, bb_signal,
                    macd_signal_line_cross, composite_signal, buy_signal, sell_signal, reason
             FROM {}
             WHERE symbol = $1
             ORDER BY date ASC, id ASC",
            table.table_name()
        );
        let rows = self
            .client
            .borrow_mut()
            .query(query.as_str(), &[&symbol])
            .map_err(query_err)?;

        Ok(rows
            .into_iter()
            .map(|row| Signal {
                symbol: row.get(0),
                date: row.get(1),
                price: row.get(2),
                short_mavg: row.get(3),
                long_mavg: row.get(4),
                sma_signal: row.get(5),
                bb_signal: row.get(6),
                macd_signal_line_cross: row.get(7),
                composite_signal: row.get(8),
                buy_signal: row.get(9),
                sell_signal: row.get(10),
                reason: row.get(11),
            })
            .collect())
    }
}

impl DataPort for PostgresAdapter {
    fn fetch_candles(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Candle>, SigtraderError> {
        let (lower, upper) = day_range_millis(start_date, end_date);

        let query = "SELECT symbol, timestamp, open, high, low, close, volume \
                     FROM crypto_data \
                     WHERE symbol = $1 AND timestamp >= $2 AND timestamp < $3 \
                     ORDER BY timestamp ASC, id ASC";

        let params: &[&(dyn ToSql + Sync)] = &[&symbol, &lower, &upper];
        let rows = self
            .client
            .borrow_mut()
            .query(query, params)
            .map_err(query_err)?;

        Ok(rows
            .into_iter()
            .map(|row| Candle {
                symbol: row.get(0),
                timestamp: row.get(1),
                open: row.get(2),
                high: row.get(3),
                low: row.get(4),
                close: row.get(5),
                volume: row.get(6),
            })
            .collect())
    }

    fn list_symbols(&self) -> Result<Vec<String>, SigtraderError> {
        let rows = self
            .client
            .borrow_mut()
            .query("SELECT DISTINCT symbol FROM crypto_data ORDER BY symbol", &[])
            .map_err(query_err)?;

        Ok(rows.into_iter().map(|row| row.get(0)).collect())
    }

    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, SigtraderError> {
        let query =
            "SELECT MIN(timestamp), MAX(timestamp), COUNT(*) FROM crypto_data WHERE symbol = $1";

        let rows = self
            .client
            .borrow_mut()
            .query(query, &[&symbol])
            .map_err(query_err)?;

        let Some(row) = rows.first() else {
            return Ok(None);
        };
        let min: Option<i64> = row.get(0);
        let max: Option<i64> = row.get(1);
        let count: i64 = row.get(2);

        match (min, max) {
            (Some(min), Some(max)) if count > 0 => Ok(Some((
                millis_to_datetime(min),
                millis_to_datetime(max),
                count as usize,
            ))),
            _ => Ok(None),
        }
    }
}
