//! Portfolio simulation over buy and sell signal streams.
//!
//! A single-symbol, long-only, fee-free account. Each buy commits a fixed
//! fraction of current cash in whole units; each sell liquidates the whole
//! position. The simulation is a fold over trade events with [`PortfolioState`]
//! as the accumulator.
//!
//! Two event orderings are supported:
//!
//! - [`SimulationMode::TwoPass`] applies every buy, then every sell. A sell can
//!   therefore liquidate units bought after it.
//! - [`SimulationMode::Chronological`] merges both streams by date (buy first on
//!   a tie), so a sell only liquidates units already held.
//!
//! An open position at the end is marked at the price of the last buy signal,
//! not at the last observed close.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::domain::error::SigtraderError;
use crate::domain::signal::{Signal, SignalTable};
use crate::ports::storage_port::StoragePort;

pub const DEFAULT_INITIAL_CAPITAL: f64 = 50_000.0;
pub const DEFAULT_INVESTMENT_FRACTION: f64 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SimulationMode {
    #[default]
    TwoPass,
    Chronological,
}

impl SimulationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SimulationMode::TwoPass => "two_pass",
            SimulationMode::Chronological => "chronological",
        }
    }
}

impl fmt::Display for SimulationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SimulationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "two_pass" | "two-pass" | "twopass" => Ok(SimulationMode::TwoPass),
            "chronological" => Ok(SimulationMode::Chronological),
            other => Err(format!(
                "unknown simulation mode '{}' (expected two_pass or chronological)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortfolioState {
    pub cash: f64,
    pub position: u64,
}

/// Floored quotient computed from the remainder, so `1.0 / 0.1` gives 9 units
/// rather than the 10 a plain division rounds up to.
fn floor_div(budget: f64, price: f64) -> f64 {
    let div = (budget - budget % price) / price;
    let mut units = div.floor();
    if div - units > 0.5 {
        units += 1.0;
    }
    units
}

impl PortfolioState {
    pub fn new(cash: f64) -> Self {
        PortfolioState { cash, position: 0 }
    }

    /// Commit `fraction` of current cash at `price`, in whole units.
    /// Returns the number of units bought; zero leaves the state unchanged.
    pub fn buy(&mut self, price: f64, fraction: f64) -> u64 {
        if price <= 0.0 {
            return 0;
        }
        let mut units = floor_div(self.cash * fraction, price);
        // Rounding in the division must not let the cost exceed the cash.
        if units * price > self.cash {
            units -= 1.0;
        }
        if units < 1.0 {
            return 0;
        }
        let units = units as u64;
        self.cash -= units as f64 * price;
        self.position += units;
        units
    }

    /// Liquidate the whole position at `price`. Returns the units sold.
    pub fn sell(&mut self, price: f64) -> u64 {
        let units = self.position;
        if units > 0 {
            self.cash += units as f64 * price;
            self.position = 0;
        }
        units
    }

    pub fn value_at(&self, mark: Option<f64>) -> f64 {
        match mark {
            Some(price) if self.position > 0 => self.cash + self.position as f64 * price,
            _ => self.cash,
        }
    }
}

/// State after one applied signal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeStep {
    pub date: NaiveDateTime,
    pub side: TradeSide,
    pub price: f64,
    pub units: u64,
    pub cash: f64,
    pub position: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationResult {
    pub final_value: f64,
    pub state: PortfolioState,
    /// Price of the chronologically last buy signal; the mark for an open position.
    pub last_buy_price: Option<f64>,
    pub trajectory: Vec<TradeStep>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    pub investment_fraction: f64,
    pub mode: SimulationMode,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_capital: DEFAULT_INITIAL_CAPITAL,
            investment_fraction: DEFAULT_INVESTMENT_FRACTION,
            mode: SimulationMode::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestResult {
    pub symbol: String,
    pub initial_capital: f64,
    pub final_value: f64,
}

impl BacktestResult {
    pub fn total_return(&self) -> f64 {
        if self.initial_capital == 0.0 {
            return 0.0;
        }
        (self.final_value - self.initial_capital) / self.initial_capital
    }
}

struct Event<'a> {
    side: TradeSide,
    signal: &'a Signal,
}

fn sorted_by_date(signals: &[Signal]) -> Vec<&Signal> {
    let mut sorted: Vec<&Signal> = signals.iter().collect();
    sorted.sort_by_key(|s| s.date);
    sorted
}

fn event_order<'a>(buys: &'a [Signal], sells: &'a [Signal], mode: SimulationMode) -> Vec<Event<'a>> {
    let buys = sorted_by_date(buys).into_iter().map(|signal| Event {
        side: TradeSide::Buy,
        signal,
    });
    let sells = sorted_by_date(sells).into_iter().map(|signal| Event {
        side: TradeSide::Sell,
        signal,
    });

    let mut events: Vec<Event<'a>> = buys.chain(sells).collect();
    if mode == SimulationMode::Chronological {
        // Stable: buys already precede sells, so same-date buys stay first.
        events.sort_by_key(|e| e.signal.date);
    }
    events
}

/// Run the account over the two signal streams.
///
/// Each stream is sorted by date (stably) before use; callers may pass them in
/// any order. The function is total: a zero fraction or an empty buy stream
/// simply leaves the capital untouched.
pub fn simulate(
    buys: &[Signal],
    sells: &[Signal],
    initial_capital: f64,
    fraction: f64,
    mode: SimulationMode,
) -> SimulationResult {
    let last_buy_price = sorted_by_date(buys).last().map(|s| s.price);

    let (state, trajectory) = event_order(buys, sells, mode).into_iter().fold(
        (PortfolioState::new(initial_capital), Vec::new()),
        |(mut state, mut trajectory), event| {
            let price = event.signal.price;
            let units = match event.side {
                TradeSide::Buy => state.buy(price, fraction),
                TradeSide::Sell => state.sell(price),
            };
            if units > 0 {
                trajectory.push(TradeStep {
                    date: event.signal.date,
                    side: event.side,
                    price,
                    units,
                    cash: state.cash,
                    position: state.position,
                });
            }
            (state, trajectory)
        },
    );

    SimulationResult {
        final_value: state.value_at(last_buy_price),
        state,
        last_buy_price,
        trajectory,
    }
}

pub fn validate_backtest_config(config: &BacktestConfig) -> Result<(), SigtraderError> {
    if !config.initial_capital.is_finite() || config.initial_capital <= 0.0 {
        return Err(SigtraderError::ConfigInvalid {
            section: "backtest".into(),
            key: "initial_capital".into(),
            reason: format!("must be positive, got {}", config.initial_capital),
        });
    }
    let f = config.investment_fraction;
    if !f.is_finite() || f <= 0.0 || f > 1.0 {
        return Err(SigtraderError::ConfigInvalid {
            section: "backtest".into(),
            key: "investment_fraction".into(),
            reason: format!("must be in (0, 1], got {}", f),
        });
    }
    Ok(())
}

fn check_prices(symbol: &str, signals: &[Signal]) -> Result<(), SigtraderError> {
    match signals.iter().find(|s| !s.price.is_finite() || s.price <= 0.0) {
        Some(bad) => Err(SigtraderError::malformed(
            symbol,
            format!("non-positive signal price {} at {}", bad.price, bad.date),
        )),
        None => Ok(()),
    }
}

/// Simulate already-loaded signal streams after validating the inputs.
pub fn backtest_signals(
    symbol: &str,
    buys: &[Signal],
    sells: &[Signal],
    config: &BacktestConfig,
) -> Result<(BacktestResult, SimulationResult), SigtraderError> {
    validate_backtest_config(config)?;
    check_prices(symbol, buys)?;
    check_prices(symbol, sells)?;

    let sim = simulate(
        buys,
        sells,
        config.initial_capital,
        config.investment_fraction,
        config.mode,
    );
    let result = BacktestResult {
        symbol: symbol.to_string(),
        initial_capital: config.initial_capital,
        final_value: sim.final_value,
    };
    Ok((result, sim))
}

/// Load the persisted buy and sell signals of `symbol` and simulate them.
pub fn run_backtest(
    store: &dyn StoragePort,
    symbol: &str,
    config: &BacktestConfig,
) -> Result<BacktestResult, SigtraderError> {
    validate_backtest_config(config)?;
    let buys = store.load_signals(symbol, SignalTable::Buy)?;
    let sells = store.load_signals(symbol, SignalTable::Sell)?;
    backtest_signals(symbol, &buys, &sells, config).map(|(result, _)| result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::signal::{BUY_REASON, SELL_REASON};
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn day(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2021, 3, d)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn signal(price: f64, d: u32, buy: bool) -> Signal {
        Signal {
            symbol: "BTC/USDT".into(),
            date: day(d),
            price,
            short_mavg: price,
            long_mavg: price,
            sma_signal: if buy { 1 } else { -1 },
            bb_signal: 0,
            macd_signal_line_cross: if buy { 1 } else { -1 },
            composite_signal: if buy { 2 } else { -2 },
            buy_signal: buy,
            sell_signal: !buy,
            reason: if buy { BUY_REASON } else { SELL_REASON }.to_string(),
        }
    }

    fn buy(price: f64, d: u32) -> Signal {
        signal(price, d, true)
    }

    fn sell(price: f64, d: u32) -> Signal {
        signal(price, d, false)
    }

    #[test]
    fn single_buy_stays_open() {
        let r = simulate(&[buy(100.0, 1)], &[], 1000.0, 0.4, SimulationMode::TwoPass);
        assert_relative_eq!(r.state.cash, 600.0);
        assert_eq!(r.state.position, 4);
        assert_relative_eq!(r.final_value, 1000.0);
        assert_eq!(r.last_buy_price, Some(100.0));
    }

    #[test]
    fn buy_units_use_floored_quotient_of_remainder() {
        // 2.5 * 0.4 / 0.1 evaluates to 10.0 in floating point.
        let mut state = PortfolioState::new(2.5);
        assert_eq!(state.buy(0.1, 0.4), 9);
        assert_eq!(state.position, 9);
        assert_relative_eq!(state.cash, 1.6, epsilon = 1e-12);
    }

    #[test]
    fn buy_then_sell_closes_out() {
        let r = simulate(
            &[buy(100.0, 1)],
            &[sell(150.0, 2)],
            1000.0,
            0.4,
            SimulationMode::TwoPass,
        );
        assert_relative_eq!(r.state.cash, 1200.0);
        assert_eq!(r.state.position, 0);
        assert_relative_eq!(r.final_value, 1200.0);
        assert_eq!(r.trajectory.len(), 2);
        assert_eq!(r.trajectory[1].side, TradeSide::Sell);
        assert_eq!(r.trajectory[1].units, 4);
    }

    #[test]
    fn open_position_marked_at_last_buy_price() {
        let r = simulate(
            &[buy(100.0, 1), buy(50.0, 2)],
            &[],
            1000.0,
            0.4,
            SimulationMode::TwoPass,
        );
        assert_relative_eq!(r.state.cash, 400.0);
        assert_eq!(r.state.position, 8);
        assert_relative_eq!(r.final_value, 800.0);
        assert_eq!(r.last_buy_price, Some(50.0));
    }

    #[test]
    fn sell_without_position_is_noop() {
        let r = simulate(&[], &[sell(100.0, 1)], 1000.0, 0.4, SimulationMode::TwoPass);
        assert_relative_eq!(r.final_value, 1000.0);
        assert!(r.trajectory.is_empty());
        assert_eq!(r.last_buy_price, None);
    }

    #[test]
    fn unaffordable_buy_is_noop() {
        let r = simulate(&[buy(5000.0, 1)], &[], 1000.0, 0.4, SimulationMode::TwoPass);
        assert_eq!(r.state.position, 0);
        assert!(r.trajectory.is_empty());
        assert_relative_eq!(r.final_value, 1000.0);
    }

    #[test]
    fn zero_fraction_buys_nothing() {
        let r = simulate(
            &[buy(10.0, 1), buy(11.0, 2)],
            &[sell(12.0, 3)],
            1000.0,
            0.0,
            SimulationMode::Chronological,
        );
        assert_relative_eq!(r.final_value, 1000.0);
        assert_eq!(r.state.position, 0);
    }

    #[test]
    fn streams_are_sorted_before_use() {
        let ordered = simulate(
            &[buy(100.0, 1), buy(50.0, 2)],
            &[],
            1000.0,
            0.4,
            SimulationMode::TwoPass,
        );
        let shuffled = simulate(
            &[buy(50.0, 2), buy(100.0, 1)],
            &[],
            1000.0,
            0.4,
            SimulationMode::TwoPass,
        );
        assert_eq!(ordered, shuffled);
    }

    #[test]
    fn two_pass_sell_liquidates_later_buys() {
        let buys = [buy(100.0, 1), buy(100.0, 3)];
        let sells = [sell(120.0, 2)];

        let two_pass = simulate(&buys, &sells, 1000.0, 0.4, SimulationMode::TwoPass);
        // Buys: 4 @100 (cash 600), 2 @100 (cash 400); sell 6 @120.
        assert_eq!(two_pass.state.position, 0);
        assert_relative_eq!(two_pass.final_value, 400.0 + 6.0 * 120.0);

        let chrono = simulate(&buys, &sells, 1000.0, 0.4, SimulationMode::Chronological);
        // Buy 4 @100 (cash 600), sell 4 @120 (cash 1080), buy 4 @100 (cash 680).
        assert_eq!(chrono.state.position, 4);
        assert_relative_eq!(chrono.state.cash, 680.0);
        assert_relative_eq!(chrono.final_value, 1080.0);

        assert!(two_pass.final_value != chrono.final_value);
    }

    #[test]
    fn chronological_tie_applies_buy_first() {
        let r = simulate(
            &[buy(100.0, 1)],
            &[sell(110.0, 1)],
            1000.0,
            0.4,
            SimulationMode::Chronological,
        );
        assert_eq!(r.state.position, 0);
        assert_relative_eq!(r.final_value, 600.0 + 4.0 * 110.0);
    }

    #[test]
    fn modes_agree_when_sells_follow_all_buys() {
        let buys = [buy(100.0, 1), buy(90.0, 2)];
        let sells = [sell(95.0, 5), sell(97.0, 6)];
        let a = simulate(&buys, &sells, 1000.0, 0.4, SimulationMode::TwoPass);
        let b = simulate(&buys, &sells, 1000.0, 0.4, SimulationMode::Chronological);
        assert_eq!(a, b);
    }

    #[test]
    fn mode_parsing() {
        assert_eq!("two_pass".parse::<SimulationMode>(), Ok(SimulationMode::TwoPass));
        assert_eq!(
            " Chronological ".parse::<SimulationMode>(),
            Ok(SimulationMode::Chronological)
        );
        assert!("fifo".parse::<SimulationMode>().is_err());
        assert_eq!(SimulationMode::default().to_string(), "two_pass");
    }

    #[test]
    fn backtest_rejects_bad_config() {
        let bad_capital = BacktestConfig {
            initial_capital: 0.0,
            ..BacktestConfig::default()
        };
        assert!(backtest_signals("X", &[], &[], &bad_capital).is_err());

        let bad_fraction = BacktestConfig {
            investment_fraction: 1.5,
            ..BacktestConfig::default()
        };
        let err = backtest_signals("X", &[], &[], &bad_fraction).unwrap_err();
        assert!(err.to_string().contains("investment_fraction"));
    }

    #[test]
    fn backtest_rejects_non_positive_price() {
        let err = backtest_signals("BTC/USDT", &[buy(0.0, 1)], &[], &BacktestConfig::default())
            .unwrap_err();
        assert!(matches!(err, SigtraderError::MalformedInput { .. }));
    }

    #[test]
    fn backtest_result_return() {
        let (result, _) = backtest_signals(
            "BTC/USDT",
            &[buy(100.0, 1)],
            &[sell(150.0, 2)],
            &BacktestConfig {
                initial_capital: 1000.0,
                ..BacktestConfig::default()
            },
        )
        .unwrap();
        assert_relative_eq!(result.final_value, 1200.0);
        assert_relative_eq!(result.total_return(), 0.2);
    }

    fn stream(max_len: usize) -> impl Strategy<Value = Vec<(f64, u32)>> {
        prop::collection::vec((1.0f64..1000.0, 1u32..28), 0..max_len)
    }

    proptest! {
        #[test]
        fn cash_never_negative(
            buys in stream(12),
            sells in stream(12),
            capital in 1.0f64..100_000.0,
            fraction in 0.0f64..=1.0,
            chronological in any::<bool>(),
        ) {
            let buys: Vec<Signal> = buys.into_iter().map(|(p, d)| buy(p, d)).collect();
            let sells: Vec<Signal> = sells.into_iter().map(|(p, d)| sell(p, d)).collect();
            let mode = if chronological {
                SimulationMode::Chronological
            } else {
                SimulationMode::TwoPass
            };

            let r = simulate(&buys, &sells, capital, fraction, mode);
            prop_assert!(r.state.cash >= 0.0);
            for step in &r.trajectory {
                prop_assert!(step.cash >= 0.0);
                prop_assert!(step.units > 0);
            }

            let again = simulate(&buys, &sells, capital, fraction, mode);
            prop_assert_eq!(r, again);
        }

        #[test]
        fn no_buys_keeps_capital(sells in stream(8), capital in 1.0f64..100_000.0) {
            let sells: Vec<Signal> = sells.into_iter().map(|(p, d)| sell(p, d)).collect();
            let r = simulate(&[], &sells, capital, 0.4, SimulationMode::TwoPass);
            prop_assert_eq!(r.final_value, capital);
        }
    }
}
