//! Report generation port.

use crate::domain::error::SigtraderError;
use crate::domain::signal::Signal;
use crate::domain::simulator::BacktestResult;

/// Port for writing backtest reports.
pub trait ReportPort {
    fn write(
        &self,
        result: &BacktestResult,
        buys: &[Signal],
        sells: &[Signal],
        output_dir: &str,
    ) -> Result<(), SigtraderError>;
}
