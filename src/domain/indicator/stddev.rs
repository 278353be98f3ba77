//! Population mean and standard deviation, shared by the Bollinger bands and
//! the incremental engine.
//!
//! STDDEV(n) = sqrt(sum((C[j] - SMA(n))^2) / n) over the window.

use crate::domain::candle::Candle;

/// Mean and population standard deviation of the closes in `window`.
pub(crate) fn window_mean_stddev(window: &[Candle]) -> (f64, f64) {
    mean_stddev(window.iter().map(|c| c.close))
}

pub(crate) fn mean_stddev<I>(values: I) -> (f64, f64)
where
    I: Iterator<Item = f64> + Clone,
{
    let n = values.clone().count() as f64;
    let mean = values.clone().sum::<f64>() / n;
    let variance = values
        .map(|v| {
            let diff = v - mean;
            diff * diff
        })
        .sum::<f64>()
        / n;
    (mean, variance.sqrt())
}
