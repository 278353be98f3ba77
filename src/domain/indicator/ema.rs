//! Exponential Moving Average, used by MACD.
//!
//! k = 2/(n+1), seed with first SMA, then EMA[i] = X[i]*k + EMA[i-1]*(1-k).
//! Warmup: first (n-1) values are undefined.

/// SMA-seeded EMA over raw values; `None` for the first (n-1) entries.
pub(crate) fn ema_of(input: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(input.len());
    if period == 0 {
        out.resize(input.len(), None);
        return out;
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut ema = 0.0;
    let mut sum = 0.0;

    for (i, &value) in input.iter().enumerate() {
        if i < period - 1 {
            sum += value;
            out.push(None);
        } else if i == period - 1 {
            sum += value;
            ema = sum / period as f64;
            out.push(Some(ema));
        } else {
            ema = value * k + ema * (1.0 - k);
            out.push(Some(ema));
        }
    }

    out
}
