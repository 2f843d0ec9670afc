//! Indicator series over candle data. Every `series` function returns one value per input
//! element, `None` until the indicator's window is full.

pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod stochastic;

pub use adx::AdxIndicator;
pub use atr::AtrIndicator;
pub use bollinger::{BollingerIndicator, BollingerPoint};
pub use ema::EmaIndicator;
pub use macd::MacdIndicator;
pub use rsi::RsiIndicator;
pub use stochastic::StochasticIndicator;

/// Simple moving average over `window` values.
pub fn sma(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let window = window.max(1);
    let mut out = vec![None; values.len()];
    let mut sum = 0.0;
    for (i, &v) in values.iter().enumerate() {
        sum += v;
        if i >= window {
            sum -= values[i - window];
        }
        if i + 1 >= window {
            out[i] = Some(sum / window as f64);
        }
    }
    out
}

/// Highest value over the trailing `window` (inclusive of the current element).
pub fn rolling_max(values: &[f64], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, f64::max)
}

/// Lowest value over the trailing `window` (inclusive of the current element).
pub fn rolling_min(values: &[f64], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, f64::min)
}

fn rolling(values: &[f64], window: usize, pick: fn(f64, f64) -> f64) -> Vec<Option<f64>> {
    let window = window.max(1);
    (0..values.len())
        .map(|i| {
            if i + 1 < window {
                return None;
            }
            values[i + 1 - window..=i].iter().copied().reduce(pick)
        })
        .collect()
}

/// Rolling extreme over an already-partial series; `None` if any input in the window is `None`.
pub fn rolling_min_opt(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    let window = window.max(1);
    (0..values.len())
        .map(|i| {
            if i + 1 < window {
                return None;
            }
            values[i + 1 - window..=i]
                .iter()
                .try_fold(f64::INFINITY, |acc, v| v.map(|v| acc.min(v)))
        })
        .collect()
}

/// Value `lag` elements earlier.
pub fn shift<T: Copy>(values: &[Option<T>], lag: usize) -> Vec<Option<T>> {
    (0..values.len())
        .map(|i| if i >= lag { values[i - lag] } else { None })
        .collect()
}

/// Fractional change over `period` elements: `v[i] / v[i - period] - 1`.
pub fn pct_change(values: &[f64], period: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            if i < period || values[i - period] == 0.0 {
                return None;
            }
            Some(values[i] / values[i - period] - 1.0)
        })
        .collect()
}
