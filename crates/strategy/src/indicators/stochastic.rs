use common::Candle;

use super::{rolling_max, rolling_min};

/// Fast stochastic %K over `k` bars: position of the close inside the high/low range.
#[derive(Debug, Clone)]
pub struct StochasticIndicator {
    pub k: usize,
}

impl StochasticIndicator {
    pub fn new(k: usize) -> Self {
        Self { k: k.max(1) }
    }

    pub fn series(&self, candles: &[Candle]) -> Vec<Option<f64>> {
        let highs: Vec<f64> = candles.iter().map(|c| c.high).collect();
        let lows: Vec<f64> = candles.iter().map(|c| c.low).collect();
        let hh = rolling_max(&highs, self.k);
        let ll = rolling_min(&lows, self.k);

        candles
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let (hi, lo) = (hh[i]?, ll[i]?);
                let range = hi - lo;
                if range <= 0.0 {
                    // Flat window: the close sits mid-range.
                    return Some(50.0);
                }
                Some(100.0 * (c.close - lo) / range)
            })
            .collect()
    }
}
