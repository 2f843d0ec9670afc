/// RSI (Relative Strength Index) indicator.
///
/// Uses Wilder's smoothed moving average seeded with the simple average of the first
/// `period` changes. Values exist from index `period` onward.
#[derive(Debug, Clone)]
pub struct RsiIndicator {
    pub period: usize,
}

impl RsiIndicator {
    pub fn new(period: usize) -> Self {
        Self { period: period.max(1) }
    }

    /// RSI of the latest element, `None` with fewer than `period + 1` closes.
    pub fn compute(&self, closes: &[f64]) -> Option<f64> {
        self.series(closes).last().copied().flatten()
    }

    pub fn series(&self, closes: &[f64]) -> Vec<Option<f64>> {
        let n = self.period;
        let mut out = vec![None; closes.len()];
        if closes.len() < n + 1 {
            return out;
        }

        let mut avg_gain = 0.0;
        let mut avg_loss = 0.0;
        for w in closes[..=n].windows(2) {
            let change = w[1] - w[0];
            if change > 0.0 {
                avg_gain += change;
            } else {
                avg_loss -= change;
            }
        }
        avg_gain /= n as f64;
        avg_loss /= n as f64;
        out[n] = Some(rsi_from(avg_gain, avg_loss));

        // Wilder smoothing over the remaining changes
        for i in n + 1..closes.len() {
            let change = closes[i] - closes[i - 1];
            let gain = change.max(0.0);
            let loss = (-change).max(0.0);
            avg_gain = (avg_gain * (n - 1) as f64 + gain) / n as f64;
            avg_loss = (avg_loss * (n - 1) as f64 + loss) / n as f64;
            out[i] = Some(rsi_from(avg_gain, avg_loss));
        }
        out
    }
}

fn rsi_from(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return if avg_gain == 0.0 { 50.0 } else { 100.0 };
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}
