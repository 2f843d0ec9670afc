use super::EmaIndicator;

/// MACD (Moving Average Convergence/Divergence) histogram.
///
/// MACD line = EMA(fast) − EMA(slow), signal = EMA(macd_line, signal),
/// histogram = MACD line − signal. Values exist once `slow + signal − 1` closes are seen.
#[derive(Debug, Clone)]
pub struct MacdIndicator {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

impl MacdIndicator {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        Self {
            fast: fast.max(1),
            slow: slow.max(1),
            signal: signal.max(1),
        }
    }

    pub fn histogram(&self, closes: &[f64]) -> Vec<Option<f64>> {
        let fast = EmaIndicator::new(self.fast).raw(closes);
        let slow = EmaIndicator::new(self.slow).raw(closes);
        let line: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
        let signal = EmaIndicator::new(self.signal).raw(&line);

        let warmup = self.slow.max(self.fast) + self.signal - 1;
        line.iter()
            .zip(&signal)
            .enumerate()
            .map(|(i, (m, s))| (i + 1 >= warmup).then_some(m - s))
            .collect()
    }
}

/// Histogram sign change between consecutive values: `(bullish, bearish)`.
pub fn flips(histogram: &[Option<f64>]) -> Vec<Option<(bool, bool)>> {
    (0..histogram.len())
        .map(|i| {
            let cur = histogram[i]?;
            let prev = histogram[i.checked_sub(1)?]?;
            Some((prev < 0.0 && cur > 0.0, prev > 0.0 && cur < 0.0))
        })
        .collect()
}
