/// Exponential moving average with `alpha = 2 / (period + 1)`, seeded with the first value
/// (recursive form, no bias adjustment).
#[derive(Debug, Clone)]
pub struct EmaIndicator {
    pub period: usize,
}

impl EmaIndicator {
    pub fn new(period: usize) -> Self {
        Self { period: period.max(1) }
    }

    fn alpha(&self) -> f64 {
        2.0 / (self.period as f64 + 1.0)
    }

    /// EMA value at every element, including the warm-up region.
    pub fn raw(&self, values: &[f64]) -> Vec<f64> {
        let alpha = self.alpha();
        let mut out = Vec::with_capacity(values.len());
        let mut prev: Option<f64> = None;
        for &v in values {
            let next = match prev {
                None => v,
                Some(p) => alpha * v + (1.0 - alpha) * p,
            };
            out.push(next);
            prev = Some(next);
        }
        out
    }

    /// EMA masked to `None` until `period` values have been seen.
    pub fn series(&self, values: &[f64]) -> Vec<Option<f64>> {
        self.raw(values)
            .into_iter()
            .enumerate()
            .map(|(i, v)| (i + 1 >= self.period).then_some(v))
            .collect()
    }
}
