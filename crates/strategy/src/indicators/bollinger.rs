use super::{rolling_min_opt, sma};

/// Bollinger bands: SMA ± `std_mult` population standard deviations.
#[derive(Debug, Clone)]
pub struct BollingerIndicator {
    pub period: usize,
    pub std_mult: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerPoint {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

impl BollingerPoint {
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }
}

impl BollingerIndicator {
    pub fn new(period: usize, std_mult: f64) -> Self {
        Self { period: period.max(1), std_mult }
    }

    pub fn series(&self, closes: &[f64]) -> Vec<Option<BollingerPoint>> {
        let means = sma(closes, self.period);
        means
            .iter()
            .enumerate()
            .map(|(i, mean)| {
                let mean = (*mean)?;
                let window = &closes[i + 1 - self.period..=i];
                let var = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
                    / self.period as f64;
                let dev = var.sqrt() * self.std_mult;
                Some(BollingerPoint {
                    upper: mean + dev,
                    middle: mean,
                    lower: mean - dev,
                })
            })
            .collect()
    }
}

/// Squeeze flag: band width equals its minimum over the trailing `length` rows.
pub fn squeeze(bands: &[Option<BollingerPoint>], length: usize) -> Vec<Option<bool>> {
    let widths: Vec<Option<f64>> = bands.iter().map(|b| b.map(|b| b.width())).collect();
    let mins = rolling_min_opt(&widths, length);
    widths
        .iter()
        .zip(&mins)
        .map(|(w, m)| Some(w.as_ref()? == m.as_ref()?))
        .collect()
}
