use common::Candle;

/// Average True Range with Wilder smoothing, seeded by the mean of the first `period`
/// true ranges. The first bar's true range is its high−low span.
#[derive(Debug, Clone)]
pub struct AtrIndicator {
    pub period: usize,
}

impl AtrIndicator {
    pub fn new(period: usize) -> Self {
        Self { period: period.max(1) }
    }

    pub fn series(&self, candles: &[Candle]) -> Vec<Option<f64>> {
        let n = self.period;
        let tr = true_ranges(candles);
        let mut out = vec![None; candles.len()];
        if tr.len() < n {
            return out;
        }

        let mut atr = tr[..n].iter().sum::<f64>() / n as f64;
        out[n - 1] = Some(atr);
        for i in n..tr.len() {
            atr = (atr * (n - 1) as f64 + tr[i]) / n as f64;
            out[i] = Some(atr);
        }
        out
    }
}

pub(crate) fn true_ranges(candles: &[Candle]) -> Vec<f64> {
    candles
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let span = c.high - c.low;
            match i.checked_sub(1).map(|p| candles[p].close) {
                Some(prev_close) => span
                    .max((c.high - prev_close).abs())
                    .max((c.low - prev_close).abs()),
                None => span,
            }
        })
        .collect()
}
