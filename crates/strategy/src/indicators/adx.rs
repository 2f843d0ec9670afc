use common::Candle;

/// ADX (Average Directional Index) with Wilder smoothing.
///
/// 1. +DM/−DM and true range from consecutive bars
/// 2. Wilder-smooth each over `window` bars (seeded with their sums)
/// 3. DX = |+DI − −DI| / (+DI + −DI) × 100
/// 4. ADX = mean of the first `window` DX values, then Wilder-smoothed
///
/// The first value appears after `2 × window` bars.
#[derive(Debug, Clone)]
pub struct AdxIndicator {
    pub window: usize,
}

impl AdxIndicator {
    pub fn new(window: usize) -> Self {
        Self { window: window.max(1) }
    }

    pub fn series(&self, candles: &[Candle]) -> Vec<Option<f64>> {
        let w = self.window;
        let wf = w as f64;
        let mut out = vec![None; candles.len()];

        let mut plus_dm = 0.0;
        let mut minus_dm = 0.0;
        let mut tr = 0.0;
        let mut dx_sum = 0.0;
        let mut dx_count = 0usize;
        let mut adx: Option<f64> = None;

        for i in 1..candles.len() {
            let (p_dm, m_dm, t) = directional_move(&candles[i - 1], &candles[i]);

            if i <= w {
                // Accumulate the seed sums over the first `window` moves.
                plus_dm += p_dm;
                minus_dm += m_dm;
                tr += t;
                if i < w {
                    continue;
                }
            } else {
                plus_dm = plus_dm - plus_dm / wf + p_dm;
                minus_dm = minus_dm - minus_dm / wf + m_dm;
                tr = tr - tr / wf + t;
            }

            let dx = dx_from(plus_dm, minus_dm, tr);
            match adx {
                Some(prev) => {
                    let next = (prev * (wf - 1.0) + dx) / wf;
                    adx = Some(next);
                    out[i] = Some(next);
                }
                None => {
                    dx_sum += dx;
                    dx_count += 1;
                    if dx_count >= w {
                        let seed = dx_sum / wf;
                        adx = Some(seed);
                        out[i] = Some(seed);
                    }
                }
            }
        }
        out
    }
}

fn directional_move(prev: &Candle, cur: &Candle) -> (f64, f64, f64) {
    let up = cur.high - prev.high;
    let down = prev.low - cur.low;
    let plus_dm = if up > down && up > 0.0 { up } else { 0.0 };
    let minus_dm = if down > up && down > 0.0 { down } else { 0.0 };
    let tr = (cur.high - cur.low)
        .max((cur.high - prev.close).abs())
        .max((cur.low - prev.close).abs());
    (plus_dm, minus_dm, tr)
}

fn dx_from(plus_dm: f64, minus_dm: f64, tr: f64) -> f64 {
    if tr <= 0.0 {
        return 0.0;
    }
    let di_pos = plus_dm / tr * 100.0;
    let di_neg = minus_dm / tr * 100.0;
    let sum = di_pos + di_neg;
    if sum > 0.0 {
        (di_pos - di_neg).abs() / sum * 100.0
    } else {
        0.0
    }
}
