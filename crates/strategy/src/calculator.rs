use common::Candle;

use crate::indicators::{
    bollinger, macd, pct_change, rolling_max, rolling_min, shift, sma, AdxIndicator, AtrIndicator,
    BollingerIndicator, EmaIndicator, MacdIndicator, RsiIndicator, StochasticIndicator,
};
use crate::params::{is_active, period, ParameterSet};
use crate::row::{BollingerBands, IndicatorRow, MacdFlip, Reading, SupportResistance, Trend};

/// Computes the weight-gated indicator set for one candle series.
///
/// An indicator is computed only when its governing weight is active, so a row's
/// `Disabled` readings mirror the parameter set exactly.
#[derive(Debug, Clone)]
pub struct IndicatorEngine<'a> {
    params: &'a ParameterSet,
}

impl<'a> IndicatorEngine<'a> {
    pub fn new(params: &'a ParameterSet) -> Self {
        Self { params }
    }

    pub fn compute(&self, candles: &[Candle]) -> Vec<IndicatorRow> {
        let p = self.params;
        let mut rows: Vec<IndicatorRow> = candles.iter().map(IndicatorRow::bare).collect();
        if candles.is_empty() {
            return rows;
        }

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let highs: Vec<f64> = candles.iter().map(|c| c.high).collect();
        let lows: Vec<f64> = candles.iter().map(|c| c.low).collect();

        if is_active(p.rsi_weight) {
            let rsi = RsiIndicator::new(period(p.rsi_period)).series(&closes);
            fill(&mut rows, &rsi, |r, v| r.rsi = Reading::from_value(v));
        }

        if is_active(p.trend_ema_weight) {
            let fast = EmaIndicator::new(period(p.trend_fast_ema)).series(&closes);
            let slow = EmaIndicator::new(period(p.trend_slow_ema)).series(&closes);
            for (i, row) in rows.iter_mut().enumerate() {
                row.ema_fast = Reading::from_value(fast[i]);
                row.ema_slow = Reading::from_value(slow[i]);
                row.trend = match (fast[i], slow[i]) {
                    (Some(f), Some(s)) => Reading::Ready(Trend::compare(f, s)),
                    _ => Reading::Warming,
                };
            }
        }

        if is_active(p.price_ema_weight) {
            let ema = EmaIndicator::new(period(p.entry_ema_period)).series(&closes);
            fill(&mut rows, &ema, |r, v| r.entry_ema = Reading::from_value(v));
        }

        if is_active(p.macd_weight) {
            let hist = MacdIndicator::new(period(p.macd_fast), period(p.macd_slow), period(p.macd_signal))
                .histogram(&closes);
            let flips = macd::flips(&hist);
            for (i, row) in rows.iter_mut().enumerate() {
                row.macd_histogram = Reading::from_value(hist[i]);
                row.macd_flip = match flips[i] {
                    Some((bullish, bearish)) => Reading::Ready(MacdFlip { bullish, bearish }),
                    None => Reading::Warming,
                };
            }
        }

        if is_active(p.volume_spike_weight) {
            let volumes: Vec<f64> = candles.iter().map(|c| c.volume).collect();
            let ma = sma(&volumes, period(p.volume_ma_period));
            for (i, row) in rows.iter_mut().enumerate() {
                row.volume_ma = Reading::from_value(ma[i]);
                row.volume_spike = row
                    .volume_ma
                    .map(|avg| row.volume > avg * p.volume_spike_multiplier);
            }
        }

        if is_active(p.bollinger_weight) {
            let bands = BollingerIndicator::new(period(p.bollinger_period), p.bollinger_std)
                .series(&closes);
            let squeeze = (p.bollinger_squeeze_enabled > 0.5)
                .then(|| bollinger::squeeze(&bands, period(p.bollinger_squeeze_length)));
            for (i, row) in rows.iter_mut().enumerate() {
                row.bollinger = match bands[i] {
                    Some(b) => Reading::Ready(BollingerBands { upper: b.upper, lower: b.lower }),
                    None => Reading::Warming,
                };
                if let Some(sq) = &squeeze {
                    row.bollinger_squeeze = sq[i].map_or(Reading::Warming, Reading::Ready);
                }
            }
        }

        if is_active(p.stochastic_weight) {
            let k = StochasticIndicator::new(period(p.stochastic_k)).series(candles);
            fill(&mut rows, &k, |r, v| r.stoch_k = Reading::from_value(v));
        }

        if is_active(p.atr_weight) {
            let atr = AtrIndicator::new(period(p.atr_period)).series(candles);
            fill(&mut rows, &atr, |r, v| r.atr = Reading::from_value(v));
        }

        if is_active(p.adx_weight) {
            let adx = AdxIndicator::new(period(p.adx_period)).series(candles);
            fill(&mut rows, &adx, |r, v| r.adx = Reading::from_value(v));
        }

        if is_active(p.sr_weight) {
            let lookback = period(p.sr_lookback);
            let resistance = rolling_max(&highs, lookback);
            let support = rolling_min(&lows, lookback);
            for (i, row) in rows.iter_mut().enumerate() {
                row.support_resistance = match (support[i], resistance[i]) {
                    (Some(s), Some(r)) if row.close != 0.0 => Reading::Ready(SupportResistance {
                        support: s,
                        resistance: r,
                        near_support: (row.close - s).abs() / row.close < p.sr_touch_distance,
                        near_resistance: (row.close - r).abs() / row.close < p.sr_touch_distance,
                    }),
                    _ => Reading::Warming,
                };
            }
        }

        if is_active(p.momentum_weight) {
            let m = pct_change(&closes, period(p.momentum_period));
            fill(&mut rows, &m, |r, v| r.momentum = Reading::from_value(v));
        }

        if is_active(p.market_structure_weight) {
            let lookback = period(p.structure_lookback);
            let hh = rolling_max(&highs, lookback);
            let ll = rolling_min(&lows, lookback);
            let hh_prev = shift(&hh, lookback);
            let ll_prev = shift(&ll, lookback);
            for (i, row) in rows.iter_mut().enumerate() {
                row.market_structure = match (hh[i], ll[i], hh_prev[i], ll_prev[i]) {
                    (Some(h), Some(l), Some(hp), Some(lp)) => Reading::Ready(if h > hp && l > lp {
                        Trend::Bullish
                    } else if h < hp && l < lp {
                        Trend::Bearish
                    } else {
                        Trend::Neutral
                    }),
                    _ => Reading::Warming,
                };
            }
        }

        rows
    }
}

fn fill<T: Copy>(rows: &mut [IndicatorRow], values: &[Option<T>], set: impl Fn(&mut IndicatorRow, Option<T>)) {
    for (row, v) in rows.iter_mut().zip(values) {
        set(row, *v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::fixtures::all_disabled;
    use chrono::{Duration, TimeZone, Utc};

    fn candles(closes: &[f64]) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Candle {
                open_time: start + Duration::minutes(5 * i as i64),
                open: c,
                high: c + 1.0,
                low: c - 1.0,
                close: c,
                volume: 10.0,
            })
            .collect()
    }

    #[test]
    fn disabled_weights_leave_readings_disabled() {
        let params = all_disabled();
        let rows = IndicatorEngine::new(&params).compute(&candles(&[100.0; 30]));
        assert_eq!(rows.len(), 30);
        assert!(rows.iter().all(|r| r.rsi.is_disabled() && r.adx.is_disabled()));
        assert!(rows.iter().all(IndicatorRow::is_warm));
    }

    #[test]
    fn enabled_indicator_warms_then_becomes_ready() {
        let mut params = all_disabled();
        params.rsi_weight = 0.5;
        params.rsi_period = 3.0;
        let rows = IndicatorEngine::new(&params).compute(&candles(&[1.0, 2.0, 3.0, 4.0, 5.0]));
        assert_eq!(rows[2].rsi, Reading::Warming);
        assert!(!rows[2].is_warm());
        assert_eq!(rows[3].rsi, Reading::Ready(100.0));
        assert!(rows[4].is_warm());
    }

    #[test]
    fn weight_at_epsilon_is_not_computed() {
        let mut params = all_disabled();
        params.momentum_weight = 0.01;
        let rows = IndicatorEngine::new(&params).compute(&candles(&[1.0; 20]));
        assert!(rows.iter().all(|r| r.momentum.is_disabled()));
    }

    #[test]
    fn trend_follows_fast_slow_ema() {
        let mut params = all_disabled();
        params.trend_ema_weight = 1.0;
        params.trend_fast_ema = 2.0;
        params.trend_slow_ema = 5.0;
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let rows = IndicatorEngine::new(&params).compute(&candles(&closes));
        assert_eq!(rows[3].trend, Reading::Warming);
        assert_eq!(rows[19].trend, Reading::Ready(Trend::Bullish));
    }

    #[test]
    fn market_structure_detects_higher_highs_and_lows() {
        let mut params = all_disabled();
        params.market_structure_weight = 1.0;
        params.structure_lookback = 2.0;
        let closes: Vec<f64> = (0..8).map(|i| 100.0 + 3.0 * i as f64).collect();
        let rows = IndicatorEngine::new(&params).compute(&candles(&closes));
        assert_eq!(rows[2].market_structure, Reading::Warming);
        assert_eq!(rows[3].market_structure, Reading::Ready(Trend::Bullish));
    }

    #[test]
    fn volume_spike_compares_against_average() {
        let mut params = all_disabled();
        params.volume_spike_weight = 1.0;
        params.volume_ma_period = 3.0;
        params.volume_spike_multiplier = 1.5;
        let mut bars = candles(&[100.0; 4]);
        bars[3].volume = 40.0; // avg (10+10+40)/3 = 20, 40 > 30
        let rows = IndicatorEngine::new(&params).compute(&bars);
        assert_eq!(rows[1].volume_spike, Reading::Warming);
        assert_eq!(rows[2].volume_spike, Reading::Ready(false));
        assert_eq!(rows[3].volume_spike, Reading::Ready(true));
    }
}
