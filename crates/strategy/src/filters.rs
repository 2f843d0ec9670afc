use std::fmt;

use chrono::Timelike;
use serde::{Deserialize, Serialize};

use crate::params::ParameterSet;
use crate::row::{IndicatorRow, Trend};

/// Scale at which a MACD histogram saturates to a full ±1 signal.
const MACD_HISTOGRAM_SCALE: f64 = 0.002;
/// Distance from the entry EMA, as a fraction of price, that counts as "far".
const PRICE_EMA_FAR: f64 = 0.002;
/// RSI band width next to oversold/overbought that yields a half signal.
const RSI_NEAR_BAND: f64 = 10.0;

/// The fixed set of weighted filters, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    Rsi,
    TrendEma,
    PriceEma,
    Macd,
    VolumeSpike,
    Bollinger,
    Stochastic,
    Atr,
    Adx,
    Sr,
    Momentum,
    MarketStructure,
    TimeFilter,
    MtfConfirmation,
}

impl FilterKind {
    pub const ALL: [FilterKind; 14] = [
        FilterKind::Rsi,
        FilterKind::TrendEma,
        FilterKind::PriceEma,
        FilterKind::Macd,
        FilterKind::VolumeSpike,
        FilterKind::Bollinger,
        FilterKind::Stochastic,
        FilterKind::Atr,
        FilterKind::Adx,
        FilterKind::Sr,
        FilterKind::Momentum,
        FilterKind::MarketStructure,
        FilterKind::TimeFilter,
        FilterKind::MtfConfirmation,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FilterKind::Rsi => "rsi",
            FilterKind::TrendEma => "trend_ema",
            FilterKind::PriceEma => "price_ema",
            FilterKind::Macd => "macd",
            FilterKind::VolumeSpike => "volume_spike",
            FilterKind::Bollinger => "bollinger",
            FilterKind::Stochastic => "stochastic",
            FilterKind::Atr => "atr",
            FilterKind::Adx => "adx",
            FilterKind::Sr => "sr",
            FilterKind::Momentum => "momentum",
            FilterKind::MarketStructure => "market_structure",
            FilterKind::TimeFilter => "time_filter",
            FilterKind::MtfConfirmation => "mtf_confirmation",
        }
    }

    pub fn weight(self, p: &ParameterSet) -> f64 {
        match self {
            FilterKind::Rsi => p.rsi_weight,
            FilterKind::TrendEma => p.trend_ema_weight,
            FilterKind::PriceEma => p.price_ema_weight,
            FilterKind::Macd => p.macd_weight,
            FilterKind::VolumeSpike => p.volume_spike_weight,
            FilterKind::Bollinger => p.bollinger_weight,
            FilterKind::Stochastic => p.stochastic_weight,
            FilterKind::Atr => p.atr_weight,
            FilterKind::Adx => p.adx_weight,
            FilterKind::Sr => p.sr_weight,
            FilterKind::Momentum => p.momentum_weight,
            FilterKind::MarketStructure => p.market_structure_weight,
            FilterKind::TimeFilter => p.time_filter_weight,
            FilterKind::MtfConfirmation => p.mtf_confirmation_weight,
        }
    }

    /// Filter signal in `[-1, 1]`, or `None` when an input is not available on this row.
    pub fn evaluate(self, row: &IndicatorRow, trend_row: Option<&IndicatorRow>, p: &ParameterSet) -> Option<f64> {
        match self {
            FilterKind::Rsi => {
                let rsi = row.rsi.ready()?;
                Some(if rsi < p.rsi_oversold {
                    1.0
                } else if rsi < p.rsi_oversold + RSI_NEAR_BAND {
                    0.5
                } else if rsi > p.rsi_overbought {
                    -1.0
                } else if rsi > p.rsi_overbought - RSI_NEAR_BAND {
                    -0.5
                } else {
                    0.0
                })
            }
            FilterKind::TrendEma => Some(trend_signal(row.trend.ready()?, 1.0)),
            FilterKind::PriceEma => {
                let ema = row.entry_ema.ready()?;
                if ema == 0.0 {
                    return Some(0.0);
                }
                let distance = (row.close - ema) / ema;
                Some(if distance < -PRICE_EMA_FAR {
                    0.8
                } else if distance < 0.0 {
                    0.3
                } else if distance > PRICE_EMA_FAR {
                    -0.8
                } else if distance > 0.0 {
                    -0.3
                } else {
                    0.0
                })
            }
            FilterKind::Macd => {
                if p.macd_flip_only > 0.5 {
                    let flip = row.macd_flip.ready()?;
                    Some(if flip.bullish {
                        1.0
                    } else if flip.bearish {
                        -1.0
                    } else {
                        0.0
                    })
                } else {
                    let hist = row.macd_histogram.ready()?;
                    let thr = p.macd_histogram_threshold;
                    Some(if hist > thr {
                        (hist / MACD_HISTOGRAM_SCALE).min(1.0)
                    } else if hist < -thr {
                        (hist / MACD_HISTOGRAM_SCALE).max(-1.0)
                    } else {
                        0.0
                    })
                }
            }
            FilterKind::VolumeSpike => {
                if !row.volume_spike.ready()? {
                    return Some(0.0);
                }
                if row.open == 0.0 {
                    return Some(0.0);
                }
                let candle_return = (row.close - row.open) / row.open;
                Some(if candle_return > 0.0 { 0.5 } else { -0.5 })
            }
            FilterKind::Bollinger => {
                let bands = row.bollinger.ready()?;
                let price = row.close;
                if p.bollinger_squeeze_enabled > 0.5 {
                    if !row.bollinger_squeeze.ready()? {
                        return Some(0.0);
                    }
                    Some(if price <= bands.lower {
                        1.0
                    } else if price >= bands.upper {
                        -1.0
                    } else {
                        0.0
                    })
                } else {
                    Some(if price <= bands.lower {
                        0.8
                    } else if price >= bands.upper {
                        -0.8
                    } else {
                        0.0
                    })
                }
            }
            FilterKind::Stochastic => {
                let k = row.stoch_k.ready()?;
                Some(if k < p.stochastic_oversold {
                    1.0
                } else if k > p.stochastic_overbought {
                    -1.0
                } else {
                    0.0
                })
            }
            FilterKind::Atr => {
                let atr = row.atr.ready()?;
                Some(if atr > p.atr_min_threshold { 0.2 } else { -0.2 })
            }
            FilterKind::Adx => {
                let adx = row.adx.ready()?;
                if adx > p.adx_threshold {
                    Some(trend_signal(row.trend_or_neutral(), 0.5))
                } else {
                    Some(0.0)
                }
            }
            FilterKind::Sr => {
                let sr = row.support_resistance.ready()?;
                Some(if sr.near_support {
                    0.7
                } else if sr.near_resistance {
                    -0.7
                } else {
                    0.0
                })
            }
            FilterKind::Momentum => {
                let m = row.momentum.ready()?;
                let thr = p.momentum_threshold;
                Some(if thr <= 0.0 {
                    if m > 0.0 {
                        1.0
                    } else if m < 0.0 {
                        -1.0
                    } else {
                        0.0
                    }
                } else if m > thr {
                    (m / (thr * 2.0)).min(1.0)
                } else if m < -thr {
                    (m / (thr * 2.0)).max(-1.0)
                } else {
                    0.0
                })
            }
            FilterKind::MarketStructure => Some(trend_signal(row.market_structure.ready()?, 0.8)),
            FilterKind::TimeFilter => {
                let hour = row.open_time.hour() as f64;
                let (start, end) = (p.trade_start_hour, p.trade_end_hour);
                let in_window = if start <= end {
                    start <= hour && hour <= end
                } else {
                    hour >= start || hour <= end
                };
                Some(if in_window { 0.1 } else { -0.5 })
            }
            FilterKind::MtfConfirmation => {
                let higher = trend_row?;
                let entry_trend = row.trend_or_neutral();
                if entry_trend == higher.trend_or_neutral() {
                    Some(trend_signal(entry_trend, 0.6))
                } else {
                    Some(0.0)
                }
            }
        }
    }

    /// The reading this filter depends on is switched off on this row.
    pub(crate) fn reading_disabled(self, row: &IndicatorRow, p: &ParameterSet) -> bool {
        match self {
            FilterKind::Rsi => row.rsi.is_disabled(),
            FilterKind::TrendEma => row.trend.is_disabled(),
            FilterKind::PriceEma => row.entry_ema.is_disabled(),
            FilterKind::Macd if p.macd_flip_only > 0.5 => row.macd_flip.is_disabled(),
            FilterKind::Macd => row.macd_histogram.is_disabled(),
            FilterKind::VolumeSpike => row.volume_spike.is_disabled(),
            FilterKind::Bollinger => {
                row.bollinger.is_disabled()
                    || (p.bollinger_squeeze_enabled > 0.5 && row.bollinger_squeeze.is_disabled())
            }
            FilterKind::Stochastic => row.stoch_k.is_disabled(),
            FilterKind::Atr => row.atr.is_disabled(),
            FilterKind::Adx => row.adx.is_disabled(),
            FilterKind::Sr => row.support_resistance.is_disabled(),
            FilterKind::Momentum => row.momentum.is_disabled(),
            FilterKind::MarketStructure => row.market_structure.is_disabled(),
            FilterKind::TimeFilter | FilterKind::MtfConfirmation => false,
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn trend_signal(trend: Trend, magnitude: f64) -> f64 {
    match trend {
        Trend::Bullish => magnitude,
        Trend::Bearish => -magnitude,
        Trend::Neutral => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::fixtures::all_disabled;
    use crate::row::{BollingerBands, MacdFlip, Reading, SupportResistance};
    use chrono::{TimeZone, Utc};
    use common::Candle;

    fn row_at(hour: u32, close: f64) -> IndicatorRow {
        IndicatorRow::bare(&Candle {
            open_time: Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap(),
            open: 100.0,
            high: close.max(100.0),
            low: close.min(100.0),
            close,
            volume: 1.0,
        })
    }

    #[test]
    fn rsi_bands() {
        let p = all_disabled();
        let mut row = row_at(0, 100.0);
        for (rsi, expected) in [(25.0, 1.0), (35.0, 0.5), (50.0, 0.0), (65.0, -0.5), (75.0, -1.0)] {
            row.rsi = Reading::Ready(rsi);
            assert_eq!(FilterKind::Rsi.evaluate(&row, None, &p), Some(expected), "rsi {rsi}");
        }
    }

    #[test]
    fn warming_reading_is_unavailable() {
        let p = all_disabled();
        let mut row = row_at(0, 100.0);
        row.rsi = Reading::Warming;
        assert_eq!(FilterKind::Rsi.evaluate(&row, None, &p), None);
    }

    #[test]
    fn price_ema_distance_bands() {
        let p = all_disabled();
        let mut row = row_at(0, 99.0);
        row.entry_ema = Reading::Ready(100.0);
        assert_eq!(FilterKind::PriceEma.evaluate(&row, None, &p), Some(0.8));
        row.close = 99.9;
        assert_eq!(FilterKind::PriceEma.evaluate(&row, None, &p), Some(0.3));
        row.close = 100.1;
        assert_eq!(FilterKind::PriceEma.evaluate(&row, None, &p), Some(-0.3));
        row.close = 101.0;
        assert_eq!(FilterKind::PriceEma.evaluate(&row, None, &p), Some(-0.8));
        row.entry_ema = Reading::Ready(0.0);
        assert_eq!(FilterKind::PriceEma.evaluate(&row, None, &p), Some(0.0));
    }

    #[test]
    fn macd_flip_only_and_histogram_modes() {
        let mut p = all_disabled();
        let mut row = row_at(0, 100.0);
        row.macd_flip = Reading::Ready(MacdFlip { bullish: true, bearish: false });
        row.macd_histogram = Reading::Ready(0.001);
        assert_eq!(FilterKind::Macd.evaluate(&row, None, &p), Some(1.0));

        p.macd_flip_only = 0.0;
        assert_eq!(FilterKind::Macd.evaluate(&row, None, &p), Some(0.5));
        row.macd_histogram = Reading::Ready(-0.01);
        assert_eq!(FilterKind::Macd.evaluate(&row, None, &p), Some(-1.0));
        p.macd_histogram_threshold = 0.02;
        assert_eq!(FilterKind::Macd.evaluate(&row, None, &p), Some(0.0));
    }

    #[test]
    fn volume_spike_follows_candle_direction() {
        let p = all_disabled();
        let mut row = row_at(0, 101.0);
        row.volume_spike = Reading::Ready(true);
        assert_eq!(FilterKind::VolumeSpike.evaluate(&row, None, &p), Some(0.5));
        row.close = 99.0;
        assert_eq!(FilterKind::VolumeSpike.evaluate(&row, None, &p), Some(-0.5));
        row.volume_spike = Reading::Ready(false);
        assert_eq!(FilterKind::VolumeSpike.evaluate(&row, None, &p), Some(0.0));
    }

    #[test]
    fn bollinger_plain_and_squeeze_modes() {
        let mut p = all_disabled();
        let mut row = row_at(0, 95.0);
        row.bollinger = Reading::Ready(BollingerBands { upper: 105.0, lower: 95.0 });
        assert_eq!(FilterKind::Bollinger.evaluate(&row, None, &p), Some(0.8));

        p.bollinger_squeeze_enabled = 1.0;
        row.bollinger_squeeze = Reading::Ready(false);
        assert_eq!(FilterKind::Bollinger.evaluate(&row, None, &p), Some(0.0));
        row.bollinger_squeeze = Reading::Ready(true);
        assert_eq!(FilterKind::Bollinger.evaluate(&row, None, &p), Some(1.0));
        row.close = 106.0;
        assert_eq!(FilterKind::Bollinger.evaluate(&row, None, &p), Some(-1.0));
    }

    #[test]
    fn adx_uses_row_trend_above_threshold() {
        let p = all_disabled();
        let mut row = row_at(0, 100.0);
        row.adx = Reading::Ready(30.0);
        row.trend = Reading::Ready(Trend::Bearish);
        assert_eq!(FilterKind::Adx.evaluate(&row, None, &p), Some(-0.5));
        row.adx = Reading::Ready(20.0);
        assert_eq!(FilterKind::Adx.evaluate(&row, None, &p), Some(0.0));
    }

    #[test]
    fn sr_prefers_support() {
        let p = all_disabled();
        let mut row = row_at(0, 100.0);
        row.support_resistance = Reading::Ready(SupportResistance {
            support: 100.0,
            resistance: 100.05,
            near_support: true,
            near_resistance: true,
        });
        assert_eq!(FilterKind::Sr.evaluate(&row, None, &p), Some(0.7));
    }

    #[test]
    fn momentum_scales_and_saturates() {
        let p = all_disabled(); // threshold 0.005
        let mut row = row_at(0, 100.0);
        row.momentum = Reading::Ready(0.0075);
        assert!((FilterKind::Momentum.evaluate(&row, None, &p).unwrap() - 0.75).abs() < 1e-12);
        row.momentum = Reading::Ready(-0.05);
        assert_eq!(FilterKind::Momentum.evaluate(&row, None, &p), Some(-1.0));
        row.momentum = Reading::Ready(0.004);
        assert_eq!(FilterKind::Momentum.evaluate(&row, None, &p), Some(0.0));
    }

    #[test]
    fn time_window_wraps_overnight() {
        let mut p = all_disabled();
        p.trade_start_hour = 22.0;
        p.trade_end_hour = 3.0;
        assert_eq!(FilterKind::TimeFilter.evaluate(&row_at(23, 1.0), None, &p), Some(0.1));
        assert_eq!(FilterKind::TimeFilter.evaluate(&row_at(2, 1.0), None, &p), Some(0.1));
        assert_eq!(FilterKind::TimeFilter.evaluate(&row_at(12, 1.0), None, &p), Some(-0.5));

        p.trade_start_hour = 8.0;
        p.trade_end_hour = 16.0;
        assert_eq!(FilterKind::TimeFilter.evaluate(&row_at(16, 1.0), None, &p), Some(0.1));
        assert_eq!(FilterKind::TimeFilter.evaluate(&row_at(17, 1.0), None, &p), Some(-0.5));
    }

    #[test]
    fn mtf_requires_matching_non_neutral_trends() {
        let p = all_disabled();
        let mut row = row_at(0, 100.0);
        let mut higher = row_at(0, 100.0);
        assert_eq!(FilterKind::MtfConfirmation.evaluate(&row, None, &p), None);

        row.trend = Reading::Ready(Trend::Bullish);
        higher.trend = Reading::Ready(Trend::Bullish);
        assert_eq!(FilterKind::MtfConfirmation.evaluate(&row, Some(&higher), &p), Some(0.6));
        higher.trend = Reading::Ready(Trend::Bearish);
        assert_eq!(FilterKind::MtfConfirmation.evaluate(&row, Some(&higher), &p), Some(0.0));
        row.trend = Reading::Ready(Trend::Neutral);
        higher.trend = Reading::Ready(Trend::Neutral);
        assert_eq!(FilterKind::MtfConfirmation.evaluate(&row, Some(&higher), &p), Some(0.0));
    }
}
