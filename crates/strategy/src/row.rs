use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use common::Candle;

/// One indicator value on one row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "state", content = "value", rename_all = "lowercase")]
pub enum Reading<T> {
    /// The governing weight is not active; the indicator was never computed.
    #[default]
    Disabled,
    /// Enabled, but the trailing window is not full yet.
    Warming,
    Ready(T),
}

impl<T: Copy> Reading<T> {
    pub fn ready(&self) -> Option<T> {
        match self {
            Reading::Ready(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self, Reading::Disabled)
    }

    pub fn is_warming(&self) -> bool {
        matches!(self, Reading::Warming)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Reading<U> {
        match self {
            Reading::Disabled => Reading::Disabled,
            Reading::Warming => Reading::Warming,
            Reading::Ready(v) => Reading::Ready(f(v)),
        }
    }
}

impl Reading<f64> {
    /// Wrap a raw series value from an enabled indicator.
    pub fn from_value(value: Option<f64>) -> Self {
        match value {
            Some(v) if v.is_finite() => Reading::Ready(v),
            _ => Reading::Warming,
        }
    }
}

/// Fast-vs-slow EMA trend, also used for market structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Trend {
    Bullish,
    Bearish,
    #[default]
    Neutral,
}

impl Trend {
    /// Strict comparison: equal values are neutral.
    pub fn compare(lhs: f64, rhs: f64) -> Self {
        if lhs > rhs {
            Trend::Bullish
        } else if lhs < rhs {
            Trend::Bearish
        } else {
            Trend::Neutral
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trend::Bullish => write!(f, "BULLISH"),
            Trend::Bearish => write!(f, "BEARISH"),
            Trend::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Sign change of the MACD histogram on this row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MacdFlip {
    pub bullish: bool,
    pub bearish: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerBands {
    pub upper: f64,
    pub lower: f64,
}

/// Rolling support/resistance with proximity flags.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SupportResistance {
    pub support: f64,
    pub resistance: f64,
    pub near_support: bool,
    pub near_resistance: bool,
}

/// A candle plus every indicator reading derived for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorRow {
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,

    pub rsi: Reading<f64>,
    pub ema_fast: Reading<f64>,
    pub ema_slow: Reading<f64>,
    pub trend: Reading<Trend>,
    pub entry_ema: Reading<f64>,
    pub macd_histogram: Reading<f64>,
    pub macd_flip: Reading<MacdFlip>,
    pub volume_ma: Reading<f64>,
    pub volume_spike: Reading<bool>,
    pub bollinger: Reading<BollingerBands>,
    /// Disabled unless squeeze detection is switched on.
    pub bollinger_squeeze: Reading<bool>,
    pub stoch_k: Reading<f64>,
    pub atr: Reading<f64>,
    pub adx: Reading<f64>,
    pub support_resistance: Reading<SupportResistance>,
    pub momentum: Reading<f64>,
    pub market_structure: Reading<Trend>,
}

impl IndicatorRow {
    /// A row with no indicators computed.
    pub fn bare(candle: &Candle) -> Self {
        Self {
            open_time: candle.open_time,
            open: candle.open,
            high: candle.high,
            low: candle.low,
            close: candle.close,
            volume: candle.volume,
            rsi: Reading::Disabled,
            ema_fast: Reading::Disabled,
            ema_slow: Reading::Disabled,
            trend: Reading::Disabled,
            entry_ema: Reading::Disabled,
            macd_histogram: Reading::Disabled,
            macd_flip: Reading::Disabled,
            volume_ma: Reading::Disabled,
            volume_spike: Reading::Disabled,
            bollinger: Reading::Disabled,
            bollinger_squeeze: Reading::Disabled,
            stoch_k: Reading::Disabled,
            atr: Reading::Disabled,
            adx: Reading::Disabled,
            support_resistance: Reading::Disabled,
            momentum: Reading::Disabled,
            market_structure: Reading::Disabled,
        }
    }

    /// Entry-timeframe trend; neutral when not computed or not warm.
    pub fn trend_or_neutral(&self) -> Trend {
        self.trend.ready().unwrap_or_default()
    }

    /// True when no enabled indicator on this row is still warming up.
    pub fn is_warm(&self) -> bool {
        !(self.rsi.is_warming()
            || self.trend.is_warming()
            || self.entry_ema.is_warming()
            || self.macd_histogram.is_warming()
            || self.macd_flip.is_warming()
            || self.volume_spike.is_warming()
            || self.bollinger.is_warming()
            || self.bollinger_squeeze.is_warming()
            || self.stoch_k.is_warming()
            || self.atr.is_warming()
            || self.adx.is_warming()
            || self.support_resistance.is_warming()
            || self.momentum.is_warming()
            || self.market_structure.is_warming())
    }
}
