use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

/// Candle interval supported by the strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "2h")]
    H2,
    #[serde(rename = "4h")]
    H4,
}

impl Timeframe {
    pub fn minutes(self) -> i64 {
        match self {
            Timeframe::M1 => 1,
            Timeframe::M5 => 5,
            Timeframe::M15 => 15,
            Timeframe::M30 => 30,
            Timeframe::H1 => 60,
            Timeframe::H2 => 120,
            Timeframe::H4 => 240,
        }
    }

    pub fn duration(self) -> Duration {
        Duration::minutes(self.minutes())
    }

    /// Exchange interval code, e.g. `"15m"`.
    pub fn as_str(self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::H2 => "2h",
            Timeframe::H4 => "4h",
        }
    }

    /// Start of the bucket containing `t`, aligned to the Unix epoch like exchange klines.
    pub fn bucket_start(self, t: DateTime<Utc>) -> DateTime<Utc> {
        let step = self.minutes() * 60_000;
        let ms = t.timestamp_millis();
        let floored = ms - ms.rem_euclid(step);
        Utc.timestamp_millis_opt(floored).single().unwrap_or(t)
    }

    /// Close time of a candle that opened at `open_time`.
    pub fn close_time(self, open_time: DateTime<Utc>) -> DateTime<Utc> {
        open_time + self.duration()
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "1m" => Timeframe::M1,
            "5m" => Timeframe::M5,
            "15m" => Timeframe::M15,
            "30m" => Timeframe::M30,
            "1h" => Timeframe::H1,
            "2h" => Timeframe::H2,
            "4h" => Timeframe::H4,
            other => return Err(Error::Config(format!("unsupported timeframe '{other}'"))),
        })
    }
}

/// Entry/trend timeframe pair selected by a parameter set's `timeframe_combo` index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeframeCombo {
    pub entry: Timeframe,
    pub trend: Timeframe,
}

/// Indexed by `timeframe_combo`. Parameter files produced by the optimizer refer to this order.
pub const TIMEFRAME_COMBOS: [TimeframeCombo; 5] = [
    TimeframeCombo { entry: Timeframe::M5, trend: Timeframe::M15 },
    TimeframeCombo { entry: Timeframe::M5, trend: Timeframe::M30 },
    TimeframeCombo { entry: Timeframe::M15, trend: Timeframe::H1 },
    TimeframeCombo { entry: Timeframe::M30, trend: Timeframe::H2 },
    TimeframeCombo { entry: Timeframe::H1, trend: Timeframe::H4 },
];

impl TimeframeCombo {
    pub fn from_index(index: usize) -> Option<Self> {
        TIMEFRAME_COMBOS.get(index).copied()
    }
}

impl fmt::Display for TimeframeCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.entry, self.trend)
    }
}
