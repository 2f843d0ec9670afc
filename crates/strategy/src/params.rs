use std::path::Path;

use serde::{Deserialize, Serialize};

use common::{Error, Result, TimeframeCombo};

/// Weights at or below this value disable their filter and its indicator.
pub const ACTIVATION_EPSILON: f64 = 0.01;

/// Per-coin strategy parameters, as written by the optimizer.
///
/// Integer-like knobs (periods, lookbacks) arrive as floats and are rounded
/// with [`period`] before use. Filter weights default to `0.0` (disabled);
/// the remaining knobs are required and a missing one fails the load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    // Exits
    pub tp_percent: f64,
    pub sl_percent: f64,
    #[serde(default)]
    pub use_trailing: f64,
    #[serde(default = "default_trailing_activation")]
    pub trailing_activation: f64,
    #[serde(default = "default_trailing_distance")]
    pub trailing_distance: f64,

    // Entry
    pub entry_threshold: f64,
    /// Threshold for shorts when it differs from `entry_threshold`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_threshold_short: Option<f64>,

    // Filter weights
    #[serde(default)]
    pub rsi_weight: f64,
    #[serde(default)]
    pub trend_ema_weight: f64,
    #[serde(default)]
    pub price_ema_weight: f64,
    #[serde(default)]
    pub macd_weight: f64,
    #[serde(default)]
    pub volume_spike_weight: f64,
    #[serde(default)]
    pub bollinger_weight: f64,
    #[serde(default)]
    pub stochastic_weight: f64,
    #[serde(default)]
    pub atr_weight: f64,
    #[serde(default)]
    pub adx_weight: f64,
    #[serde(default)]
    pub sr_weight: f64,
    #[serde(default)]
    pub momentum_weight: f64,
    #[serde(default)]
    pub market_structure_weight: f64,
    #[serde(default)]
    pub time_filter_weight: f64,
    #[serde(default)]
    pub mtf_confirmation_weight: f64,

    // RSI
    pub rsi_period: f64,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,

    // EMA / trend
    pub trend_fast_ema: f64,
    pub trend_slow_ema: f64,
    pub entry_ema_period: f64,

    // MACD
    #[serde(default)]
    pub macd_flip_only: f64,
    pub macd_fast: f64,
    pub macd_slow: f64,
    pub macd_signal: f64,
    #[serde(default)]
    pub macd_histogram_threshold: f64,

    // Volume
    pub volume_ma_period: f64,
    pub volume_spike_multiplier: f64,

    // Bollinger
    pub bollinger_period: f64,
    pub bollinger_std: f64,
    #[serde(default)]
    pub bollinger_squeeze_enabled: f64,
    #[serde(default = "default_squeeze_length")]
    pub bollinger_squeeze_length: f64,

    // Stochastic
    pub stochastic_k: f64,
    #[serde(default = "default_stochastic_d")]
    pub stochastic_d: f64,
    pub stochastic_overbought: f64,
    pub stochastic_oversold: f64,

    // ATR
    pub atr_period: f64,
    pub atr_min_threshold: f64,
    #[serde(default = "default_atr_stop_multiplier")]
    pub atr_stop_multiplier: f64,

    // ADX
    pub adx_period: f64,
    pub adx_threshold: f64,

    // Support / resistance
    pub sr_lookback: f64,
    pub sr_touch_distance: f64,

    // Momentum
    pub momentum_period: f64,
    pub momentum_threshold: f64,

    // Market structure
    pub structure_lookback: f64,

    // Risk caps (backtest)
    #[serde(default = "default_max_daily_trades")]
    pub max_daily_trades: f64,
    #[serde(default = "default_max_consecutive_losses")]
    pub max_consecutive_losses: f64,
    #[serde(default = "default_daily_loss_limit")]
    pub daily_loss_limit: f64,

    // Trading hours (UTC, inclusive)
    #[serde(default)]
    pub trade_start_hour: f64,
    #[serde(default = "default_end_hour")]
    pub trade_end_hour: f64,

    pub timeframe_combo: f64,
}

fn default_trailing_activation() -> f64 {
    0.3
}
fn default_trailing_distance() -> f64 {
    0.0015
}
fn default_squeeze_length() -> f64 {
    10.0
}
fn default_stochastic_d() -> f64 {
    3.0
}
fn default_atr_stop_multiplier() -> f64 {
    1.5
}
fn default_max_daily_trades() -> f64 {
    20.0
}
fn default_max_consecutive_losses() -> f64 {
    5.0
}
fn default_daily_loss_limit() -> f64 {
    0.05
}
fn default_end_hour() -> f64 {
    23.0
}

/// Round a float-valued period to the nearest integer, ties to even. Never below 1.
pub fn period(value: f64) -> usize {
    let rounded = value.round_ties_even();
    if rounded.is_finite() && rounded >= 1.0 {
        rounded as usize
    } else {
        1
    }
}

/// True when a weight switches its filter on.
pub fn is_active(weight: f64) -> bool {
    weight > ACTIVATION_EPSILON
}

/// Parameter file layout: `{"parameters": {...}, ...metadata}`.
#[derive(Debug, Deserialize)]
struct ParameterFile {
    parameters: ParameterSet,
}

impl ParameterSet {
    /// Load and validate a parameter file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read parameters at '{}': {e}", path.display()))
        })?;
        Self::from_json(&content).map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let file: ParameterFile = serde_json::from_str(content)
            .map_err(|e| Error::Config(format!("invalid parameter file: {e}")))?;
        file.parameters.validate()?;
        Ok(file.parameters)
    }

    /// Reject values that would make indicators or exits meaningless.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("tp_percent", self.tp_percent),
            ("sl_percent", self.sl_percent),
            ("bollinger_std", self.bollinger_std),
            ("volume_spike_multiplier", self.volume_spike_multiplier),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::Config(format!("{name} must be positive, got {value}")));
            }
        }

        let periods = [
            ("rsi_period", self.rsi_period),
            ("trend_fast_ema", self.trend_fast_ema),
            ("trend_slow_ema", self.trend_slow_ema),
            ("entry_ema_period", self.entry_ema_period),
            ("macd_fast", self.macd_fast),
            ("macd_slow", self.macd_slow),
            ("macd_signal", self.macd_signal),
            ("volume_ma_period", self.volume_ma_period),
            ("bollinger_period", self.bollinger_period),
            ("bollinger_squeeze_length", self.bollinger_squeeze_length),
            ("stochastic_k", self.stochastic_k),
            ("atr_period", self.atr_period),
            ("adx_period", self.adx_period),
            ("sr_lookback", self.sr_lookback),
            ("momentum_period", self.momentum_period),
            ("structure_lookback", self.structure_lookback),
        ];
        for (name, value) in periods {
            if !value.is_finite() || value.round_ties_even() < 1.0 {
                return Err(Error::Config(format!("{name} must round to at least 1, got {value}")));
            }
        }

        if !self.entry_threshold.is_finite() || self.entry_threshold < 0.0 {
            return Err(Error::Config(format!(
                "entry_threshold must be non-negative, got {}",
                self.entry_threshold
            )));
        }
        if let Some(short) = self.entry_threshold_short {
            if !short.is_finite() || short < 0.0 {
                return Err(Error::Config(format!(
                    "entry_threshold_short must be non-negative, got {short}"
                )));
            }
        }
        for (name, hour) in [
            ("trade_start_hour", self.trade_start_hour),
            ("trade_end_hour", self.trade_end_hour),
        ] {
            if !(0.0..24.0).contains(&hour) {
                return Err(Error::Config(format!("{name} must be within 0..24, got {hour}")));
            }
        }
        if self.combo().is_none() {
            return Err(Error::Config(format!(
                "timeframe_combo {} does not name a known timeframe pair",
                self.timeframe_combo
            )));
        }
        Ok(())
    }

    pub fn combo(&self) -> Option<TimeframeCombo> {
        let idx = self.timeframe_combo.round_ties_even();
        if idx.is_finite() && idx >= 0.0 {
            TimeframeCombo::from_index(idx as usize)
        } else {
            None
        }
    }

    /// The validated timeframe pair. Falls back to the first combo only for unvalidated sets.
    pub fn timeframes(&self) -> TimeframeCombo {
        self.combo().unwrap_or(common::TIMEFRAME_COMBOS[0])
    }

    pub fn long_threshold(&self) -> f64 {
        self.entry_threshold
    }

    pub fn short_threshold(&self) -> f64 {
        self.entry_threshold_short.unwrap_or(self.entry_threshold)
    }

    pub fn trailing_enabled(&self) -> bool {
        self.use_trailing > 0.5
    }

    /// Logical relationships the optimizer requires of a candidate.
    pub fn constraint_violation(&self) -> Option<&'static str> {
        if self.tp_percent <= self.sl_percent {
            return Some("tp_percent must exceed sl_percent");
        }
        if self.rsi_oversold >= self.rsi_overbought {
            return Some("rsi_oversold must be below rsi_overbought");
        }
        if self.trend_fast_ema >= self.trend_slow_ema {
            return Some("trend_fast_ema must be below trend_slow_ema");
        }
        None
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::ParameterSet;

    /// Balanced parameters with every filter weight set to zero.
    pub fn all_disabled() -> ParameterSet {
        ParameterSet {
            tp_percent: 0.01,
            sl_percent: 0.005,
            use_trailing: 0.0,
            trailing_activation: 0.3,
            trailing_distance: 0.0015,
            entry_threshold: 0.5,
            entry_threshold_short: None,
            rsi_weight: 0.0,
            trend_ema_weight: 0.0,
            price_ema_weight: 0.0,
            macd_weight: 0.0,
            volume_spike_weight: 0.0,
            bollinger_weight: 0.0,
            stochastic_weight: 0.0,
            atr_weight: 0.0,
            adx_weight: 0.0,
            sr_weight: 0.0,
            momentum_weight: 0.0,
            market_structure_weight: 0.0,
            time_filter_weight: 0.0,
            mtf_confirmation_weight: 0.0,
            rsi_period: 14.0,
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            trend_fast_ema: 12.0,
            trend_slow_ema: 50.0,
            entry_ema_period: 9.0,
            macd_flip_only: 1.0,
            macd_fast: 12.0,
            macd_slow: 26.0,
            macd_signal: 9.0,
            macd_histogram_threshold: 0.0,
            volume_ma_period: 20.0,
            volume_spike_multiplier: 1.5,
            bollinger_period: 20.0,
            bollinger_std: 2.0,
            bollinger_squeeze_enabled: 0.0,
            bollinger_squeeze_length: 10.0,
            stochastic_k: 14.0,
            stochastic_d: 3.0,
            stochastic_overbought: 80.0,
            stochastic_oversold: 20.0,
            atr_period: 14.0,
            atr_min_threshold: 0.001,
            atr_stop_multiplier: 1.5,
            adx_period: 14.0,
            adx_threshold: 25.0,
            sr_lookback: 50.0,
            sr_touch_distance: 0.001,
            momentum_period: 10.0,
            momentum_threshold: 0.005,
            structure_lookback: 10.0,
            max_daily_trades: 20.0,
            max_consecutive_losses: 5.0,
            daily_loss_limit: 0.05,
            trade_start_hour: 0.0,
            trade_end_hour: 23.0,
            timeframe_combo: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "parameters": {
            "tp_percent": 0.01, "sl_percent": 0.005, "entry_threshold": 0.5,
            "rsi_weight": 0.6,
            "rsi_period": 14, "rsi_oversold": 30, "rsi_overbought": 70,
            "trend_fast_ema": 12, "trend_slow_ema": 50, "entry_ema_period": 9,
            "macd_fast": 12, "macd_slow": 26, "macd_signal": 9,
            "volume_ma_period": 20, "volume_spike_multiplier": 1.5,
            "bollinger_period": 20, "bollinger_std": 2.0,
            "stochastic_k": 14, "stochastic_overbought": 80, "stochastic_oversold": 20,
            "atr_period": 14, "atr_min_threshold": 0.001,
            "adx_period": 14, "adx_threshold": 25,
            "sr_lookback": 50, "sr_touch_distance": 0.001,
            "momentum_period": 10, "momentum_threshold": 0.005,
            "structure_lookback": 10,
            "timeframe_combo": 2.4
        },
        "score": 1.23
    }"#;

    #[test]
    fn loads_minimal_file_with_defaults() {
        let p = ParameterSet::from_json(MINIMAL).unwrap();
        assert_eq!(p.rsi_weight, 0.6);
        assert_eq!(p.macd_weight, 0.0);
        assert_eq!(p.trade_end_hour, 23.0);
        assert_eq!(p.timeframes().entry, common::Timeframe::M15);
        assert_eq!(p.short_threshold(), 0.5);
    }

    #[test]
    fn missing_required_field_is_named() {
        let broken = MINIMAL.replace("\"rsi_period\": 14,", "");
        let err = ParameterSet::from_json(&broken).unwrap_err().to_string();
        assert!(err.contains("rsi_period"), "error should name the field: {err}");
    }

    #[test]
    fn unknown_timeframe_combo_is_rejected() {
        let broken = MINIMAL.replace("\"timeframe_combo\": 2.4", "\"timeframe_combo\": 9");
        let err = ParameterSet::from_json(&broken).unwrap_err().to_string();
        assert!(err.contains("timeframe_combo"));
    }

    #[test]
    fn period_rounds_half_to_even() {
        assert_eq!(period(14.4), 14);
        assert_eq!(period(14.6), 15);
        assert_eq!(period(2.5), 2);
        assert_eq!(period(3.5), 4);
        assert_eq!(period(0.2), 1);
    }

    #[test]
    fn activation_is_strict() {
        assert!(!is_active(0.01));
        assert!(is_active(0.010_001));
    }

    #[test]
    fn constraint_violation_detects_inverted_exits() {
        let mut p = fixtures::all_disabled();
        assert!(p.constraint_violation().is_none());
        p.sl_percent = 0.02;
        assert!(p.constraint_violation().is_some());
    }
}
