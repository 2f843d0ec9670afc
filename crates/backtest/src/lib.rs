//! Offline replay of the strategy over historical candles.
//!
//! [`BacktestRunner`] drives the same scorer, slot and exit rules as the live trader,
//! one completed row per cycle, with a [`CostModel`] for fills. [`evaluate`] runs a set
//! of monthly 1-minute segments and scores the result for parameter search.

pub mod cost;
pub mod data;
pub mod error;
pub mod metrics;
pub mod resample;
pub mod runner;

pub use cost::CostModel;
pub use data::{load_klines, load_segments};
pub use error::BacktestError;
pub use metrics::{evaluate, score, Evaluation, FilterUsage, Metrics, REJECTED_SCORE};
pub use resample::resample;
pub use runner::{BacktestConfig, BacktestResult, BacktestRunner, BacktestTrade};
