//! Indicator engine and weighted signal scorer.
//!
//! Candles go in through [`SignalFrame::build`]; [`Scorer`] turns a frame into a
//! [`Signal`]. Nothing here performs I/O, so the live poller and the backtest runner
//! share exactly the same code path.

pub mod calculator;
pub mod filters;
pub mod frame;
pub mod indicators;
pub mod params;
pub mod row;
pub mod scorer;

pub use calculator::IndicatorEngine;
pub use filters::FilterKind;
pub use frame::{align_forward_fill, SignalFrame};
pub use params::{is_active, period, ParameterSet, ACTIVATION_EPSILON};
pub use row::{IndicatorRow, Reading, Trend};
pub use scorer::{FilterContribution, Scorer, Signal};
