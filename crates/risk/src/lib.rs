//! Entry gating: account-level checks shared by live and backtest, plus the
//! per-day trade limits the backtest enforces.

pub mod gate;
pub mod limits;

pub use gate::{AccountGate, Rejection};
pub use limits::DailyRiskLimits;
