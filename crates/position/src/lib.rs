//! Per-coin position lifecycle: pending signal, entry sizing, bracket prices,
//! exit detection and closed-trade accounting.

pub mod exit;
pub mod sizing;
pub mod slot;
pub mod trade;

pub use exit::{BracketLeg, ExitDecision, ExitObservation, ExitRules};
pub use sizing::{size_quantity, Brackets};
pub use slot::{CoinSlot, PendingSignal, Position, SlotError, SlotState};
pub use trade::{close_trade, pnl_pct, ExitFill};
