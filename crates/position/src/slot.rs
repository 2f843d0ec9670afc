use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use common::Side;
use strategy::{FilterContribution, Signal};

use crate::sizing::Brackets;

/// A directional decision held for one cycle before execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingSignal {
    pub side: Side,
    pub strength: f64,
    /// Open time of the row the signal was scored on.
    pub signal_time: DateTime<Utc>,
    pub contributions: Vec<FilterContribution>,
}

impl PendingSignal {
    /// `None` for a non-directional signal.
    pub fn from_signal(signal: &Signal, signal_time: DateTime<Utc>) -> Option<Self> {
        let side = signal.direction.side()?;
        Some(Self {
            side,
            strength: signal.strength,
            signal_time,
            contributions: signal.contributions.clone(),
        })
    }
}

/// An open position and its bracket orders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    pub coin: String,
    pub side: Side,
    /// Fill price including any simulated slippage.
    pub entry_price: f64,
    /// Market price before slippage.
    pub base_entry_price: f64,
    pub quantity: f64,
    pub entry_time: DateTime<Utc>,
    pub tp_price: f64,
    pub sl_price: f64,
    /// Best prices seen since entry; only ever move in the favourable direction.
    pub highest_price: f64,
    pub lowest_price: f64,
    /// Profit was at or above the trailing activation level at the last check.
    pub trailing_active: bool,
    pub entry_order_id: Option<String>,
    pub tp_order_id: Option<String>,
    pub sl_order_id: Option<String>,
    pub contributions: Vec<FilterContribution>,
}

impl Position {
    pub fn new(
        coin: impl Into<String>,
        side: Side,
        entry_price: f64,
        quantity: f64,
        entry_time: DateTime<Utc>,
        brackets: Brackets,
    ) -> Self {
        Self {
            coin: coin.into(),
            side,
            entry_price,
            base_entry_price: entry_price,
            quantity,
            entry_time,
            tp_price: brackets.tp_price,
            sl_price: brackets.sl_price,
            highest_price: entry_price,
            lowest_price: entry_price,
            trailing_active: false,
            entry_order_id: None,
            tp_order_id: None,
            sl_order_id: None,
            contributions: Vec::new(),
        }
    }

    pub fn notional(&self) -> f64 {
        self.entry_price * self.quantity
    }

    /// Signed fractional move from entry to `price` (positive is profit).
    pub fn profit_at(&self, price: f64) -> f64 {
        if self.entry_price == 0.0 {
            return 0.0;
        }
        self.side.sign() * (price - self.entry_price) / self.entry_price
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SlotState {
    Idle,
    PendingEntry,
    Open,
}

#[derive(Debug, Error, PartialEq)]
pub enum SlotError {
    #[error("{0} already has an open position")]
    AlreadyOpen(String),
    #[error("position coin {got} does not match slot {expected}")]
    WrongCoin { expected: String, got: String },
}

/// Lifecycle state for one coin: at most one pending signal and at most one position.
#[derive(Debug, Clone, Default)]
pub struct CoinSlot {
    coin: String,
    pending: Option<PendingSignal>,
    position: Option<Position>,
}

impl CoinSlot {
    pub fn new(coin: impl Into<String>) -> Self {
        Self { coin: coin.into(), pending: None, position: None }
    }

    pub fn coin(&self) -> &str {
        &self.coin
    }

    pub fn state(&self) -> SlotState {
        match (&self.position, &self.pending) {
            (Some(_), _) => SlotState::Open,
            (None, Some(_)) => SlotState::PendingEntry,
            (None, None) => SlotState::Idle,
        }
    }

    pub fn pending(&self) -> Option<&PendingSignal> {
        self.pending.as_ref()
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn position_mut(&mut self) -> Option<&mut Position> {
        self.position.as_mut()
    }

    pub fn has_position(&self) -> bool {
        self.position.is_some()
    }

    /// Store a signal for next-cycle execution. Only accepted while idle.
    pub fn offer(&mut self, signal: PendingSignal) -> bool {
        if self.state() != SlotState::Idle {
            debug!(coin = %self.coin, side = %signal.side, state = ?self.state(), "signal ignored, slot busy");
            return false;
        }
        self.pending = Some(signal);
        true
    }

    /// Consume the pending signal. It is gone whether or not the entry succeeds.
    pub fn take_pending(&mut self) -> Option<PendingSignal> {
        if self.position.is_some() {
            return None;
        }
        self.pending.take()
    }

    pub fn open(&mut self, position: Position) -> Result<(), SlotError> {
        if position.coin != self.coin {
            return Err(SlotError::WrongCoin { expected: self.coin.clone(), got: position.coin });
        }
        if self.position.is_some() {
            return Err(SlotError::AlreadyOpen(self.coin.clone()));
        }
        self.pending = None;
        self.position = Some(position);
        Ok(())
    }

    /// Remove the position for closing.
    pub fn close(&mut self) -> Option<Position> {
        self.position.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn pending(side: Side) -> PendingSignal {
        PendingSignal { side, strength: 0.8, signal_time: now(), contributions: Vec::new() }
    }

    fn position(coin: &str) -> Position {
        Position::new(coin, Side::Long, 100.0, 1.0, now(), Brackets { tp_price: 101.0, sl_price: 99.5 })
    }

    #[test]
    fn idle_slot_accepts_one_pending_signal() {
        let mut slot = CoinSlot::new("BTCUSDT");
        assert!(slot.offer(pending(Side::Long)));
        assert!(!slot.offer(pending(Side::Short)));
        assert_eq!(slot.state(), SlotState::PendingEntry);
        assert_eq!(slot.pending().map(|p| p.side), Some(Side::Long));
    }

    #[test]
    fn opening_clears_pending() {
        let mut slot = CoinSlot::new("BTCUSDT");
        slot.offer(pending(Side::Long));
        slot.open(position("BTCUSDT")).unwrap();
        assert!(slot.pending().is_none());
        assert_eq!(slot.state(), SlotState::Open);
    }

    #[test]
    fn open_slot_ignores_signals_and_second_entries() {
        let mut slot = CoinSlot::new("BTCUSDT");
        slot.open(position("BTCUSDT")).unwrap();
        assert!(!slot.offer(pending(Side::Short)));
        assert_eq!(slot.open(position("BTCUSDT")), Err(SlotError::AlreadyOpen("BTCUSDT".into())));
        assert!(slot.take_pending().is_none());
    }

    #[test]
    fn wrong_coin_is_rejected() {
        let mut slot = CoinSlot::new("BTCUSDT");
        assert!(matches!(slot.open(position("ETHUSDT")), Err(SlotError::WrongCoin { .. })));
    }

    #[test]
    fn close_returns_to_idle() {
        let mut slot = CoinSlot::new("BTCUSDT");
        slot.open(position("BTCUSDT")).unwrap();
        let closed = slot.close().unwrap();
        assert_eq!(closed.coin, "BTCUSDT");
        assert_eq!(slot.state(), SlotState::Idle);
    }

    #[test]
    fn short_profit_is_inverted() {
        let mut p = position("BTCUSDT");
        p.side = Side::Short;
        assert!((p.profit_at(95.0) - 0.05).abs() < 1e-12);
    }
}
