use chrono::{DateTime, Utc};

use common::{ExitType, Side, TradeRecord};

use crate::slot::Position;

/// Side-aware price move in percent: 100 → 105 is `5.0` long and `-5.0` short.
pub fn pnl_pct(side: Side, entry: f64, exit: f64) -> f64 {
    if entry == 0.0 {
        return 0.0;
    }
    side.sign() * (exit - entry) / entry * 100.0
}

/// How a position left the market.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitFill {
    pub exit_type: ExitType,
    /// Fill price including any simulated slippage.
    pub price: f64,
    /// Reference price before slippage.
    pub base_price: f64,
    pub time: DateTime<Utc>,
}

impl ExitFill {
    pub fn at(exit_type: ExitType, price: f64, time: DateTime<Utc>) -> Self {
        Self { exit_type, price, base_price: price, time }
    }
}

/// Close `position` into an immutable trade record.
///
/// Fees are charged on entry and exit notional at `fee_rate`; `pnl_value` is the
/// gross move on entry notional minus those fees.
pub fn close_trade(position: &Position, fill: ExitFill, fee_rate: f64) -> TradeRecord {
    let qty = position.quantity;
    let entry_notional = position.entry_price * qty;
    let exit_notional = fill.price * qty;
    let fees = (entry_notional + exit_notional) * fee_rate;

    let pct = pnl_pct(position.side, position.entry_price, fill.price);
    let gross = pct / 100.0 * entry_notional;
    let slippage =
        ((position.entry_price - position.base_entry_price).abs() + (fill.price - fill.base_price).abs()) * qty;

    TradeRecord {
        coin: position.coin.clone(),
        side: position.side,
        entry_time: position.entry_time,
        exit_time: fill.time,
        entry_price: position.entry_price,
        exit_price: fill.price,
        quantity: qty,
        pnl_pct: pct,
        pnl_value: gross - fees,
        exit_type: fill.exit_type,
        fees,
        slippage,
    }
}
