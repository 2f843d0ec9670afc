use serde::Serialize;

use common::precision::{floor_to_step, truncate_to_tick};
use common::{Side, SymbolFilters};

/// Order quantity for `position_value` of notional at `price`, floored to the lot step.
///
/// Returns `None` when the floored quantity falls below the minimum lot.
pub fn size_quantity(position_value: f64, price: f64, filters: &SymbolFilters) -> Option<f64> {
    if !(price > 0.0 && position_value > 0.0) {
        return None;
    }
    let qty = floor_to_step(position_value / price, filters.step_size);
    if qty <= 0.0 || qty < filters.min_qty {
        return None;
    }
    Some(qty)
}

/// Take-profit and stop-loss trigger prices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Brackets {
    pub tp_price: f64,
    pub sl_price: f64,
}

impl Brackets {
    /// Brackets around `entry`, truncated to the tick size.
    pub fn compute(side: Side, entry: f64, tp_percent: f64, sl_percent: f64, tick_size: f64) -> Self {
        let (tp, sl) = match side {
            Side::Long => (entry * (1.0 + tp_percent), entry * (1.0 - sl_percent)),
            Side::Short => (entry * (1.0 - tp_percent), entry * (1.0 + sl_percent)),
        };
        Self {
            tp_price: truncate_to_tick(tp, tick_size),
            sl_price: truncate_to_tick(sl, tick_size),
        }
    }
}
