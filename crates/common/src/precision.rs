//! Exchange rounding helpers. Arithmetic is done in `Decimal` so that
//! `0.15678` floored to `0.001` is exactly `0.156`, not `0.15599999`.

use std::str::FromStr;

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

fn to_decimal(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    // Shortest round-trip text first, so 0.1 becomes exactly 0.1.
    Decimal::from_str(&value.to_string())
        .ok()
        .or_else(|| Decimal::from_f64(value))
}

/// Largest multiple of `step` that is <= `value`. Returns `value` unchanged for a non-positive step.
pub fn floor_to_step(value: f64, step: f64) -> f64 {
    quantize(value, step, Decimal::floor)
}

/// Truncate a price toward zero onto the tick grid.
pub fn truncate_to_tick(price: f64, tick: f64) -> f64 {
    quantize(price, tick, Decimal::trunc)
}

fn quantize(value: f64, step: f64, round: fn(&Decimal) -> Decimal) -> f64 {
    let (Some(v), Some(s)) = (to_decimal(value), to_decimal(step)) else {
        return value;
    };
    if s <= Decimal::ZERO {
        return value;
    }
    let units = round(&(v / s));
    (units * s).normalize().to_f64().unwrap_or(value)
}

/// Plain decimal text without exponent or trailing zeros, suitable for exchange query strings.
pub fn format_decimal(value: f64) -> String {
    match to_decimal(value) {
        Some(d) => d.normalize().to_string(),
        None => value.to_string(),
    }
}
