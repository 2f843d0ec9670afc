use serde::{Deserialize, Serialize};

/// Simulated trading costs, all as fractions of price or notional.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostModel {
    /// Taker fee per side.
    pub fee_rate: f64,
    pub slippage: f64,
    pub spread: f64,
    /// Extra slippage factor for stop fills.
    pub stop_multiplier: f64,
}

impl Default for CostModel {
    fn default() -> Self {
        Self { fee_rate: 0.00045, slippage: 0.0003, spread: 0.0001, stop_multiplier: 2.25 }
    }
}

impl CostModel {
    pub fn frictionless() -> Self {
        Self { fee_rate: 0.0, slippage: 0.0, spread: 0.0, stop_multiplier: 1.0 }
    }

    /// Fill price for a market order at `base`, moved against the trader.
    pub fn fill(&self, base: f64, is_buy: bool, is_stop: bool) -> f64 {
        let mut adverse = self.slippage + self.spread;
        if is_stop {
            adverse *= self.stop_multiplier;
        }
        if is_buy {
            base * (1.0 + adverse)
        } else {
            base * (1.0 - adverse)
        }
    }
}
