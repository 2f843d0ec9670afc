use chrono::{DateTime, Duration, Utc};

use common::{Candle, ExitType, OrderStatus, Side};
use strategy::ParameterSet;

use crate::slot::Position;

/// Exit settings that stay fixed for the life of a position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitRules {
    pub tp_percent: f64,
    pub use_trailing: bool,
    /// Fraction of `tp_percent` the profit must reach before the trail arms.
    pub trailing_activation: f64,
    /// Retracement from the best price that fires the trail.
    pub trailing_distance: f64,
    /// How long both brackets may be missing before a manual close.
    pub manual_grace: Duration,
}

impl ExitRules {
    pub fn from_params(params: &ParameterSet, manual_grace: Duration) -> Self {
        Self {
            tp_percent: params.tp_percent,
            use_trailing: params.trailing_enabled(),
            trailing_activation: params.trailing_activation,
            trailing_distance: params.trailing_distance,
            manual_grace,
        }
    }
}

/// What the exchange reports about one bracket order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BracketLeg {
    Filled,
    Working,
    Missing,
}

impl BracketLeg {
    pub fn from_status(status: OrderStatus) -> Self {
        if status.is_filled() {
            BracketLeg::Filled
        } else if status.is_missing() {
            BracketLeg::Missing
        } else {
            BracketLeg::Working
        }
    }
}

/// Live view of a position at one exit check.
#[derive(Debug, Clone, Copy)]
pub struct ExitObservation {
    pub tp: BracketLeg,
    pub sl: BracketLeg,
    /// Latest market price, when it could be fetched.
    pub price: Option<f64>,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExitDecision {
    Hold,
    Exit { exit_type: ExitType, price: f64 },
}

impl Position {
    /// Move the favourable extreme toward `price`. The extreme never retreats.
    pub fn ratchet(&mut self, price: f64) {
        self.highest_price = self.highest_price.max(price);
        self.lowest_price = self.lowest_price.min(price);
    }

    /// Update the trail with the best price seen (`extreme`) and the price an exit
    /// would happen at (`price`). Returns true when the trail fires.
    ///
    /// The trail is active only while profit at `price` is at least
    /// `tp_percent * trailing_activation`; the extreme moves only while it is active.
    pub fn trail(&mut self, extreme: f64, price: f64, rules: &ExitRules) -> bool {
        if !rules.use_trailing {
            return false;
        }
        self.trailing_active = self.profit_at(price) >= rules.tp_percent * rules.trailing_activation;
        if !self.trailing_active {
            return false;
        }
        self.ratchet(extreme);
        self.ratchet(price);

        let best = match self.side {
            Side::Long => self.highest_price,
            Side::Short => self.lowest_price,
        };
        if best <= 0.0 {
            return false;
        }
        let retracement = match self.side {
            Side::Long => (best - price) / best,
            Side::Short => (price - best) / best,
        };
        retracement >= rules.trailing_distance
    }

    /// Exit decision for a live check, in priority order TP, SL, trailing, manual.
    pub fn decide_exit(&mut self, obs: &ExitObservation, rules: &ExitRules) -> ExitDecision {
        if obs.tp == BracketLeg::Filled {
            return ExitDecision::Exit { exit_type: ExitType::TakeProfit, price: self.tp_price };
        }
        if obs.sl == BracketLeg::Filled {
            return ExitDecision::Exit { exit_type: ExitType::StopLoss, price: self.sl_price };
        }
        if let Some(price) = obs.price {
            if self.trail(price, price, rules) {
                return ExitDecision::Exit { exit_type: ExitType::Trailing, price };
            }
        }
        if obs.tp == BracketLeg::Missing && obs.sl == BracketLeg::Missing {
            let age = obs.now - self.entry_time;
            if age > rules.manual_grace {
                if let Some(price) = obs.price {
                    return ExitDecision::Exit { exit_type: ExitType::Manual, price };
                }
            }
        }
        ExitDecision::Hold
    }

    /// Exit decision for a completed bar, in priority order TP, SL, trailing.
    ///
    /// TP and SL trigger when the bar's range touches them. The trail uses the bar's
    /// favourable extreme and fires at the close.
    pub fn decide_bar_exit(&mut self, bar: &Candle, rules: &ExitRules) -> Option<ExitType> {
        let (tp_hit, sl_hit) = match self.side {
            Side::Long => (bar.high >= self.tp_price, bar.low <= self.sl_price),
            Side::Short => (bar.low <= self.tp_price, bar.high >= self.sl_price),
        };
        if tp_hit {
            return Some(ExitType::TakeProfit);
        }
        if sl_hit {
            return Some(ExitType::StopLoss);
        }
        let extreme = match self.side {
            Side::Long => bar.high,
            Side::Short => bar.low,
        };
        self.trail(extreme, bar.close, rules).then_some(ExitType::Trailing)
    }
}
