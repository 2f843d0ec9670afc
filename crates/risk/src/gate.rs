use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use common::BotConfig;

/// Why an entry was refused. A refused entry is dropped, never queued.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
pub enum Rejection {
    #[error("balance {balance:.2} below minimum {minimum:.2}")]
    BelowMinimumBalance { balance: f64, minimum: f64 },
    #[error("balance {balance:.2} cannot cover margin {margin:.2}")]
    InsufficientMargin { balance: f64, margin: f64 },
    #[error("{open} positions open, limit is {limit}")]
    MaxPositions { open: usize, limit: usize },
    #[error("daily trade limit {limit} reached")]
    DailyTradeLimit { limit: u32 },
    #[error("{count} consecutive losses, limit is {limit}")]
    ConsecutiveLosses { count: u32, limit: u32 },
    #[error("daily pnl {pnl:.2} breached loss limit {limit:.2}")]
    DailyLossLimit { pnl: f64, limit: f64 },
}

/// Balance and position-count checks run before every entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccountGate {
    pub min_balance: f64,
    pub margin_per_trade: f64,
    pub max_total_positions: usize,
}

impl AccountGate {
    pub fn from_config(cfg: &BotConfig) -> Self {
        Self {
            min_balance: cfg.min_balance,
            margin_per_trade: cfg.margin_per_trade,
            max_total_positions: cfg.max_total_positions,
        }
    }

    /// Startup check. Failing it is fatal for the live bot.
    pub fn check_startup(&self, balance: f64) -> Result<(), Rejection> {
        if balance < self.min_balance {
            return Err(Rejection::BelowMinimumBalance { balance, minimum: self.min_balance });
        }
        Ok(())
    }

    /// Entry check against the current balance and open positions across all coins.
    pub fn check(&self, balance: f64, open_positions: usize) -> Result<(), Rejection> {
        self.check_startup(balance)?;
        if balance < self.margin_per_trade {
            return Err(Rejection::InsufficientMargin { balance, margin: self.margin_per_trade });
        }
        if open_positions >= self.max_total_positions {
            info!(open_positions, limit = self.max_total_positions, "position limit reached");
            return Err(Rejection::MaxPositions { open: open_positions, limit: self.max_total_positions });
        }
        Ok(())
    }
}
