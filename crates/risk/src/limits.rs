use chrono::{DateTime, NaiveDate, Utc};
use tracing::debug;

use crate::gate::Rejection;

/// Per-UTC-day trade count, loss streak and loss budget.
///
/// All counters reset when a check or record arrives on a new UTC date.
#[derive(Debug, Clone)]
pub struct DailyRiskLimits {
    max_daily_trades: u32,
    max_consecutive_losses: u32,
    /// Daily loss budget in account currency.
    max_daily_loss: f64,
    day: Option<NaiveDate>,
    trades_today: u32,
    consecutive_losses: u32,
    pnl_today: f64,
}

impl DailyRiskLimits {
    /// `daily_loss_limit` is a fraction of `initial_balance`.
    pub fn new(max_daily_trades: u32, max_consecutive_losses: u32, daily_loss_limit: f64, initial_balance: f64) -> Self {
        Self {
            max_daily_trades,
            max_consecutive_losses,
            max_daily_loss: daily_loss_limit * initial_balance,
            day: None,
            trades_today: 0,
            consecutive_losses: 0,
            pnl_today: 0.0,
        }
    }

    fn roll(&mut self, at: DateTime<Utc>) {
        let date = at.date_naive();
        if self.day != Some(date) {
            if self.day.is_some() {
                debug!(%date, "daily risk counters reset");
            }
            self.day = Some(date);
            self.trades_today = 0;
            self.consecutive_losses = 0;
            self.pnl_today = 0.0;
        }
    }

    pub fn check(&mut self, at: DateTime<Utc>) -> Result<(), Rejection> {
        self.roll(at);
        if self.trades_today >= self.max_daily_trades {
            return Err(Rejection::DailyTradeLimit { limit: self.max_daily_trades });
        }
        if self.consecutive_losses >= self.max_consecutive_losses {
            return Err(Rejection::ConsecutiveLosses {
                count: self.consecutive_losses,
                limit: self.max_consecutive_losses,
            });
        }
        if self.pnl_today <= -self.max_daily_loss {
            return Err(Rejection::DailyLossLimit { pnl: self.pnl_today, limit: self.max_daily_loss });
        }
        Ok(())
    }

    pub fn record_entry(&mut self, at: DateTime<Utc>) {
        self.roll(at);
        self.trades_today += 1;
    }

    /// Book a closed trade's net pnl against the day it closed on.
    pub fn record_exit(&mut self, at: DateTime<Utc>, pnl_value: f64) {
        self.roll(at);
        self.pnl_today += pnl_value;
        if pnl_value > 0.0 {
            self.consecutive_losses = 0;
        } else {
            self.consecutive_losses += 1;
        }
    }

    pub fn trades_today(&self) -> u32 {
        self.trades_today
    }

    pub fn consecutive_losses(&self) -> u32 {
        self.consecutive_losses
    }

    pub fn pnl_today(&self) -> f64 {
        self.pnl_today
    }
}
