use std::collections::BTreeMap;

use serde::Serialize;

use common::TradeRecord;

/// Win/loss tally for one scope (overall, one coin, or one day).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Tally {
    pub wins: u32,
    pub losses: u32,
    pub pnl: f64,
    /// Sum of winning trades' pnl_pct, for averages.
    #[serde(skip)]
    win_pct_sum: f64,
    #[serde(skip)]
    loss_pct_sum: f64,
}

impl Tally {
    fn record(&mut self, trade: &TradeRecord) {
        self.pnl += trade.pnl_value;
        if trade.is_win() {
            self.wins += 1;
            self.win_pct_sum += trade.pnl_pct;
        } else {
            self.losses += 1;
            self.loss_pct_sum += trade.pnl_pct.abs();
        }
    }

    pub fn total(&self) -> u32 {
        self.wins + self.losses
    }

    /// Win rate in percent; `0.0` with no trades.
    pub fn win_rate(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            n => f64::from(self.wins) / f64::from(n) * 100.0,
        }
    }

    pub fn avg_win_pct(&self) -> f64 {
        if self.wins == 0 {
            0.0
        } else {
            self.win_pct_sum / f64::from(self.wins)
        }
    }

    pub fn avg_loss_pct(&self) -> f64 {
        if self.losses == 0 {
            0.0
        } else {
            self.loss_pct_sum / f64::from(self.losses)
        }
    }
}

/// Running statistics for the current process.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionStats {
    pub overall: Tally,
    pub by_coin: BTreeMap<String, Tally>,
    /// Trades closed since the last daily summary.
    pub today: Tally,
    pub today_by_coin: BTreeMap<String, Tally>,
    pub current_streak: u32,
    pub best_streak: u32,
}

impl SessionStats {
    pub fn record(&mut self, trade: &TradeRecord) {
        self.overall.record(trade);
        self.by_coin.entry(trade.coin.clone()).or_default().record(trade);
        self.today.record(trade);
        self.today_by_coin.entry(trade.coin.clone()).or_default().record(trade);

        if trade.is_win() {
            self.current_streak += 1;
            self.best_streak = self.best_streak.max(self.current_streak);
        } else {
            self.current_streak = 0;
        }
    }

    /// Hand back the day's tallies and start a new day.
    pub fn take_day(&mut self) -> (Tally, BTreeMap<String, Tally>) {
        (std::mem::take(&mut self.today), std::mem::take(&mut self.today_by_coin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::{ExitType, Side};

    fn trade(coin: &str, pnl: f64) -> TradeRecord {
        let now = Utc::now();
        TradeRecord {
            coin: coin.into(),
            side: Side::Long,
            entry_time: now,
            exit_time: now,
            entry_price: 100.0,
            exit_price: 100.0 + pnl,
            quantity: 1.0,
            pnl_pct: pnl,
            pnl_value: pnl,
            exit_type: if pnl > 0.0 { ExitType::TakeProfit } else { ExitType::StopLoss },
            fees: 0.0,
            slippage: 0.0,
        }
    }

    #[test]
    fn tracks_streaks_and_rates() {
        let mut s = SessionStats::default();
        for pnl in [1.0, 2.0, -1.0, 1.0, 1.0, 1.0] {
            s.record(&trade("BTCUSDT", pnl));
        }
        assert_eq!(s.best_streak, 3);
        assert_eq!(s.current_streak, 3);
        assert_eq!(s.overall.total(), 6);
        assert!((s.overall.win_rate() - 500.0 / 6.0).abs() < 1e-9);
        assert!((s.overall.avg_win_pct() - 1.2).abs() < 1e-9);
        assert_eq!(s.overall.avg_loss_pct(), 1.0);
    }

    #[test]
    fn take_day_resets_only_daily_tallies() {
        let mut s = SessionStats::default();
        s.record(&trade("BTCUSDT", 1.0));
        s.record(&trade("ETHUSDT", -1.0));
        let (day, coins) = s.take_day();
        assert_eq!(day.total(), 2);
        assert_eq!(coins.len(), 2);
        assert_eq!(s.today.total(), 0);
        assert_eq!(s.overall.total(), 2);
    }
}
