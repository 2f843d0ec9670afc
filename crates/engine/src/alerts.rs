//! HTML alert bodies for the notifier.

use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::NaiveDate;

use common::{Side, Timeframe, TradeRecord};

use crate::stats::{SessionStats, Tally};

pub fn entry(coin: &str, side: Side, price: f64, quantity: f64, tp: f64, sl: f64, strength: f64) -> String {
    format!(
        "📈 <b>NEW POSITION</b>\nCoin: {coin}\nSide: {side}\nPrice: ${price:.4}\nQty: {quantity}\n\
         TP: ${tp:.4}\nSL: ${sl:.4}\nStrength: {strength:.3}"
    )
}

pub fn exit(trade: &TradeRecord, stats: &SessionStats) -> String {
    let emoji = if trade.is_win() { "✅" } else { "❌" };
    let mut msg = format!(
        "{emoji} <b>POSITION CLOSED</b>\nCoin: {}\nSide: {}\nExit: {}\nEntry: ${:.4}\nExit price: ${:.4}\n\
         PnL: {:.2}% (${:.2})",
        trade.coin, trade.side, trade.exit_type, trade.entry_price, trade.exit_price, trade.pnl_pct, trade.pnl_value
    );
    if let Some(coin) = stats.by_coin.get(&trade.coin) {
        let _ = write!(msg, "\n\n{}: {}/{} ({:.1}% WR)", trade.coin, coin.wins, coin.total(), coin.win_rate());
    }
    let _ = write!(
        msg,
        "\nOverall: {}/{} ({:.1}% WR), PnL ${:.2}\nStreak: {} (best {})",
        stats.overall.wins,
        stats.overall.total(),
        stats.overall.win_rate(),
        stats.overall.pnl,
        stats.current_streak,
        stats.best_streak
    );
    msg
}

pub fn candle_closed(coin: &str, timeframe: Timeframe, close: f64) -> String {
    format!("📊 {coin} {timeframe} closed at ${close:.4}")
}

pub fn daily_summary(day: NaiveDate, total: &Tally, by_coin: &BTreeMap<String, Tally>) -> String {
    let mut msg = format!(
        "📊 <b>DAILY SUMMARY {day}</b>\nTrades: {}\nWins/Losses: {}/{}\nWin Rate: {:.1}%\nPnL: ${:.2}\n\
         Avg Win: {:.2}%\nAvg Loss: {:.2}%",
        total.total(),
        total.wins,
        total.losses,
        total.win_rate(),
        total.pnl,
        total.avg_win_pct(),
        total.avg_loss_pct()
    );
    if !by_coin.is_empty() {
        msg.push_str("\n\n🏆 <b>By coin</b>");
        for (coin, t) in by_coin {
            let _ = write!(msg, "\n{coin}: {:.1}% WR ({}/{}) PnL ${:.2}", t.win_rate(), t.wins, t.total(), t.pnl);
        }
    }
    msg
}

pub fn startup(mode: &str, coins: &[String], balance: f64) -> String {
    format!("🤖 <b>Bot started</b> ({mode})\nCoins: {}\nBalance: ${balance:.2}", coins.join(", "))
}
