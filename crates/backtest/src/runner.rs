use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use common::{Candle, ExitType, Side, TradeRecord};
use position::{close_trade, Brackets, CoinSlot, ExitFill, ExitRules, PendingSignal, Position};
use risk::{AccountGate, DailyRiskLimits};
use strategy::{FilterContribution, IndicatorRow, ParameterSet, Scorer, SignalFrame};

use crate::cost::CostModel;
use crate::resample::resample;

/// Open beyond this fraction past a bracket counts as a gap through it.
const GAP_TOLERANCE: f64 = 0.002;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub initial_balance: f64,
    pub margin_per_trade: f64,
    pub leverage: f64,
    pub min_balance: f64,
    /// Scored candle quote volume must cover this multiple of the position value.
    pub liquidity_multiple: f64,
    pub costs: CostModel,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_balance: 1000.0,
            margin_per_trade: 100.0,
            leverage: 1.0,
            min_balance: 20.0,
            liquidity_multiple: 2.0,
            costs: CostModel::default(),
        }
    }
}

impl BacktestConfig {
    pub fn position_value(&self) -> f64 {
        self.margin_per_trade * self.leverage
    }
}

/// A closed trade with the balance after it and the filters that opened it.
#[derive(Debug, Clone, Serialize)]
pub struct BacktestTrade {
    #[serde(flatten)]
    pub record: TradeRecord,
    pub balance: f64,
    pub contributions: Vec<FilterContribution>,
}

impl BacktestTrade {
    pub fn entry_notional(&self) -> f64 {
        self.record.entry_price * self.record.quantity
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BacktestResult {
    pub coin: String,
    pub initial_balance: f64,
    pub final_balance: f64,
    pub trades: Vec<BacktestTrade>,
    /// Signals dropped by a risk check.
    pub rejected_signals: usize,
}

impl BacktestResult {
    fn empty(coin: &str, balance: f64) -> Self {
        Self {
            coin: coin.to_string(),
            initial_balance: balance,
            final_balance: balance,
            trades: Vec::new(),
            rejected_signals: 0,
        }
    }
}

/// Replays candles through the same scorer and position slot the live trader uses.
pub struct BacktestRunner<'a> {
    coin: String,
    params: &'a ParameterSet,
    config: BacktestConfig,
    rules: ExitRules,
}

struct RunState {
    slot: CoinSlot,
    balance: f64,
    limits: DailyRiskLimits,
    trades: Vec<BacktestTrade>,
    rejected: usize,
}

impl<'a> BacktestRunner<'a> {
    pub fn new(coin: impl Into<String>, params: &'a ParameterSet, config: BacktestConfig) -> Self {
        let rules = ExitRules::from_params(params, Duration::zero());
        Self { coin: coin.into(), params, config, rules }
    }

    /// Run over 1-minute segments (one per data file), carrying the balance forward.
    pub fn run_segments(&self, segments: &[Vec<Candle>]) -> BacktestResult {
        let combo = self.params.timeframes();
        let mut total = BacktestResult::empty(&self.coin, self.config.initial_balance);
        for minutes in segments {
            let entry = resample(minutes, combo.entry);
            let trend = resample(minutes, combo.trend);
            let segment = self.run_from(&entry, &trend, total.final_balance);
            total.final_balance = segment.final_balance;
            total.rejected_signals += segment.rejected_signals;
            total.trades.extend(segment.trades);
        }
        info!(
            coin = %self.coin,
            segments = segments.len(),
            trades = total.trades.len(),
            final_balance = total.final_balance,
            "backtest finished"
        );
        total
    }

    /// Run over candles already at the entry and trend timeframes.
    pub fn run(&self, entry: &[Candle], trend: &[Candle]) -> BacktestResult {
        self.run_from(entry, trend, self.config.initial_balance)
    }

    fn run_from(&self, entry: &[Candle], trend: &[Candle], balance: f64) -> BacktestResult {
        let frame = SignalFrame::build(self.params, entry, trend);
        self.run_frame(&frame, balance)
    }

    pub fn run_frame(&self, frame: &SignalFrame, initial_balance: f64) -> BacktestResult {
        let p = self.params;
        let mut state = RunState {
            slot: CoinSlot::new(self.coin.clone()),
            balance: initial_balance,
            limits: DailyRiskLimits::new(
                p.max_daily_trades.max(0.0) as u32,
                p.max_consecutive_losses.max(0.0) as u32,
                p.daily_loss_limit,
                initial_balance,
            ),
            trades: Vec::new(),
            rejected: 0,
        };
        let gate = AccountGate {
            min_balance: self.config.min_balance,
            margin_per_trade: self.config.margin_per_trade,
            max_total_positions: 1,
        };
        let scorer = Scorer::new(p);
        let tf = p.timeframes().entry;
        let rows = frame.rows();

        for (i, row) in rows.iter().enumerate() {
            let close_time = tf.close_time(row.open_time);
            let next = rows.get(i + 1);

            if let Some(next) = next {
                if state.slot.pending().is_some() && !state.slot.has_position() {
                    if let Some(pending) = state.slot.take_pending() {
                        self.enter(&mut state, &gate, pending, next);
                    }
                    continue;
                }
            }

            if state.slot.has_position() {
                let next_open = next.map_or(row.close, |n| n.open);
                if let Some(fill) = self.bar_exit(&mut state, row, next_open, close_time) {
                    self.settle(&mut state, fill);
                }
                continue;
            }

            if next.is_none() {
                continue;
            }
            let signal = scorer.delayed_at(frame, i);
            let Some(pending) = PendingSignal::from_signal(&signal, close_time) else {
                continue;
            };
            if let Err(reason) = state.limits.check(close_time) {
                debug!(coin = %self.coin, %reason, "signal skipped");
                state.rejected += 1;
                continue;
            }
            if let Some(scored) = i.checked_sub(1).and_then(|j| rows.get(j)) {
                let required = self.config.liquidity_multiple * self.config.position_value();
                if scored.volume * scored.close < required {
                    debug!(coin = %self.coin, quote_volume = scored.volume * scored.close, required, "signal skipped: thin candle");
                    state.rejected += 1;
                    continue;
                }
            }
            state.slot.offer(pending);
        }

        if let (Some(last), true) = (rows.last(), state.slot.has_position()) {
            let time = tf.close_time(last.open_time);
            let side = state.slot.position().map_or(Side::Long, |p| p.side);
            let price = self.config.costs.fill(last.close, side == Side::Short, false);
            self.settle(&mut state, ExitFill { exit_type: ExitType::End, price, base_price: last.close, time });
        }

        BacktestResult {
            coin: self.coin.clone(),
            initial_balance,
            final_balance: state.balance,
            trades: state.trades,
            rejected_signals: state.rejected,
        }
    }

    fn enter(&self, state: &mut RunState, gate: &AccountGate, pending: PendingSignal, next: &IndicatorRow) {
        if let Err(reason) = gate.check(state.balance, 0) {
            debug!(coin = %self.coin, %reason, "pending signal dropped");
            state.rejected += 1;
            return;
        }
        let base = next.open;
        let price = self.config.costs.fill(base, pending.side == Side::Long, false);
        if price <= 0.0 {
            return;
        }
        let quantity = self.config.position_value() / price;
        let brackets = Brackets::compute(pending.side, price, self.params.tp_percent, self.params.sl_percent, 0.0);
        let mut position = Position::new(self.coin.clone(), pending.side, price, quantity, next.open_time, brackets);
        position.base_entry_price = base;
        position.contributions = pending.contributions;
        if state.slot.open(position).is_ok() {
            state.limits.record_entry(next.open_time);
        }
    }

    /// Exit for a completed row, with gap handling against the following open.
    fn bar_exit(&self, state: &mut RunState, row: &IndicatorRow, next_open: f64, time: DateTime<Utc>) -> Option<ExitFill> {
        let costs = &self.config.costs;
        let position = state.slot.position_mut()?;
        let bar = Candle {
            open_time: row.open_time,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        };
        let exit_type = position.decide_bar_exit(&bar, &self.rules)?;
        let (tp, sl) = (position.tp_price, position.sl_price);
        let is_buy = position.side == Side::Short;
        let (tp_gapped, sl_gapped) = match position.side {
            Side::Long => (next_open > tp * (1.0 + GAP_TOLERANCE), next_open < sl * (1.0 - GAP_TOLERANCE)),
            Side::Short => (next_open < tp * (1.0 - GAP_TOLERANCE), next_open > sl * (1.0 + GAP_TOLERANCE)),
        };

        let (exit_type, base, is_stop) = match exit_type {
            ExitType::TakeProfit if tp_gapped => (ExitType::TakeProfitGap, next_open, false),
            ExitType::TakeProfit => (ExitType::TakeProfit, tp, false),
            ExitType::StopLoss if sl_gapped => (ExitType::StopLossGap, next_open, true),
            ExitType::StopLoss => (ExitType::StopLoss, sl, true),
            other => (other, row.close, false),
        };
        let price = costs.fill(base, is_buy, is_stop);
        Some(ExitFill { exit_type, price, base_price: base, time })
    }

    fn settle(&self, state: &mut RunState, fill: ExitFill) {
        let Some(position) = state.slot.close() else {
            return;
        };
        let record = close_trade(&position, fill, self.config.costs.fee_rate);
        state.balance += record.pnl_value;
        state.limits.record_exit(record.exit_time, record.pnl_value);
        debug!(
            coin = %record.coin,
            side = %record.side,
            exit_type = %record.exit_type,
            entry = record.entry_price,
            exit = record.exit_price,
            pnl = record.pnl_value,
            balance = state.balance,
            "trade closed"
        );
        state.trades.push(BacktestTrade { record, balance: state.balance, contributions: position.contributions });
    }
}
