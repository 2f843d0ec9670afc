use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use common::{
    with_timeout, BotConfig, Candle, Error, ExitType, FuturesExchange, Notifier, Result, Timeframe,
    TimeframeCombo, TradeRecord, TradeStore, TradingMode,
};
use position::{close_trade, BracketLeg, ExitDecision, ExitFill, ExitObservation, ExitRules, PendingSignal, Position};
use risk::AccountGate;
use strategy::{ParameterSet, Scorer, SignalFrame};

use crate::alerts;
use crate::book::PositionBook;
use crate::executor::OrderExecutor;
use crate::stats::SessionStats;

/// Everything fixed about how one coin is traded.
#[derive(Debug, Clone)]
pub struct CoinPlan {
    pub params: ParameterSet,
    pub combo: TimeframeCombo,
    pub rules: ExitRules,
}

impl CoinPlan {
    pub fn new(params: ParameterSet, bracket_grace: Duration) -> Self {
        let rules = ExitRules::from_params(&params, bracket_grace);
        Self { combo: params.timeframes(), params, rules }
    }
}

/// Load `<coin>_params.json` for every configured coin.
///
/// A coin without a file is skipped with a warning; an invalid file is an error.
pub fn load_plans(config: &BotConfig) -> Result<BTreeMap<String, CoinPlan>> {
    let grace = Duration::seconds(config.bracket_grace_secs as i64);
    let mut plans = BTreeMap::new();
    for coin in &config.coins {
        let path = config.parameter_path(coin);
        if !path.exists() {
            warn!(coin, path = %path.display(), "no parameter file, coin skipped");
            continue;
        }
        let params = ParameterSet::load(&path)?;
        let plan = CoinPlan::new(params, grace);
        info!(
            coin,
            entry = %plan.combo.entry,
            trend = %plan.combo.trend,
            threshold = plan.params.entry_threshold,
            "parameters loaded"
        );
        plans.insert(coin.clone(), plan);
    }
    if plans.is_empty() {
        return Err(Error::Config("no coin has a parameter file".into()));
    }
    Ok(plans)
}

struct Session {
    balance: f64,
    stats: SessionStats,
    day: NaiveDate,
}

/// Point-in-time view for the status surface.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub mode: TradingMode,
    pub balance: f64,
    pub open_positions: Vec<Position>,
    pub pending: BTreeMap<String, PendingSignal>,
    pub stats: SessionStats,
}

/// Live execution driver: candle-close signal cycles and exit checks over one position book.
pub struct LiveTrader {
    config: BotConfig,
    mode: TradingMode,
    exchange: Arc<dyn FuturesExchange>,
    executor: OrderExecutor,
    store: Arc<dyn TradeStore>,
    notifier: Arc<dyn Notifier>,
    gate: AccountGate,
    plans: BTreeMap<String, CoinPlan>,
    book: Mutex<PositionBook>,
    session: Mutex<Session>,
    last_seen: Mutex<HashMap<(String, Timeframe), DateTime<Utc>>>,
}

impl LiveTrader {
    pub fn new(
        config: BotConfig,
        mode: TradingMode,
        exchange: Arc<dyn FuturesExchange>,
        store: Arc<dyn TradeStore>,
        notifier: Arc<dyn Notifier>,
        plans: BTreeMap<String, CoinPlan>,
    ) -> Self {
        let timeout = StdDuration::from_secs(config.api_timeout_secs);
        Self {
            executor: OrderExecutor::new(exchange.clone(), timeout),
            gate: AccountGate::from_config(&config),
            book: Mutex::new(PositionBook::new(plans.keys().cloned())),
            session: Mutex::new(Session {
                balance: 0.0,
                stats: SessionStats::default(),
                day: Utc::now().date_naive(),
            }),
            last_seen: Mutex::new(HashMap::new()),
            config,
            mode,
            exchange,
            store,
            notifier,
            plans,
        }
    }

    fn timeout(&self) -> StdDuration {
        StdDuration::from_secs(self.config.api_timeout_secs)
    }

    pub fn coins(&self) -> impl Iterator<Item = &String> {
        self.plans.keys()
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    /// Check the balance and prepare every coin's account settings.
    ///
    /// A balance below the configured minimum is fatal.
    pub async fn startup(&self) -> Result<()> {
        let balance = with_timeout(self.timeout(), self.exchange.balance()).await?;
        self.gate
            .check_startup(balance)
            .map_err(|r| Error::Config(format!("cannot start trading: {r}")))?;
        self.session.lock().await.balance = balance;
        info!(balance, mode = %self.mode, "account checked");

        for coin in self.plans.keys() {
            if let Err(e) = with_timeout(self.timeout(), self.exchange.set_leverage(coin, self.config.leverage)).await {
                warn!(coin, error = %e, "failed to set leverage");
            }
            if let Err(e) =
                with_timeout(self.timeout(), self.exchange.set_margin_type(coin, self.config.margin_type)).await
            {
                warn!(coin, error = %e, "failed to set margin type");
            }
        }

        match with_timeout(self.timeout(), self.exchange.open_positions()).await {
            Ok(positions) => {
                let book = self.book.lock().await;
                for p in positions.iter().filter(|p| !book.is_tracked(&p.symbol)) {
                    warn!(coin = %p.symbol, amount = p.amount, entry = p.entry_price, "exchange position not tracked by the bot");
                }
            }
            Err(e) => warn!(error = %e, "could not list exchange positions"),
        }

        let coins: Vec<String> = self.plans.keys().cloned().collect();
        self.notifier
            .notify(&alerts::startup(&self.mode.to_string(), &coins, balance))
            .await;
        Ok(())
    }

    /// One pass of the candle poller over every coin and both of its timeframes.
    pub async fn poll_candles(&self) {
        for (coin, plan) in &self.plans {
            for timeframe in [plan.combo.entry, plan.combo.trend] {
                let closed = match self.detect_close(coin, timeframe).await {
                    Ok(closed) => closed,
                    Err(e) => {
                        warn!(coin, %timeframe, error = %e, "candle poll failed");
                        continue;
                    }
                };
                let Some(candle) = closed else { continue };
                debug!("{}", alerts::candle_closed(coin, timeframe, candle.close));
                if timeframe == plan.combo.entry {
                    if let Err(e) = self.on_candle_close(coin, Utc::now()).await {
                        error!(coin, error = %e, "candle-close cycle failed");
                    }
                }
            }
        }
    }

    /// The latest complete candle, if it has not been seen before.
    async fn detect_close(&self, coin: &str, timeframe: Timeframe) -> Result<Option<Candle>> {
        let candles = with_timeout(self.timeout(), self.exchange.candles(coin, timeframe, 2)).await?;
        if candles.len() < 2 {
            return Ok(None);
        }
        let last_complete = candles[candles.len() - 2];
        let mut seen = self.last_seen.lock().await;
        let key = (coin.to_string(), timeframe);
        if seen.get(&key) == Some(&last_complete.open_time) {
            return Ok(None);
        }
        seen.insert(key, last_complete.open_time);
        Ok(Some(last_complete))
    }

    /// Candle-close cycle for one coin.
    ///
    /// A held position ends the cycle. Otherwise a pending signal is executed at market
    /// and cleared, and no new signal is scored in the same cycle. With neither, the last
    /// complete candle is scored and a directional result is held for the next cycle.
    pub async fn on_candle_close(&self, coin: &str, now: DateTime<Utc>) -> Result<()> {
        let plan = self
            .plans
            .get(coin)
            .ok_or_else(|| Error::Other(format!("{coin} is not traded")))?;
        let history = self.config.history_candles;
        let entry = with_timeout(self.timeout(), self.exchange.candles(coin, plan.combo.entry, history)).await?;
        let trend = with_timeout(self.timeout(), self.exchange.candles(coin, plan.combo.trend, history)).await?;

        let mut book = self.book.lock().await;
        let open = book.open_count();
        let slot = book
            .slot_mut(coin)
            .ok_or_else(|| Error::Other(format!("{coin} has no slot")))?;
        if slot.has_position() {
            return Ok(());
        }

        if let Some(pending) = slot.take_pending() {
            let balance = self.session.lock().await.balance;
            if let Err(reason) = self.gate.check(balance, open) {
                info!(coin, side = %pending.side, %reason, "pending signal dropped");
                return Ok(());
            }
            info!(coin, side = %pending.side, strength = pending.strength, "executing pending signal at market");
            let opened = self
                .executor
                .open_position(
                    coin,
                    pending.side,
                    self.config.position_value(),
                    plan.params.tp_percent,
                    plan.params.sl_percent,
                    now,
                )
                .await?;
            let Some(mut position) = opened else { return Ok(()) };
            position.contributions = pending.contributions;
            let msg = alerts::entry(
                coin,
                position.side,
                position.entry_price,
                position.quantity,
                position.tp_price,
                position.sl_price,
                pending.strength,
            );
            slot.open(position).map_err(|e| Error::Other(e.to_string()))?;
            drop(book);
            self.notifier.notify(&msg).await;
            self.refresh_balance().await;
            return Ok(());
        }

        let frame = SignalFrame::build(&plan.params, &entry, &trend);
        let signal = Scorer::new(&plan.params).delayed(&frame);
        let Some(signal_time) = frame.len().checked_sub(2).and_then(|i| frame.row(i)).map(|r| r.open_time) else {
            return Ok(());
        };
        if let Some(pending) = PendingSignal::from_signal(&signal, signal_time) {
            info!(
                coin,
                side = %pending.side,
                strength = pending.strength,
                unavailable = signal.unavailable.len(),
                "signal pending for next candle"
            );
            slot.offer(pending);
        }
        Ok(())
    }

    /// One pass of the exit poller, including the daily rollover.
    pub async fn check_exits(&self) {
        let now = Utc::now();
        self.daily_rollover(now).await;
        for coin in self.plans.keys() {
            if let Err(e) = self.check_exit(coin, now).await {
                error!(coin, error = %e, "exit check failed");
            }
        }
    }

    /// Exit check for one coin. Returns the closed trade, if any.
    pub async fn check_exit(&self, coin: &str, now: DateTime<Utc>) -> Result<Option<TradeRecord>> {
        let Some(plan) = self.plans.get(coin) else { return Ok(None) };
        let mut book = self.book.lock().await;
        let Some(slot) = book.slot_mut(coin) else { return Ok(None) };
        let Some(position) = slot.position_mut() else { return Ok(None) };

        let tp = self.executor.leg_status(coin, position.tp_order_id.as_deref()).await;
        let sl = self.executor.leg_status(coin, position.sl_order_id.as_deref()).await;
        let price = match self.executor.price(coin).await {
            Ok(p) => Some(p),
            Err(e) => {
                warn!(coin, error = %e, "price unavailable for exit check");
                None
            }
        };
        let obs = ExitObservation { tp, sl, price, now };

        let (exit_type, exit_price) = match position.decide_exit(&obs, &plan.rules) {
            ExitDecision::Hold => {
                if tp == BracketLeg::Missing && sl == BracketLeg::Missing && price.is_none() {
                    error!(coin, "both brackets missing and price unavailable, position left open");
                }
                return Ok(None);
            }
            ExitDecision::Exit { exit_type, price } => (exit_type, price),
        };

        let snapshot = position.clone();
        let fill_price = self.flatten(&snapshot, exit_type, exit_price).await?;
        slot.close();
        drop(book);

        let trade = close_trade(&snapshot, ExitFill::at(exit_type, fill_price, now), self.config.fee_rate);
        self.finish_trade(&trade).await;
        Ok(Some(trade))
    }

    /// Cancel what is left on the book and, for exits the exchange did not fill, close at market.
    async fn flatten(&self, position: &Position, exit_type: ExitType, price: f64) -> Result<f64> {
        let coin = position.coin.as_str();
        match exit_type {
            ExitType::TakeProfit | ExitType::TakeProfitGap => {
                self.executor.cancel_safe(coin, position.sl_order_id.as_deref()).await;
                Ok(price)
            }
            ExitType::StopLoss | ExitType::StopLossGap => {
                self.executor.cancel_safe(coin, position.tp_order_id.as_deref()).await;
                Ok(price)
            }
            ExitType::Trailing | ExitType::Manual | ExitType::End => {
                self.executor.cancel_safe(coin, position.tp_order_id.as_deref()).await;
                self.executor.cancel_safe(coin, position.sl_order_id.as_deref()).await;
                let filled = self.executor.close_market(position).await?;
                Ok(filled.unwrap_or(price))
            }
        }
    }

    async fn finish_trade(&self, trade: &TradeRecord) {
        info!(
            coin = %trade.coin,
            exit_type = %trade.exit_type,
            exit_price = trade.exit_price,
            pnl_pct = trade.pnl_pct,
            pnl = trade.pnl_value,
            "position closed"
        );
        if let Err(e) = self.store.record(trade).await {
            error!(coin = %trade.coin, error = %e, "failed to persist trade");
        }
        self.refresh_balance().await;
        let msg = {
            let mut session = self.session.lock().await;
            session.stats.record(trade);
            alerts::exit(trade, &session.stats)
        };
        self.notifier.notify(&msg).await;
    }

    async fn refresh_balance(&self) {
        match with_timeout(self.timeout(), self.exchange.balance()).await {
            Ok(balance) => self.session.lock().await.balance = balance,
            Err(e) => warn!(error = %e, "balance refresh failed"),
        }
    }

    /// Send the daily summary and prune old trades once per UTC day.
    pub async fn daily_rollover(&self, now: DateTime<Utc>) {
        let today = now.date_naive();
        let (day, tally, by_coin) = {
            let mut session = self.session.lock().await;
            if today <= session.day {
                return;
            }
            let day = std::mem::replace(&mut session.day, today);
            let (tally, by_coin) = session.stats.take_day();
            (day, tally, by_coin)
        };

        let cutoff = now - Duration::days(self.config.trade_retention_days);
        match self.store.prune_before(cutoff).await {
            Ok(removed) => info!(%day, removed, "daily cleanup completed"),
            Err(e) => warn!(error = %e, "trade pruning failed"),
        }
        self.notifier.notify(&alerts::daily_summary(day, &tally, &by_coin)).await;
    }

    /// Best-effort cancellation of bracket orders for positions still open.
    pub async fn shutdown(&self) {
        if !self.config.cancel_orders_on_shutdown {
            return;
        }
        let book = self.book.lock().await;
        for position in book.positions() {
            self.executor.cancel_safe(&position.coin, position.tp_order_id.as_deref()).await;
            self.executor.cancel_safe(&position.coin, position.sl_order_id.as_deref()).await;
            warn!(coin = %position.coin, "position still open at shutdown, brackets cancelled");
        }
    }

    pub async fn status(&self) -> StatusSnapshot {
        let book = self.book.lock().await;
        let session = self.session.lock().await;
        let pending = self
            .plans
            .keys()
            .filter_map(|c| book.slot(c).and_then(|s| s.pending()).map(|p| (c.clone(), p.clone())))
            .collect();
        StatusSnapshot {
            mode: self.mode,
            balance: session.balance,
            open_positions: book.positions().cloned().collect(),
            pending,
            stats: session.stats.clone(),
        }
    }
}
