use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use common::{
    BotConfig, Candle, ExchangePosition, ExitType, FuturesExchange, MarginType, Notifier, OrderAck,
    OrderRequest, OrderStatus, OrderType, Result, SymbolFilters, Timeframe, TradeRecord, TradeStore,
    TradingMode,
};
use engine::{CoinPlan, LiveTrader};
use strategy::ParameterSet;

#[derive(Default)]
struct FakeState {
    candles: HashMap<(String, Timeframe), Vec<Candle>>,
    prices: HashMap<String, f64>,
    orders: Vec<OrderRequest>,
    statuses: HashMap<String, OrderStatus>,
    cancelled: Vec<String>,
}

#[derive(Default)]
struct FakeExchange {
    state: Mutex<FakeState>,
}

impl FakeExchange {
    fn set_candles(&self, coin: &str, tf: Timeframe, candles: Vec<Candle>) {
        self.state.lock().unwrap().candles.insert((coin.into(), tf), candles);
    }

    fn set_price(&self, coin: &str, price: f64) {
        self.state.lock().unwrap().prices.insert(coin.into(), price);
    }

    fn set_status(&self, id: &str, status: OrderStatus) {
        self.state.lock().unwrap().statuses.insert(id.into(), status);
    }

    fn orders(&self) -> Vec<OrderRequest> {
        self.state.lock().unwrap().orders.clone()
    }

    fn cancelled(&self) -> Vec<String> {
        self.state.lock().unwrap().cancelled.clone()
    }
}

#[async_trait]
impl FuturesExchange for FakeExchange {
    async fn candles(&self, symbol: &str, timeframe: Timeframe, limit: usize) -> Result<Vec<Candle>> {
        let state = self.state.lock().unwrap();
        let all = state.candles.get(&(symbol.to_string(), timeframe)).cloned().unwrap_or_default();
        let skip = all.len().saturating_sub(limit);
        Ok(all[skip..].to_vec())
    }

    async fn price(&self, symbol: &str) -> Result<f64> {
        let state = self.state.lock().unwrap();
        state
            .prices
            .get(symbol)
            .copied()
            .ok_or_else(|| common::Error::Exchange(format!("no price for {symbol}")))
    }

    async fn balance(&self) -> Result<f64> {
        Ok(1_000.0)
    }

    async fn open_positions(&self) -> Result<Vec<ExchangePosition>> {
        Ok(Vec::new())
    }

    async fn place_order(&self, order: &OrderRequest) -> Result<OrderAck> {
        let mut state = self.state.lock().unwrap();
        state.orders.push(order.clone());
        let id = state.orders.len().to_string();
        let (status, avg_price) = match order.order_type {
            OrderType::Market => (OrderStatus::Filled, state.prices.get(&order.symbol).copied()),
            _ => (OrderStatus::New, None),
        };
        state.statuses.insert(id.clone(), status);
        Ok(OrderAck { order_id: id, status, avg_price })
    }

    async fn cancel_order(&self, _symbol: &str, order_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.statuses.insert(order_id.into(), OrderStatus::Canceled);
        state.cancelled.push(order_id.into());
        Ok(())
    }

    async fn order_status(&self, _symbol: &str, order_id: &str) -> Result<OrderStatus> {
        let state = self.state.lock().unwrap();
        Ok(state.statuses.get(order_id).copied().unwrap_or(OrderStatus::Unknown))
    }

    async fn symbol_filters(&self, _symbol: &str) -> Result<SymbolFilters> {
        Ok(SymbolFilters { step_size: 0.001, min_qty: 0.001, tick_size: 0.01 })
    }

    async fn set_leverage(&self, _symbol: &str, _leverage: u32) -> Result<()> {
        Ok(())
    }

    async fn set_margin_type(&self, _symbol: &str, _margin_type: MarginType) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
struct MemoryStore {
    trades: Mutex<Vec<TradeRecord>>,
}

#[async_trait]
impl TradeStore for MemoryStore {
    async fn record(&self, trade: &TradeRecord) -> Result<()> {
        self.trades.lock().unwrap().push(trade.clone());
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<TradeRecord>> {
        Ok(self.trades.lock().unwrap().iter().rev().take(limit).cloned().collect())
    }

    async fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut trades = self.trades.lock().unwrap();
        let before = trades.len();
        trades.retain(|t| t.exit_time >= cutoff);
        Ok((before - trades.len()) as u64)
    }
}

#[derive(Default)]
struct Inbox {
    messages: Mutex<Vec<String>>,
}

#[async_trait]
impl Notifier for Inbox {
    async fn notify(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

/// RSI is the only weighted filter; a steadily falling market is deeply oversold.
fn rsi_only_params() -> ParameterSet {
    ParameterSet::from_json(
        r#"{
        "parameters": {
            "tp_percent": 0.01, "sl_percent": 0.005, "entry_threshold": 0.5,
            "rsi_weight": 1.0, "trend_ema_weight": 0, "price_ema_weight": 0, "macd_weight": 0,
            "volume_spike_weight": 0, "bollinger_weight": 0, "stochastic_weight": 0,
            "atr_weight": 0, "adx_weight": 0, "sr_weight": 0, "momentum_weight": 0,
            "market_structure_weight": 0, "time_filter_weight": 0, "mtf_confirmation_weight": 0,
            "rsi_period": 6, "rsi_oversold": 30, "rsi_overbought": 70,
            "trend_fast_ema": 4, "trend_slow_ema": 9, "entry_ema_period": 5,
            "macd_fast": 4, "macd_slow": 8, "macd_signal": 3, "macd_flip_only": 0,
            "volume_ma_period": 5, "volume_spike_multiplier": 1.5,
            "bollinger_period": 8, "bollinger_std": 2.0,
            "bollinger_squeeze_enabled": 0, "bollinger_squeeze_length": 4,
            "stochastic_k": 6, "stochastic_overbought": 80, "stochastic_oversold": 20,
            "atr_period": 5, "atr_min_threshold": 0.5,
            "adx_period": 4, "adx_threshold": 20,
            "sr_lookback": 10, "sr_touch_distance": 0.002,
            "momentum_period": 3, "momentum_threshold": 0.004,
            "structure_lookback": 3,
            "trade_start_hour": 0, "trade_end_hour": 23,
            "timeframe_combo": 0
        }
    }"#,
    )
    .unwrap()
}

fn falling(tf: Timeframe, count: usize) -> Vec<Candle> {
    let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    (0..count)
        .map(|i| {
            let open = 100.0 - i as f64 * 0.5;
            let close = open - 0.5;
            Candle {
                open_time: start + tf.duration() * i as i32,
                open,
                high: open + 0.1,
                low: close - 0.1,
                close,
                volume: 10.0,
            }
        })
        .collect()
}

struct Harness {
    exchange: Arc<FakeExchange>,
    store: Arc<MemoryStore>,
    inbox: Arc<Inbox>,
    trader: LiveTrader,
}

fn harness(coins: &[&str], max_positions: usize) -> Harness {
    harness_with(coins, max_positions, "")
}

fn harness_with(coins: &[&str], max_positions: usize, extra_toml: &str) -> Harness {
    let toml = format!(
        "coins = [{}]\nmax_total_positions = {max_positions}\n{extra_toml}",
        coins.iter().map(|c| format!("\"{c}\"")).collect::<Vec<_>>().join(", ")
    );
    let config = BotConfig::from_toml(&toml).unwrap();
    let exchange = Arc::new(FakeExchange::default());
    let store = Arc::new(MemoryStore::default());
    let inbox = Arc::new(Inbox::default());

    let mut plans = BTreeMap::new();
    for coin in coins {
        exchange.set_candles(coin, Timeframe::M5, falling(Timeframe::M5, 60));
        exchange.set_candles(coin, Timeframe::M15, falling(Timeframe::M15, 20));
        exchange.set_price(coin, 70.0);
        plans.insert(coin.to_string(), CoinPlan::new(rsi_only_params(), Duration::seconds(30)));
    }

    let trader = LiveTrader::new(
        config,
        TradingMode::Paper,
        exchange.clone(),
        store.clone(),
        inbox.clone(),
        plans,
    );
    Harness { exchange, store, inbox, trader }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 5, 0, 0).unwrap()
}

#[tokio::test]
async fn signal_waits_one_cycle_then_enters_at_market() {
    let h = harness(&["BTCUSDT"], 10);
    h.trader.startup().await.unwrap();

    h.trader.on_candle_close("BTCUSDT", now()).await.unwrap();
    assert!(h.exchange.orders().is_empty());
    let status = h.trader.status().await;
    assert_eq!(status.pending["BTCUSDT"].side, common::Side::Long);
    assert!(status.open_positions.is_empty());

    h.trader.on_candle_close("BTCUSDT", now()).await.unwrap();
    let orders = h.exchange.orders();
    assert_eq!(orders.len(), 3);
    assert_eq!(orders[0].order_type, OrderType::Market);
    assert_eq!(orders[1].order_type, OrderType::TakeProfitMarket);
    assert_eq!(orders[2].order_type, OrderType::StopMarket);
    assert!(orders[1].reduce_only && orders[2].reduce_only);

    let status = h.trader.status().await;
    assert!(status.pending.is_empty());
    let pos = &status.open_positions[0];
    assert_eq!(pos.entry_price, 70.0);
    assert!((pos.quantity - 14.285).abs() < 1e-9);
    assert!((pos.tp_price - 70.7).abs() <= 0.0100001);
    assert!((pos.sl_price - 69.65).abs() <= 0.0100001);

    // A held position ends the cycle: no new orders.
    h.trader.on_candle_close("BTCUSDT", now()).await.unwrap();
    assert_eq!(h.exchange.orders().len(), 3);
}

#[tokio::test]
async fn position_limit_keeps_second_coin_flat() {
    let h = harness(&["BTCUSDT", "ETHUSDT"], 1);

    for _ in 0..4 {
        h.trader.on_candle_close("BTCUSDT", now()).await.unwrap();
        h.trader.on_candle_close("ETHUSDT", now()).await.unwrap();
        let status = h.trader.status().await;
        assert!(status.open_positions.len() <= 1);
        assert!(status.open_positions.iter().all(|p| p.coin == "BTCUSDT"));
    }
    let eth_orders = h.exchange.orders().iter().filter(|o| o.symbol == "ETHUSDT").count();
    assert_eq!(eth_orders, 0);
}

#[tokio::test]
async fn take_profit_fill_closes_and_records_trade() {
    let h = harness(&["BTCUSDT"], 10);
    h.trader.on_candle_close("BTCUSDT", now()).await.unwrap();
    h.trader.on_candle_close("BTCUSDT", now()).await.unwrap();

    assert!(h.trader.check_exit("BTCUSDT", now()).await.unwrap().is_none());

    h.exchange.set_status("2", OrderStatus::Filled);
    let trade = h.trader.check_exit("BTCUSDT", now()).await.unwrap().unwrap();
    assert_eq!(trade.exit_type, ExitType::TakeProfit);
    assert!((trade.exit_price - 70.7).abs() <= 0.0100001);
    assert!((trade.pnl_pct - 1.0).abs() < 0.02);
    assert!(trade.fees > 0.0);

    assert_eq!(h.exchange.cancelled(), vec!["3".to_string()]);
    assert_eq!(h.store.trades.lock().unwrap().len(), 1);
    assert!(h.inbox.messages.lock().unwrap().iter().any(|m| m.contains("POSITION CLOSED")));
    assert!(h.trader.status().await.open_positions.is_empty());
    assert_eq!(h.trader.status().await.stats.overall.wins, 1);
}

#[tokio::test]
async fn missing_brackets_close_at_market_after_grace() {
    let h = harness(&["BTCUSDT"], 10);
    h.trader.on_candle_close("BTCUSDT", now()).await.unwrap();
    h.trader.on_candle_close("BTCUSDT", now()).await.unwrap();
    h.exchange.set_status("2", OrderStatus::Canceled);
    h.exchange.set_status("3", OrderStatus::Expired);

    let early = now() + Duration::seconds(10);
    assert!(h.trader.check_exit("BTCUSDT", early).await.unwrap().is_none());

    let late = now() + Duration::seconds(31);
    let trade = h.trader.check_exit("BTCUSDT", late).await.unwrap().unwrap();
    assert_eq!(trade.exit_type, ExitType::Manual);

    let last = h.exchange.orders().pop().unwrap();
    assert_eq!(last.order_type, OrderType::Market);
    assert!(last.reduce_only);
}

#[tokio::test]
async fn poller_acts_only_on_new_candles() {
    let h = harness(&["BTCUSDT"], 10);
    h.trader.poll_candles().await;
    assert!(h.trader.status().await.pending.contains_key("BTCUSDT"));

    // Same candles again: no new close, the pending signal stays pending.
    h.trader.poll_candles().await;
    assert!(h.exchange.orders().is_empty());

    h.exchange.set_candles("BTCUSDT", Timeframe::M5, falling(Timeframe::M5, 61));
    h.trader.poll_candles().await;
    assert_eq!(h.exchange.orders().len(), 3);
}

#[tokio::test]
async fn shutdown_cancels_brackets_of_open_positions() {
    let h = harness(&["BTCUSDT"], 10);
    h.trader.on_candle_close("BTCUSDT", now()).await.unwrap();
    h.trader.on_candle_close("BTCUSDT", now()).await.unwrap();
    assert_eq!(h.trader.status().await.open_positions.len(), 1);

    h.trader.shutdown().await;
    let cancelled = h.exchange.cancelled();
    assert_eq!(cancelled.len(), 2);
    assert!(cancelled.contains(&"2".to_string()));
    assert!(cancelled.contains(&"3".to_string()));
}

#[tokio::test]
async fn shutdown_leaves_brackets_when_cancelling_is_off() {
    let h = harness_with(&["BTCUSDT"], 10, "cancel_orders_on_shutdown = false\n");
    h.trader.on_candle_close("BTCUSDT", now()).await.unwrap();
    h.trader.on_candle_close("BTCUSDT", now()).await.unwrap();
    assert_eq!(h.trader.status().await.open_positions.len(), 1);

    h.trader.shutdown().await;
    assert!(h.exchange.cancelled().is_empty());
}
