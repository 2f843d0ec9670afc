use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use common::{
    Candle, Error, ExchangePosition, FuturesExchange, MarginType, OrderAck, OrderRequest, OrderSide,
    OrderStatus, OrderType, Result, SymbolFilters, Timeframe,
};

#[derive(Debug, Clone, Copy)]
struct PaperPosition {
    /// Signed size: positive long, negative short.
    amount: f64,
    entry_price: f64,
}

#[derive(Debug, Clone)]
struct PaperOrder {
    request: OrderRequest,
    status: OrderStatus,
}

#[derive(Debug, Default)]
struct Ledger {
    balance: f64,
    positions: HashMap<String, PaperPosition>,
    orders: HashMap<String, PaperOrder>,
}

/// Simulated futures venue for paper trading.
///
/// Market data comes from a real exchange client; orders never leave the process.
/// Market orders fill at the latest price with slippage. Bracket orders rest until an
/// order-status query finds the latest price through their trigger, then fill at the
/// trigger price.
pub struct PaperExchange {
    market: Arc<dyn FuturesExchange>,
    slippage_bps: f64,
    fee_rate: f64,
    ledger: RwLock<Ledger>,
}

impl PaperExchange {
    pub fn new(market: Arc<dyn FuturesExchange>, initial_balance: f64, slippage_bps: f64, fee_rate: f64) -> Self {
        info!(balance = initial_balance, slippage_bps, "paper exchange initialized");
        Self {
            market,
            slippage_bps,
            fee_rate,
            ledger: RwLock::new(Ledger { balance: initial_balance, ..Ledger::default() }),
        }
    }

    fn slipped(&self, side: OrderSide, price: f64) -> f64 {
        match side {
            OrderSide::Buy => price * (1.0 + self.slippage_bps / 10_000.0),
            OrderSide::Sell => price * (1.0 - self.slippage_bps / 10_000.0),
        }
    }

    /// Apply a fill to the ledger, realizing pnl on the reduced part.
    fn apply_fill(&self, ledger: &mut Ledger, order: &OrderRequest, price: f64) -> Result<()> {
        let signed = match order.side {
            OrderSide::Buy => order.quantity,
            OrderSide::Sell => -order.quantity,
        };
        let current = ledger.positions.get(&order.symbol).copied();
        let fee = order.quantity * price * self.fee_rate;

        match current {
            Some(pos) if pos.amount * signed < 0.0 => {
                let closing = order.quantity.min(pos.amount.abs());
                let realized = (price - pos.entry_price) * closing * pos.amount.signum();
                ledger.balance += realized - fee;
                let remaining = if order.reduce_only {
                    pos.amount + signed.signum() * closing
                } else {
                    pos.amount + signed
                };
                if remaining.abs() < 1e-12 {
                    ledger.positions.remove(&order.symbol);
                } else if remaining * pos.amount > 0.0 {
                    ledger.positions.insert(order.symbol.clone(), PaperPosition { amount: remaining, ..pos });
                } else {
                    ledger.positions.insert(order.symbol.clone(), PaperPosition { amount: remaining, entry_price: price });
                }
                debug!(symbol = %order.symbol, realized, fee, "paper position reduced");
            }
            _ if order.reduce_only => {
                return Err(Error::Exchange(format!("reduce-only order would open a position on {}", order.symbol)));
            }
            Some(pos) => {
                let amount = pos.amount + signed;
                let entry_price = (pos.entry_price * pos.amount.abs() + price * order.quantity) / amount.abs();
                ledger.positions.insert(order.symbol.clone(), PaperPosition { amount, entry_price });
                ledger.balance -= fee;
            }
            None => {
                ledger.positions.insert(order.symbol.clone(), PaperPosition { amount: signed, entry_price: price });
                ledger.balance -= fee;
            }
        }
        Ok(())
    }
}

fn triggered(order: &OrderRequest, price: f64) -> bool {
    let Some(stop) = order.stop_price else { return false };
    match (order.order_type, order.side) {
        (OrderType::TakeProfitMarket, OrderSide::Sell) | (OrderType::StopMarket, OrderSide::Buy) => price >= stop,
        (OrderType::TakeProfitMarket, OrderSide::Buy) | (OrderType::StopMarket, OrderSide::Sell) => price <= stop,
        (OrderType::Market, _) => false,
    }
}

#[async_trait]
impl FuturesExchange for PaperExchange {
    async fn candles(&self, symbol: &str, timeframe: Timeframe, limit: usize) -> Result<Vec<Candle>> {
        self.market.candles(symbol, timeframe, limit).await
    }

    async fn price(&self, symbol: &str) -> Result<f64> {
        self.market.price(symbol).await
    }

    async fn balance(&self) -> Result<f64> {
        Ok(self.ledger.read().await.balance)
    }

    async fn open_positions(&self) -> Result<Vec<ExchangePosition>> {
        let ledger = self.ledger.read().await;
        Ok(ledger
            .positions
            .iter()
            .map(|(symbol, p)| ExchangePosition { symbol: symbol.clone(), amount: p.amount, entry_price: p.entry_price })
            .collect())
    }

    async fn place_order(&self, order: &OrderRequest) -> Result<OrderAck> {
        let order_id = Uuid::new_v4().to_string();
        match order.order_type {
            OrderType::Market => {
                let mid = self.market.price(&order.symbol).await?;
                let fill = self.slipped(order.side, mid);
                let mut ledger = self.ledger.write().await;
                self.apply_fill(&mut ledger, order, fill)?;
                ledger.orders.insert(
                    order_id.clone(),
                    PaperOrder { request: order.clone(), status: OrderStatus::Filled },
                );
                debug!(symbol = %order.symbol, side = %order.side, mid, fill, qty = order.quantity, "paper fill simulated");
                Ok(OrderAck { order_id, status: OrderStatus::Filled, avg_price: Some(fill) })
            }
            OrderType::TakeProfitMarket | OrderType::StopMarket => {
                if order.stop_price.is_none() {
                    return Err(Error::Exchange(format!("{} requires a stop price", order.order_type)));
                }
                self.ledger.write().await.orders.insert(
                    order_id.clone(),
                    PaperOrder { request: order.clone(), status: OrderStatus::New },
                );
                Ok(OrderAck { order_id, status: OrderStatus::New, avg_price: None })
            }
        }
    }

    async fn cancel_order(&self, _symbol: &str, order_id: &str) -> Result<()> {
        let mut ledger = self.ledger.write().await;
        if let Some(order) = ledger.orders.get_mut(order_id) {
            if order.status == OrderStatus::New {
                order.status = OrderStatus::Canceled;
            }
        }
        Ok(())
    }

    async fn order_status(&self, _symbol: &str, order_id: &str) -> Result<OrderStatus> {
        let pending = {
            let ledger = self.ledger.read().await;
            match ledger.orders.get(order_id) {
                None => return Ok(OrderStatus::Unknown),
                Some(o) if o.status != OrderStatus::New => return Ok(o.status),
                Some(o) => o.request.clone(),
            }
        };

        let price = self.market.price(&pending.symbol).await?;
        if !triggered(&pending, price) {
            return Ok(OrderStatus::New);
        }

        let mut ledger = self.ledger.write().await;
        let stop = pending.stop_price.unwrap_or(price);
        let status = match self.apply_fill(&mut ledger, &pending, stop) {
            Ok(()) => {
                info!(symbol = %pending.symbol, order_type = %pending.order_type, stop, "paper bracket filled");
                OrderStatus::Filled
            }
            // Nothing left to reduce.
            Err(_) => OrderStatus::Expired,
        };
        if let Some(order) = ledger.orders.get_mut(order_id) {
            order.status = status;
        }
        Ok(status)
    }

    async fn symbol_filters(&self, symbol: &str) -> Result<SymbolFilters> {
        self.market.symbol_filters(symbol).await
    }

    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<()> {
        debug!(symbol, leverage, "paper leverage set");
        Ok(())
    }

    async fn set_margin_type(&self, symbol: &str, margin_type: MarginType) -> Result<()> {
        debug!(symbol, %margin_type, "paper margin type set");
        Ok(())
    }
}
