use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use common::{with_timeout, FuturesExchange, OrderRequest, OrderType, Result, Side, SymbolFilters};
use position::{size_quantity, BracketLeg, Brackets, Position};

/// Places and tracks exchange orders for the live trader.
///
/// This is the only component that calls `FuturesExchange::place_order`. Every call runs
/// under the configured timeout.
pub struct OrderExecutor {
    exchange: Arc<dyn FuturesExchange>,
    timeout: Duration,
    filters: Mutex<HashMap<String, SymbolFilters>>,
}

impl OrderExecutor {
    pub fn new(exchange: Arc<dyn FuturesExchange>, timeout: Duration) -> Self {
        Self { exchange, timeout, filters: Mutex::new(HashMap::new()) }
    }

    /// Rounding rules for `symbol`, fetched once and cached.
    pub async fn filters(&self, symbol: &str) -> Result<SymbolFilters> {
        if let Some(f) = self.filters.lock().await.get(symbol) {
            return Ok(*f);
        }
        let fetched = with_timeout(self.timeout, self.exchange.symbol_filters(symbol)).await?;
        self.filters.lock().await.insert(symbol.to_string(), fetched);
        Ok(fetched)
    }

    pub async fn price(&self, symbol: &str) -> Result<f64> {
        with_timeout(self.timeout, self.exchange.price(symbol)).await
    }

    /// Market entry followed by reduce-only TP and SL brackets.
    ///
    /// Returns `Ok(None)` when the size rounds below the minimum quantity. A bracket leg
    /// that fails to place is logged and left without an order id.
    pub async fn open_position(
        &self,
        coin: &str,
        side: Side,
        position_value: f64,
        tp_percent: f64,
        sl_percent: f64,
        now: DateTime<Utc>,
    ) -> Result<Option<Position>> {
        let filters = self.filters(coin).await?;
        let market_price = self.price(coin).await?;
        let Some(quantity) = size_quantity(position_value, market_price, &filters) else {
            warn!(coin, market_price, min_qty = filters.min_qty, "position size below minimum quantity");
            return Ok(None);
        };

        let entry = OrderRequest::market(coin, side.entry_order(), quantity);
        let ack = with_timeout(self.timeout, self.exchange.place_order(&entry)).await?;
        let entry_price = ack.avg_price.filter(|p| *p > 0.0).unwrap_or(market_price);
        info!(coin, %side, quantity, entry_price, order_id = %ack.order_id, "entry filled");

        let brackets = Brackets::compute(side, entry_price, tp_percent, sl_percent, filters.tick_size);
        let mut position = Position::new(coin, side, entry_price, quantity, now, brackets);
        position.base_entry_price = market_price;
        position.entry_order_id = Some(ack.order_id);
        position.tp_order_id = self
            .place_bracket(coin, side, OrderType::TakeProfitMarket, quantity, brackets.tp_price)
            .await;
        position.sl_order_id = self
            .place_bracket(coin, side, OrderType::StopMarket, quantity, brackets.sl_price)
            .await;
        Ok(Some(position))
    }

    async fn place_bracket(
        &self,
        coin: &str,
        side: Side,
        order_type: OrderType,
        quantity: f64,
        stop_price: f64,
    ) -> Option<String> {
        let order = OrderRequest::bracket(coin, side.exit_order(), order_type, quantity, stop_price);
        match with_timeout(self.timeout, self.exchange.place_order(&order)).await {
            Ok(ack) => {
                info!(coin, %order_type, stop_price, order_id = %ack.order_id, "bracket placed");
                Some(ack.order_id)
            }
            Err(e) => {
                error!(coin, %order_type, stop_price, error = %e, "bracket placement failed");
                None
            }
        }
    }

    /// Flatten `position` at market. Returns the fill price when the exchange reports one.
    pub async fn close_market(&self, position: &Position) -> Result<Option<f64>> {
        let order = OrderRequest::market_close(&position.coin, position.side.exit_order(), position.quantity);
        let ack = with_timeout(self.timeout, self.exchange.place_order(&order)).await?;
        info!(coin = %position.coin, order_id = %ack.order_id, "position closed at market");
        Ok(ack.avg_price.filter(|p| *p > 0.0))
    }

    /// Cancel an order, logging instead of failing.
    pub async fn cancel_safe(&self, symbol: &str, order_id: Option<&str>) {
        let Some(id) = order_id else { return };
        match with_timeout(self.timeout, self.exchange.cancel_order(symbol, id)).await {
            Ok(()) => info!(symbol, order_id = id, "order cancelled"),
            Err(e) => warn!(symbol, order_id = id, error = %e, "cancel failed"),
        }
    }

    /// Bracket state as seen by exit detection. No id or a failed query counts as missing.
    pub async fn leg_status(&self, symbol: &str, order_id: Option<&str>) -> BracketLeg {
        let Some(id) = order_id else { return BracketLeg::Missing };
        match with_timeout(self.timeout, self.exchange.order_status(symbol, id)).await {
            Ok(status) => BracketLeg::from_status(status),
            Err(e) => {
                warn!(symbol, order_id = id, error = %e, "order status query failed");
                BracketLeg::Missing
            }
        }
    }
}
