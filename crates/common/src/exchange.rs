use async_trait::async_trait;

use crate::{
    Candle, ExchangePosition, MarginType, OrderAck, OrderRequest, OrderStatus, Result,
    SymbolFilters, Timeframe,
};

/// Capability surface of a USDⓈ-M futures venue.
///
/// `BinanceFuturesClient` implements this against the real API and
/// `PaperExchange` simulates order handling on top of real market data.
/// Callers impose their own timeouts; implementations may block on I/O.
#[async_trait]
pub trait FuturesExchange: Send + Sync {
    /// Most recent `limit` candles, oldest first. The last one is usually still forming.
    async fn candles(&self, symbol: &str, timeframe: Timeframe, limit: usize) -> Result<Vec<Candle>>;

    /// Latest traded price.
    async fn price(&self, symbol: &str) -> Result<f64>;

    /// Available quote-asset (USDT) balance.
    async fn balance(&self) -> Result<f64>;

    /// Positions with a non-zero size.
    async fn open_positions(&self) -> Result<Vec<ExchangePosition>>;

    async fn place_order(&self, order: &OrderRequest) -> Result<OrderAck>;

    /// Cancel a working order. Cancelling an order that no longer exists is not an error.
    async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<()>;

    async fn order_status(&self, symbol: &str, order_id: &str) -> Result<OrderStatus>;

    async fn symbol_filters(&self, symbol: &str) -> Result<SymbolFilters>;

    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<()>;

    /// Set the margin mode. Already being in the requested mode is not an error.
    async fn set_margin_type(&self, symbol: &str, margin_type: MarginType) -> Result<()>;
}
