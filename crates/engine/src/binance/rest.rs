use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use hmac::{Hmac, Mac};
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use tracing::{debug, warn};

use common::precision::format_decimal;
use common::{
    Candle, Error, ExchangePosition, FuturesExchange, MarginType, OrderAck, OrderRequest, OrderStatus, Result,
    SymbolFilters, Timeframe,
};

const MAINNET_URL: &str = "https://fapi.binance.com";
const TESTNET_URL: &str = "https://testnet.binancefuture.com";
const RECV_WINDOW_MS: u64 = 5_000;

/// "No need to change margin type."
const CODE_NO_CHANGE_NEEDED: i64 = -4046;
/// "Unknown order sent."
const CODE_UNKNOWN_ORDER: i64 = -2011;
/// "Order does not exist."
const CODE_NO_SUCH_ORDER: i64 = -2013;

/// REST client for Binance USDⓈ-M futures.
pub struct BinanceFuturesClient {
    api_key: String,
    secret: String,
    base_url: String,
    http: Client,
}

impl BinanceFuturesClient {
    pub fn new(api_key: impl Into<String>, secret: impl Into<String>, testnet: bool, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            api_key: api_key.into(),
            secret: secret.into(),
            base_url: if testnet { TESTNET_URL } else { MAINNET_URL }.to_string(),
            http,
        })
    }

    /// Point the client at another host, e.g. a local mock.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn timestamp_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default()
    }

    fn sign(&self, query: &str) -> Result<String> {
        type HmacSha256 = Hmac<Sha256>;
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| Error::Config(format!("invalid API secret: {e}")))?;
        mac.update(query.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    async fn public_get(&self, path: &str, params: &str) -> Result<String> {
        let url = if params.is_empty() {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}{path}?{params}", self.base_url)
        };
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        Self::read_body(resp).await
    }

    async fn signed(&self, method: Method, path: &str, params: &str) -> Result<String> {
        let ts = Self::timestamp_ms();
        let query = if params.is_empty() {
            format!("recvWindow={RECV_WINDOW_MS}&timestamp={ts}")
        } else {
            format!("{params}&recvWindow={RECV_WINDOW_MS}&timestamp={ts}")
        };
        let signature = self.sign(&query)?;
        let url = format!("{}{path}?{query}&signature={signature}", self.base_url);

        let resp = self
            .http
            .request(method, &url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        Self::read_body(resp).await
    }

    async fn read_body(resp: reqwest::Response) -> Result<String> {
        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;
        if !status.is_success() {
            return Err(Error::Exchange(format!("HTTP {status}: {body}")));
        }
        Ok(body)
    }

    /// Accept the listed API error codes as success.
    fn tolerate(result: Result<String>, codes: &[i64]) -> Result<()> {
        match result {
            Ok(_) => Ok(()),
            Err(Error::Exchange(msg)) if api_error_code(&msg).is_some_and(|c| codes.contains(&c)) => {
                debug!(%msg, "tolerated exchange response");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

/// Extract `code` from an error body like `HTTP 400 Bad Request: {"code":-4046,"msg":"..."}`.
fn api_error_code(message: &str) -> Option<i64> {
    let start = message.find('{')?;
    let body: ApiError = serde_json::from_str(&message[start..]).ok()?;
    Some(body.code)
}

fn parse_f64(value: &Value) -> Result<f64> {
    match value {
        Value::String(s) => s
            .parse::<f64>()
            .map_err(|e| Error::Exchange(format!("bad number '{s}': {e}"))),
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| Error::Exchange(format!("bad number {n}"))),
        other => Err(Error::Exchange(format!("expected number, got {other}"))),
    }
}

fn parse_kline(row: &[Value]) -> Result<Candle> {
    if row.len() < 6 {
        return Err(Error::Exchange(format!("kline row too short: {} fields", row.len())));
    }
    let open_ms = row[0]
        .as_i64()
        .ok_or_else(|| Error::Exchange("kline open time is not an integer".into()))?;
    let open_time = Utc
        .timestamp_millis_opt(open_ms)
        .single()
        .ok_or_else(|| Error::Exchange(format!("kline open time out of range: {open_ms}")))?;
    Ok(Candle {
        open_time,
        open: parse_f64(&row[1])?,
        high: parse_f64(&row[2])?,
        low: parse_f64(&row[3])?,
        close: parse_f64(&row[4])?,
        volume: parse_f64(&row[5])?,
    })
}

fn order_params(order: &OrderRequest) -> String {
    let mut params = format!(
        "symbol={}&side={}&type={}&quantity={}",
        order.symbol,
        order.side,
        order.order_type,
        format_decimal(order.quantity)
    );
    if let Some(stop) = order.stop_price {
        params.push_str(&format!("&stopPrice={}", format_decimal(stop)));
    }
    if order.reduce_only {
        params.push_str("&reduceOnly=true");
    }
    if let Some(working) = order.working_type {
        params.push_str(&format!("&workingType={working}"));
    }
    params.push_str("&newOrderRespType=RESULT");
    params
}

#[async_trait]
impl FuturesExchange for BinanceFuturesClient {
    async fn candles(&self, symbol: &str, timeframe: Timeframe, limit: usize) -> Result<Vec<Candle>> {
        let params = format!("symbol={symbol}&interval={}&limit={limit}", timeframe.as_str());
        let body = self.public_get("/fapi/v1/klines", &params).await?;
        let rows: Vec<Vec<Value>> = serde_json::from_str(&body)?;
        rows.iter().map(|r| parse_kline(r)).collect()
    }

    async fn price(&self, symbol: &str) -> Result<f64> {
        let body = self
            .public_get("/fapi/v1/ticker/price", &format!("symbol={symbol}"))
            .await?;
        let ticker: PriceTicker = serde_json::from_str(&body)?;
        ticker
            .price
            .parse::<f64>()
            .map_err(|e| Error::Exchange(e.to_string()))
    }

    async fn balance(&self) -> Result<f64> {
        let body = self.signed(Method::GET, "/fapi/v2/account", "").await?;
        let account: AccountResponse = serde_json::from_str(&body)?;
        let usdt = account
            .assets
            .iter()
            .find(|a| a.asset == "USDT")
            .ok_or_else(|| Error::Exchange("no USDT asset in futures account".into()))?;
        usdt.available_balance
            .parse::<f64>()
            .map_err(|e| Error::Exchange(e.to_string()))
    }

    async fn open_positions(&self) -> Result<Vec<ExchangePosition>> {
        let body = self.signed(Method::GET, "/fapi/v2/account", "").await?;
        let account: AccountResponse = serde_json::from_str(&body)?;
        let positions = account
            .positions
            .into_iter()
            .filter_map(|p| {
                let amount = p.position_amt.parse::<f64>().ok()?;
                if amount == 0.0 {
                    return None;
                }
                Some(ExchangePosition {
                    symbol: p.symbol,
                    amount,
                    entry_price: p.entry_price.parse::<f64>().unwrap_or(0.0),
                })
            })
            .collect();
        Ok(positions)
    }

    async fn place_order(&self, order: &OrderRequest) -> Result<OrderAck> {
        let params = order_params(order);
        debug!(symbol = %order.symbol, side = %order.side, kind = %order.order_type, "submitting order");
        let body = self.signed(Method::POST, "/fapi/v1/order", &params).await?;
        let resp: OrderResponse = serde_json::from_str(&body)?;
        let avg_price = resp
            .avg_price
            .as_deref()
            .and_then(|p| p.parse::<f64>().ok())
            .filter(|p| *p > 0.0);
        Ok(OrderAck {
            order_id: resp.order_id.to_string(),
            status: OrderStatus::from_exchange(&resp.status),
            avg_price,
        })
    }

    async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<()> {
        let params = format!("symbol={symbol}&orderId={order_id}");
        let result = self.signed(Method::DELETE, "/fapi/v1/order", &params).await;
        Self::tolerate(result, &[CODE_UNKNOWN_ORDER, CODE_NO_SUCH_ORDER])
    }

    async fn order_status(&self, symbol: &str, order_id: &str) -> Result<OrderStatus> {
        let params = format!("symbol={symbol}&orderId={order_id}");
        match self.signed(Method::GET, "/fapi/v1/order", &params).await {
            Ok(body) => {
                let resp: OrderResponse = serde_json::from_str(&body)?;
                Ok(OrderStatus::from_exchange(&resp.status))
            }
            Err(Error::Exchange(msg)) if api_error_code(&msg) == Some(CODE_NO_SUCH_ORDER) => {
                warn!(symbol, order_id, "order not found");
                Ok(OrderStatus::Unknown)
            }
            Err(e) => Err(e),
        }
    }

    async fn symbol_filters(&self, symbol: &str) -> Result<SymbolFilters> {
        let body = self.public_get("/fapi/v1/exchangeInfo", "").await?;
        let info: ExchangeInfo = serde_json::from_str(&body)?;
        let sym = info
            .symbols
            .into_iter()
            .find(|s| s.symbol == symbol)
            .ok_or_else(|| Error::Exchange(format!("unknown symbol {symbol}")))?;
        filters_from(&sym.filters)
            .ok_or_else(|| Error::Exchange(format!("{symbol} is missing LOT_SIZE or PRICE_FILTER")))
    }

    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<()> {
        let params = format!("symbol={symbol}&leverage={leverage}");
        self.signed(Method::POST, "/fapi/v1/leverage", &params).await?;
        Ok(())
    }

    async fn set_margin_type(&self, symbol: &str, margin_type: MarginType) -> Result<()> {
        let params = format!("symbol={symbol}&marginType={margin_type}");
        let result = self.signed(Method::POST, "/fapi/v1/marginType", &params).await;
        Self::tolerate(result, &[CODE_NO_CHANGE_NEEDED])
    }
}

fn filters_from(filters: &[Value]) -> Option<SymbolFilters> {
    let field = |kind: &str, key: &str| {
        filters
            .iter()
            .find(|f| f.get("filterType").and_then(Value::as_str) == Some(kind))
            .and_then(|f| f.get(key))
            .and_then(|v| parse_f64(v).ok())
    };
    Some(SymbolFilters {
        step_size: field("LOT_SIZE", "stepSize")?,
        min_qty: field("LOT_SIZE", "minQty")?,
        tick_size: field("PRICE_FILTER", "tickSize")?,
    })
}

// ─── Response types ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ApiError {
    code: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    order_id: i64,
    status: String,
    #[serde(default)]
    avg_price: Option<String>,
}

#[derive(Deserialize)]
struct AccountResponse {
    #[serde(default)]
    assets: Vec<AccountAsset>,
    #[serde(default)]
    positions: Vec<AccountPosition>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountAsset {
    asset: String,
    available_balance: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountPosition {
    symbol: String,
    position_amt: String,
    #[serde(default)]
    entry_price: String,
}

#[derive(Deserialize)]
struct PriceTicker {
    price: String,
}

#[derive(Deserialize)]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

#[derive(Deserialize)]
struct SymbolInfo {
    symbol: String,
    filters: Vec<Value>,
}
