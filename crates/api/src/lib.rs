//! Read-only HTTP status surface for the live bot.

mod auth;
pub mod routes;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use common::{Result, TradingMode};
use engine::{EngineHandle, SqliteTradeStore, StatusSnapshot};

/// Where `/api/status` reads the live book from.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn snapshot(&self) -> StatusSnapshot;
}

#[async_trait]
impl StatusSource for EngineHandle {
    async fn snapshot(&self) -> StatusSnapshot {
        self.status().await
    }
}

/// Shared application state injected into every route handler.
#[derive(Clone)]
pub struct AppState {
    pub status: Arc<dyn StatusSource>,
    pub store: Arc<SqliteTradeStore>,
    pub trading_mode: TradingMode,
    pub dashboard_token: String,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods(Any);

    Router::new()
        .merge(routes::api_router(state.clone()))
        .merge(routes::health_router())
        .with_state(state)
        .layer(cors)
}

/// Serve the API until `shutdown` resolves.
pub async fn serve(state: AppState, port: u16, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Status API listening");
    axum::serve(listener, router(state)).with_graceful_shutdown(shutdown).await?;
    Ok(())
}
