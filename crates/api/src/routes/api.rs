use axum::{
    extract::{Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use common::TradeStore;

use crate::{auth::require_auth, AppState};

const MAX_TRADES: usize = 200;

pub fn api_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/status", get(get_status))
        .route("/api/trades", get(get_trades))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

fn internal(error: common::Error) -> Response {
    warn!(%error, "status API query failed");
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": error.to_string()}))).into_response()
}

/// Balance, open positions, pending signals, session stats and stored win/loss counts.
async fn get_status(State(state): State<AppState>) -> Response {
    let snapshot = state.status.snapshot().await;
    match state.store.summary().await {
        Ok(summary) => Json(json!({
            "mode": snapshot.mode,
            "balance": snapshot.balance,
            "open_positions": snapshot.open_positions,
            "pending": snapshot.pending,
            "session": snapshot.stats,
            "stored": summary,
        }))
        .into_response(),
        Err(e) => internal(e),
    }
}

#[derive(Deserialize)]
struct TradesQuery {
    limit: Option<usize>,
}

async fn get_trades(State(state): State<AppState>, Query(q): Query<TradesQuery>) -> Response {
    let limit = q.limit.unwrap_or(50).clamp(1, MAX_TRADES);
    match state.store.recent(limit).await {
        Ok(trades) => Json(json!({ "trades": trades, "limit": limit })).into_response(),
        Err(e) => internal(e),
    }
}
