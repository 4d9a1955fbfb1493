use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::header,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use crate::anomaly::detector::AnomalyResult;
use crate::api::error::ApiError;
use crate::api::middleware::{request_context, CallerKey};
use crate::core::pipeline::PricePipeline;
use crate::observability::metrics;
use crate::types::price_point::PricePoint;

pub const DEFAULT_HISTORY_LIMIT: i64 = 100;
pub const MAX_HISTORY_LIMIT: i64 = 1_000;

pub struct AppState {
    pub pipeline: Arc<PricePipeline>,
    pub request_deadline: Duration,
    /// Parent of every per-request cancellation token.
    pub shutdown: CancellationToken,
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route("/supported-symbols", get(supported_symbols))
        .route("/collect-once/:symbol", post(collect_once))
        .route("/history/:symbol", get(history))
        .route("/anomaly/:symbol", get(anomaly))
        .layer(middleware::from_fn(request_context))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

async fn metrics_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::render(),
    )
}

async fn supported_symbols(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "symbols": state.pipeline.list_supported_symbols() }))
}

/// Child token that cancels itself after `deadline`. The timer stops when dropped.
struct RequestDeadline {
    token: CancellationToken,
    timer: JoinHandle<()>,
}

impl RequestDeadline {
    fn start(parent: &CancellationToken, deadline: Duration) -> Self {
        let token = parent.child_token();
        let expiry = token.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            expiry.cancel();
        });

        RequestDeadline { token, timer }
    }
}

impl Drop for RequestDeadline {
    fn drop(&mut self) {
        self.timer.abort();
    }
}

async fn collect_once(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<CallerKey>,
    Path(symbol): Path<String>,
) -> Result<Json<PricePoint>, ApiError> {
    let deadline = RequestDeadline::start(&state.shutdown, state.request_deadline);

    let point = state.pipeline
        .collect_once(&symbol, &caller.0, &deadline.token)
        .await?;

    Ok(Json(point))
}

/// Parses `?limit=` by hand so malformed values get the JSON error body.
fn history_limit(params: &HashMap<String, String>) -> Result<usize, ApiError> {
    let limit = match params.get("limit") {
        None => DEFAULT_HISTORY_LIMIT,
        Some(raw) => raw.trim().parse::<i64>().unwrap_or(0),
    };
    if !(1..=MAX_HISTORY_LIMIT).contains(&limit) {
        return Err(ApiError::BadRequest(format!(
            "limit must be an integer between 1 and {}",
            MAX_HISTORY_LIMIT
        )));
    }
    Ok(limit as usize)
}

async fn history(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<PricePoint>>, ApiError> {
    let limit = history_limit(&params)?;
    let points = state.pipeline.price_history(&symbol, limit).await?;
    Ok(Json(points))
}

async fn anomaly(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> Result<Json<AnomalyResult>, ApiError> {
    Ok(Json(state.pipeline.check_anomaly(&symbol).await?))
}
