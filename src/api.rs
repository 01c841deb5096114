//! Relayer API Endpoints
//!
//! REST surface for the deposit relay:
//! - POST /deposit/retry      - Retry a stuck deposit (signed request)
//! - GET  /deposit/:txn_hash  - Look up a deposit
//! - GET  /params             - Current global parameter snapshot
//! - GET  /unstaking-period   - Current withdrawal waiting time
//! - GET  /health             - Health check

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::ledger::LedgerClient;
use crate::params::{GlobalParamsCache, UnstakingPeriodResolver};
use crate::relay::{DepositRetryService, RetryError, RetryRequest};

/// Combined application state
pub struct AppState {
    pub retry: DepositRetryService,
    pub ledger: Arc<dyn LedgerClient>,
    pub params: Arc<GlobalParamsCache>,
    pub unstaking: UnstakingPeriodResolver,
}

/// Shared app state type
pub type SharedAppState = Arc<AppState>;

/// Create the relayer API router
pub fn create_router(state: SharedAppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/deposit/retry", post(handle_retry_deposit))
        .route("/deposit/:txn_hash", get(handle_get_deposit))
        .route("/params", get(handle_params))
        .route("/unstaking-period", get(handle_unstaking_period))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

/// POST /deposit/retry
///
/// Validates the signed request end-to-end and rolls the deposit back to
/// its pre-error status. Failure responses carry enough context for the
/// caller to see which check failed, except for signature failures, which
/// stay opaque.
async fn handle_retry_deposit(
    State(state): State<SharedAppState>,
    Json(req): Json<RetryRequest>,
) -> impl IntoResponse {
    match state.retry.retry(&req).await {
        Ok(deposit) => {
            info!(txn_hash = %req.btc_txn_hash, "retry succeeded");
            (StatusCode::OK, Json(serde_json::json!({ "deposit": deposit })))
        }
        Err(RetryError::InvalidSignature) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "invalid signature" })),
        ),
        Err(RetryError::DepositNotFound(hash)) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "error": format!("deposit {} not found", hash)
            })),
        ),
        Err(RetryError::SenderMismatch { expected, actual }) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": "sender mismatch",
                "expected": expected,
                "actual": actual,
            })),
        ),
        Err(RetryError::NotRetryable {
            deposit,
            eligibility,
        }) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": "deposit is not retryable",
                "deposit": deposit,
                "has_error": eligibility.has_error,
                "is_in_retry_status": eligibility.is_in_retry_status,
            })),
        ),
        Err(e @ RetryError::RetryLimitExceeded { .. }) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": e.to_string() })),
        ),
        Err(RetryError::Ledger(e)) => {
            warn!(txn_hash = %req.btc_txn_hash, error = %e, "retry failed on ledger access");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "ledger unavailable" })),
            )
        }
    }
}

/// GET /deposit/:txn_hash
async fn handle_get_deposit(
    State(state): State<SharedAppState>,
    Path(txn_hash): Path<String>,
) -> impl IntoResponse {
    match state.ledger.get_deposit_by_txn_hash(&txn_hash).await {
        Ok(Some(deposit)) => (StatusCode::OK, Json(serde_json::json!(deposit))),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "error": format!("deposit {} not found", txn_hash)
            })),
        ),
        Err(e) => {
            warn!(txn_hash = %txn_hash, error = %e, "deposit lookup failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "ledger unavailable" })),
            )
        }
    }
}

/// GET /params
async fn handle_params(State(state): State<SharedAppState>) -> impl IntoResponse {
    Json(state.params.current())
}

/// GET /unstaking-period
async fn handle_unstaking_period(State(state): State<SharedAppState>) -> impl IntoResponse {
    let period_ms = state.unstaking.get_unstaking_period().await;
    Json(serde_json::json!({ "unstaking_period_ms": period_ms }))
}

/// GET /health
async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "atlas-deposit-relayer",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Start the API server
pub async fn start_server(state: SharedAppState, port: u16) -> Result<(), std::io::Error> {
    let app = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    info!(%addr, "relayer API listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}
