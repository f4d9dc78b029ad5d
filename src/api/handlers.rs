//! HTTP request handlers with OpenAPI documentation.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use utoipa::OpenApi;
use validator::Validate;

use crate::app::AppState;
use crate::domain::{
    AppError, BalanceQuery, BalanceSnapshot, BalanceView, ErrorDetail, ErrorResponse,
    HealthResponse, HealthStatus, HistoryQuery, MultipleBalancesRequest, ReconciliationReport,
    ValidationError, WatchedPair,
};

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Starknet Balance Service API",
        version = "0.1.0",
        description = "Cached token balance reads with retries and scheduled reconciliation"
    ),
    paths(
        get_balance_handler,
        get_multiple_balances_handler,
        get_history_handler,
        list_watched_pairs_handler,
        clear_cache_handler,
        clear_all_caches_handler,
        trigger_reconciliation_handler,
        health_check_handler,
        liveness_handler,
        readiness_handler,
    ),
    components(
        schemas(
            BalanceView,
            BalanceSnapshot,
            WatchedPair,
            MultipleBalancesRequest,
            BalanceQuery,
            HistoryQuery,
            ReconciliationReport,
            HealthResponse,
            HealthStatus,
            ErrorResponse,
            ErrorDetail,
            crate::domain::Network,
            crate::domain::TokenInfo,
        )
    ),
    tags(
        (name = "balances", description = "Token balance endpoints"),
        (name = "cache", description = "Cache management endpoints"),
        (name = "reconciliation", description = "Background reconciliation endpoints"),
        (name = "health", description = "Health check endpoints")
    )
)]
pub struct ApiDoc;

/// Get the balance of one (account, token) pair
///
/// Answers from the cache when warm; otherwise reads the chain behind
/// bounded retries and warms the cache. `refresh=true` bypasses the cache.
#[utoipa::path(
    get,
    path = "/accounts/{account}/tokens/{token}/balance",
    tag = "balances",
    params(
        ("account" = String, Path, description = "Account (wallet) address"),
        ("token" = String, Path, description = "Token contract address"),
        ("refresh" = Option<bool>, Query, description = "Bypass the cache and read from the chain")
    ),
    responses(
        (status = 200, description = "Balance retrieved", body = BalanceView),
        (status = 400, description = "Invalid address", body = ErrorResponse),
        (status = 503, description = "Chain unavailable after retries", body = ErrorResponse)
    )
)]
pub async fn get_balance_handler(
    State(state): State<Arc<AppState>>,
    Path((account, token)): Path<(String, String)>,
    Query(query): Query<BalanceQuery>,
) -> Result<Json<BalanceView>, AppError> {
    let view = state
        .service
        .get_balance(&account, &token, query.refresh)
        .await?;
    Ok(Json(view))
}

/// Get balances for several tokens of one account
///
/// Individual failures are dropped from the result instead of failing the
/// whole batch.
#[utoipa::path(
    post,
    path = "/accounts/{account}/balances",
    tag = "balances",
    params(
        ("account" = String, Path, description = "Account (wallet) address")
    ),
    request_body = MultipleBalancesRequest,
    responses(
        (status = 200, description = "Balances that could be resolved", body = [BalanceView]),
        (status = 400, description = "Validation error", body = ErrorResponse)
    )
)]
pub async fn get_multiple_balances_handler(
    State(state): State<Arc<AppState>>,
    Path(account): Path<String>,
    Json(payload): Json<MultipleBalancesRequest>,
) -> Result<Json<Vec<BalanceView>>, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(ValidationError::Multiple(e.to_string())))?;

    let views = state
        .service
        .get_multiple_balances(&account, &payload.token_addresses)
        .await;
    Ok(Json(views))
}

/// Get historical balance snapshots for one pair, newest first
#[utoipa::path(
    get,
    path = "/accounts/{account}/tokens/{token}/history",
    tag = "balances",
    params(
        ("account" = String, Path, description = "Account (wallet) address"),
        ("token" = String, Path, description = "Token contract address"),
        ("limit" = Option<i64>, Query, description = "Maximum snapshots to return (1-500, default: 30)")
    ),
    responses(
        (status = 200, description = "Snapshots retrieved", body = [BalanceSnapshot]),
        (status = 400, description = "Invalid limit", body = ErrorResponse)
    )
)]
pub async fn get_history_handler(
    State(state): State<Arc<AppState>>,
    Path((account, token)): Path<(String, String)>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<BalanceSnapshot>>, AppError> {
    query
        .validate()
        .map_err(|e| AppError::Validation(ValidationError::Multiple(e.to_string())))?;

    let snapshots = state
        .service
        .get_historical_balances(&account, &token, query.limit)
        .await?;
    Ok(Json(snapshots))
}

/// List every watched pair of an account
#[utoipa::path(
    get,
    path = "/accounts/{account}/tokens",
    tag = "balances",
    params(
        ("account" = String, Path, description = "Account (wallet) address")
    ),
    responses(
        (status = 200, description = "Watched pairs retrieved", body = [WatchedPair])
    )
)]
pub async fn list_watched_pairs_handler(
    State(state): State<Arc<AppState>>,
    Path(account): Path<String>,
) -> Result<Json<Vec<WatchedPair>>, AppError> {
    let pairs = state.service.list_watched_pairs(&account).await?;
    Ok(Json(pairs))
}

/// Drop the cached balance of one pair
#[utoipa::path(
    delete,
    path = "/accounts/{account}/tokens/{token}/cache",
    tag = "cache",
    params(
        ("account" = String, Path, description = "Account (wallet) address"),
        ("token" = String, Path, description = "Token contract address")
    ),
    responses(
        (status = 204, description = "Cache entry removed")
    )
)]
pub async fn clear_cache_handler(
    State(state): State<Arc<AppState>>,
    Path((account, token)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    state.service.clear_cache(&account, &token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Drop every cached balance view
#[utoipa::path(
    delete,
    path = "/cache",
    tag = "cache",
    responses(
        (status = 204, description = "Balance caches cleared")
    )
)]
pub async fn clear_all_caches_handler(
    State(state): State<Arc<AppState>>,
) -> Result<StatusCode, AppError> {
    state.service.clear_all_caches().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Trigger a reconciliation pass immediately
///
/// Runs the same oldest-first, chunked refresh as the background job and
/// reports what it did.
#[utoipa::path(
    post,
    path = "/reconciliation/run",
    tag = "reconciliation",
    responses(
        (status = 200, description = "Reconciliation pass completed", body = ReconciliationReport),
        (status = 500, description = "Durable store unavailable", body = ErrorResponse)
    )
)]
pub async fn trigger_reconciliation_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ReconciliationReport>, AppError> {
    let report = state.reconciliation.run_once().await?;
    Ok(Json(report))
}

/// Full health check of the service and its dependencies
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Health report", body = HealthResponse)
    )
)]
pub async fn health_check_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(state.service.health_check().await)
}

/// Liveness probe
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "health",
    responses(
        (status = 200, description = "Process is alive")
    )
)]
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// Readiness probe: 503 until all dependencies answer
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "health",
    responses(
        (status = 200, description = "Ready to serve traffic"),
        (status = 503, description = "A dependency is unavailable")
    )
)]
pub async fn readiness_handler(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<HealthResponse>) {
    let health = state.service.health_check().await;
    let status = match health.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(health))
}
