//! HTTP routing.

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::app::AppState;

use super::handlers::{
    ApiDoc, clear_all_caches_handler, clear_cache_handler, get_balance_handler,
    get_history_handler, get_multiple_balances_handler, health_check_handler,
    list_watched_pairs_handler, liveness_handler, readiness_handler,
    trigger_reconciliation_handler,
};

/// Build the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/accounts/{account}/tokens/{token}/balance",
            get(get_balance_handler),
        )
        .route(
            "/accounts/{account}/balances",
            post(get_multiple_balances_handler),
        )
        .route(
            "/accounts/{account}/tokens/{token}/history",
            get(get_history_handler),
        )
        .route("/accounts/{account}/tokens", get(list_watched_pairs_handler))
        .route(
            "/accounts/{account}/tokens/{token}/cache",
            delete(clear_cache_handler),
        )
        .route("/cache", delete(clear_all_caches_handler))
        .route("/reconciliation/run", post(trigger_reconciliation_handler))
        .route("/health", get(health_check_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
