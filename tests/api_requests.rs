//! Integration tests for the HTTP API.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::Utc;
use http_body_util::BodyExt;
use tower::ServiceExt;

use starknet_balance_service::api::create_router;
use starknet_balance_service::app::{AppState, BalanceServiceConfig, SchedulerConfig};
use starknet_balance_service::domain::{
    BalanceView, ChainError, ErrorResponse, HealthResponse, HealthStatus, ReconciliationReport,
    WatchedPair,
};
use starknet_balance_service::infra::InMemoryCacheStore;
use starknet_balance_service::test_utils::{MockBalanceRepository, MockChainAdapter};

const ACCOUNT: &str = "0x04a9e147455c8dafae167baaae0f2ef6ed8f6792847fcaa9a8a841a8c03bbee3";
const TOKEN: &str = "0x049d36570d4e46f48e99674bd3fcc84644ddd6b96f7c741b1562b82f9e004dc7";
const TOKEN2: &str = "0x04718f5a0fc34cc1af16a1cdee98ffb20c31f5cd61d6ab07201858f4287c938d";

fn create_test_state(
    chain: Arc<MockChainAdapter>,
    repository: Arc<MockBalanceRepository>,
) -> Arc<AppState> {
    let service_config = BalanceServiceConfig {
        initial_retry_delay: Duration::from_millis(1),
        max_retry_delay: Duration::from_millis(5),
        ..Default::default()
    };
    let scheduler_config = SchedulerConfig {
        chunk_delay: Duration::from_millis(1),
        ..Default::default()
    };
    Arc::new(AppState::with_config(
        chain,
        Arc::new(InMemoryCacheStore::new()),
        repository,
        service_config,
        scheduler_config,
    ))
}

#[tokio::test]
async fn test_get_balance_success() {
    let chain = Arc::new(MockChainAdapter::new());
    chain.set_balance(TOKEN, ACCOUNT, "1500000000000000000");
    let state = create_test_state(chain, Arc::new(MockBalanceRepository::new()));
    let router = create_router(state);

    let request = Request::builder()
        .method("GET")
        .uri(format!("/accounts/{ACCOUNT}/tokens/{TOKEN}/balance"))
        .body(Body::empty())
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let view: BalanceView = serde_json::from_slice(&body_bytes).unwrap();
    assert_eq!(view.account_address, ACCOUNT);
    assert_eq!(view.balance, "1500000000000000000");
    assert_eq!(view.balance_formatted, "1.5");
    assert_eq!(view.token_symbol, "TST");
}

#[tokio::test]
async fn test_get_balance_chain_down_returns_503_with_cause() {
    let chain = Arc::new(MockChainAdapter::new());
    chain.fail_balance_always(ChainError::ServiceUnavailable("gateway 503".to_string()));
    let state = create_test_state(chain, Arc::new(MockBalanceRepository::new()));
    let router = create_router(state);

    let request = Request::builder()
        .method("GET")
        .uri(format!("/accounts/{ACCOUNT}/tokens/{TOKEN}/balance"))
        .body(Body::empty())
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let error: ErrorResponse = serde_json::from_slice(&body_bytes).unwrap();
    assert_eq!(error.error.r#type, "fetch_error");
    assert!(error.error.message.contains("gateway 503"));
}

#[tokio::test]
async fn test_get_balance_refresh_query_bypasses_cache() {
    let chain = Arc::new(MockChainAdapter::new());
    chain.set_balance(TOKEN, ACCOUNT, "5");
    let state = create_test_state(Arc::clone(&chain), Arc::new(MockBalanceRepository::new()));
    let router = create_router(state);

    for uri in [
        format!("/accounts/{ACCOUNT}/tokens/{TOKEN}/balance"),
        format!("/accounts/{ACCOUNT}/tokens/{TOKEN}/balance?refresh=true"),
    ] {
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(chain.balance_call_count(), 2);
}

#[tokio::test]
async fn test_batch_balances_partial_failure() {
    let chain = Arc::new(MockChainAdapter::new());
    chain.set_balance(TOKEN, ACCOUNT, "100");
    chain.fail_balance_for(TOKEN2, ChainError::InvalidAddress(TOKEN2.to_string()));
    let state = create_test_state(chain, Arc::new(MockBalanceRepository::new()));
    let router = create_router(state);

    let payload = serde_json::json!({ "token_addresses": [TOKEN, TOKEN2] });
    let request = Request::builder()
        .method("POST")
        .uri(format!("/accounts/{ACCOUNT}/balances"))
        .header("Content-Type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let views: Vec<BalanceView> = serde_json::from_slice(&body_bytes).unwrap();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].token_address, TOKEN);
}

#[tokio::test]
async fn test_batch_balances_empty_list_rejected() {
    let state = create_test_state(
        Arc::new(MockChainAdapter::new()),
        Arc::new(MockBalanceRepository::new()),
    );
    let router = create_router(state);

    let request = Request::builder()
        .method("POST")
        .uri(format!("/accounts/{ACCOUNT}/balances"))
        .header("Content-Type", "application/json")
        .body(Body::from(r#"{"token_addresses": []}"#))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_watched_pairs() {
    let repository = Arc::new(MockBalanceRepository::new());
    repository.seed_pair(ACCOUNT, TOKEN, Utc::now());
    repository.seed_pair("0xother", TOKEN, Utc::now());
    let state = create_test_state(Arc::new(MockChainAdapter::new()), repository);
    let router = create_router(state);

    let request = Request::builder()
        .method("GET")
        .uri(format!("/accounts/{ACCOUNT}/tokens"))
        .body(Body::empty())
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let pairs: Vec<WatchedPair> = serde_json::from_slice(&body_bytes).unwrap();
    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs[0].account_address, ACCOUNT);
}

#[tokio::test]
async fn test_history_invalid_limit_rejected() {
    let state = create_test_state(
        Arc::new(MockChainAdapter::new()),
        Arc::new(MockBalanceRepository::new()),
    );
    let router = create_router(state);

    let request = Request::builder()
        .method("GET")
        .uri(format!("/accounts/{ACCOUNT}/tokens/{TOKEN}/history?limit=0"))
        .body(Body::empty())
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_clear_cache_returns_no_content() {
    let state = create_test_state(
        Arc::new(MockChainAdapter::new()),
        Arc::new(MockBalanceRepository::new()),
    );
    let router = create_router(state);

    let request = Request::builder()
        .method("DELETE")
        .uri(format!("/accounts/{ACCOUNT}/tokens/{TOKEN}/cache"))
        .body(Body::empty())
        .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let request = Request::builder()
        .method("DELETE")
        .uri("/cache")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_trigger_reconciliation_reports_work_done() {
    let chain = Arc::new(MockChainAdapter::new());
    let repository = Arc::new(MockBalanceRepository::new());
    repository.seed_pair(ACCOUNT, TOKEN, Utc::now() - chrono::Duration::days(1));
    let state = create_test_state(chain, repository);
    let router = create_router(state);

    let request = Request::builder()
        .method("POST")
        .uri("/reconciliation/run")
        .body(Body::empty())
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let report: ReconciliationReport = serde_json::from_slice(&body_bytes).unwrap();
    assert_eq!(report.scanned, 1);
    assert_eq!(report.refreshed, 1);
}

#[tokio::test]
async fn test_health_reflects_dependency_state() {
    let chain = Arc::new(MockChainAdapter::new());
    let repository = Arc::new(MockBalanceRepository::new());
    let state = create_test_state(Arc::clone(&chain), Arc::clone(&repository));
    let router = create_router(state);

    let request = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let health: HealthResponse = serde_json::from_slice(&body_bytes).unwrap();
    assert_eq!(health.status, HealthStatus::Healthy);

    chain.set_healthy(false);
    let request = Request::builder()
        .method("GET")
        .uri("/health/ready")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_liveness_always_ok() {
    let state = create_test_state(
        Arc::new(MockChainAdapter::new()),
        Arc::new(MockBalanceRepository::new()),
    );
    let router = create_router(state);

    let request = Request::builder()
        .method("GET")
        .uri("/health/live")
        .body(Body::empty())
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
