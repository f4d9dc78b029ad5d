//! HTTP-level tests of the Starknet chain adapter.
//!
//! Uses `wiremock` to mock JSON-RPC responses for balance reads, metadata
//! probes, and failure mapping.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

use starknet_balance_service::domain::{AppError, ChainAdapter, ChainError, Network};
use starknet_balance_service::infra::{StarknetChainAdapter, StarknetConfig};
use starknet_balance_service::retry::is_retryable_error;

const ACCOUNT: &str = "0x04a9e147455c8dafae167baaae0f2ef6ed8f6792847fcaa9a8a841a8c03bbee3";
const TOKEN: &str = "0x049d36570d4e46f48e99674bd3fcc84644ddd6b96f7c741b1562b82f9e004dc7";

// Entry point selectors as sent on the wire
const SELECTOR_BALANCE_OF: &str =
    "0x02e4263afad30923c891518314c3c95dbe830a16874e8abc5777a9a20b54c76e";
const SELECTOR_NAME: &str = "0x0361458367e696363fbcc70777d07ebbd2394e89fd0adcaf147faccd1d294d60";
const SELECTOR_SYMBOL: &str = "0x0216b05c387bab9ac31918a3e61672f4618601f3c598a2f3f2710f37053e1ea4";
const SELECTOR_DECIMALS: &str =
    "0x004c4fb1ab068f6039d5780c68dd0fa2f8742cceb3426d19667778ca7f3518a9";

fn rpc_result(result: serde_json::Value) -> serde_json::Value {
    json!({ "jsonrpc": "2.0", "id": 1, "result": result })
}

fn adapter_for(server: &MockServer) -> StarknetChainAdapter {
    StarknetChainAdapter::with_defaults(&server.uri(), Network::Mainnet).unwrap()
}

fn call_matcher(selector: &str) -> impl wiremock::Match + 'static {
    body_partial_json(json!({
        "method": "starknet_call",
        "params": { "request": { "entry_point_selector": selector } }
    }))
}

#[tokio::test]
async fn test_balance_uint256_low_and_high_assembled() {
    let server = MockServer::start().await;
    // 1.5 tokens with 18 decimals in the low felt, empty high felt
    Mock::given(method("POST"))
        .and(call_matcher(SELECTOR_BALANCE_OF))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(rpc_result(json!(["0x14d1120d7b160000", "0x0"]))),
        )
        .mount(&server)
        .await;

    let adapter = adapter_for(&server);
    let balance = adapter.get_token_balance(TOKEN, ACCOUNT).await.unwrap();
    assert_eq!(balance, "1500000000000000000");
}

#[tokio::test]
async fn test_balance_exceeding_u128_uses_high_felt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(call_matcher(SELECTOR_BALANCE_OF))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(rpc_result(json!(["0x1", "0x2"]))),
        )
        .mount(&server)
        .await;

    let adapter = adapter_for(&server);
    let balance = adapter.get_token_balance(TOKEN, ACCOUNT).await.unwrap();
    // 2 * 2^128 + 1
    assert_eq!(balance, "680564733841876926926749214863536422913");
}

#[tokio::test]
async fn test_http_429_maps_to_retryable_rate_limit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&server)
        .await;

    let adapter = adapter_for(&server);
    let error = adapter.get_token_balance(TOKEN, ACCOUNT).await.unwrap_err();
    assert!(matches!(
        error,
        AppError::Chain(ChainError::RateLimited(_))
    ));
    assert!(is_retryable_error(&error));
}

#[tokio::test]
async fn test_http_503_maps_to_retryable_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let adapter = adapter_for(&server);
    let error = adapter.get_token_balance(TOKEN, ACCOUNT).await.unwrap_err();
    assert!(matches!(
        error,
        AppError::Chain(ChainError::ServiceUnavailable(_))
    ));
    assert!(is_retryable_error(&error));
}

#[tokio::test]
async fn test_rpc_contract_not_found_is_permanent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": 20, "message": "Contract not found" }
        })))
        .mount(&server)
        .await;

    let adapter = adapter_for(&server);
    let error = adapter.get_token_balance(TOKEN, ACCOUNT).await.unwrap_err();
    assert!(matches!(
        error,
        AppError::Chain(ChainError::ContractNotFound(_))
    ));
    assert!(!is_retryable_error(&error));
}

#[tokio::test]
async fn test_invalid_address_rejected_before_any_request() {
    let server = MockServer::start().await;
    let adapter = adapter_for(&server);

    let error = adapter
        .get_token_balance("not-an-address", ACCOUNT)
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        AppError::Chain(ChainError::InvalidAddress(_))
    ));

    let requests = server.received_requests().await.unwrap();
    assert!(requests.is_empty(), "no RPC call may be issued for bad input");
}

#[tokio::test]
async fn test_token_info_decodes_short_strings() {
    let server = MockServer::start().await;
    // "Ether"
    Mock::given(method("POST"))
        .and(call_matcher(SELECTOR_NAME))
        .respond_with(ResponseTemplate::new(200).set_body_json(rpc_result(json!(["0x4574686572"]))))
        .mount(&server)
        .await;
    // "ETH"
    Mock::given(method("POST"))
        .and(call_matcher(SELECTOR_SYMBOL))
        .respond_with(ResponseTemplate::new(200).set_body_json(rpc_result(json!(["0x455448"]))))
        .mount(&server)
        .await;
    // 18
    Mock::given(method("POST"))
        .and(call_matcher(SELECTOR_DECIMALS))
        .respond_with(ResponseTemplate::new(200).set_body_json(rpc_result(json!(["0x12"]))))
        .mount(&server)
        .await;

    let adapter = adapter_for(&server);
    let info = adapter.get_token_info(TOKEN).await.unwrap();
    assert_eq!(info.name, "Ether");
    assert_eq!(info.symbol, "ETH");
    assert_eq!(info.decimals, 18);
    assert!(info.is_fungible);
    assert_eq!(info.network, Network::Mainnet);
}

#[tokio::test]
async fn test_token_info_partial_probe_failure_degrades_per_field() {
    let server = MockServer::start().await;
    // Only decimals answers; name/symbol probes error out
    Mock::given(method("POST"))
        .and(call_matcher(SELECTOR_DECIMALS))
        .respond_with(ResponseTemplate::new(200).set_body_json(rpc_result(json!(["0x6"]))))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": 21, "message": "Invalid message selector" }
        })))
        .mount(&server)
        .await;

    let adapter = adapter_for(&server);
    let info = adapter.get_token_info(TOKEN).await.unwrap();
    assert_eq!(info.name, "Unknown Token");
    assert_eq!(info.symbol, "UNKNOWN");
    assert_eq!(info.decimals, 6);
    assert!(!info.is_fungible);
}

#[tokio::test]
async fn test_token_info_total_failure_surfaces_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": 20, "message": "Contract not found" }
        })))
        .mount(&server)
        .await;

    let adapter = adapter_for(&server);
    let error = adapter.get_token_info(TOKEN).await.unwrap_err();
    assert!(matches!(
        error,
        AppError::Chain(ChainError::ContractNotFound(_))
    ));
}

#[tokio::test]
async fn test_health_check_uses_chain_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "starknet_chainId" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(rpc_result(json!("0x534e5f4d41494e"))),
        )
        .mount(&server)
        .await;

    let adapter = adapter_for(&server);
    adapter.health_check().await.unwrap();
}

#[tokio::test]
async fn test_timeout_maps_to_retryable_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(rpc_result(json!(["0x1"])))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let adapter = StarknetChainAdapter::new(StarknetConfig {
        rpc_url: server.uri(),
        network: Network::Mainnet,
        timeout: Duration::from_millis(50),
    })
    .unwrap();

    let error = adapter.get_token_balance(TOKEN, ACCOUNT).await.unwrap_err();
    assert!(matches!(error, AppError::Chain(ChainError::Timeout(_))));
    assert!(is_retryable_error(&error));
}

#[tokio::test]
async fn test_malformed_body_maps_to_malformed_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let adapter = adapter_for(&server);
    let error = adapter.get_token_balance(TOKEN, ACCOUNT).await.unwrap_err();
    assert!(matches!(
        error,
        AppError::Chain(ChainError::MalformedResponse(_))
    ));
    assert!(!is_retryable_error(&error));
}
