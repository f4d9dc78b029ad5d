//! Starknet JSON-RPC chain adapter.
//!
//! Reads ERC-20 state through `starknet_call` against the latest block.
//! Errors are mapped into the transient/permanent taxonomy so the retry
//! layer can classify them without inspecting transport details.

use std::time::Duration;

use async_trait::async_trait;
use num_bigint::BigUint;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use crate::domain::{AppError, ChainAdapter, ChainError, Network, TokenInfo};

/// starknet_keccak("balanceOf")
const SELECTOR_BALANCE_OF: &str =
    "0x02e4263afad30923c891518314c3c95dbe830a16874e8abc5777a9a20b54c76e";
/// starknet_keccak("name")
const SELECTOR_NAME: &str = "0x0361458367e696363fbcc70777d07ebbd2394e89fd0adcaf147faccd1d294d60";
/// starknet_keccak("symbol")
const SELECTOR_SYMBOL: &str = "0x0216b05c387bab9ac31918a3e61672f4618601f3c598a2f3f2710f37053e1ea4";
/// starknet_keccak("decimals")
const SELECTOR_DECIMALS: &str =
    "0x004c4fb1ab068f6039d5780c68dd0fa2f8742cceb3426d19667778ca7f3518a9";

/// Starknet JSON-RPC error code for a missing contract
const RPC_CODE_CONTRACT_NOT_FOUND: i64 = 20;

/// Configuration for the Starknet RPC client
#[derive(Debug, Clone)]
pub struct StarknetConfig {
    pub rpc_url: String,
    pub network: Network,
    pub timeout: Duration,
}

impl StarknetConfig {
    #[must_use]
    pub fn new(rpc_url: &str, network: Network) -> Self {
        Self {
            rpc_url: rpc_url.to_string(),
            network,
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: &'static str,
    id: u64,
    method: String,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// HTTP-based [`ChainAdapter`] for Starknet
pub struct StarknetChainAdapter {
    http_client: Client,
    config: StarknetConfig,
}

impl StarknetChainAdapter {
    pub fn new(config: StarknetConfig) -> Result<Self, AppError> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::Chain(ChainError::Network(e.to_string())))?;
        Ok(Self {
            http_client,
            config,
        })
    }

    pub fn with_defaults(rpc_url: &str, network: Network) -> Result<Self, AppError> {
        Self::new(StarknetConfig::new(rpc_url, network))
    }

    async fn send_request(&self, method: &str, params: Value) -> Result<Value, AppError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method: method.to_string(),
            params,
        };

        let response = self
            .http_client
            .post(&self.config.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Chain(ChainError::Timeout(e.to_string()))
                } else if e.is_connect() {
                    AppError::Chain(ChainError::ConnectionRefused(e.to_string()))
                } else {
                    AppError::Chain(ChainError::Network(e.to_string()))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                429 => AppError::Chain(ChainError::RateLimited(message)),
                503 => AppError::Chain(ChainError::ServiceUnavailable(message)),
                code => AppError::Chain(ChainError::Http {
                    status: code,
                    message,
                }),
            });
        }

        let body: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| AppError::Chain(ChainError::MalformedResponse(e.to_string())))?;

        if let Some(error) = body.error {
            return Err(AppError::Chain(map_rpc_error(error)));
        }

        body.result.ok_or_else(|| {
            AppError::Chain(ChainError::MalformedResponse(
                "response carried neither result nor error".to_string(),
            ))
        })
    }

    /// Invoke a read-only entry point against the latest block,
    /// returning the raw felt array.
    async fn starknet_call(
        &self,
        contract_address: &str,
        entry_point_selector: &str,
        calldata: Vec<String>,
    ) -> Result<Vec<String>, AppError> {
        let result = self
            .send_request(
                "starknet_call",
                json!({
                    "request": {
                        "contract_address": contract_address,
                        "entry_point_selector": entry_point_selector,
                        "calldata": calldata,
                    },
                    "block_id": "latest",
                }),
            )
            .await?;

        serde_json::from_value(result)
            .map_err(|e| AppError::Chain(ChainError::MalformedResponse(e.to_string())))
    }
}

#[async_trait]
impl ChainAdapter for StarknetChainAdapter {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        let result = self.send_request("starknet_chainId", json!([])).await?;
        debug!(chain_id = ?result, "Chain endpoint healthy");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_token_balance(
        &self,
        token_address: &str,
        account_address: &str,
    ) -> Result<String, AppError> {
        validate_address(token_address)?;
        validate_address(account_address)?;

        let felts = self
            .starknet_call(
                token_address,
                SELECTOR_BALANCE_OF,
                vec![account_address.to_string()],
            )
            .await?;

        // ERC-20 balanceOf returns a Uint256 as (low, high) felts
        let low = felts.first().ok_or_else(|| {
            AppError::Chain(ChainError::MalformedResponse(
                "empty balanceOf result".to_string(),
            ))
        })?;
        let low = felt_to_biguint(low)?;
        let high = match felts.get(1) {
            Some(high) => felt_to_biguint(high)?,
            None => BigUint::from(0u32),
        };

        let balance = (high << 128u32) + low;
        Ok(balance.to_str_radix(10))
    }

    #[instrument(skip(self))]
    async fn get_token_info(&self, token_address: &str) -> Result<TokenInfo, AppError> {
        validate_address(token_address)?;

        let (name_result, symbol_result, decimals_result) = tokio::join!(
            self.starknet_call(token_address, SELECTOR_NAME, vec![]),
            self.starknet_call(token_address, SELECTOR_SYMBOL, vec![]),
            self.starknet_call(token_address, SELECTOR_DECIMALS, vec![]),
        );

        // A contract that answers none of the three probes is surfaced as an
        // error; partial answers degrade per field like the wallets expect.
        if let (Err(name_err), Err(_), Err(_)) = (&name_result, &symbol_result, &decimals_result) {
            return Err(name_err.clone());
        }

        let is_fungible = name_result.is_ok() && symbol_result.is_ok();

        let name = name_result
            .ok()
            .and_then(|felts| felts.first().and_then(|f| decode_short_string(f)))
            .unwrap_or_else(|| "Unknown Token".to_string());
        let symbol = symbol_result
            .ok()
            .and_then(|felts| felts.first().and_then(|f| decode_short_string(f)))
            .unwrap_or_else(|| "UNKNOWN".to_string());
        let decimals = decimals_result
            .ok()
            .and_then(|felts| felts.first().and_then(|f| felt_to_biguint(f).ok()))
            .and_then(|value| i32::try_from(value).ok())
            .unwrap_or(18);

        if decimals > 77 {
            warn!(token = %token_address, decimals, "Implausible decimals from contract");
        }

        Ok(TokenInfo {
            address: token_address.to_string(),
            name,
            symbol,
            decimals,
            network: self.config.network,
            is_fungible,
            is_nft: false,
        })
    }

    fn network(&self) -> Network {
        self.config.network
    }
}

fn map_rpc_error(error: JsonRpcError) -> ChainError {
    let lowered = error.message.to_lowercase();
    if error.code == RPC_CODE_CONTRACT_NOT_FOUND || lowered.contains("contract not found") {
        ChainError::ContractNotFound(error.message)
    } else {
        ChainError::Rpc {
            code: error.code.to_string(),
            message: error.message,
        }
    }
}

/// Reject anything that is not a 0x-prefixed hex felt before it reaches the
/// RPC endpoint; a malformed address is a permanent error, never retried.
fn validate_address(address: &str) -> Result<(), AppError> {
    let hex = address
        .strip_prefix("0x")
        .ok_or_else(|| AppError::Chain(ChainError::InvalidAddress(address.to_string())))?;
    if hex.is_empty() || hex.len() > 64 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(AppError::Chain(ChainError::InvalidAddress(
            address.to_string(),
        )));
    }
    Ok(())
}

fn felt_to_biguint(felt: &str) -> Result<BigUint, AppError> {
    let hex = felt.strip_prefix("0x").unwrap_or(felt);
    if hex.is_empty() {
        return Ok(BigUint::from(0u32));
    }
    BigUint::parse_bytes(hex.as_bytes(), 16).ok_or_else(|| {
        AppError::Chain(ChainError::MalformedResponse(format!(
            "invalid felt: {}",
            felt
        )))
    })
}

/// Decode a Cairo short string (ASCII bytes packed into one felt)
fn decode_short_string(felt: &str) -> Option<String> {
    let hex = felt.strip_prefix("0x").unwrap_or(felt);
    if hex.is_empty() || hex.len() > 62 {
        return None;
    }
    let padded = if hex.len() % 2 == 1 {
        format!("0{}", hex)
    } else {
        hex.to_string()
    };

    let mut bytes = Vec::with_capacity(padded.len() / 2);
    for chunk in padded.as_bytes().chunks(2) {
        let pair = std::str::from_utf8(chunk).ok()?;
        bytes.push(u8::from_str_radix(pair, 16).ok()?);
    }

    let text: String = bytes
        .into_iter()
        .skip_while(|b| *b == 0)
        .map(char::from)
        .collect();
    if text.is_empty() || !text.chars().all(|c| c.is_ascii_graphic() || c == ' ') {
        return None;
    }
    Some(text)
}
