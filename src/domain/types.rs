//! Domain types with validation support.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Starknet network a watched pair belongs to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Starknet mainnet
    #[default]
    Mainnet,
    /// Sepolia testnet
    Sepolia,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Sepolia => "sepolia",
        }
    }
}

impl std::str::FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mainnet" => Ok(Self::Mainnet),
            "sepolia" => Ok(Self::Sepolia),
            _ => Err(format!("Invalid network: {}", s)),
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Token metadata resolved from the chain
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct TokenInfo {
    /// Token contract address
    #[schema(example = "0x049d36570d4e46f48e99674bd3fcc84644ddd6b96f7c741b1562b82f9e004dc7")]
    pub address: String,
    /// Token name
    #[schema(example = "Ether")]
    pub name: String,
    /// Token symbol
    #[schema(example = "ETH")]
    pub symbol: String,
    /// Number of decimal places in base units
    #[schema(example = 18)]
    pub decimals: i32,
    /// Network the token lives on
    pub network: Network,
    /// Whether the contract behaves like a fungible (ERC-20 style) token
    pub is_fungible: bool,
    /// Whether the contract behaves like an NFT (ERC-721 style) collection
    pub is_nft: bool,
}

impl TokenInfo {
    /// Conservative fallback used when metadata cannot be resolved.
    /// Balance display must degrade gracefully rather than fail the read.
    #[must_use]
    pub fn unknown(address: &str, network: Network) -> Self {
        Self {
            address: address.to_string(),
            name: "Unknown Token".to_string(),
            symbol: "UNKNOWN".to_string(),
            decimals: 18,
            network,
            is_fungible: true,
            is_nft: false,
        }
    }
}

/// One (account, token) combination the service keeps warm
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct WatchedPair {
    /// Unique identifier (UUID)
    #[schema(example = "550e8400-e29b-41d4-a716-446655440000")]
    pub id: String,
    /// Account (wallet) address
    #[schema(example = "0x04a9e147455c8dafae167baaae0f2ef6ed8f6792847fcaa9a8a841a8c03bbee3")]
    pub account_address: String,
    /// Token contract address
    #[schema(example = "0x049d36570d4e46f48e99674bd3fcc84644ddd6b96f7c741b1562b82f9e004dc7")]
    pub token_address: String,
    /// Token name
    pub token_name: String,
    /// Token symbol
    pub token_symbol: String,
    /// Token decimals
    pub token_decimals: i32,
    /// Most recent observed balance in base units (integer string)
    #[schema(example = "1000000000000000000")]
    pub latest_balance: Option<String>,
    /// Fungible (ERC-20 style) token flag
    pub is_fungible: bool,
    /// NFT (ERC-721 style) collection flag
    pub is_nft: bool,
    /// Marked as favorite by the account owner
    pub is_favorite: bool,
    /// Network tag
    pub network: Network,
    /// Opaque token metadata
    pub metadata: Option<serde_json::Value>,
    /// When the balance was last refreshed from the chain
    pub last_refreshed_at: DateTime<Utc>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl WatchedPair {
    #[must_use]
    pub fn new(account_address: String, token: &TokenInfo) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            account_address,
            token_address: token.address.clone(),
            token_name: token.name.clone(),
            token_symbol: token.symbol.clone(),
            token_decimals: token.decimals,
            latest_balance: None,
            is_fungible: token.is_fungible,
            is_nft: token.is_nft,
            is_favorite: false,
            network: token.network,
            metadata: None,
            last_refreshed_at: now,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One immutable historical balance observation for a watched pair
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct BalanceSnapshot {
    /// Unique identifier (UUID)
    pub id: String,
    /// Watched pair this snapshot belongs to
    pub watched_pair_id: String,
    /// Account (wallet) address
    pub account_address: String,
    /// Token contract address
    pub token_address: String,
    /// Observed balance in base units (integer string)
    #[schema(example = "1500000000000000000")]
    pub balance: String,
    /// Block number the balance was read at, when known
    pub block_number: Option<i64>,
    /// When the balance was observed on chain
    pub observed_at: DateTime<Utc>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// One successful chain read, as handed to the durable store
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceObservation {
    pub account_address: String,
    pub token: TokenInfo,
    pub balance: String,
    pub block_number: Option<i64>,
    pub observed_at: DateTime<Utc>,
}

/// Balance response shape; derived, never persisted as-is
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct BalanceView {
    /// Account (wallet) address
    #[schema(example = "0x04a9e147455c8dafae167baaae0f2ef6ed8f6792847fcaa9a8a841a8c03bbee3")]
    pub account_address: String,
    /// Token contract address
    #[schema(example = "0x049d36570d4e46f48e99674bd3fcc84644ddd6b96f7c741b1562b82f9e004dc7")]
    pub token_address: String,
    /// Balance in base units (integer string)
    #[schema(example = "1000000000000000000")]
    pub balance: String,
    /// Human-readable balance
    #[schema(example = "1")]
    pub balance_formatted: String,
    /// Token name
    #[schema(example = "Ether")]
    pub token_name: String,
    /// Token symbol
    #[schema(example = "ETH")]
    pub token_symbol: String,
    /// Token decimals
    #[schema(example = 18)]
    pub token_decimals: i32,
}

/// Request body for batch balance lookups
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct MultipleBalancesRequest {
    /// Token contract addresses to query
    #[validate(length(min = 1, max = 50, message = "Between 1 and 50 token addresses required"))]
    pub token_addresses: Vec<String>,
}

/// Query parameters for a single balance lookup
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct BalanceQuery {
    /// Bypass the cache and read from the chain
    #[serde(default)]
    pub refresh: bool,
}

/// Query parameters for historical balance lookups
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct HistoryQuery {
    /// Maximum number of snapshots to return (1-500, default: 30)
    #[validate(range(min = 1, max = 500, message = "Limit must be between 1 and 500"))]
    #[serde(default = "default_history_limit")]
    pub limit: i64,
}

fn default_history_limit() -> i64 {
    30
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self {
            limit: default_history_limit(),
        }
    }
}

/// Outcome of one reconciliation run
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct ReconciliationReport {
    /// Pairs selected for refresh
    pub scanned: usize,
    /// Pairs refreshed successfully
    pub refreshed: usize,
    /// Pairs that failed to refresh
    pub failed: usize,
}

/// Health status enum
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// All systems operational
    Healthy,
    /// Some systems degraded but functional
    Degraded,
    /// Critical systems unavailable
    Unhealthy,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Overall system status
    pub status: HealthStatus,
    /// Durable store health
    pub database: HealthStatus,
    /// Chain adapter health
    pub chain: HealthStatus,
    /// Current server timestamp
    pub timestamp: DateTime<Utc>,
    /// Application version
    #[schema(example = "0.1.0")]
    pub version: String,
}

impl HealthResponse {
    #[must_use]
    pub fn new(database: HealthStatus, chain: HealthStatus) -> Self {
        let status = match (&database, &chain) {
            (HealthStatus::Healthy, HealthStatus::Healthy) => HealthStatus::Healthy,
            (HealthStatus::Unhealthy, _) | (_, HealthStatus::Unhealthy) => HealthStatus::Unhealthy,
            _ => HealthStatus::Degraded,
        };
        Self {
            status,
            database,
            chain,
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Error response structure
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error details
    pub error: ErrorDetail,
}

/// Error detail structure
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Error type identifier
    #[schema(example = "fetch_error")]
    pub r#type: String,
    /// Human-readable error message
    #[schema(example = "failed to get balance for 0xabc/0xdef: chain request timed out")]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_network_display_and_parsing() {
        let networks = vec![(Network::Mainnet, "mainnet"), (Network::Sepolia, "sepolia")];

        for (network, string) in networks {
            assert_eq!(network.as_str(), string);
            assert_eq!(network.to_string(), string);
            assert_eq!(Network::from_str(string).unwrap(), network);
        }

        assert!(Network::from_str("goerli").is_err());
    }

    #[test]
    fn test_token_info_unknown_defaults() {
        let info = TokenInfo::unknown("0xabc", Network::Mainnet);
        assert_eq!(info.name, "Unknown Token");
        assert_eq!(info.symbol, "UNKNOWN");
        assert_eq!(info.decimals, 18);
        assert!(info.is_fungible);
        assert!(!info.is_nft);
    }

    #[test]
    fn test_watched_pair_initialization_defaults() {
        let token = TokenInfo {
            address: "0xdef".to_string(),
            name: "Ether".to_string(),
            symbol: "ETH".to_string(),
            decimals: 18,
            network: Network::Mainnet,
            is_fungible: true,
            is_nft: false,
        };
        let pair = WatchedPair::new("0xabc".to_string(), &token);

        assert_eq!(pair.account_address, "0xabc");
        assert_eq!(pair.token_address, "0xdef");
        assert_eq!(pair.token_symbol, "ETH");
        assert!(pair.latest_balance.is_none());
        assert!(!pair.is_favorite);
        assert_eq!(pair.network, Network::Mainnet);
    }

    #[test]
    fn test_multiple_balances_request_validation() {
        let req = MultipleBalancesRequest {
            token_addresses: vec!["0x1".to_string()],
        };
        assert!(req.validate().is_ok());

        let req = MultipleBalancesRequest {
            token_addresses: vec![],
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_history_query_limits() {
        let query = HistoryQuery::default();
        assert_eq!(query.limit, 30);
        assert!(query.validate().is_ok());

        let query = HistoryQuery { limit: 0 };
        assert!(query.validate().is_err());
    }

    #[test]
    fn test_balance_view_serialization_roundtrip() {
        let view = BalanceView {
            account_address: "0xabc".to_string(),
            token_address: "0xdef".to_string(),
            balance: "1500000000000000000".to_string(),
            balance_formatted: "1.5".to_string(),
            token_name: "Ether".to_string(),
            token_symbol: "ETH".to_string(),
            token_decimals: 18,
        };

        let json = serde_json::to_string(&view).unwrap();
        let deserialized: BalanceView = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, view);
    }
}
