//! Domain traits defining contracts for external systems.

use std::time::Duration;

use async_trait::async_trait;

use super::error::AppError;
use super::types::{BalanceObservation, BalanceSnapshot, Network, TokenInfo, WatchedPair};

/// Chain adapter trait supplying token metadata and raw balances.
///
/// May raise transient or permanent errors; callers classify them through
/// the retry layer, nothing else is assumed about the transport.
#[async_trait]
pub trait ChainAdapter: Send + Sync {
    /// Check chain RPC connectivity
    async fn health_check(&self) -> Result<(), AppError>;

    /// Fetch the raw balance of `account_address` for `token_address`,
    /// in base units, as a decimal integer string
    async fn get_token_balance(
        &self,
        token_address: &str,
        account_address: &str,
    ) -> Result<String, AppError>;

    /// Resolve token metadata (name, symbol, decimals, kind)
    async fn get_token_info(&self, token_address: &str) -> Result<TokenInfo, AppError>;

    /// Network this adapter is connected to
    fn network(&self) -> Network;
}

/// Key/value cache store with per-entry TTL.
///
/// Entries may be evicted at any time; an expired entry is absent. Store
/// failures are degradation signals, never fatal to a read path.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get a value by key, `None` on miss or expiry
    async fn get(&self, key: &str) -> Result<Option<String>, AppError>;

    /// Set a value with a time-to-live
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), AppError>;

    /// Delete a single key
    async fn delete(&self, key: &str) -> Result<(), AppError>;

    /// Delete every key starting with `prefix`, returning how many were removed
    async fn delete_by_prefix(&self, prefix: &str) -> Result<u64, AppError>;
}

/// Durable store holding watched pairs and their append-only balance history
#[async_trait]
pub trait BalanceRepository: Send + Sync {
    /// Check store connectivity
    async fn health_check(&self) -> Result<(), AppError>;

    /// Find a watched pair by (account, token)
    async fn find_watched_pair(
        &self,
        account_address: &str,
        token_address: &str,
    ) -> Result<Option<WatchedPair>, AppError>;

    /// Create the watched pair for an observation, or update its latest
    /// balance and refresh timestamp. Idempotent per (account, token, network).
    async fn upsert_watched_pair(
        &self,
        observation: &BalanceObservation,
    ) -> Result<WatchedPair, AppError>;

    /// Append one immutable balance snapshot for a pair. Never deduplicated.
    async fn append_snapshot(
        &self,
        pair: &WatchedPair,
        observation: &BalanceObservation,
    ) -> Result<BalanceSnapshot, AppError>;

    /// List up to `limit` pairs ordered by `last_refreshed_at` ascending
    /// (oldest first), across all accounts
    async fn list_oldest_pairs(&self, limit: i64) -> Result<Vec<WatchedPair>, AppError>;

    /// List snapshots for a pair, newest first when `order_desc` is set
    async fn list_snapshots(
        &self,
        account_address: &str,
        token_address: &str,
        limit: i64,
        order_desc: bool,
    ) -> Result<Vec<BalanceSnapshot>, AppError>;

    /// List every watched pair for one account, most recently refreshed first
    async fn list_watched_pairs(&self, account_address: &str)
    -> Result<Vec<WatchedPair>, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::Network;

    struct MinimalChainAdapter;

    #[async_trait]
    impl ChainAdapter for MinimalChainAdapter {
        async fn health_check(&self) -> Result<(), AppError> {
            Ok(())
        }

        async fn get_token_balance(
            &self,
            _token_address: &str,
            _account_address: &str,
        ) -> Result<String, AppError> {
            Ok("0".to_string())
        }

        async fn get_token_info(&self, token_address: &str) -> Result<TokenInfo, AppError> {
            Ok(TokenInfo::unknown(token_address, Network::Mainnet))
        }

        fn network(&self) -> Network {
            Network::Mainnet
        }
    }

    #[tokio::test]
    async fn test_chain_adapter_object_safety() {
        let adapter: Box<dyn ChainAdapter> = Box::new(MinimalChainAdapter);
        assert_eq!(adapter.get_token_balance("0x1", "0x2").await.unwrap(), "0");
        assert_eq!(adapter.network(), Network::Mainnet);
    }
}
