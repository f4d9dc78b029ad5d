//! Balance orchestration with graceful degradation.
//!
//! The service owns every cache read/write and every durable append. Reads
//! are cache-aside: a warm entry answers immediately, a miss falls through
//! to the chain behind bounded retries, and the result is written back to
//! the cache and handed to the persistence worker.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, error, instrument, warn};

use crate::app::persist::{DEFAULT_PERSIST_QUEUE_CAPACITY, PersistHandle, spawn_persist_worker};
use crate::domain::{
    AppError, BalanceObservation, BalanceRepository, BalanceSnapshot, BalanceView, CacheStore,
    ChainAdapter, HealthResponse, HealthStatus, TokenInfo, WatchedPair, format_token_balance,
};
use crate::retry::{
    DEFAULT_MAX_RETRIES, ExponentialBackoff, execute_with_retry, is_retryable_error,
};

/// Cache key prefix for balance views
pub const BALANCE_CACHE_PREFIX: &str = "token_balance:";
/// Cache key prefix for token metadata
pub const TOKEN_INFO_CACHE_PREFIX: &str = "token_info:";

/// Tuning knobs for the orchestrator
#[derive(Debug, Clone)]
pub struct BalanceServiceConfig {
    /// TTL for cached balance views
    pub balance_ttl: Duration,
    /// TTL for cached token metadata; metadata changes far less often
    /// than balances, so it is cached on its own much longer key
    pub token_info_ttl: Duration,
    /// Retries after the initial chain attempt
    pub max_retries: u32,
    /// First backoff delay
    pub initial_retry_delay: Duration,
    /// Backoff ceiling
    pub max_retry_delay: Duration,
    /// Bound on the persistence queue
    pub persist_queue_capacity: usize,
}

impl Default for BalanceServiceConfig {
    fn default() -> Self {
        Self {
            balance_ttl: Duration::from_secs(5 * 60),
            token_info_ttl: Duration::from_secs(24 * 60 * 60),
            max_retries: DEFAULT_MAX_RETRIES,
            initial_retry_delay: Duration::from_secs(1),
            max_retry_delay: Duration::from_secs(10),
            persist_queue_capacity: DEFAULT_PERSIST_QUEUE_CAPACITY,
        }
    }
}

#[must_use]
pub fn balance_cache_key(account_address: &str, token_address: &str) -> String {
    format!("{BALANCE_CACHE_PREFIX}{account_address}:{token_address}")
}

#[must_use]
pub fn token_info_cache_key(token_address: &str) -> String {
    format!("{TOKEN_INFO_CACHE_PREFIX}{token_address}")
}

/// Application service orchestrating cache, chain, and durable store
pub struct BalanceService {
    chain: Arc<dyn ChainAdapter>,
    cache: Arc<dyn CacheStore>,
    repository: Arc<dyn BalanceRepository>,
    config: BalanceServiceConfig,
    persist: PersistHandle,
}

impl BalanceService {
    #[must_use]
    pub fn new(
        chain: Arc<dyn ChainAdapter>,
        cache: Arc<dyn CacheStore>,
        repository: Arc<dyn BalanceRepository>,
        config: BalanceServiceConfig,
    ) -> Self {
        let (persist, _worker) =
            spawn_persist_worker(Arc::clone(&repository), config.persist_queue_capacity);
        Self {
            chain,
            cache,
            repository,
            config,
            persist,
        }
    }

    /// Observations dropped or rejected by the durable store since startup
    #[must_use]
    pub fn persist_failure_count(&self) -> u64 {
        self.persist.failure_count()
    }

    /// Get the balance of one (account, token) pair.
    ///
    /// Cache hits return immediately and are not re-recorded. On a miss (or
    /// `force_refresh`) the chain is read behind bounded retries, the view
    /// is cached, and the observation is queued for durable persistence.
    /// Exhausted retries fail the call with the underlying cause attached.
    #[instrument(skip(self), fields(account = %account_address, token = %token_address))]
    pub async fn get_balance(
        &self,
        account_address: &str,
        token_address: &str,
        force_refresh: bool,
    ) -> Result<BalanceView, AppError> {
        let cache_key = balance_cache_key(account_address, token_address);

        if !force_refresh {
            if let Some(view) = self.read_cached_view(&cache_key).await {
                debug!("Returning cached balance");
                return Ok(view);
            }
        }

        debug!("Fetching balance from chain");
        let token = self.resolve_token_info(token_address).await;

        let balance = execute_with_retry(
            || self.chain.get_token_balance(token_address, account_address),
            self.config.max_retries,
            ExponentialBackoff::new(self.config.initial_retry_delay, 2, self.config.max_retry_delay),
            is_retryable_error,
        )
        .await
        .map_err(|e| {
            error!(error = %e, "Balance fetch failed");
            AppError::fetch(account_address, token_address, e)
        })?;

        let view = BalanceView {
            account_address: account_address.to_string(),
            token_address: token_address.to_string(),
            balance: balance.clone(),
            balance_formatted: format_token_balance(&balance, token.decimals.max(0) as u32),
            token_name: token.name.clone(),
            token_symbol: token.symbol.clone(),
            token_decimals: token.decimals,
        };

        // Chain fetch strictly precedes the cache write, which strictly
        // precedes the durable dispatch.
        self.write_cached_view(&cache_key, &view).await;

        self.persist.enqueue(BalanceObservation {
            account_address: account_address.to_string(),
            token,
            balance,
            block_number: None,
            observed_at: Utc::now(),
        });

        Ok(view)
    }

    /// Get balances for several tokens of one account concurrently.
    ///
    /// Collect-what-succeeded semantics: a failing token is logged and
    /// dropped from the result instead of failing the batch.
    #[instrument(skip(self, token_addresses), fields(account = %account_address, tokens = token_addresses.len()))]
    pub async fn get_multiple_balances(
        &self,
        account_address: &str,
        token_addresses: &[String],
    ) -> Vec<BalanceView> {
        let fetches = token_addresses.iter().map(|token_address| async move {
            match self
                .get_balance(account_address, token_address, false)
                .await
            {
                Ok(view) => Some(view),
                Err(error) => {
                    error!(token = %token_address, error = %error, "Skipping failed balance in batch");
                    None
                }
            }
        });

        join_all(fetches).await.into_iter().flatten().collect()
    }

    /// Historical snapshots for a pair, newest first
    #[instrument(skip(self))]
    pub async fn get_historical_balances(
        &self,
        account_address: &str,
        token_address: &str,
        limit: i64,
    ) -> Result<Vec<BalanceSnapshot>, AppError> {
        self.repository
            .list_snapshots(account_address, token_address, limit.clamp(1, 500), true)
            .await
    }

    /// All watched pairs for one account, most recently refreshed first
    #[instrument(skip(self))]
    pub async fn list_watched_pairs(
        &self,
        account_address: &str,
    ) -> Result<Vec<WatchedPair>, AppError> {
        self.repository.list_watched_pairs(account_address).await
    }

    /// Drop the cached balance for one pair. No durable side effects.
    #[instrument(skip(self))]
    pub async fn clear_cache(
        &self,
        account_address: &str,
        token_address: &str,
    ) -> Result<(), AppError> {
        self.cache
            .delete(&balance_cache_key(account_address, token_address))
            .await
    }

    /// Drop every cached balance view. No durable side effects.
    #[instrument(skip(self))]
    pub async fn clear_all_caches(&self) -> Result<u64, AppError> {
        self.cache.delete_by_prefix(BALANCE_CACHE_PREFIX).await
    }

    /// Perform health check on all dependencies
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> HealthResponse {
        let database = match self.repository.health_check().await {
            Ok(()) => HealthStatus::Healthy,
            Err(_) => HealthStatus::Unhealthy,
        };
        let chain = match self.chain.health_check().await {
            Ok(()) => HealthStatus::Healthy,
            Err(_) => HealthStatus::Unhealthy,
        };
        HealthResponse::new(database, chain)
    }

    async fn read_cached_view(&self, cache_key: &str) -> Option<BalanceView> {
        match self.cache.get(cache_key).await {
            Ok(Some(serialized)) => match serde_json::from_str(&serialized) {
                Ok(view) => Some(view),
                Err(error) => {
                    warn!(key = %cache_key, error = %error, "Dropping undecodable cache entry");
                    None
                }
            },
            Ok(None) => None,
            Err(error) => {
                // Cache trouble is a degradation signal, never fatal
                warn!(key = %cache_key, error = %error, "Cache read failed, falling through to chain");
                None
            }
        }
    }

    async fn write_cached_view(&self, cache_key: &str, view: &BalanceView) {
        let serialized = match serde_json::to_string(view) {
            Ok(serialized) => serialized,
            Err(error) => {
                warn!(key = %cache_key, error = %error, "Could not serialize balance view");
                return;
            }
        };
        if let Err(error) = self
            .cache
            .set(cache_key, serialized, self.config.balance_ttl)
            .await
        {
            warn!(key = %cache_key, error = %error, "Cache write failed");
        }
    }

    /// Resolve token metadata through its own longer-lived cache.
    ///
    /// Failure substitutes a conservative default instead of failing the
    /// read; the fallback is not cached so the next read probes again.
    async fn resolve_token_info(&self, token_address: &str) -> TokenInfo {
        let cache_key = token_info_cache_key(token_address);

        if let Ok(Some(serialized)) = self.cache.get(&cache_key).await {
            if let Ok(info) = serde_json::from_str::<TokenInfo>(&serialized) {
                return info;
            }
        }

        match self.chain.get_token_info(token_address).await {
            Ok(info) => {
                if let Ok(serialized) = serde_json::to_string(&info) {
                    if let Err(error) = self
                        .cache
                        .set(&cache_key, serialized, self.config.token_info_ttl)
                        .await
                    {
                        warn!(token = %token_address, error = %error, "Token info cache write failed");
                    }
                }
                info
            }
            Err(error) => {
                warn!(token = %token_address, error = %error, "Falling back to default token metadata");
                TokenInfo::unknown(token_address, self.chain.network())
            }
        }
    }
}
