//! Mock implementations for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    AppError, BalanceObservation, BalanceRepository, BalanceSnapshot, CacheError, CacheStore,
    ChainAdapter, ChainError, DatabaseError, Network, TokenInfo, WatchedPair,
};

/// Scripted failure behavior for the mock chain adapter
#[derive(Debug, Clone, Default)]
enum FailurePlan {
    #[default]
    None,
    /// Fail every call with this error
    Always(ChainError),
    /// Fail the next N calls with this error, then succeed
    Times(u32, ChainError),
}

impl FailurePlan {
    fn take_error(&mut self) -> Option<ChainError> {
        match self {
            Self::None => None,
            Self::Always(error) => Some(error.clone()),
            Self::Times(remaining, error) => {
                if *remaining == 0 {
                    *self = Self::None;
                    None
                } else {
                    *remaining -= 1;
                    Some(error.clone())
                }
            }
        }
    }
}

/// Mock chain adapter with scripted balances, metadata, and failures
pub struct MockChainAdapter {
    balances: Mutex<HashMap<String, String>>,
    token_infos: Mutex<HashMap<String, TokenInfo>>,
    per_token_failures: Mutex<HashMap<String, ChainError>>,
    balance_failures: Mutex<FailurePlan>,
    info_failures: Mutex<FailurePlan>,
    balance_calls: AtomicUsize,
    info_calls: AtomicUsize,
    is_healthy: AtomicBool,
    network: Network,
}

impl MockChainAdapter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            balances: Mutex::new(HashMap::new()),
            token_infos: Mutex::new(HashMap::new()),
            per_token_failures: Mutex::new(HashMap::new()),
            balance_failures: Mutex::new(FailurePlan::None),
            info_failures: Mutex::new(FailurePlan::None),
            balance_calls: AtomicUsize::new(0),
            info_calls: AtomicUsize::new(0),
            is_healthy: AtomicBool::new(true),
            network: Network::Mainnet,
        }
    }

    pub fn set_balance(&self, token_address: &str, account_address: &str, balance: &str) {
        self.balances.lock().unwrap().insert(
            format!("{}:{}", token_address, account_address),
            balance.to_string(),
        );
    }

    pub fn set_token_info(&self, info: TokenInfo) {
        self.token_infos
            .lock()
            .unwrap()
            .insert(info.address.clone(), info);
    }

    /// Fail every balance call with this error
    pub fn fail_balance_always(&self, error: ChainError) {
        *self.balance_failures.lock().unwrap() = FailurePlan::Always(error);
    }

    /// Fail the next `times` balance calls, then succeed again
    pub fn fail_balance_times(&self, times: u32, error: ChainError) {
        *self.balance_failures.lock().unwrap() = FailurePlan::Times(times, error);
    }

    /// Fail every balance call for one specific token
    pub fn fail_balance_for(&self, token_address: &str, error: ChainError) {
        self.per_token_failures
            .lock()
            .unwrap()
            .insert(token_address.to_string(), error);
    }

    pub fn fail_token_info(&self, error: ChainError) {
        *self.info_failures.lock().unwrap() = FailurePlan::Always(error);
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.is_healthy.store(healthy, Ordering::Relaxed);
    }

    /// Number of get_token_balance invocations
    #[must_use]
    pub fn balance_call_count(&self) -> usize {
        self.balance_calls.load(Ordering::SeqCst)
    }

    /// Number of get_token_info invocations
    #[must_use]
    pub fn info_call_count(&self) -> usize {
        self.info_calls.load(Ordering::SeqCst)
    }
}

impl Default for MockChainAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChainAdapter for MockChainAdapter {
    async fn health_check(&self) -> Result<(), AppError> {
        if !self.is_healthy.load(Ordering::Relaxed) {
            return Err(AppError::Chain(ChainError::ServiceUnavailable(
                "Unhealthy".to_string(),
            )));
        }
        Ok(())
    }

    async fn get_token_balance(
        &self,
        token_address: &str,
        account_address: &str,
    ) -> Result<String, AppError> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.per_token_failures.lock().unwrap().get(token_address) {
            return Err(AppError::Chain(error.clone()));
        }
        if let Some(error) = self.balance_failures.lock().unwrap().take_error() {
            return Err(AppError::Chain(error));
        }
        let balances = self.balances.lock().unwrap();
        Ok(balances
            .get(&format!("{}:{}", token_address, account_address))
            .cloned()
            .unwrap_or_else(|| "0".to_string()))
    }

    async fn get_token_info(&self, token_address: &str) -> Result<TokenInfo, AppError> {
        self.info_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.info_failures.lock().unwrap().take_error() {
            return Err(AppError::Chain(error));
        }
        let infos = self.token_infos.lock().unwrap();
        Ok(infos.get(token_address).cloned().unwrap_or_else(|| TokenInfo {
            address: token_address.to_string(),
            name: "Test Token".to_string(),
            symbol: "TST".to_string(),
            decimals: 18,
            network: self.network,
            is_fungible: true,
            is_nft: false,
        }))
    }

    fn network(&self) -> Network {
        self.network
    }
}

/// Mock balance repository backed by in-memory maps
pub struct MockBalanceRepository {
    pairs: Mutex<HashMap<String, WatchedPair>>,
    snapshots: Mutex<Vec<BalanceSnapshot>>,
    should_fail: AtomicBool,
    error_message: Mutex<String>,
    is_healthy: AtomicBool,
}

impl MockBalanceRepository {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pairs: Mutex::new(HashMap::new()),
            snapshots: Mutex::new(Vec::new()),
            should_fail: AtomicBool::new(false),
            error_message: Mutex::new(String::new()),
            is_healthy: AtomicBool::new(true),
        }
    }

    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        let repo = Self::new();
        repo.should_fail.store(true, Ordering::Relaxed);
        *repo.error_message.lock().unwrap() = message.into();
        repo
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.is_healthy.store(healthy, Ordering::Relaxed);
    }

    /// Insert a watched pair with an explicit refresh timestamp (for
    /// staleness scenarios)
    pub fn seed_pair(
        &self,
        account_address: &str,
        token_address: &str,
        last_refreshed_at: DateTime<Utc>,
    ) -> WatchedPair {
        let token = TokenInfo {
            address: token_address.to_string(),
            name: "Test Token".to_string(),
            symbol: "TST".to_string(),
            decimals: 18,
            network: Network::Mainnet,
            is_fungible: true,
            is_nft: false,
        };
        let mut pair = WatchedPair::new(account_address.to_string(), &token);
        pair.last_refreshed_at = last_refreshed_at;
        self.pairs
            .lock()
            .unwrap()
            .insert(pair_key(account_address, token_address), pair.clone());
        pair
    }

    /// Snapshots appended so far (for testing)
    #[must_use]
    pub fn snapshot_count(&self) -> usize {
        self.snapshots.lock().unwrap().len()
    }

    /// All stored pairs (for testing)
    #[must_use]
    pub fn all_pairs(&self) -> Vec<WatchedPair> {
        self.pairs.lock().unwrap().values().cloned().collect()
    }

    fn check_should_fail(&self) -> Result<(), AppError> {
        if self.should_fail.load(Ordering::Relaxed) {
            let message = self.error_message.lock().unwrap().clone();
            return Err(AppError::Database(DatabaseError::Query(message)));
        }
        Ok(())
    }
}

impl Default for MockBalanceRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn pair_key(account_address: &str, token_address: &str) -> String {
    format!("{}:{}", account_address, token_address)
}

#[async_trait]
impl BalanceRepository for MockBalanceRepository {
    async fn health_check(&self) -> Result<(), AppError> {
        if !self.is_healthy.load(Ordering::Relaxed) {
            return Err(AppError::Database(DatabaseError::Connection(
                "Unhealthy".to_string(),
            )));
        }
        self.check_should_fail()
    }

    async fn find_watched_pair(
        &self,
        account_address: &str,
        token_address: &str,
    ) -> Result<Option<WatchedPair>, AppError> {
        self.check_should_fail()?;
        let pairs = self.pairs.lock().unwrap();
        Ok(pairs.get(&pair_key(account_address, token_address)).cloned())
    }

    async fn upsert_watched_pair(
        &self,
        observation: &BalanceObservation,
    ) -> Result<WatchedPair, AppError> {
        self.check_should_fail()?;
        let key = pair_key(&observation.account_address, &observation.token.address);
        let mut pairs = self.pairs.lock().unwrap();
        let pair = pairs
            .entry(key)
            .or_insert_with(|| {
                WatchedPair::new(observation.account_address.clone(), &observation.token)
            });
        pair.token_name = observation.token.name.clone();
        pair.token_symbol = observation.token.symbol.clone();
        pair.token_decimals = observation.token.decimals;
        pair.latest_balance = Some(observation.balance.clone());
        pair.last_refreshed_at = observation.observed_at;
        pair.updated_at = Utc::now();
        Ok(pair.clone())
    }

    async fn append_snapshot(
        &self,
        pair: &WatchedPair,
        observation: &BalanceObservation,
    ) -> Result<BalanceSnapshot, AppError> {
        self.check_should_fail()?;
        let snapshot = BalanceSnapshot {
            id: uuid::Uuid::new_v4().to_string(),
            watched_pair_id: pair.id.clone(),
            account_address: observation.account_address.clone(),
            token_address: observation.token.address.clone(),
            balance: observation.balance.clone(),
            block_number: observation.block_number,
            observed_at: observation.observed_at,
            created_at: Utc::now(),
        };
        self.snapshots.lock().unwrap().push(snapshot.clone());
        Ok(snapshot)
    }

    async fn list_oldest_pairs(&self, limit: i64) -> Result<Vec<WatchedPair>, AppError> {
        self.check_should_fail()?;
        let pairs = self.pairs.lock().unwrap();
        let mut items: Vec<WatchedPair> = pairs.values().cloned().collect();
        items.sort_by(|a, b| a.last_refreshed_at.cmp(&b.last_refreshed_at));
        Ok(items.into_iter().take(limit.max(0) as usize).collect())
    }

    async fn list_snapshots(
        &self,
        account_address: &str,
        token_address: &str,
        limit: i64,
        order_desc: bool,
    ) -> Result<Vec<BalanceSnapshot>, AppError> {
        self.check_should_fail()?;
        let snapshots = self.snapshots.lock().unwrap();
        let mut items: Vec<BalanceSnapshot> = snapshots
            .iter()
            .filter(|s| {
                s.account_address == account_address && s.token_address == token_address
            })
            .cloned()
            .collect();
        if order_desc {
            items.sort_by(|a, b| b.observed_at.cmp(&a.observed_at));
        } else {
            items.sort_by(|a, b| a.observed_at.cmp(&b.observed_at));
        }
        Ok(items.into_iter().take(limit.max(0) as usize).collect())
    }

    async fn list_watched_pairs(
        &self,
        account_address: &str,
    ) -> Result<Vec<WatchedPair>, AppError> {
        self.check_should_fail()?;
        let pairs = self.pairs.lock().unwrap();
        let mut items: Vec<WatchedPair> = pairs
            .values()
            .filter(|p| p.account_address == account_address)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.last_refreshed_at.cmp(&a.last_refreshed_at));
        Ok(items)
    }
}

/// Cache store that always fails, for degradation tests
#[derive(Debug, Default)]
pub struct FailingCacheStore;

#[async_trait]
impl CacheStore for FailingCacheStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, AppError> {
        Err(AppError::Cache(CacheError::Unavailable(
            "cache backend down".to_string(),
        )))
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), AppError> {
        Err(AppError::Cache(CacheError::Unavailable(
            "cache backend down".to_string(),
        )))
    }

    async fn delete(&self, _key: &str) -> Result<(), AppError> {
        Err(AppError::Cache(CacheError::Unavailable(
            "cache backend down".to_string(),
        )))
    }

    async fn delete_by_prefix(&self, _prefix: &str) -> Result<u64, AppError> {
        Err(AppError::Cache(CacheError::Unavailable(
            "cache backend down".to_string(),
        )))
    }
}
