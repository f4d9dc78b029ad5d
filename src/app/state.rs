//! Application state management.

use std::sync::Arc;

use crate::domain::{BalanceRepository, CacheStore, ChainAdapter};

use super::scheduler::{ReconciliationWorker, SchedulerConfig};
use super::service::{BalanceService, BalanceServiceConfig};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<BalanceService>,
    pub reconciliation: Arc<ReconciliationWorker>,
    pub chain: Arc<dyn ChainAdapter>,
    pub cache: Arc<dyn CacheStore>,
    pub repository: Arc<dyn BalanceRepository>,
}

impl AppState {
    /// Create application state with default service and scheduler tuning
    #[must_use]
    pub fn new(
        chain: Arc<dyn ChainAdapter>,
        cache: Arc<dyn CacheStore>,
        repository: Arc<dyn BalanceRepository>,
    ) -> Self {
        Self::with_config(
            chain,
            cache,
            repository,
            BalanceServiceConfig::default(),
            SchedulerConfig::default(),
        )
    }

    /// Create application state with explicit tuning
    #[must_use]
    pub fn with_config(
        chain: Arc<dyn ChainAdapter>,
        cache: Arc<dyn CacheStore>,
        repository: Arc<dyn BalanceRepository>,
        service_config: BalanceServiceConfig,
        scheduler_config: SchedulerConfig,
    ) -> Self {
        let service = Arc::new(BalanceService::new(
            Arc::clone(&chain),
            Arc::clone(&cache),
            Arc::clone(&repository),
            service_config,
        ));
        let reconciliation = Arc::new(ReconciliationWorker::new(
            Arc::clone(&service),
            Arc::clone(&repository),
            scheduler_config,
        ));
        Self {
            service,
            reconciliation,
            chain,
            cache,
            repository,
        }
    }
}
