//! Periodic balance reconciliation.
//!
//! Selects the least-recently-refreshed watched pairs and refreshes them
//! through the orchestrator in paced chunks. Selection and pacing live
//! here; the fetch/cache/persist logic stays in [`BalanceService`].

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, sleep};
use tracing::{error, info, instrument};

use crate::app::service::BalanceService;
use crate::domain::{AppError, BalanceRepository, ReconciliationReport, WatchedPair};

/// Reconciliation worker configuration
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Time between runs
    pub interval: Duration,
    /// Pairs selected per run, oldest `last_refreshed_at` first
    pub batch_size: i64,
    /// Pairs refreshed concurrently within one chunk
    pub chunk_size: usize,
    /// Pause between chunks. This is the sole throttle protecting the
    /// chain provider's rate limit; do not remove it.
    pub chunk_delay: Duration,
    /// Master switch for the background loop
    pub enabled: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60 * 60),
            batch_size: 50,
            chunk_size: 10,
            chunk_delay: Duration::from_secs(2),
            enabled: true,
        }
    }
}

/// Periodic job refreshing stale watched pairs
pub struct ReconciliationWorker {
    service: Arc<BalanceService>,
    repository: Arc<dyn BalanceRepository>,
    config: SchedulerConfig,
}

impl ReconciliationWorker {
    #[must_use]
    pub fn new(
        service: Arc<BalanceService>,
        repository: Arc<dyn BalanceRepository>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            service,
            repository,
            config,
        }
    }

    /// Execute one reconciliation pass.
    ///
    /// An empty batch is a silent no-op. Per-pair failures are logged and
    /// counted without stopping the chunk or the batch; a crash mid-batch
    /// leaves stale pairs for the next run (oldest-first selection heals).
    #[instrument(skip(self))]
    pub async fn run_once(&self) -> Result<ReconciliationReport, AppError> {
        self.run_batch(None).await
    }

    /// Run the periodic loop until the shutdown signal fires. The first
    /// pass runs at startup, later passes on the configured interval; the
    /// loop is also cancellable between chunks of a pass.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let ticked = tokio::select! {
                _ = ticker.tick() => true,
                _ = shutdown.wait_for(|stop| *stop) => false,
            };
            if !ticked {
                break;
            }
            match self.run_batch(Some(&mut shutdown)).await {
                Ok(_) => {}
                Err(AppError::Cancelled) => break,
                Err(error) => {
                    error!(error = %error, "Reconciliation run failed");
                }
            }
        }
        info!("Reconciliation worker stopped");
    }

    async fn run_batch(
        &self,
        mut shutdown: Option<&mut watch::Receiver<bool>>,
    ) -> Result<ReconciliationReport, AppError> {
        let pairs = self
            .repository
            .list_oldest_pairs(self.config.batch_size)
            .await?;

        // Idle systems must not log or alert spuriously
        if pairs.is_empty() {
            return Ok(ReconciliationReport::default());
        }

        info!(count = pairs.len(), "Reconciling stale balances");
        let mut report = ReconciliationReport {
            scanned: pairs.len(),
            ..Default::default()
        };

        let mut chunks = pairs.chunks(self.config.chunk_size.max(1)).peekable();
        while let Some(chunk) = chunks.next() {
            for refreshed in join_all(chunk.iter().map(|pair| self.refresh_pair(pair))).await {
                if refreshed {
                    report.refreshed += 1;
                } else {
                    report.failed += 1;
                }
            }

            // Inter-chunk pause keeps the chain provider under its rate
            // limit; cancellable so shutdown is not held up by it.
            if chunks.peek().is_some() {
                match shutdown.as_deref_mut() {
                    Some(rx) => {
                        tokio::select! {
                            _ = sleep(self.config.chunk_delay) => {}
                            _ = rx.wait_for(|stop| *stop) => return Err(AppError::Cancelled),
                        }
                    }
                    None => sleep(self.config.chunk_delay).await,
                }
            }
        }

        info!(
            scanned = report.scanned,
            refreshed = report.refreshed,
            failed = report.failed,
            "Reconciliation run complete"
        );
        Ok(report)
    }

    async fn refresh_pair(&self, pair: &WatchedPair) -> bool {
        match self
            .service
            .get_balance(&pair.account_address, &pair.token_address, true)
            .await
        {
            Ok(_) => true,
            Err(error) => {
                error!(
                    account = %pair.account_address,
                    token = %pair.token_address,
                    error = %error,
                    "Failed to refresh watched pair"
                );
                false
            }
        }
    }
}

/// Spawn the reconciliation loop, returning its handle and shutdown sender.
pub fn spawn_scheduler(
    worker: Arc<ReconciliationWorker>,
) -> (JoinHandle<()>, watch::Sender<bool>) {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(async move {
        worker.run(shutdown_rx).await;
    });
    (handle, shutdown_tx)
}
