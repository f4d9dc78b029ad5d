//! Background persistence of balance observations.
//!
//! The read path never waits on the durable store: observations are handed
//! to a worker task over a bounded channel, and persistence failures are
//! logged and counted instead of failing the read that produced them.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::domain::{AppError, BalanceObservation, BalanceRepository};

/// Default bound on queued observations
pub const DEFAULT_PERSIST_QUEUE_CAPACITY: usize = 256;

/// Sending side of the persistence queue
#[derive(Clone)]
pub struct PersistHandle {
    tx: mpsc::Sender<BalanceObservation>,
    failures: Arc<AtomicU64>,
}

impl PersistHandle {
    /// Enqueue an observation without blocking the caller.
    ///
    /// A full queue drops the observation: the cache already holds the
    /// value, and the next refresh re-observes it. Both drop and closed
    /// channel count as persistence failures.
    pub fn enqueue(&self, observation: BalanceObservation) {
        match self.tx.try_send(observation) {
            Ok(()) => {}
            Err(TrySendError::Full(observation)) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                error!(
                    account = %observation.account_address,
                    token = %observation.token.address,
                    "Persistence queue full, dropping balance observation"
                );
            }
            Err(TrySendError::Closed(observation)) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                error!(
                    account = %observation.account_address,
                    token = %observation.token.address,
                    "Persistence worker gone, dropping balance observation"
                );
            }
        }
    }

    /// Observations that could not be persisted since startup
    #[must_use]
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

/// Spawn the persistence worker.
///
/// The worker drains the queue until every [`PersistHandle`] is dropped,
/// upserting the watched pair and appending one snapshot per observation.
pub fn spawn_persist_worker(
    repository: Arc<dyn BalanceRepository>,
    capacity: usize,
) -> (PersistHandle, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<BalanceObservation>(capacity);
    let failures = Arc::new(AtomicU64::new(0));
    let worker_failures = Arc::clone(&failures);

    let handle = tokio::spawn(async move {
        while let Some(observation) = rx.recv().await {
            if let Err(error) = persist_observation(repository.as_ref(), &observation).await {
                worker_failures.fetch_add(1, Ordering::Relaxed);
                error!(
                    account = %observation.account_address,
                    token = %observation.token.address,
                    error = %error,
                    "Failed to persist balance observation"
                );
            }
        }
        debug!("Persistence worker stopped");
    });

    (PersistHandle { tx, failures }, handle)
}

async fn persist_observation(
    repository: &dyn BalanceRepository,
    observation: &BalanceObservation,
) -> Result<(), AppError> {
    let pair = repository.upsert_watched_pair(observation).await?;
    repository.append_snapshot(&pair, observation).await?;
    Ok(())
}
