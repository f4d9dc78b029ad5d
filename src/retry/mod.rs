//! Retry support for chain operations: exponential backoff, transient-error
//! classification, and a bounded retry executor.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::sleep;
use tracing::debug;

use crate::domain::{AppError, ChainError};

/// Default number of retries after the initial attempt
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Structured error codes that always classify as transient
pub const RETRYABLE_ERROR_CODES: &[&str] = &[
    "NETWORK_ERROR",
    "TIMEOUT",
    "CONNECTION_REFUSED",
    "NODE_IS_SYNCING",
    "TOO_MANY_REQUESTS",
    "RATE_LIMIT_EXCEEDED",
    "SERVICE_UNAVAILABLE",
];

/// Message fragments that additionally classify as transient for
/// chain-write operations. These resolve once network state advances.
const WRITE_RETRY_FRAGMENTS: &[&str] = &[
    "nonce",
    "gas",
    "pending",
    "underpriced",
    "already known",
    "replacement transaction",
    "insufficient funds",
    "not found",
];

/// Bounded multiplicative backoff. Deterministic: no jitter is added;
/// callers needing jitter compose it externally. Create a fresh generator
/// per retry session, or call `reset` between independent sessions.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial_delay: Duration,
    multiplier: u32,
    max_delay: Duration,
    attempt: u32,
}

impl ExponentialBackoff {
    #[must_use]
    pub fn new(initial_delay: Duration, multiplier: u32, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            multiplier,
            max_delay,
            attempt: 0,
        }
    }

    /// Next delay: `min(initial * multiplier^attempt, max_delay)`,
    /// advancing the internal attempt counter.
    pub fn next(&mut self) -> Duration {
        let factor = u64::from(self.multiplier).saturating_pow(self.attempt.min(63));
        let millis = (self.initial_delay.as_millis() as u64).saturating_mul(factor);
        self.attempt += 1;
        Duration::from_millis(millis).min(self.max_delay)
    }

    /// Zero the attempt counter for reuse in a new retry session
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

impl Default for ExponentialBackoff {
    /// 1 s initial delay, doubling, capped at 30 s
    fn default() -> Self {
        Self::new(Duration::from_secs(1), 2, Duration::from_secs(30))
    }
}

fn message_is_transient(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("timeout")
        || message.contains("etimedout")
        || message.contains("network")
        || message.contains("connection")
        || message.contains("econnrefused")
        || message.contains("socket hang up")
        || message.contains("rate limit")
        || message.contains("too many requests")
        || message.contains("syncing")
        || message.contains("service unavailable")
        || message.contains("server error")
}

/// Classify an error as transient (retry) or permanent (surface verbatim).
#[must_use]
pub fn is_retryable_error(error: &AppError) -> bool {
    let AppError::Chain(chain) = error else {
        return false;
    };
    match chain {
        ChainError::Timeout(_)
        | ChainError::Network(_)
        | ChainError::ConnectionRefused(_)
        | ChainError::RateLimited(_)
        | ChainError::NodeSyncing(_)
        | ChainError::ServiceUnavailable(_) => true,
        ChainError::Http { status, .. } => *status == 429 || *status == 503,
        ChainError::Rpc { code, message } => {
            RETRYABLE_ERROR_CODES.contains(&code.as_str()) || message_is_transient(message)
        }
        ChainError::InvalidAddress(_)
        | ChainError::ContractNotFound(_)
        | ChainError::MalformedResponse(_) => false,
    }
}

/// Chain-write variant of the classifier: nonce conflicts, underpriced gas,
/// "already known" and similar submission races also clear after a short
/// wait once the network state advances.
#[must_use]
pub fn is_chain_write_retryable(error: &AppError) -> bool {
    if is_retryable_error(error) {
        return true;
    }
    let AppError::Chain(chain) = error else {
        return false;
    };
    let message = chain.to_string().to_lowercase();
    WRITE_RETRY_FRAGMENTS
        .iter()
        .any(|fragment| message.contains(fragment))
}

/// Drive `operation` through bounded retries.
///
/// Attempt 0 runs immediately. On failure the error is classified; a
/// permanent error or an exhausted budget propagates the last error
/// verbatim, otherwise the executor sleeps `backoff.next()` and retries.
pub async fn execute_with_retry<T, F, Fut>(
    operation: F,
    max_retries: u32,
    backoff: ExponentialBackoff,
    is_retryable: impl Fn(&AppError) -> bool,
) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    run_with_retry(operation, max_retries, backoff, is_retryable, None).await
}

/// Cancellable variant: aborts with [`AppError::Cancelled`] if the shutdown
/// signal fires at either suspension point (the operation await or the
/// backoff sleep). A dropped sender counts as shutdown.
pub async fn execute_with_retry_cancellable<T, F, Fut>(
    operation: F,
    max_retries: u32,
    backoff: ExponentialBackoff,
    is_retryable: impl Fn(&AppError) -> bool,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    run_with_retry(operation, max_retries, backoff, is_retryable, Some(shutdown)).await
}

async fn run_with_retry<T, F, Fut>(
    mut operation: F,
    max_retries: u32,
    mut backoff: ExponentialBackoff,
    is_retryable: impl Fn(&AppError) -> bool,
    mut shutdown: Option<&mut watch::Receiver<bool>>,
) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let mut attempt: u32 = 0;
    loop {
        let result = match shutdown.as_deref_mut() {
            Some(rx) => {
                tokio::select! {
                    result = operation() => result,
                    _ = rx.wait_for(|stop| *stop) => return Err(AppError::Cancelled),
                }
            }
            None => operation().await,
        };

        let error = match result {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        if attempt >= max_retries || !is_retryable(&error) {
            return Err(error);
        }

        let delay = backoff.next();
        debug!(
            attempt,
            max_retries,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Transient failure, retrying after backoff"
        );

        match shutdown.as_deref_mut() {
            Some(rx) => {
                tokio::select! {
                    _ = sleep(delay) => {}
                    _ = rx.wait_for(|stop| *stop) => return Err(AppError::Cancelled),
                }
            }
            None => sleep(delay).await,
        }

        attempt += 1;
    }
}
