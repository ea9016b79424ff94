//! Bounded retry of store operations on transient failures.
//!
//! Every store call made through [`Collection`](crate::collection::Collection) or
//! [`Model`](crate::collection::Model) goes through a [`RetryPolicy`]. A transient failure
//! suspends the calling task for the configured delay and repeats the call; when the
//! retries are used up the failure becomes [`DocumentStoreError::StoreUnavailable`].
//! Any other error is returned on the spot.

use serde::{Deserialize, Serialize};
use std::{future::Future, time::Duration};
use tracing::{error, warn};

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Serializable form of a [`RetryPolicy`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

/// Retries an operation while it fails transiently, up to `max_retries` times.
///
/// # Example
///
/// ```ignore
/// let policy = RetryPolicy::builder()
///     .max_retries(5)
///     .retry_delay(Duration::from_millis(200))
///     .build();
///
/// let rows = policy.execute("find", || backend.find("users", query.clone(), 100)).await?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryConfig::default().into()
    }
}

impl From<RetryConfig> for RetryPolicy {
    fn from(config: RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self { max_retries, retry_delay }
    }

    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::default()
    }

    /// A policy that gives up on the first transient failure.
    pub fn never() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    /// Runs `op` until it succeeds, fails permanently, or exhausts the retries.
    ///
    /// `operation` names the store call in logs and in the resulting error.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::StoreUnavailable`] after `max_retries + 1` consecutive
    /// transient failures, or the first non-transient error `op` returns.
    pub async fn execute<T, F, Fut>(&self, operation: &str, mut op: F) -> DocumentStoreResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DocumentStoreResult<T>>,
    {
        let mut attempts: u32 = 1;

        loop {
            match op().await {
                Err(err) if err.is_transient() => {
                    if attempts > self.max_retries {
                        error!(operation, attempts, error = %err, "store unavailable, giving up");

                        return Err(DocumentStoreError::StoreUnavailable {
                            operation: operation.to_string(),
                            attempts,
                            reason: err.to_string(),
                        });
                    }

                    warn!(
                        operation,
                        attempts,
                        delay_ms = self.retry_delay.as_millis() as u64,
                        error = %err,
                        "transient store failure, retrying"
                    );

                    tokio::time::sleep(self.retry_delay).await;
                    attempts += 1;
                }
                result => return result,
            }
        }
    }
}

/// Builder for [`RetryPolicy`].
#[derive(Debug, Clone, Default)]
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl RetryPolicyBuilder {
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.policy.max_retries = max_retries;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.policy.retry_delay = delay;
        self
    }

    pub fn build(self) -> RetryPolicy {
        self.policy
    }
}
