//! Retry of gateway calls with exponential backoff
//!
//! Transient failures are retried up to three times, waiting 2s, 4s and 8s.
//! Fatal failures and failures to rebuild a channel end the call at once.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rust_common::{RetryConfig, RetryPolicy, Sleeper};

use crate::error::{GatewayFailure, SigningError};

/// Retries after the first attempt.
pub const MAX_RETRIES: u32 = 3;
/// Wait before the first retry; doubles for each following one.
pub const INITIAL_BACKOFF: Duration = Duration::from_secs(2);

/// Retry configuration of the signing client.
#[must_use]
pub fn signing_retry_config() -> RetryConfig {
    RetryConfig::default()
        .with_max_retries(MAX_RETRIES)
        .with_initial_delay(INITIAL_BACKOFF)
        .with_max_delay(Duration::from_secs(60))
        .without_jitter()
}

/// Runs gateway operations under the signing retry policy.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(signing_retry_config())
    }
}

impl RetryExecutor {
    /// Creates an executor sleeping on the tokio timer.
    #[must_use]
    pub fn new(config: RetryConfig) -> Self {
        Self {
            policy: RetryPolicy::new(config),
        }
    }

    /// Replaces the sleeper used between attempts.
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.policy = self.policy.with_sleeper(sleeper);
        self
    }

    /// Backoff before retry number `retry` (one-based).
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        self.policy.delay_for_attempt(retry.saturating_sub(1))
    }

    /// Runs `operation`, retrying transient failures.
    ///
    /// # Errors
    ///
    /// - `ServiceUnavailable` when every attempt failed transiently
    /// - `Communication` or `Rejected` on the first fatal gateway failure
    /// - the setup error when a healthy channel could not be obtained
    pub async fn execute<F, Fut, T>(&self, label: &str, operation: F) -> Result<T, SigningError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GatewayFailure>>,
    {
        self.policy
            .execute(label, operation)
            .await
            .map_err(SigningError::from)
    }
}
