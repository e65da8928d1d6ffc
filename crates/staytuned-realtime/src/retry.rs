//! Bounded-timeout retry policy for durable writes.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use staytuned_core::config::NotificationRealtimeConfig;
use staytuned_core::error::AppError;

/// How a durable write is attempted.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// Pause between attempts.
    pub backoff: Duration,
}

/// A write that failed on every attempt.
#[derive(Debug, Clone)]
pub struct RetryExhausted {
    /// Attempts made.
    pub attempts: u32,
    /// Error from the final attempt.
    pub error: AppError,
}

impl RetryPolicy {
    /// Build the policy from configuration.
    pub fn from_config(config: &NotificationRealtimeConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            timeout: Duration::from_millis(config.write_timeout_ms.max(1)),
            backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }

    /// A single attempt with the same timeout.
    pub fn single_attempt(&self) -> Self {
        Self {
            max_attempts: 1,
            ..*self
        }
    }

    /// Run `op` until it succeeds or attempts are exhausted. Each attempt is
    /// bounded by the policy timeout.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, RetryExhausted>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let error = match tokio::time::timeout(self.timeout, op()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => e,
                Err(_) => AppError::timeout(format!(
                    "{operation} timed out after {}ms",
                    self.timeout.as_millis()
                )),
            };

            if attempt >= self.max_attempts {
                return Err(RetryExhausted {
                    attempts: attempt,
                    error,
                });
            }

            warn!(
                operation,
                attempt,
                max_attempts = self.max_attempts,
                error = %error,
                "Durable write failed, retrying"
            );
            if !self.backoff.is_zero() {
                tokio::time::sleep(self.backoff).await;
            }
        }
    }
}
