//! Bounded exponential backoff for connection setup.
//!
//! Only the initial rendezvous join or link open is retried. Once a room is
//! up, a lost connection ends the session instead of being resumed.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::TransportError;

/// How often and how patiently to retry a failed connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt. 0 disables retrying.
    pub max_retries: u32,
    /// Delay before the first retry; doubled for every retry after it.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

/// Runs `attempt` until it succeeds, fails with a non-retryable error, or
/// the policy's retries are spent.
///
/// `attempt` receives the 0-based attempt number.
///
/// # Errors
/// - Any non-retryable error (e.g. [`TransportError::Unsupported`]) is
///   returned as-is on first sight.
/// - [`TransportError::RetriesExhausted`] wraps the last retryable error.
pub async fn with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    mut attempt: F,
) -> Result<T, TransportError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    let mut n = 0;
    loop {
        match attempt(n).await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) if n >= policy.max_retries => {
                tracing::warn!(attempts = n + 1, error = %e, "connection attempts exhausted");
                return Err(TransportError::RetriesExhausted {
                    attempts: n + 1,
                    last: Box::new(e),
                });
            }
            Err(e) => {
                n += 1;
                let delay = policy.delay_for(n);
                tracing::debug!(
                    retry = n,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "connection attempt failed, backing off"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
