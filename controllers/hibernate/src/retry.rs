//! Fixed-interval retry for remote calls.
//!
//! Every call to either control plane (the CAST AI API or the Kubernetes
//! API server) runs under this wrapper: a bounded number of attempts at a
//! fixed interval, then the last error is surfaced as a typed result. The
//! orchestrator itself never retries business steps; each collaborator
//! pass is already retried here.

use std::time::Duration;

use tracing::warn;

/// Retry policy applied to a remote call: bounded attempts, fixed delay
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total number of attempts (the first call counts as one)
    pub max_attempts: u32,
    /// Fixed pause between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(10),
        }
    }
}

/// Execute an async operation under the retry policy.
///
/// Each failed attempt is logged; after the final attempt the error is
/// returned to the caller unchanged.
pub async fn retry<F, Fut, T, E>(policy: &RetryPolicy, name: &str, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match operation().await {
            Ok(result) => return Ok(result),
            Err(err) => {
                if attempt >= attempts {
                    warn!("Call failed [{}], attempts exhausted: {}", name, err);
                    return Err(err);
                }
                warn!(
                    "Call failed [{}] (attempt {}/{}), retrying in {:?}: {}",
                    name, attempt, attempts, policy.delay, err
                );
                tokio::time::sleep(policy.delay).await;
            }
        }
    }
}
