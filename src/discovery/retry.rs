//! Bounded retry around a discovery source.

use std::time::Duration;

use crate::discovery::{DiscoveryError, NodeDiscovery, NodeSelector};
use crate::resilience::backoff::linear_backoff;

/// Attempt budget and delay unit for discovery calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

/// Call `source` until it succeeds or the attempt budget is spent.
///
/// Failed attempt *i* is followed by a sleep of *i* × base before the next
/// attempt. On exhaustion the last error is returned; the caller decides what
/// to keep.
pub async fn discover_with_retry(
    source: &dyn NodeDiscovery,
    region: &str,
    selector: &NodeSelector,
    policy: RetryPolicy,
) -> Result<Vec<String>, DiscoveryError> {
    let mut attempt = 1;
    loop {
        match source.discover(region, selector).await {
            Ok(nodes) => return Ok(nodes),
            Err(e) => {
                tracing::warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    selector = %selector,
                    error = %e,
                    "Discovery attempt failed"
                );
                if attempt >= policy.max_attempts {
                    return Err(e);
                }
                tokio::time::sleep(linear_backoff(attempt, policy.base_delay)).await;
                attempt += 1;
            }
        }
    }
}
