//! Linear backoff for retried discovery calls.

use std::time::Duration;

/// Delay to wait after failed attempt number `attempt` (1-based).
///
/// Attempt *i* waits *i* × `base`; attempt 0 waits nothing.
pub fn linear_backoff(attempt: u32, base: Duration) -> Duration {
    base.saturating_mul(attempt)
}
