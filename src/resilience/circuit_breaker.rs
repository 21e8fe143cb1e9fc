//! Circuit breaker for backend protection.
//!
//! # Predicate
//! ```text
//! open  ⇔  failures >= threshold  ∧  now - last_failure < open_duration
//! ```
//!
//! There is no explicit half-open state. Once the open window has elapsed
//! the breaker reads as closed again without any success being recorded;
//! the next failure re-opens it immediately because the count was not reset.
//!
//! # Design Decisions
//! - Per-target circuit breaker (not global)
//! - Fail fast while open (no dial attempt)
//! - Success resets the failure count unconditionally

use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Open window used when none is configured.
pub const DEFAULT_OPEN_DURATION: Duration = Duration::from_secs(5 * 60);

/// Failure count used when none is configured.
pub const DEFAULT_THRESHOLD: u32 = 5;

#[derive(Debug, Default, Clone, Copy)]
struct BreakerState {
    failures: u32,
    last_failure: Option<Instant>,
}

/// Whether a breaker with the given state is open at `now`.
pub fn breaker_open(
    failures: u32,
    last_failure: Option<Instant>,
    now: Instant,
    threshold: u32,
    open_duration: Duration,
) -> bool {
    match last_failure {
        Some(at) => failures >= threshold && now.saturating_duration_since(at) < open_duration,
        None => false,
    }
}

/// Failure tracker gating dial attempts to a single target.
#[derive(Debug)]
pub struct CircuitBreaker {
    state: RwLock<BreakerState>,
    threshold: u32,
    open_duration: Duration,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, open_duration: Duration) -> Self {
        Self {
            state: RwLock::new(BreakerState::default()),
            threshold,
            open_duration,
        }
    }

    /// True while the target should not be dialed.
    pub fn is_open(&self) -> bool {
        self.is_open_at(Instant::now())
    }

    pub fn is_open_at(&self, now: Instant) -> bool {
        let state = *self.state.read().unwrap_or_else(|e| e.into_inner());
        breaker_open(
            state.failures,
            state.last_failure,
            now,
            self.threshold,
            self.open_duration,
        )
    }

    pub fn record_failure(&self) {
        self.record_failure_at(Instant::now());
    }

    pub fn record_failure_at(&self, now: Instant) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.failures = state.failures.saturating_add(1);
        state.last_failure = Some(now);
    }

    pub fn record_success(&self) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.failures = 0;
    }

    pub fn failure_count(&self) -> u32 {
        self.state.read().unwrap_or_else(|e| e.into_inner()).failures
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD, DEFAULT_OPEN_DURATION)
    }
}

/// Lazily-populated breaker per target, owned by the balancer.
///
/// Entries live for the process lifetime; the map grows with the number of
/// distinct targets ever dialed.
#[derive(Debug)]
pub struct BreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    threshold: u32,
    open_duration: Duration,
}

impl BreakerRegistry {
    pub fn new(threshold: u32, open_duration: Duration) -> Self {
        Self {
            breakers: DashMap::new(),
            threshold,
            open_duration,
        }
    }

    /// Breaker for `target`, created on first use.
    pub fn get(&self, target: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(target) {
            return existing.clone();
        }
        self.breakers
            .entry(target.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(self.threshold, self.open_duration)))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_threshold_failures() {
        let cb = CircuitBreaker::new(5, DEFAULT_OPEN_DURATION);
        let now = Instant::now();

        for _ in 0..4 {
            cb.record_failure_at(now);
            assert!(!cb.is_open_at(now));
        }
        cb.record_failure_at(now);
        assert!(cb.is_open_at(now));
        assert_eq!(cb.failure_count(), 5);
    }

    #[test]
    fn success_closes_immediately() {
        let cb = CircuitBreaker::new(2, DEFAULT_OPEN_DURATION);
        cb.record_failure();
        cb.record_failure();
        assert!(cb.is_open());

        cb.record_success();
        assert!(!cb.is_open());
        assert_eq!(cb.failure_count(), 0);
    }

    #[test]
    fn heals_after_open_window_without_success() {
        let cb = CircuitBreaker::new(3, DEFAULT_OPEN_DURATION);
        let t0 = Instant::now();
        for _ in 0..3 {
            cb.record_failure_at(t0);
        }

        assert!(cb.is_open_at(t0 + Duration::from_secs(299)));
        assert!(!cb.is_open_at(t0 + DEFAULT_OPEN_DURATION + Duration::from_secs(1)));
        // The count survives the window, so one more failure re-opens it.
        let t1 = t0 + DEFAULT_OPEN_DURATION + Duration::from_secs(2);
        cb.record_failure_at(t1);
        assert!(cb.is_open_at(t1));
    }

    #[test]
    fn predicate_is_closed_without_failures() {
        let now = Instant::now();
        assert!(!breaker_open(0, None, now, 0, DEFAULT_OPEN_DURATION));
        assert!(!breaker_open(10, None, now, 5, DEFAULT_OPEN_DURATION));
        assert!(breaker_open(5, Some(now), now, 5, DEFAULT_OPEN_DURATION));
    }

    #[test]
    fn registry_isolates_targets() {
        let registry = BreakerRegistry::new(1, DEFAULT_OPEN_DURATION);
        let a = registry.get("10.0.0.1:30080");
        let b = registry.get("10.0.0.2:30080");

        a.record_failure();
        assert!(a.is_open());
        assert!(!b.is_open());

        assert!(Arc::ptr_eq(&a, &registry.get("10.0.0.1:30080")));
        assert_eq!(registry.len(), 2);
    }
}
