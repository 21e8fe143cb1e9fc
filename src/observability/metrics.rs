//! Metrics collection and exposition.
//!
//! # Metrics
//! - `load_balancer_successful_connections_total` (counter)
//! - `load_balancer_failed_connections_total` (counter)
//! - `load_balancer_active_connections` (gauge)
//! - `load_balancer_health_check_latency_seconds` (histogram)
//! - `load_balancer_node_health_status{node}` (gauge): 1=healthy, 0=unhealthy
//!
//! # Design Decisions
//! - Every update goes to the `metrics` facade; the exporter is installed by
//!   the binary only
//! - Connection counters are also kept in `BalancerStats`, owned by the
//!   balancer instance, so they can be read back without a recorder

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

const SUCCESSFUL_CONNECTIONS: &str = "load_balancer_successful_connections_total";
const FAILED_CONNECTIONS: &str = "load_balancer_failed_connections_total";
const ACTIVE_CONNECTIONS: &str = "load_balancer_active_connections";
const HEALTH_CHECK_LATENCY: &str = "load_balancer_health_check_latency_seconds";
const NODE_HEALTH_STATUS: &str = "load_balancer_node_health_status";

/// Install the Prometheus exporter and describe every metric.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;

    describe_counter!(SUCCESSFUL_CONNECTIONS, "Total number of successful connection attempts");
    describe_counter!(FAILED_CONNECTIONS, "Total number of failed connection attempts");
    describe_gauge!(ACTIVE_CONNECTIONS, "Number of currently active connections");
    describe_histogram!(HEALTH_CHECK_LATENCY, "Latency of health checks in seconds");
    describe_gauge!(
        NODE_HEALTH_STATUS,
        "Health status of each node (1 for healthy, 0 for unhealthy)"
    );

    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record one health probe.
pub fn record_probe(node: &str, healthy: bool, latency: Duration) {
    histogram!(HEALTH_CHECK_LATENCY).record(latency.as_secs_f64());
    gauge!(NODE_HEALTH_STATUS, "node" => node.to_string()).set(if healthy { 1.0 } else { 0.0 });
}

#[derive(Debug, Default)]
struct StatsInner {
    successful: AtomicU64,
    failed: AtomicU64,
    active: AtomicU64,
}

/// Connection outcome counters for one balancer instance.
#[derive(Debug, Clone, Default)]
pub struct BalancerStats {
    inner: Arc<StatsInner>,
}

impl BalancerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self) {
        self.inner.successful.fetch_add(1, Ordering::Relaxed);
        counter!(SUCCESSFUL_CONNECTIONS).increment(1);
    }

    pub fn record_failure(&self) {
        self.inner.failed.fetch_add(1, Ordering::Relaxed);
        counter!(FAILED_CONNECTIONS).increment(1);
    }

    /// Count a connection as active until the returned guard is dropped.
    pub fn track_active(&self) -> ActiveConnection {
        self.inner.active.fetch_add(1, Ordering::Relaxed);
        gauge!(ACTIVE_CONNECTIONS).increment(1.0);
        ActiveConnection {
            inner: Arc::clone(&self.inner),
        }
    }

    pub fn successful(&self) -> u64 {
        self.inner.successful.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.inner.failed.load(Ordering::Relaxed)
    }

    pub fn active(&self) -> u64 {
        self.inner.active.load(Ordering::Relaxed)
    }
}

/// Active-connection gauge guard.
#[derive(Debug)]
pub struct ActiveConnection {
    inner: Arc<StatsInner>,
}

impl Drop for ActiveConnection {
    fn drop(&mut self) {
        self.inner.active.fetch_sub(1, Ordering::Relaxed);
        gauge!(ACTIVE_CONNECTIONS).decrement(1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_and_gauge() {
        let stats = BalancerStats::new();
        stats.record_success();
        stats.record_failure();
        stats.record_failure();

        let active = stats.track_active();
        assert_eq!(stats.active(), 1);
        drop(active);

        assert_eq!(stats.successful(), 1);
        assert_eq!(stats.failed(), 2);
        assert_eq!(stats.active(), 0);
    }

    #[test]
    fn clones_share_counters() {
        let stats = BalancerStats::new();
        let other = stats.clone();
        other.record_success();
        assert_eq!(stats.successful(), 1);
    }
}
