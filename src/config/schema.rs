//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the balancer.
//! All types derive Serde traits for deserialization from config files, and
//! every field has the documented default so an empty file is a valid config.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::discovery::NodeSelector;

/// Root configuration for the load balancer.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BalancerConfig {
    /// Inbound listener (host and port).
    pub listener: ListenerConfig,

    /// Node discovery settings.
    pub discovery: DiscoveryConfig,

    /// Health check settings.
    pub health_check: HealthCheckConfig,

    /// Backend port and connection pool settings.
    pub backend: BackendConfig,

    /// Per-target circuit breaker settings.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Graceful shutdown settings.
    pub shutdown: ShutdownConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Host to bind (`HOST`).
    pub host: String,

    /// Port to bind (`PORT`).
    pub port: u16,
}

impl ListenerConfig {
    /// The `host:port` string handed to the socket layer.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Which discovery strategy selects the node set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeFilter {
    /// Scaling-group membership.
    Asg,
    /// Tag key/value lookup.
    Tag,
}

impl std::str::FromStr for NodeFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asg" => Ok(NodeFilter::Asg),
            "tag" => Ok(NodeFilter::Tag),
            other => Err(format!("unknown node filter '{}', expected 'asg' or 'tag'", other)),
        }
    }
}

/// Node discovery configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Selection strategy (`NODE_FILTER`).
    pub node_filter: NodeFilter,

    /// Scaling group name (`ASG_NAME`).
    pub asg_name: String,

    /// Tag key (`TAG_NAME`).
    pub tag_name: String,

    /// Tag value (`TAG_VALUE`).
    pub tag_value: String,

    /// Region to enumerate (`AWS_REGION`).
    pub region: String,

    /// Seconds between discovery refreshes (`NODE_CHECK_PERIOD`).
    pub node_check_period_secs: u64,

    /// Inventory file read by the file-backed adapter (`NODE_INVENTORY`).
    pub inventory_path: String,

    /// Retry base unit in milliseconds (`DISCOVERY_RETRY_BASE_MS`).
    pub retry_base_ms: u64,
}

impl DiscoveryConfig {
    /// Build the selector for the configured strategy.
    pub fn selector(&self) -> NodeSelector {
        match self.node_filter {
            NodeFilter::Asg => NodeSelector::ScalingGroup(self.asg_name.clone()),
            NodeFilter::Tag => NodeSelector::Tag {
                key: self.tag_name.clone(),
                value: self.tag_value.clone(),
            },
        }
    }

    pub fn node_check_period(&self) -> Duration {
        Duration::from_secs(self.node_check_period_secs)
    }

    pub fn retry_base(&self) -> Duration {
        Duration::from_millis(self.retry_base_ms)
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            node_filter: NodeFilter::Asg,
            asg_name: "worker-nodes".to_string(),
            tag_name: "Name".to_string(),
            tag_value: "worker-node".to_string(),
            region: "eu-west-1".to_string(),
            node_check_period_secs: 10,
            inventory_path: "inventory.toml".to_string(),
            retry_base_ms: 1000,
        }
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Seconds between probe cycles (`HEALTH_CHECK_PERIOD`).
    pub period_secs: u64,

    /// Path to probe (`HEALTH_CHECK_PATH`).
    pub path: String,

    /// Per-probe timeout in seconds (`HEALTH_CHECK_TIMEOUT`).
    pub timeout_secs: u64,
}

impl HealthCheckConfig {
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            period_secs: 2,
            path: "/ping".to_string(),
            timeout_secs: 2,
        }
    }
}

/// Backend service and connection pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Service port on every node (`TARGET_PORT`).
    pub target_port: u16,

    /// Idle connections cached per target (`POOL_SIZE`).
    pub pool_size: usize,

    /// Dial timeout in seconds (`POOL_TIMEOUT`).
    pub pool_timeout_secs: u64,
}

impl BackendConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.pool_timeout_secs)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            target_port: 30080,
            pool_size: 100,
            pool_timeout_secs: 2,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Failures before the breaker opens (`CIRCUIT_BREAKER_THRESHOLD`).
    pub threshold: u32,

    /// Open window in minutes (`CIRCUIT_BREAKER_TIMEOUT`).
    pub timeout_mins: u64,
}

impl CircuitBreakerConfig {
    pub fn open_duration(&self) -> Duration {
        Duration::from_secs(self.timeout_mins.saturating_mul(60))
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            threshold: 5,
            timeout_mins: 5,
        }
    }
}

/// Graceful shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Drain deadline in seconds (`SHUTDOWN_TIMEOUT`).
    pub timeout_secs: u64,
}

impl ShutdownConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log every proxied connection at info level (`LOG_CONNECTIONS`).
    pub log_connections: bool,

    /// Enable the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Exporter bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_connections: false,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
