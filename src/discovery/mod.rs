//! Node discovery subsystem.
//!
//! # Data Flow
//! ```text
//! NodeDirectory timer tick
//!     → retry.rs (bounded attempts with linear backoff)
//!     → NodeDiscovery::discover(region, selector)
//!         - inventory.rs (file-backed scaling group / tag lookup)
//!         - StaticDiscovery (fixed list)
//!     → set of node addresses (bare hosts, no port)
//! ```
//!
//! # Design Decisions
//! - Strategies are interchangeable behind one trait
//! - A failed refresh never empties the routable set; the caller keeps the
//!   last-known nodes

pub mod inventory;
pub mod retry;

use async_trait::async_trait;
use thiserror::Error;

pub use inventory::InventoryDiscovery;
pub use retry::{discover_with_retry, RetryPolicy};

/// How nodes are selected from the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeSelector {
    /// Members of a scaling group.
    ScalingGroup(String),
    /// Instances carrying a tag key/value pair.
    Tag { key: String, value: String },
}

impl std::fmt::Display for NodeSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeSelector::ScalingGroup(name) => write!(f, "asg:{}", name),
            NodeSelector::Tag { key, value } => write!(f, "tag:{}={}", key, value),
        }
    }
}

/// Errors returned by a discovery source.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to read inventory {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse inventory {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("discovery source unavailable: {0}")]
    Unavailable(String),
}

/// A source of node addresses for a region.
#[async_trait]
pub trait NodeDiscovery: Send + Sync {
    async fn discover(
        &self,
        region: &str,
        selector: &NodeSelector,
    ) -> Result<Vec<String>, DiscoveryError>;
}

/// A fixed node list; ignores region and selector.
#[derive(Debug, Clone, Default)]
pub struct StaticDiscovery {
    nodes: Vec<String>,
}

impl StaticDiscovery {
    pub fn new<I, S>(nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            nodes: nodes.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl NodeDiscovery for StaticDiscovery {
    async fn discover(
        &self,
        _region: &str,
        _selector: &NodeSelector,
    ) -> Result<Vec<String>, DiscoveryError> {
        Ok(self.nodes.clone())
    }
}
