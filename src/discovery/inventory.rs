//! File-backed discovery.
//!
//! Reads an instance inventory (kept current by an external agent) on every
//! call and answers scaling-group and tag queries against it.
//!
//! ```toml
//! [[instances]]
//! private_ip = "10.0.1.12"
//! region = "eu-west-1"
//! scaling_group = "worker-nodes"
//! tags = { Name = "worker-node", team = "edge" }
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;

use crate::discovery::{DiscoveryError, NodeDiscovery, NodeSelector};

#[derive(Debug, Default, Deserialize)]
struct Inventory {
    #[serde(default)]
    instances: Vec<Instance>,
}

#[derive(Debug, Deserialize)]
struct Instance {
    private_ip: Option<String>,
    region: String,
    scaling_group: Option<String>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

impl Instance {
    fn matches(&self, region: &str, selector: &NodeSelector) -> bool {
        if self.region != region {
            return false;
        }
        match selector {
            NodeSelector::ScalingGroup(name) => self.scaling_group.as_deref() == Some(name.as_str()),
            NodeSelector::Tag { key, value } => self.tags.get(key) == Some(value),
        }
    }
}

/// Discovery adapter over a TOML inventory file.
#[derive(Debug, Clone)]
pub struct InventoryDiscovery {
    path: PathBuf,
}

impl InventoryDiscovery {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    async fn load(&self) -> Result<Inventory, DiscoveryError> {
        let display = self.path.display().to_string();
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| DiscoveryError::Read {
                path: display.clone(),
                source,
            })?;
        toml::from_str(&content).map_err(|source| DiscoveryError::Parse {
            path: display,
            source,
        })
    }
}

#[async_trait]
impl NodeDiscovery for InventoryDiscovery {
    async fn discover(
        &self,
        region: &str,
        selector: &NodeSelector,
    ) -> Result<Vec<String>, DiscoveryError> {
        let inventory = self.load().await?;

        let nodes: Vec<String> = inventory
            .instances
            .into_iter()
            .filter(|instance| instance.matches(region, selector))
            .filter_map(|instance| instance.private_ip)
            .collect();

        tracing::debug!(
            path = %self.path.display(),
            selector = %selector,
            count = nodes.len(),
            "Inventory discovery complete"
        );
        Ok(nodes)
    }
}
