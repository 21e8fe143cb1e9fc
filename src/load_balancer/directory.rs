//! Node directory: the authoritative node set and the healthy snapshot.
//!
//! # Responsibilities
//! - Refresh the known node set from discovery on a timer
//! - Keep the last-known set when discovery fails
//! - Publish the healthy snapshot read by every connection handler
//!
//! Both sets are swapped whole; readers never observe a partial update.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::time::{self, MissedTickBehavior};

use crate::discovery::{discover_with_retry, DiscoveryError, NodeDiscovery, NodeSelector, RetryPolicy};
use crate::lifecycle::ShutdownSignal;

pub struct NodeDirectory {
    source: Arc<dyn NodeDiscovery>,
    region: String,
    selector: NodeSelector,
    retry: RetryPolicy,
    /// Last successful discovery result.
    known: ArcSwap<Vec<String>>,
    /// Nodes eligible for selection. Always a subset of `known`.
    healthy: ArcSwap<Vec<String>>,
    /// Serializes writers; readers never take it.
    write: Mutex<()>,
}

impl NodeDirectory {
    pub fn new(
        source: Arc<dyn NodeDiscovery>,
        region: impl Into<String>,
        selector: NodeSelector,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            source,
            region: region.into(),
            selector,
            retry,
            known: ArcSwap::from_pointee(Vec::new()),
            healthy: ArcSwap::from_pointee(Vec::new()),
            write: Mutex::new(()),
        }
    }

    /// Current healthy snapshot.
    pub fn healthy(&self) -> Arc<Vec<String>> {
        self.healthy.load_full()
    }

    /// Nodes from the last successful discovery.
    pub fn known(&self) -> Arc<Vec<String>> {
        self.known.load_full()
    }

    /// Replace both sets wholesale with `nodes` (deduplicated). Returns the new size.
    pub fn replace(&self, nodes: Vec<String>) -> usize {
        let nodes = Arc::new(normalize(nodes));
        let count = nodes.len();
        let _write = self.write.lock().unwrap_or_else(|e| e.into_inner());
        self.known.store(Arc::clone(&nodes));
        self.healthy.store(nodes);
        count
    }

    /// Publish a health-filtered candidate set.
    ///
    /// Nodes no longer in the known set are dropped first, so a candidate
    /// built before a refresh cannot resurrect a removed node. Empty
    /// candidates are treated as probe noise and dropped, as are candidates
    /// equal to the current snapshot. Returns whether the snapshot changed.
    pub fn replace_healthy(&self, candidate: Vec<String>) -> bool {
        let _write = self.write.lock().unwrap_or_else(|e| e.into_inner());
        let known = self.known.load();
        let mut candidate = normalize(candidate);
        candidate.retain(|node| known.binary_search(node).is_ok());
        if candidate.is_empty() {
            return false;
        }
        if *self.healthy.load_full() == candidate {
            return false;
        }
        self.healthy.store(Arc::new(candidate));
        true
    }

    /// Run discovery (with retries) and replace the node set on success.
    ///
    /// On failure nothing changes and the final error is returned.
    pub async fn refresh(&self) -> Result<usize, DiscoveryError> {
        let nodes =
            discover_with_retry(self.source.as_ref(), &self.region, &self.selector, self.retry)
                .await?;
        let count = self.replace(nodes);
        tracing::debug!(selector = %self.selector, nodes = count, "Node set refreshed");
        Ok(count)
    }

    /// Refresh every `period` until shutdown. The first refresh is immediate.
    pub async fn run(self: Arc<Self>, period: Duration, mut shutdown: ShutdownSignal) {
        tracing::info!(
            period_secs = period.as_secs(),
            selector = %self.selector,
            region = %self.region,
            "Node discovery starting"
        );

        let mut ticker = time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.recv() => break,
            }
            tokio::select! {
                res = self.refresh() => {
                    if let Err(e) = res {
                        tracing::error!(
                            error = %e,
                            known = self.known.load().len(),
                            "Node discovery failed, keeping last-known nodes"
                        );
                    }
                }
                _ = shutdown.recv() => break,
            }
        }

        tracing::info!("Node discovery received shutdown signal, exiting loop");
    }
}

impl std::fmt::Debug for NodeDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeDirectory")
            .field("region", &self.region)
            .field("selector", &self.selector)
            .field("known", &self.known.load_full())
            .field("healthy", &self.healthy.load_full())
            .finish()
    }
}

fn normalize(mut nodes: Vec<String>) -> Vec<String> {
    nodes.retain(|n| !n.is_empty());
    nodes.sort();
    nodes.dedup();
    nodes
}
