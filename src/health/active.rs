//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every known node over HTTP
//! - Narrow the healthy snapshot to the nodes that passed
//! - Never publish an empty snapshot (an all-failing cycle is discarded)

use std::sync::Arc;
use std::time::{Duration, Instant};

use hyper::header::USER_AGENT;
use hyper::{Method, Request};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::task::JoinSet;
use tokio::time::{self, MissedTickBehavior};

use crate::config::HealthCheckConfig;
use crate::lifecycle::ShutdownSignal;
use crate::load_balancer::directory::NodeDirectory;
use crate::load_balancer::target::target_addr;
use crate::observability::metrics;

/// Result of probing a single node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Healthy,
    Failed { reason: String },
}

impl ProbeOutcome {
    pub fn is_healthy(&self) -> bool {
        matches!(self, ProbeOutcome::Healthy)
    }
}

/// What one probe cycle did to the healthy snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The snapshot was replaced with `healthy` nodes.
    Updated { healthy: usize },
    /// Passing set equals the current snapshot.
    Unchanged,
    /// No node passed; the snapshot was left alone.
    Discarded,
}

pub struct HealthMonitor {
    directory: Arc<NodeDirectory>,
    config: HealthCheckConfig,
    port: u16,
    client: Client<HttpConnector, String>,
}

impl HealthMonitor {
    pub fn new(directory: Arc<NodeDirectory>, config: HealthCheckConfig, port: u16) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Self {
            directory,
            config,
            port,
            client,
        }
    }

    pub async fn run(self, mut shutdown: ShutdownSignal) {
        tracing::info!(
            interval = self.config.period_secs,
            path = %self.config.path,
            port = self.port,
            "Health monitor starting"
        );

        let mut ticker = time::interval(self.config.period());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.recv() => break,
            }
            tokio::select! {
                _ = self.run_cycle() => {}
                _ = shutdown.recv() => break,
            }
        }

        tracing::info!("Health monitor received shutdown signal, exiting loop");
    }

    /// Probe every known node once and publish the passing set.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let nodes = self.directory.known();
        if nodes.is_empty() {
            return CycleOutcome::Discarded;
        }

        let mut probes = JoinSet::new();
        for node in nodes.iter().cloned() {
            let client = self.client.clone();
            let uri = format!("{}{}", probe_base(&node, self.port), self.config.path);
            let timeout = self.config.timeout();
            probes.spawn(async move {
                let started = Instant::now();
                let outcome = probe(&client, &uri, timeout).await;
                metrics::record_probe(&node, outcome.is_healthy(), started.elapsed());
                if let ProbeOutcome::Failed { reason } = &outcome {
                    tracing::warn!(node = %node, uri = %uri, reason = %reason, "Health check failed");
                }
                (node, outcome)
            });
        }

        let mut passing = Vec::with_capacity(nodes.len());
        while let Some(joined) = probes.join_next().await {
            match joined {
                Ok((node, ProbeOutcome::Healthy)) => passing.push(node),
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Health probe task failed"),
            }
        }

        if passing.is_empty() {
            tracing::warn!(
                known = nodes.len(),
                "No node passed health checks, keeping current healthy set"
            );
            return CycleOutcome::Discarded;
        }

        let healthy = passing.len();
        if self.directory.replace_healthy(passing) {
            tracing::info!(healthy, known = nodes.len(), "Healthy node set updated");
            CycleOutcome::Updated { healthy }
        } else {
            CycleOutcome::Unchanged
        }
    }
}

fn probe_base(node: &str, port: u16) -> String {
    format!("http://{}", target_addr(node, port))
}

/// One HTTP GET; 2xx within `timeout` passes.
async fn probe(client: &Client<HttpConnector, String>, uri: &str, timeout: Duration) -> ProbeOutcome {
    let request = match Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header(USER_AGENT, "tcp-balancer-health-check")
        .body(String::new())
    {
        Ok(req) => req,
        Err(e) => {
            return ProbeOutcome::Failed {
                reason: format!("invalid request: {}", e),
            }
        }
    };

    match time::timeout(timeout, client.request(request)).await {
        Ok(Ok(response)) if response.status().is_success() => ProbeOutcome::Healthy,
        Ok(Ok(response)) => ProbeOutcome::Failed {
            reason: format!("status {}", response.status()),
        },
        Ok(Err(e)) => ProbeOutcome::Failed {
            reason: format!("connection error: {}", e),
        },
        Err(_) => ProbeOutcome::Failed {
            reason: format!("timeout after {:?}", timeout),
        },
    }
}
