//! The top-level balancer instance.
//!
//! Owns every shared registry (node directory, breakers, pool, stats), the two
//! background loops, the accept loop and the shutdown coordinator. Nothing is
//! process-global, so several balancers can run side by side in one process.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::config::BalancerConfig;
use crate::discovery::{NodeDiscovery, RetryPolicy};
use crate::health::HealthMonitor;
use crate::lifecycle::{Shutdown, ShutdownError, ShutdownSignal};
use crate::load_balancer::{ConnectionPool, NodeDirectory};
use crate::net::{ConnectionTracker, Listener};
use crate::observability::BalancerStats;
use crate::proxy::ProxyEngine;
use crate::resilience::BreakerRegistry;

/// Pause after a failed accept before trying again.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Discovery attempts per refresh.
const DISCOVERY_ATTEMPTS: u32 = 3;

pub struct Balancer {
    config: BalancerConfig,
    directory: Arc<NodeDirectory>,
    breakers: Arc<BreakerRegistry>,
    pool: Arc<ConnectionPool>,
    stats: BalancerStats,
    tracker: ConnectionTracker,
    shutdown: Shutdown,
    accept_task: Mutex<Option<JoinHandle<()>>>,
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl Balancer {
    pub fn new(config: BalancerConfig, discovery: Arc<dyn NodeDiscovery>) -> Self {
        let directory = Arc::new(NodeDirectory::new(
            discovery,
            config.discovery.region.clone(),
            config.discovery.selector(),
            RetryPolicy::new(DISCOVERY_ATTEMPTS, config.discovery.retry_base()),
        ));
        let breakers = Arc::new(BreakerRegistry::new(
            config.circuit_breaker.threshold,
            config.circuit_breaker.open_duration(),
        ));
        let pool = Arc::new(ConnectionPool::new(
            config.backend.pool_size,
            config.backend.connect_timeout(),
        ));

        Self {
            config,
            directory,
            breakers,
            pool,
            stats: BalancerStats::new(),
            tracker: ConnectionTracker::new(),
            shutdown: Shutdown::new(),
            accept_task: Mutex::new(None),
            background: Mutex::new(Vec::new()),
        }
    }

    /// Start the background loops and the accept loop.
    pub fn start(&self, listener: Listener) -> std::io::Result<SocketAddr> {
        self.spawn_background_tasks();
        self.serve(listener)
    }

    /// Spawn the node discovery and health check loops. Call once.
    pub fn spawn_background_tasks(&self) {
        let discovery = tokio::spawn(Arc::clone(&self.directory).run(
            self.config.discovery.node_check_period(),
            self.shutdown.subscribe(),
        ));

        let monitor = HealthMonitor::new(
            Arc::clone(&self.directory),
            self.config.health_check.clone(),
            self.config.backend.target_port,
        );
        let health = tokio::spawn(monitor.run(self.shutdown.subscribe()));

        lock(&self.background).extend([discovery, health]);
    }

    /// Spawn the accept loop on `listener`. Returns the bound address.
    pub fn serve(&self, listener: Listener) -> std::io::Result<SocketAddr> {
        let local_addr = listener.local_addr()?;

        let engine = ProxyEngine::new(
            Arc::clone(&self.directory),
            Arc::clone(&self.breakers),
            Arc::clone(&self.pool),
            self.stats.clone(),
            self.config.backend.target_port,
        )
        .with_connection_logging(self.config.observability.log_connections);

        let handle = tokio::spawn(accept_loop(
            listener,
            engine,
            self.tracker.clone(),
            self.shutdown.subscribe(),
        ));
        *lock(&self.accept_task) = Some(handle);

        tracing::info!(address = %local_addr, target_port = self.config.backend.target_port, "Balancer serving");
        Ok(local_addr)
    }

    /// Stop accepting, cancel background loops, close the pool and drain.
    ///
    /// In-flight connections are never cancelled. If they outlive `deadline`
    /// this returns `DeadlineExceeded` and they keep running.
    pub async fn shutdown(&self, deadline: Duration) -> Result<(), ShutdownError> {
        tracing::info!(
            active = self.tracker.active_count(),
            deadline_secs = deadline.as_secs_f64(),
            "Shutting down"
        );
        self.shutdown.trigger();

        let accept = lock(&self.accept_task).take();
        if let Some(handle) = accept {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Accept loop task failed");
            }
        }

        self.pool.close();

        let background = std::mem::take(&mut *lock(&self.background));
        let drain = async {
            for handle in background {
                if let Err(e) = handle.await {
                    tracing::error!(error = %e, "Background task failed");
                }
            }
            self.tracker.wait_idle().await;
        };

        match tokio::time::timeout(deadline, drain).await {
            Ok(()) => {
                tracing::info!("All connections drained");
                Ok(())
            }
            Err(_) => {
                let active = self.tracker.active_count();
                tracing::warn!(active, "Drain deadline exceeded, leaving connections running");
                Err(ShutdownError::DeadlineExceeded { deadline, active })
            }
        }
    }

    pub fn config(&self) -> &BalancerConfig {
        &self.config
    }

    pub fn directory(&self) -> &Arc<NodeDirectory> {
        &self.directory
    }

    pub fn breakers(&self) -> &Arc<BreakerRegistry> {
        &self.breakers
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    pub fn stats(&self) -> &BalancerStats {
        &self.stats
    }

    /// In-flight connection handlers.
    pub fn active_connections(&self) -> u64 {
        self.tracker.active_count()
    }
}

async fn accept_loop(
    listener: Listener,
    engine: ProxyEngine,
    tracker: ConnectionTracker,
    mut shutdown: ShutdownSignal,
) {
    loop {
        let accepted = tokio::select! {
            res = listener.accept() => res,
            _ = shutdown.recv() => break,
        };

        match accepted {
            Ok((stream, peer)) => {
                // Tracked before spawning so a concurrent drain sees it.
                let guard = tracker.track();
                let engine = engine.clone();
                tokio::spawn(async move {
                    let id = guard.id();
                    if let Err(e) = engine.handle(stream, peer, id).await {
                        tracing::warn!(connection_id = %id, peer = %peer, error = %e, "Connection rejected");
                    }
                    drop(guard);
                });
            }
            Err(e) => {
                tracing::error!(error = %e, "Accept failed");
                if !pause_unless_shutdown(ACCEPT_ERROR_BACKOFF, &mut shutdown).await {
                    break;
                }
            }
        }
    }

    // Dropping the listener closes the socket.
    drop(listener);
    tracing::info!("Listener closed, no longer accepting connections");
}

/// Sleep for `delay`. Returns false if shutdown fired first.
async fn pause_unless_shutdown(delay: Duration, shutdown: &mut ShutdownSignal) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => true,
        _ = shutdown.recv() => false,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
