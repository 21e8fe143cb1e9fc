//! Per-connection handler: select, gate, lease, splice, report.

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpStream;

use crate::load_balancer::directory::NodeDirectory;
use crate::load_balancer::pool::{ConnectionPool, PoolError};
use crate::load_balancer::target::{select_node, target_addr};
use crate::net::ConnectionId;
use crate::observability::BalancerStats;
use crate::resilience::BreakerRegistry;

use super::splice::{splice, SpliceSummary};

/// Why an inbound connection was rejected. Every variant counts as one failed
/// connection.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("no healthy nodes available")]
    NoHealthyNodes,

    #[error("circuit breaker open for {target}")]
    CircuitOpen { target: String },

    #[error(transparent)]
    Dial(#[from] PoolError),
}

#[derive(Debug, Clone)]
pub struct ProxyEngine {
    directory: Arc<NodeDirectory>,
    breakers: Arc<BreakerRegistry>,
    pool: Arc<ConnectionPool>,
    stats: BalancerStats,
    target_port: u16,
    log_connections: bool,
}

impl ProxyEngine {
    pub fn new(
        directory: Arc<NodeDirectory>,
        breakers: Arc<BreakerRegistry>,
        pool: Arc<ConnectionPool>,
        stats: BalancerStats,
        target_port: u16,
    ) -> Self {
        Self {
            directory,
            breakers,
            pool,
            stats,
            target_port,
            log_connections: false,
        }
    }

    /// Log connection open/close at info instead of debug.
    pub fn with_connection_logging(mut self, enabled: bool) -> Self {
        self.log_connections = enabled;
        self
    }

    /// Proxy one inbound connection to a healthy node.
    ///
    /// The inbound stream is closed when this returns, whatever the outcome.
    pub async fn handle(
        &self,
        mut inbound: TcpStream,
        peer: SocketAddr,
        id: ConnectionId,
    ) -> Result<SpliceSummary, ProxyError> {
        let _active = self.stats.track_active();

        let nodes = self.directory.healthy();
        let Some(node) = select_node(&nodes) else {
            self.stats.record_failure();
            return Err(ProxyError::NoHealthyNodes);
        };
        let target = target_addr(node, self.target_port);

        let breaker = self.breakers.get(&target);
        if breaker.is_open() {
            self.stats.record_failure();
            return Err(ProxyError::CircuitOpen { target });
        }

        let mut backend = match self.pool.get(&target).await {
            Ok(conn) => conn,
            Err(e) => {
                breaker.record_failure();
                self.stats.record_failure();
                return Err(e.into());
            }
        };

        if self.log_connections {
            tracing::info!(connection_id = %id, peer = %peer, target = %target, "Connection opened");
        } else {
            tracing::debug!(connection_id = %id, peer = %peer, target = %target, "Connection opened");
        }

        let summary = splice(&mut inbound, &mut backend).await;

        let returned = self
            .pool
            .release(&target, backend, summary.backend_reusable())
            .await;
        breaker.record_success();
        self.stats.record_success();

        if self.log_connections {
            tracing::info!(
                connection_id = %id,
                target = %target,
                sent = summary.client_to_backend,
                received = summary.backend_to_client,
                pool = ?returned,
                "Connection closed"
            );
        } else {
            tracing::debug!(
                connection_id = %id,
                target = %target,
                sent = summary.client_to_backend,
                received = summary.backend_to_client,
                pool = ?returned,
                "Connection closed"
            );
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{NodeSelector, RetryPolicy, StaticDiscovery};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn engine(nodes: &[&str], port: u16) -> ProxyEngine {
        let directory = Arc::new(NodeDirectory::new(
            Arc::new(StaticDiscovery::default()),
            "eu-west-1",
            NodeSelector::ScalingGroup("workers".into()),
            RetryPolicy::default(),
        ));
        directory.replace(nodes.iter().map(|n| n.to_string()).collect());

        ProxyEngine::new(
            directory,
            Arc::new(BreakerRegistry::new(2, Duration::from_secs(300))),
            Arc::new(ConnectionPool::new(4, Duration::from_secs(1))),
            BalancerStats::new(),
            port,
        )
    }

    /// Inbound server half plus the client half connected to it.
    async fn inbound() -> (TcpStream, TcpStream, SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
        let (server, peer) = accepted.unwrap();
        (client.unwrap(), server, peer)
    }

    async fn closed_port() -> u16 {
        let probe = TcpListener::bind("127.0.0.1:0").await.unwrap();
        probe.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn empty_snapshot_rejects_and_closes() {
        let engine = engine(&[], 9);
        let (mut client, server, peer) = inbound().await;

        let err = engine.handle(server, peer, ConnectionId::new()).await.unwrap_err();
        assert!(matches!(err, ProxyError::NoHealthyNodes));
        assert_eq!(engine.stats.failed(), 1);
        assert_eq!(engine.stats.active(), 0);

        let mut buf = [0u8; 1];
        assert_eq!(client.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn dial_failures_open_the_breaker() {
        let port = closed_port().await;
        let engine = engine(&["127.0.0.1"], port);
        let target = target_addr("127.0.0.1", port);

        for _ in 0..2 {
            let (_client, server, peer) = inbound().await;
            let err = engine.handle(server, peer, ConnectionId::new()).await.unwrap_err();
            assert!(matches!(err, ProxyError::Dial(_)));
        }
        assert!(engine.breakers.get(&target).is_open());

        let (_client, server, peer) = inbound().await;
        let err = engine.handle(server, peer, ConnectionId::new()).await.unwrap_err();
        assert!(matches!(err, ProxyError::CircuitOpen { .. }));
        // Rejected before dialing: no further failure recorded on the breaker.
        assert_eq!(engine.breakers.get(&target).failure_count(), 2);
        assert_eq!(engine.stats.failed(), 3);
    }

    #[tokio::test]
    async fn reset_client_does_not_leave_backend_in_pool() {
        use tokio::sync::mpsc;

        // Reads until EOF, reports what arrived, answers, then stays open.
        let backend = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = backend.local_addr().unwrap().port();
        let (seen_tx, mut seen) = mpsc::unbounded_channel::<Vec<u8>>();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = backend.accept().await {
                let seen_tx = seen_tx.clone();
                tokio::spawn(async move {
                    let mut received = Vec::new();
                    let _ = socket.read_to_end(&mut received).await;
                    let _ = seen_tx.send(received.clone());
                    let _ = socket.write_all(b"bye").await;
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    drop(socket);
                });
            }
        });

        let engine = engine(&["127.0.0.1"], port);
        let target = target_addr("127.0.0.1", port);

        // First client resets mid-exchange while the backend is idle.
        let (client, server, peer) = inbound().await;
        let first = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.handle(server, peer, ConnectionId::new()).await })
        };
        client.set_linger(Some(Duration::ZERO)).unwrap();
        drop(client);
        tokio::time::timeout(Duration::from_secs(3), first)
            .await
            .expect("first exchange did not finish")
            .unwrap()
            .unwrap();
        assert_eq!(seen.recv().await.unwrap(), b"");
        assert_eq!(engine.pool.idle_count(&target), 0);

        // The next client gets a fresh backend connection and its bytes arrive.
        let (mut client, server, peer) = inbound().await;
        let second = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.handle(server, peer, ConnectionId::new()).await })
        };
        client.write_all(b"client two payload").await.unwrap();
        client.shutdown().await.unwrap();

        let received = tokio::time::timeout(Duration::from_secs(3), seen.recv())
            .await
            .expect("second payload never reached the backend")
            .unwrap();
        assert_eq!(received, b"client two payload");

        let mut reply = [0u8; 3];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(&reply, b"bye");
        drop(client);
        drop(second);
    }

    #[tokio::test]
    async fn successful_exchange_resets_breaker() {
        let backend = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = backend.local_addr().unwrap().port();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = backend.accept().await {
                tokio::spawn(async move {
                    let (mut r, mut w) = socket.split();
                    let _ = tokio::io::copy(&mut r, &mut w).await;
                    let _ = w.shutdown().await;
                });
            }
        });

        let engine = engine(&["127.0.0.1"], port);
        let target = target_addr("127.0.0.1", port);
        engine.breakers.get(&target).record_failure();

        let (mut client, server, peer) = inbound().await;
        let handler = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.handle(server, peer, ConnectionId::new()).await })
        };

        client.write_all(b"ping").await.unwrap();
        client.shutdown().await.unwrap();
        let mut echoed = Vec::new();
        client.read_to_end(&mut echoed).await.unwrap();
        assert_eq!(echoed, b"ping");

        let summary = handler.await.unwrap().unwrap();
        assert_eq!(summary.client_to_backend, 4);
        assert_eq!(summary.backend_to_client, 4);
        assert_eq!(engine.breakers.get(&target).failure_count(), 0);
        assert_eq!(engine.stats.successful(), 1);
        assert_eq!(engine.stats.failed(), 0);
    }
}
