//! Per-target connection pool.
//!
//! # Responsibilities
//! - Cache idle outbound connections per target (last in, first out)
//! - Dial a fresh connection, bounded by the connect timeout, on a miss
//! - Probe liveness before caching a returned connection
//! - Reject (close) returned connections once a target's cache is full
//!
//! A connection is owned either by the idle cache or by the caller of
//! [`ConnectionPool::get`], never both.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use thiserror::Error;
use tokio::net::TcpStream;

/// How long `put` waits for a returned connection to become readable.
const LIVENESS_PROBE_DEADLINE: Duration = Duration::from_millis(1);

/// Dial failures. Not retried inside the pool.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("dial {target} timed out after {timeout:?}")]
    Timeout { target: String, timeout: Duration },

    #[error("dial {target} failed: {source}")]
    Connect {
        target: String,
        #[source]
        source: std::io::Error,
    },
}

/// Why a returned connection was not cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// Peer closed, sent unsolicited data, or the socket errored.
    Dead,
    /// The target's idle cache is at capacity.
    PoolFull,
    /// The pool has been closed for shutdown.
    Closed,
    /// Our write half was shut down; the peer has seen FIN.
    HalfClosed,
}

/// Result of returning a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Pooled,
    Discarded(DiscardReason),
}

/// Bounded LIFO cache of idle connections, keyed by target.
#[derive(Debug)]
pub struct ConnectionPool {
    idle: DashMap<String, Vec<TcpStream>>,
    max_idle: usize,
    connect_timeout: Duration,
    closed: AtomicBool,
}

impl ConnectionPool {
    pub fn new(max_idle: usize, connect_timeout: Duration) -> Self {
        Self {
            idle: DashMap::new(),
            max_idle,
            connect_timeout,
            closed: AtomicBool::new(false),
        }
    }

    /// Lease a connection to `target`: the most recently returned idle one,
    /// else a fresh dial.
    pub async fn get(&self, target: &str) -> Result<TcpStream, PoolError> {
        // The shard guard must be released before dialing.
        let cached = self.idle.get_mut(target).and_then(|mut conns| conns.pop());
        if let Some(conn) = cached {
            tracing::trace!(target = %target, "Reusing pooled connection");
            return Ok(conn);
        }

        match tokio::time::timeout(self.connect_timeout, TcpStream::connect(target)).await {
            Ok(Ok(conn)) => {
                tracing::debug!(target = %target, "Dialed new backend connection");
                Ok(conn)
            }
            Ok(Err(source)) => Err(PoolError::Connect {
                target: target.to_string(),
                source,
            }),
            Err(_) => Err(PoolError::Timeout {
                target: target.to_string(),
                timeout: self.connect_timeout,
            }),
        }
    }

    /// Return a connection. Dead or excess connections are closed.
    pub async fn put(&self, target: &str, conn: TcpStream) -> PutOutcome {
        if self.closed.load(Ordering::Acquire) {
            return PutOutcome::Discarded(DiscardReason::Closed);
        }
        if !is_alive(&conn).await {
            tracing::debug!(target = %target, "Discarding dead backend connection");
            return PutOutcome::Discarded(DiscardReason::Dead);
        }

        let mut conns = self.idle.entry(target.to_string()).or_default();
        // Re-checked under the shard lock so nothing is cached after close().
        if self.closed.load(Ordering::Acquire) {
            return PutOutcome::Discarded(DiscardReason::Closed);
        }
        if conns.len() >= self.max_idle {
            tracing::trace!(target = %target, "Pool at capacity, closing connection");
            return PutOutcome::Discarded(DiscardReason::PoolFull);
        }
        conns.push(conn);
        tracing::trace!(target = %target, pooled = conns.len(), "Connection returned to pool");
        PutOutcome::Pooled
    }

    /// Return a connection after use. Connections the caller marks as not
    /// reusable are closed without touching the cache.
    pub async fn release(&self, target: &str, conn: TcpStream, reusable: bool) -> PutOutcome {
        if !reusable {
            tracing::trace!(target = %target, "Closing half-closed backend connection");
            return PutOutcome::Discarded(DiscardReason::HalfClosed);
        }
        self.put(target, conn).await
    }

    /// Close every idle connection and stop caching. Returns how many were closed.
    pub fn close(&self) -> usize {
        self.closed.store(true, Ordering::Release);

        let closed: usize = self.idle.iter().map(|entry| entry.value().len()).sum();
        self.idle.clear();

        tracing::info!(closed, "Connection pool closed");
        closed
    }

    /// Idle connections currently cached for `target`.
    pub fn idle_count(&self, target: &str) -> usize {
        self.idle.get(target).map(|conns| conns.len()).unwrap_or(0)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Short non-blocking read probe.
///
/// An idle, healthy peer has nothing to say, so the readiness wait times out.
/// Readable means EOF or unsolicited bytes; neither is safe to reuse.
async fn is_alive(conn: &TcpStream) -> bool {
    match tokio::time::timeout(LIVENESS_PROBE_DEADLINE, conn.readable()).await {
        Err(_) => true,
        Ok(Err(_)) => false,
        Ok(Ok(())) => {
            let mut buf = [0u8; 1];
            match conn.try_read(&mut buf) {
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => true,
                _ => false,
            }
        }
    }
}
