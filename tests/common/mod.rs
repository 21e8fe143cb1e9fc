//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tcp_balancer::discovery::StaticDiscovery;
use tcp_balancer::net::Listener;
use tcp_balancer::{Balancer, BalancerConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Start a backend that echoes everything it reads and closes on EOF.
pub async fn start_echo_backend() -> SocketAddr {
    start_delayed_echo_backend(Duration::ZERO).await
}

/// Start a backend that reads until EOF, waits `delay`, then echoes it all back.
pub async fn start_delayed_echo_backend(delay: Duration) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut received = Vec::new();
                if socket.read_to_end(&mut received).await.is_err() {
                    return;
                }
                tokio::time::sleep(delay).await;
                let _ = socket.write_all(&received).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// Start a minimal HTTP endpoint on `ip:port` answering every request with `status`.
pub async fn start_health_endpoint(ip: &str, port: u16, status: &'static str) -> SocketAddr {
    let listener = TcpListener::bind((ip, port)).await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                    status
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// A port with nothing listening on it.
pub async fn closed_port() -> u16 {
    let probe = TcpListener::bind("127.0.0.1:0").await.unwrap();
    probe.local_addr().unwrap().port()
}

/// A balancer over a fixed node list, with a low breaker threshold.
pub fn balancer(nodes: &[&str], target_port: u16) -> Balancer {
    let mut config = BalancerConfig::default();
    config.backend.target_port = target_port;
    config.backend.pool_timeout_secs = 1;
    config.circuit_breaker.threshold = 2;
    config.discovery.node_check_period_secs = 1;
    config.health_check.period_secs = 1;
    config.health_check.timeout_secs = 1;

    Balancer::new(config, Arc::new(StaticDiscovery::new(nodes.iter().copied())))
}

/// Serve `balancer` on an ephemeral loopback port.
pub async fn serve(balancer: &Balancer) -> SocketAddr {
    let listener = Listener::bind_addr("127.0.0.1:0").await.unwrap();
    balancer.serve(listener).unwrap()
}

/// Send `payload`, half-close, and collect everything sent back.
pub async fn exchange(addr: SocketAddr, payload: &[u8]) -> Vec<u8> {
    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(payload).await.unwrap();
    client.shutdown().await.unwrap();

    let mut reply = Vec::new();
    client.read_to_end(&mut reply).await.unwrap();
    reply
}

/// Poll `condition` every 10ms until it holds or `limit` elapses.
pub async fn wait_until<F>(limit: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Run `f` with a timeout, panicking with `what` if it overruns.
pub async fn within<T>(limit: Duration, what: &str, f: impl Future<Output = T>) -> T {
    match tokio::time::timeout(limit, f).await {
        Ok(v) => v,
        Err(_) => panic!("{} did not finish within {:?}", what, limit),
    }
}
