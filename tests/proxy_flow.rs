//! End-to-end connection handling through a running balancer.

use std::time::Duration;

use tcp_balancer::load_balancer::target_addr;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

mod common;

#[tokio::test]
async fn echo_round_trip_counts_one_success() {
    let backend = common::start_echo_backend().await;
    let balancer = common::balancer(&["127.0.0.1"], backend.port());
    balancer.directory().refresh().await.unwrap();
    let addr = common::serve(&balancer).await;

    let payload: Vec<u8> = (0..32 * 1024).map(|i| (i * 7 % 256) as u8).collect();
    let reply = common::within(Duration::from_secs(5), "echo", common::exchange(addr, &payload)).await;
    assert_eq!(reply, payload);

    let stats = balancer.stats().clone();
    assert!(common::wait_until(Duration::from_secs(2), || stats.successful() == 1).await);
    assert_eq!(stats.failed(), 0);
    assert!(common::wait_until(Duration::from_secs(2), || balancer.active_connections() == 0).await);

    balancer.shutdown(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn zero_healthy_nodes_rejects_every_connection() {
    let balancer = common::balancer(&[], 9);
    let addr = common::serve(&balancer).await;

    for expected in 1..=3u64 {
        let mut client = TcpStream::connect(addr).await.unwrap();
        let mut buf = [0u8; 16];
        let n = common::within(Duration::from_secs(2), "reject", client.read(&mut buf))
            .await
            .unwrap_or(0);
        assert_eq!(n, 0, "connection should be closed without data");

        let stats = balancer.stats().clone();
        assert!(common::wait_until(Duration::from_secs(1), || stats.failed() == expected).await);
    }
    assert_eq!(balancer.stats().successful(), 0);

    balancer.shutdown(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn breaker_stops_dialing_after_threshold() {
    let port = common::closed_port().await;
    let balancer = common::balancer(&["127.0.0.1"], port);
    balancer.directory().refresh().await.unwrap();
    let addr = common::serve(&balancer).await;
    let target = target_addr("127.0.0.1", port);

    // Threshold is two: two dial failures, then one rejection without a dial.
    for expected in 1..=3u64 {
        let mut client = TcpStream::connect(addr).await.unwrap();
        let mut buf = [0u8; 1];
        let _ = common::within(Duration::from_secs(3), "reject", client.read(&mut buf)).await;

        let stats = balancer.stats().clone();
        assert!(common::wait_until(Duration::from_secs(2), || stats.failed() == expected).await);
    }

    let breaker = balancer.breakers().get(&target);
    assert!(breaker.is_open());
    assert_eq!(breaker.failure_count(), 2);

    balancer.shutdown(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn concurrent_connections_are_independent() {
    let backend = common::start_echo_backend().await;
    let balancer = common::balancer(&["127.0.0.1"], backend.port());
    balancer.directory().refresh().await.unwrap();
    let addr = common::serve(&balancer).await;

    let clients: Vec<_> = (0..16u8)
        .map(|i| {
            tokio::spawn(async move {
                let payload = vec![i; 1024 + i as usize];
                let reply = common::exchange(addr, &payload).await;
                assert_eq!(reply, payload);
            })
        })
        .collect();
    for client in clients {
        common::within(Duration::from_secs(5), "client", client).await.unwrap();
    }

    let stats = balancer.stats().clone();
    assert!(common::wait_until(Duration::from_secs(2), || stats.successful() == 16).await);
    assert_eq!(stats.failed(), 0);

    balancer.shutdown(Duration::from_secs(1)).await.unwrap();
}
