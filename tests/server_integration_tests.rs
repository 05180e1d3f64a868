// Server integration tests
//
// These tests bind a responder on 127.0.0.1 with an ephemeral port and talk
// to it over real UDP sockets. Upstream resolution is mocked.

mod common;

use bound::{
    cache::LocalCache,
    config::BoundConfig,
    resolver::DnsResolver,
    server::{Server, handle_datagram},
};
use common::{MockUpstream, create_dns_query_bytes, create_test_resolver, tail};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::{
    net::UdpSocket,
    sync::broadcast,
    task::JoinHandle,
    time::timeout,
};

struct TestServer {
    addr: SocketAddr,
    shutdown_tx: broadcast::Sender<()>,
    handle: JoinHandle<bound::error::Result<()>>,
}

// Helper to start a test server with random port
async fn start_test_server(entries: &[(&str, &str)], upstream: MockUpstream) -> TestServer {
    let config = BoundConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        ..BoundConfig::default()
    };

    let cache = LocalCache::with_entries(entries.iter().copied());
    let resolver = Arc::new(DnsResolver::new(Arc::new(cache), Arc::new(upstream)));
    let server = Server::bind(&config, resolver)
        .await
        .expect("Failed to bind test server");
    let addr = server.local_addr().unwrap();

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let handle = tokio::spawn(server.run(shutdown_rx));

    TestServer {
        addr,
        shutdown_tx,
        handle,
    }
}

async fn client() -> UdpSocket {
    UdpSocket::bind("127.0.0.1:0").await.unwrap()
}

async fn ask(socket: &UdpSocket, server: SocketAddr, query: &[u8]) -> Option<Vec<u8>> {
    socket.send_to(query, server).await.unwrap();
    let mut buf = vec![0u8; 512];
    match timeout(Duration::from_secs(2), socket.recv_from(&mut buf)).await {
        Ok(Ok((len, _))) => Some(buf[..len].to_vec()),
        _ => None,
    }
}

#[tokio::test]
async fn test_cached_a_record_is_answered() {
    let server = start_test_server(&[("www.example.com", "1.2.5.33")], MockUpstream::new()).await;
    let socket = client().await;

    let query = create_dns_query_bytes(0xbeef, "www.example.com", 1);
    let response = ask(&socket, server.addr, &query).await.expect("no response");

    assert_eq!(&response[0..2], &[0xbe, 0xef]);
    assert_eq!(&response[2..4], &[0x81, 0x80]);
    assert_eq!(&response[6..8], &[0x00, 0x01]);
    // Question echoed verbatim after the header
    assert_eq!(&response[12..query.len()], &query[12..]);
    assert_eq!(tail(&response, 4), &[1, 2, 5, 33]);
}

#[tokio::test]
async fn test_unknown_reverse_lookup_is_not_found() {
    let server = start_test_server(&[], MockUpstream::new()).await;
    let socket = client().await;

    let query = create_dns_query_bytes(7, "4.3.2.1.in-addr.arpa", 12);
    let response = ask(&socket, server.addr, &query).await.expect("no response");

    assert_eq!(&response[2..4], &[0x81, 0x83]);
    assert_eq!(tail(&response, 4), &[0, 0, 0, 0]);
}

#[tokio::test]
async fn test_malformed_packet_gets_no_reply_and_server_keeps_serving() {
    let server = start_test_server(&[("alive.test", "10.0.0.1")], MockUpstream::new()).await;
    let socket = client().await;

    assert!(ask(&socket, server.addr, &[0x12, 0x34, 0x01]).await.is_none());

    let query = create_dns_query_bytes(1, "alive.test", 1);
    let response = ask(&socket, server.addr, &query).await.expect("no response");
    assert_eq!(tail(&response, 4), &[10, 0, 0, 1]);
}

#[tokio::test]
async fn test_responses_are_ignored() {
    let server = start_test_server(&[("alive.test", "10.0.0.1")], MockUpstream::new()).await;
    let socket = client().await;

    let mut query = create_dns_query_bytes(1, "alive.test", 1);
    query[2] |= 0x80;
    assert!(ask(&socket, server.addr, &query).await.is_none());
}

#[tokio::test]
async fn test_slow_upstream_does_not_block_cache_hits() {
    let upstream = MockUpstream::new()
        .with_a("slow.test", &["9.9.9.9".parse().unwrap()])
        .with_delay("slow.test", Duration::from_millis(1500));
    let server = start_test_server(&[("fast.test", "1.1.1.1")], upstream).await;

    let slow_client = client().await;
    let slow_query = create_dns_query_bytes(1, "slow.test", 1);
    slow_client.send_to(&slow_query, server.addr).await.unwrap();

    // Give the slow query a head start so it is in flight
    tokio::time::sleep(Duration::from_millis(50)).await;

    let fast_client = client().await;
    let fast_query = create_dns_query_bytes(2, "fast.test", 1);
    fast_client.send_to(&fast_query, server.addr).await.unwrap();

    let mut buf = vec![0u8; 512];
    let (len, _) = timeout(Duration::from_millis(500), fast_client.recv_from(&mut buf))
        .await
        .expect("cache hit was blocked by the slow upstream lookup")
        .unwrap();
    assert_eq!(tail(&buf[..len], 4), &[1, 1, 1, 1]);

    let (len, _) = timeout(Duration::from_secs(3), slow_client.recv_from(&mut buf))
        .await
        .expect("slow query never answered")
        .unwrap();
    assert_eq!(tail(&buf[..len], 4), &[9, 9, 9, 9]);
}

#[tokio::test]
async fn test_server_stops_on_shutdown_signal() {
    let server = start_test_server(&[], MockUpstream::new()).await;

    server.shutdown_tx.send(()).unwrap();
    let result = timeout(Duration::from_secs(2), server.handle)
        .await
        .expect("server did not stop")
        .expect("server task panicked");
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_non_utf8_label_still_gets_verbatim_answer() {
    let resolver = create_test_resolver(&[], Arc::new(MockUpstream::new()));
    let src: SocketAddr = "127.0.0.1:5353".parse().unwrap();

    let mut packet = vec![0x00, 0x2a, 0x01, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0, 0, 100];
    packet.extend_from_slice(&[0xff; 100]);
    packet.extend_from_slice(b"\x03com\x00\x00\x01\x00\x01");

    let response = handle_datagram(&packet, &resolver, src)
        .await
        .expect("query with non-UTF-8 label was dropped");
    assert_eq!(&response[12..packet.len()], &packet[12..]);
    assert_eq!(&response[2..4], &[0x81, 0x83]);
}

#[tokio::test]
async fn test_bind_rejects_oversized_concurrency_limit() {
    let config = BoundConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        max_concurrent_queries: 1usize << 32,
        ..BoundConfig::default()
    };
    let resolver = Arc::new(create_test_resolver(&[], Arc::new(MockUpstream::new())));

    assert!(Server::bind(&config, resolver).await.is_err());
}

#[tokio::test]
async fn test_shutdown_waits_for_in_flight_queries() {
    let upstream = MockUpstream::new()
        .with_a("slow.test", &["9.9.9.9".parse().unwrap()])
        .with_delay("slow.test", Duration::from_millis(400));
    let server = start_test_server(&[], upstream).await;

    let socket = client().await;
    let query = create_dns_query_bytes(3, "slow.test", 1);
    socket.send_to(&query, server.addr).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let started = std::time::Instant::now();
    server.shutdown_tx.send(()).unwrap();
    timeout(Duration::from_secs(3), server.handle)
        .await
        .expect("server did not stop")
        .expect("server task panicked")
        .unwrap();
    assert!(started.elapsed() >= Duration::from_millis(200));

    // The in-flight answer was sent before the server returned
    let mut buf = vec![0u8; 512];
    let (len, _) = timeout(Duration::from_millis(200), socket.recv_from(&mut buf))
        .await
        .expect("in-flight query was abandoned")
        .unwrap();
    assert_eq!(tail(&buf[..len], 4), &[9, 9, 9, 9]);
}
