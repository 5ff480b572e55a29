//! CONNECT tunnel tests against a mock upstream proxy.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use relay_proxy::http::response::CONNECTION_ESTABLISHED;

mod common;

const ACCEPT: &[u8] = b"HTTP/1.1 200 Connection established\r\n\r\n";
const DENY: &[u8] = b"HTTP/1.1 407 Proxy Authentication Required\r\nContent-Length: 0\r\n\r\n";

async fn read_established(stream: &mut TcpStream) {
    let mut head = vec![0u8; CONNECTION_ESTABLISHED.len()];
    stream.read_exact(&mut head).await.unwrap();
    assert_eq!(head, CONNECTION_ESTABLISHED);
}

#[tokio::test]
async fn tunnel_relays_bytes_both_ways() {
    let (upstream, mut sessions) = common::start_mock_upstream(ACCEPT).await;
    let config = common::test_config(upstream, "exit 1");
    let proxy_url = format!("http://svc:tok123@{}:{}", upstream.ip(), upstream.port());
    let (relay, shutdown) = common::start_relay(config, Some(proxy_url)).await;

    let mut client = TcpStream::connect(relay).await.unwrap();
    client
        .write_all(b"CONNECT api.nuget.org:443 HTTP/1.1\r\nHost: api.nuget.org:443\r\n\r\n")
        .await
        .unwrap();
    read_established(&mut client).await;

    // TLS-looking binary payload, larger than one relay chunk.
    let payload: Vec<u8> = (0..50_000u32).map(|i| (i.wrapping_mul(31) % 256) as u8).collect();
    client.write_all(&payload).await.unwrap();

    let mut echoed = vec![0u8; payload.len()];
    tokio::time::timeout(Duration::from_secs(5), client.read_exact(&mut echoed))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(echoed, payload);

    drop(client);
    let session = tokio::time::timeout(Duration::from_secs(5), sessions.recv())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        session.handshake,
        "CONNECT api.nuget.org:443 HTTP/1.1\r\n\
         Host: api.nuget.org:443\r\n\
         Proxy-Authorization: Basic c3ZjOnRvazEyMw==\r\n\r\n"
    );
    assert_eq!(session.relayed, payload);
    assert!(session.closed_by_relay);

    shutdown.trigger();
}

#[tokio::test]
async fn fallback_endpoint_used_without_proxy_url() {
    let (upstream, mut sessions) = common::start_mock_upstream(ACCEPT).await;
    let config = common::test_config(upstream, "exit 1");
    let (relay, shutdown) = common::start_relay(config, None).await;

    let mut client = TcpStream::connect(relay).await.unwrap();
    client.write_all(b"CONNECT example.com:8443 HTTP/1.1\r\n\r\n").await.unwrap();
    read_established(&mut client).await;
    client.write_all(b"ping").await.unwrap();
    let mut pong = [0u8; 4];
    client.read_exact(&mut pong).await.unwrap();
    assert_eq!(&pong, b"ping");
    drop(client);

    let session = sessions.recv().await.unwrap();
    assert_eq!(
        session.handshake,
        "CONNECT example.com:8443 HTTP/1.1\r\nHost: example.com:8443\r\n\r\n"
    );

    shutdown.trigger();
}

#[tokio::test]
async fn bytes_sent_with_connect_head_are_forwarded() {
    let (upstream, mut sessions) = common::start_mock_upstream(ACCEPT).await;
    let config = common::test_config(upstream, "exit 1");
    let (relay, shutdown) = common::start_relay(config, None).await;

    let mut client = TcpStream::connect(relay).await.unwrap();
    client
        .write_all(b"CONNECT example.com:443 HTTP/1.1\r\n\r\n\x16\x03\x01hello")
        .await
        .unwrap();
    read_established(&mut client).await;

    let mut echoed = [0u8; 8];
    client.read_exact(&mut echoed).await.unwrap();
    assert_eq!(&echoed, b"\x16\x03\x01hello");
    drop(client);

    let session = sessions.recv().await.unwrap();
    assert_eq!(session.relayed, b"\x16\x03\x01hello");

    shutdown.trigger();
}

#[tokio::test]
async fn rejected_handshake_relays_nothing() {
    let (upstream, mut sessions) = common::start_mock_upstream(DENY).await;
    let config = common::test_config(upstream, "exit 1");
    let (relay, shutdown) = common::start_relay(config, None).await;

    let mut client = TcpStream::connect(relay).await.unwrap();
    client.write_all(b"CONNECT example.com:443 HTTP/1.1\r\n\r\n").await.unwrap();
    read_established(&mut client).await;

    // Data written now must never reach the upstream.
    let _ = client.write_all(b"should not arrive").await;

    let mut rest = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), client.read_to_end(&mut rest))
        .await
        .expect("client connection was not closed")
        .ok();
    assert!(rest.is_empty());

    let session = tokio::time::timeout(Duration::from_secs(5), sessions.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(session.relayed.is_empty());
    assert!(session.closed_by_relay);

    shutdown.trigger();
}

#[tokio::test]
async fn unreachable_upstream_closes_client() {
    // Reserve a port and release it so nothing listens there.
    let unused = {
        let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        probe.local_addr().unwrap()
    };
    let config = common::test_config(unused, "exit 1");
    let (relay, shutdown) = common::start_relay(config, None).await;

    let response = common::exchange(relay, b"CONNECT example.com:443 HTTP/1.1\r\n\r\n").await;
    assert_eq!(response, CONNECTION_ESTABLISHED);

    shutdown.trigger();
}

#[tokio::test]
async fn idle_tunnel_is_closed() {
    let (upstream, mut sessions) = common::start_mock_upstream(ACCEPT).await;
    let mut config = common::test_config(upstream, "exit 1");
    config.timeouts.idle_secs = 1;
    let (relay, shutdown) = common::start_relay(config, None).await;

    let mut client = TcpStream::connect(relay).await.unwrap();
    client.write_all(b"CONNECT example.com:443 HTTP/1.1\r\n\r\n").await.unwrap();
    read_established(&mut client).await;

    let mut rest = Vec::new();
    let closed = tokio::time::timeout(Duration::from_secs(5), client.read_to_end(&mut rest)).await;
    assert!(closed.is_ok(), "idle tunnel stayed open");
    assert!(rest.is_empty());

    let session = tokio::time::timeout(Duration::from_secs(5), sessions.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(session.closed_by_relay);

    shutdown.trigger();
}

#[tokio::test]
async fn malformed_connect_target_gets_no_response() {
    let (upstream, _sessions) = common::start_mock_upstream(ACCEPT).await;
    let config = common::test_config(upstream, "exit 1");
    let (relay, shutdown) = common::start_relay(config, None).await;

    let response = common::exchange(relay, b"CONNECT example.com:https HTTP/1.1\r\n\r\n").await;
    assert!(response.is_empty());

    shutdown.trigger();
}
