//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use relay_proxy::config::RelayConfig;
use relay_proxy::http::ProxyServer;
use relay_proxy::lifecycle::Shutdown;
use relay_proxy::net::Listener;
use relay_proxy::upstream::{FixedProxySource, ProxyUrlSource};

/// What the mock upstream proxy saw on one connection.
#[derive(Debug)]
pub struct UpstreamSession {
    /// The CONNECT request head, terminator included.
    pub handshake: String,
    /// Bytes received after the handshake.
    pub relayed: Vec<u8>,
    /// Whether the relay closed the connection.
    pub closed_by_relay: bool,
}

/// Start a mock upstream proxy.
///
/// Each connection gets `reply` after its CONNECT head. When the reply is a
/// 200 the mock echoes every byte back until the relay closes; otherwise it
/// only waits for the relay to hang up.
#[allow(dead_code)]
pub async fn start_mock_upstream(reply: &'static [u8]) -> (SocketAddr, mpsc::UnboundedReceiver<UpstreamSession>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();
    let echo = reply.starts_with(b"HTTP/1.1 200");

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                let mut head = Vec::new();
                let mut buf = [0u8; 1024];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => head.extend_from_slice(&buf[..n]),
                    }
                }
                let _ = socket.write_all(reply).await;

                let mut relayed = Vec::new();
                let closed_by_relay = loop {
                    match tokio::time::timeout(Duration::from_secs(10), socket.read(&mut buf)).await {
                        Ok(Ok(0)) => break true,
                        Ok(Ok(n)) => {
                            relayed.extend_from_slice(&buf[..n]);
                            if echo && socket.write_all(&buf[..n]).await.is_err() {
                                break true;
                            }
                        }
                        Ok(Err(_)) => break true,
                        Err(_) => break false,
                    }
                };

                let _ = tx.send(UpstreamSession {
                    handshake: String::from_utf8_lossy(&head).into_owned(),
                    relayed,
                    closed_by_relay,
                });
            });
        }
    });

    (addr, rx)
}

/// Relay configuration suitable for tests: ephemeral port, short timeouts,
/// `sh -c <script>` as the executor.
#[allow(dead_code)]
pub fn test_config(upstream: SocketAddr, executor_script: &str) -> RelayConfig {
    let mut config = RelayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.upstream.fallback_host = upstream.ip().to_string();
    config.upstream.fallback_port = upstream.port();
    config.timeouts.head_secs = 5;
    config.timeouts.body_secs = 5;
    config.timeouts.connect_secs = 5;
    config.timeouts.handshake_secs = 5;
    config.timeouts.idle_secs = 5;
    config.timeouts.executor_secs = 5;
    config.executor.program = "sh".into();
    config.executor.leading_args = vec!["-c".into(), executor_script.into(), "relay-exec".into()];
    config.executor.pass_proxy = false;
    config.lifecycle.drain_timeout_secs = 1;
    config
}

/// Start the relay on an ephemeral loopback port.
#[allow(dead_code)]
pub async fn start_relay(config: RelayConfig, proxy_url: Option<String>) -> (SocketAddr, Shutdown) {
    let source: Arc<dyn ProxyUrlSource> = match proxy_url {
        Some(url) => Arc::new(FixedProxySource::new(url)),
        None => Arc::new(FixedProxySource::none()),
    };

    let listener = Listener::bind(&config.listener).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = ProxyServer::with_proxy_source(config, source);
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    (addr, shutdown)
}

/// Send raw bytes to the relay and collect everything until it closes.
#[allow(dead_code)]
pub async fn exchange(relay: SocketAddr, request: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(relay).await.unwrap();
    stream.write_all(request).await.unwrap();

    let mut response = Vec::new();
    tokio::time::timeout(Duration::from_secs(10), stream.read_to_end(&mut response))
        .await
        .expect("relay did not close the connection")
        .unwrap();
    response
}
