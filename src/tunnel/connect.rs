//! CONNECT tunnel establishment through the upstream proxy.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::config::TimeoutConfig;
use crate::http::response::{self, CONNECTION_ESTABLISHED};
use crate::tunnel::relay::{relay, RelayOutcome};
use crate::upstream::UpstreamEndpoint;

const HANDSHAKE_READ_CHUNK: usize = 1024;
const HANDSHAKE_MAX_BYTES: usize = 64 * 1024;

/// Errors that end a tunnel session before relaying starts.
#[derive(Debug, thiserror::Error)]
pub enum TunnelError {
    #[error("failed to accept CONNECT on client: {0}")]
    ClientWrite(std::io::Error),

    #[error("connect to upstream {addr} failed: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    #[error("connect to upstream {addr} timed out after {timeout:?}")]
    ConnectTimeout { addr: String, timeout: Duration },

    #[error("upstream handshake I/O failed: {0}")]
    Handshake(std::io::Error),

    #[error("upstream handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    #[error("upstream rejected CONNECT: {0}")]
    Rejected(String),

    #[error("failed to forward buffered client bytes upstream: {0}")]
    Pending(std::io::Error),
}

impl TunnelError {
    /// Stage label for logs and metrics.
    pub fn stage(&self) -> &'static str {
        match self {
            TunnelError::ClientWrite(_) => "accept",
            TunnelError::Connect { .. } | TunnelError::ConnectTimeout { .. } => "dial",
            TunnelError::Handshake(_) | TunnelError::HandshakeTimeout(_) => "handshake",
            TunnelError::Rejected(_) => "verify",
            TunnelError::Pending(_) => "relay",
        }
    }
}

/// Run one CONNECT session: accept, dial, handshake, verify, relay, teardown.
///
/// `pending` holds client bytes that arrived together with the CONNECT head;
/// they are sent upstream ahead of the relay. The client is shut down before
/// returning on every path.
pub async fn handle_connect<S>(
    client: &mut S,
    host: &str,
    port: u16,
    pending: Option<&[u8]>,
    upstream: &UpstreamEndpoint,
    timeouts: &TimeoutConfig,
) -> Result<RelayOutcome, TunnelError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let result = establish_and_relay(client, host, port, pending, upstream, timeouts).await;
    let _ = client.shutdown().await;
    result
}

async fn establish_and_relay<S>(
    client: &mut S,
    host: &str,
    port: u16,
    pending: Option<&[u8]>,
    upstream: &UpstreamEndpoint,
    timeouts: &TimeoutConfig,
) -> Result<RelayOutcome, TunnelError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    client
        .write_all(CONNECTION_ESTABLISHED)
        .await
        .map_err(TunnelError::ClientWrite)?;
    client.flush().await.map_err(TunnelError::ClientWrite)?;

    let mut upstream_stream = dial(upstream, timeouts.connect()).await?;

    let early_data = tokio::time::timeout(
        timeouts.handshake(),
        handshake(&mut upstream_stream, host, port, upstream),
    )
    .await
    .map_err(|_| TunnelError::HandshakeTimeout(timeouts.handshake()))??;

    tracing::debug!(target_host = %host, target_port = port, "Upstream tunnel established");

    if !early_data.is_empty() {
        client
            .write_all(&early_data)
            .await
            .map_err(TunnelError::ClientWrite)?;
    }
    let pending = pending.unwrap_or_default();
    if !pending.is_empty() {
        upstream_stream
            .write_all(pending)
            .await
            .map_err(TunnelError::Pending)?;
    }

    let mut outcome = relay(client, &mut upstream_stream, timeouts.idle()).await;
    outcome.upstream_to_client += early_data.len() as u64;
    outcome.client_to_upstream += pending.len() as u64;
    Ok(outcome)
}

async fn dial(upstream: &UpstreamEndpoint, timeout: Duration) -> Result<TcpStream, TunnelError> {
    let addr = upstream.address();
    match tokio::time::timeout(timeout, TcpStream::connect(&addr)).await {
        Ok(Ok(stream)) => {
            let _ = stream.set_nodelay(true);
            Ok(stream)
        }
        Ok(Err(source)) => Err(TunnelError::Connect { addr, source }),
        Err(_) => Err(TunnelError::ConnectTimeout { addr, timeout }),
    }
}

/// Build the CONNECT request sent to the upstream proxy.
pub fn connect_request(host: &str, port: u16, upstream: &UpstreamEndpoint) -> String {
    let mut request = format!("CONNECT {host}:{port} HTTP/1.1\r\nHost: {host}:{port}\r\n");
    if let Some(auth) = upstream.proxy_authorization() {
        request.push_str(&format!("Proxy-Authorization: {auth}\r\n"));
    }
    request.push_str("\r\n");
    request
}

/// Send the CONNECT handshake and verify the reply.
///
/// Returns any bytes the upstream sent after its response head.
async fn handshake<U>(
    upstream_stream: &mut U,
    host: &str,
    port: u16,
    upstream: &UpstreamEndpoint,
) -> Result<Vec<u8>, TunnelError>
where
    U: AsyncRead + AsyncWrite + Unpin,
{
    upstream_stream
        .write_all(connect_request(host, port, upstream).as_bytes())
        .await
        .map_err(TunnelError::Handshake)?;

    let reply = read_reply(upstream_stream).await?;
    let head_end = reply
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|pos| pos + 4)
        .unwrap_or(reply.len());

    let head = String::from_utf8_lossy(&reply[..head_end]);
    let status_line = head.split("\r\n").next().unwrap_or_default();
    let accepted = response::status_code(status_line).is_some_and(|code| code.contains("200"));
    if !accepted {
        let shown: String = head.chars().take(200).collect();
        return Err(TunnelError::Rejected(shown.trim_end().to_string()));
    }

    Ok(reply[head_end..].to_vec())
}

/// Read until the end of the response head or until the upstream closes.
async fn read_reply<U>(upstream_stream: &mut U) -> Result<Vec<u8>, TunnelError>
where
    U: AsyncRead + Unpin,
{
    let mut reply = Vec::new();
    let mut chunk = [0u8; HANDSHAKE_READ_CHUNK];
    while !reply.windows(4).any(|w| w == b"\r\n\r\n") && reply.len() < HANDSHAKE_MAX_BYTES {
        let n = upstream_stream
            .read(&mut chunk)
            .await
            .map_err(TunnelError::Handshake)?;
        if n == 0 {
            break;
        }
        reply.extend_from_slice(&chunk[..n]);
    }
    Ok(reply)
}
