//! Bidirectional byte relay between the client and the upstream proxy.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum bytes moved per read.
pub const RELAY_CHUNK: usize = 8192;

/// Why a relay session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayEnd {
    ClientClosed,
    UpstreamClosed,
    ClientError,
    UpstreamError,
    IdleTimeout,
}

impl RelayEnd {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelayEnd::ClientClosed => "client_closed",
            RelayEnd::UpstreamClosed => "upstream_closed",
            RelayEnd::ClientError => "client_error",
            RelayEnd::UpstreamError => "upstream_error",
            RelayEnd::IdleTimeout => "idle_timeout",
        }
    }
}

/// Summary of a finished relay session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayOutcome {
    pub end: RelayEnd,
    pub client_to_upstream: u64,
    pub upstream_to_client: u64,
}

enum Ready {
    Client(std::io::Result<usize>),
    Upstream(std::io::Result<usize>),
}

/// Copy bytes both ways until either side closes, errors, or stays idle
/// for `idle`. Both write halves are shut down before returning.
pub async fn relay<C, U>(client: &mut C, upstream: &mut U, idle: Duration) -> RelayOutcome
where
    C: AsyncRead + AsyncWrite + Unpin,
    U: AsyncRead + AsyncWrite + Unpin,
{
    let (mut client_rd, mut client_wr) = tokio::io::split(client);
    let (mut upstream_rd, mut upstream_wr) = tokio::io::split(upstream);

    let mut client_buf = vec![0u8; RELAY_CHUNK];
    let mut upstream_buf = vec![0u8; RELAY_CHUNK];
    let mut client_to_upstream = 0u64;
    let mut upstream_to_client = 0u64;

    let end = loop {
        let ready = tokio::time::timeout(idle, async {
            tokio::select! {
                res = client_rd.read(&mut client_buf) => Ready::Client(res),
                res = upstream_rd.read(&mut upstream_buf) => Ready::Upstream(res),
            }
        })
        .await;

        match ready {
            Err(_) => break RelayEnd::IdleTimeout,
            Ok(Ready::Client(Ok(0))) => break RelayEnd::ClientClosed,
            Ok(Ready::Upstream(Ok(0))) => break RelayEnd::UpstreamClosed,
            Ok(Ready::Client(Err(e))) => {
                tracing::debug!(error = %e, "Client read failed");
                break RelayEnd::ClientError;
            }
            Ok(Ready::Upstream(Err(e))) => {
                tracing::debug!(error = %e, "Upstream read failed");
                break RelayEnd::UpstreamError;
            }
            Ok(Ready::Client(Ok(n))) => {
                match forward(&mut upstream_wr, &client_buf[..n], idle).await {
                    Ok(()) => client_to_upstream += n as u64,
                    Err(end) => break end.unwrap_or(RelayEnd::UpstreamError),
                }
            }
            Ok(Ready::Upstream(Ok(n))) => {
                match forward(&mut client_wr, &upstream_buf[..n], idle).await {
                    Ok(()) => upstream_to_client += n as u64,
                    Err(end) => break end.unwrap_or(RelayEnd::ClientError),
                }
            }
        }
    };

    let _ = upstream_wr.shutdown().await;
    let _ = client_wr.shutdown().await;

    RelayOutcome {
        end,
        client_to_upstream,
        upstream_to_client,
    }
}

/// Write one chunk. `Err(Some(IdleTimeout))` when the peer stops draining,
/// `Err(None)` on an I/O error.
async fn forward<W>(writer: &mut W, chunk: &[u8], idle: Duration) -> Result<(), Option<RelayEnd>>
where
    W: AsyncWrite + Unpin,
{
    match tokio::time::timeout(idle, writer.write_all(chunk)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            tracing::debug!(error = %e, "Relay write failed");
            Err(None)
        }
        Err(_) => Err(Some(RelayEnd::IdleTimeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn copies_both_directions_in_order() {
        let (mut client_side, mut client) = duplex(64 * 1024);
        let (mut upstream, mut upstream_side) = duplex(64 * 1024);

        let session = tokio::spawn(async move {
            relay(&mut client, &mut upstream, Duration::from_secs(5)).await
        });

        let payload: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
        client_side.write_all(&payload).await.unwrap();
        let mut received = vec![0u8; payload.len()];
        upstream_side.read_exact(&mut received).await.unwrap();
        assert_eq!(received, payload);

        upstream_side.write_all(b"\x16\x03\x01reply").await.unwrap();
        let mut reply = [0u8; 8];
        client_side.read_exact(&mut reply).await.unwrap();
        assert_eq!(&reply, b"\x16\x03\x01reply");

        drop(client_side);
        let outcome = session.await.unwrap();
        assert_eq!(outcome.end, RelayEnd::ClientClosed);
        assert_eq!(outcome.client_to_upstream, payload.len() as u64);
        assert_eq!(outcome.upstream_to_client, 8);

        // The upstream write half was shut down.
        let mut rest = Vec::new();
        upstream_side.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn upstream_close_ends_session() {
        let (client_side, mut client) = duplex(1024);
        let (mut upstream, upstream_side) = duplex(1024);
        drop(upstream_side);

        let outcome = relay(&mut client, &mut upstream, Duration::from_secs(5)).await;
        assert_eq!(outcome.end, RelayEnd::UpstreamClosed);
        drop(client_side);
    }

    #[tokio::test]
    async fn idle_session_times_out() {
        let (_client_side, mut client) = duplex(1024);
        let (mut upstream, _upstream_side) = duplex(1024);

        let outcome = relay(&mut client, &mut upstream, Duration::from_millis(200)).await;
        assert_eq!(outcome.end, RelayEnd::IdleTimeout);
        assert_eq!(outcome.client_to_upstream, 0);
    }
}
