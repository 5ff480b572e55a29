//! Relay server: accept loop and per-connection dispatch.
//!
//! # Responsibilities
//! - Accept client connections and hand each to its own task
//! - Frame the request head and pick the CONNECT or plain path
//! - Resolve the upstream proxy per request
//! - Stop accepting on shutdown and drain in-flight connections

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tracing::Instrument;

use crate::config::RelayConfig;
use crate::forward::{handle_plain, HttpExecutor};
use crate::http::request::{read_request, FrameError};
use crate::net::{ConnectionGuard, ConnectionPermit, ConnectionTracker, Listener};
use crate::observability::metrics;
use crate::tunnel::handle_connect;
use crate::upstream::{self, locate, Fallback, ProxyUrlSource, UpstreamEndpoint};

/// State shared by every connection task. Read-only after construction.
#[derive(Clone)]
pub struct RelayState {
    pub config: Arc<RelayConfig>,
    pub proxy_source: Arc<dyn ProxyUrlSource>,
    pub executor: HttpExecutor,
}

impl RelayState {
    pub fn new(config: RelayConfig, proxy_source: Arc<dyn ProxyUrlSource>) -> Self {
        let executor = HttpExecutor::new(&config.executor, config.timeouts.executor());
        Self {
            config: Arc::new(config),
            proxy_source,
            executor,
        }
    }

    /// Resolve the upstream endpoint from the current proxy URL.
    pub fn upstream(&self) -> UpstreamEndpoint {
        let url = self.proxy_source.proxy_url();
        locate(url.as_deref(), &Fallback::from(&self.config.upstream))
    }

    /// Proxy URL for the executor; the fallback endpoint when none is set.
    pub fn upstream_proxy_url(&self) -> String {
        self.proxy_source
            .proxy_url()
            .unwrap_or_else(|| format!("http://{}", self.upstream().address()))
    }
}

/// The local relay proxy server.
pub struct ProxyServer {
    state: RelayState,
    tracker: ConnectionTracker,
}

impl ProxyServer {
    /// Create a server reading the upstream proxy as configured.
    pub fn new(config: RelayConfig) -> Self {
        let source: Arc<dyn ProxyUrlSource> = Arc::from(upstream::source::from_config(&config.upstream));
        Self::with_proxy_source(config, source)
    }

    /// Create a server with an explicit upstream proxy source.
    pub fn with_proxy_source(config: RelayConfig, proxy_source: Arc<dyn ProxyUrlSource>) -> Self {
        Self {
            state: RelayState::new(config, proxy_source),
            tracker: ConnectionTracker::new(),
        }
    }

    /// Tracker for connections handled by this server.
    pub fn tracker(&self) -> ConnectionTracker {
        self.tracker.clone()
    }

    /// Accept connections until `shutdown` fires, then drain.
    pub async fn run(self, listener: Listener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Relay proxy accepting connections");

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, no longer accepting");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => {
                        let guard = self.tracker.track();
                        let state = self.state.clone();
                        tokio::spawn(handle_client(stream, peer, state, guard, permit));
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Accept failed");
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                },
            }
        }

        drop(listener);

        let in_flight = self.tracker.active_count();
        if in_flight > 0 {
            let deadline = Duration::from_secs(self.state.config.lifecycle.drain_timeout_secs);
            tracing::info!(in_flight, ?deadline, "Waiting for in-flight connections");
            if !self.tracker.drain(deadline).await {
                tracing::warn!(
                    remaining = self.tracker.active_count(),
                    "Drain deadline passed with connections still open"
                );
            }
        }

        tracing::info!("Relay proxy stopped");
        Ok(())
    }
}

/// Handle one client connection from head read to close.
async fn handle_client(
    mut stream: TcpStream,
    peer: SocketAddr,
    state: RelayState,
    guard: ConnectionGuard,
    _permit: ConnectionPermit,
) {
    let span = tracing::info_span!("connection", connection_id = %guard.id(), peer_addr = %peer);

    async move {
        let config = &state.config;
        let head = tokio::time::timeout(
            config.timeouts.head(),
            read_request(&mut stream, config.limits.max_head_bytes),
        )
        .await;

        let request = match head {
            Ok(Ok(Some(request))) => request,
            Ok(Ok(None)) => {
                tracing::debug!("Client closed without sending a request");
                return;
            }
            Ok(Err(FrameError::Io(e))) => {
                tracing::debug!(error = %e, "Failed reading request head");
                return;
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Malformed request, closing");
                return;
            }
            Err(_) => {
                tracing::warn!("Timed out waiting for request head");
                return;
            }
        };

        if request.is_connect() {
            let (host, port) = match request.connect_target() {
                Ok(target) => target,
                Err(e) => {
                    tracing::warn!(error = %e, "Malformed CONNECT target, closing");
                    return;
                }
            };

            let upstream = state.upstream();
            tracing::info!(
                target_host = %host,
                target_port = port,
                upstream = %upstream.address(),
                authenticated = upstream.credential.is_some(),
                "CONNECT tunnel requested"
            );

            let result = handle_connect(
                &mut stream,
                &host,
                port,
                request.body(),
                &upstream,
                &config.timeouts,
            )
            .await;

            match result {
                Ok(outcome) => {
                    metrics::record_tunnel(&outcome);
                    tracing::debug!(
                        end = outcome.end.as_str(),
                        client_to_upstream = outcome.client_to_upstream,
                        upstream_to_client = outcome.upstream_to_client,
                        "Tunnel closed"
                    );
                }
                Err(e) => {
                    metrics::record_tunnel_failure(e.stage());
                    tracing::warn!(
                        target_host = %host,
                        target_port = port,
                        stage = e.stage(),
                        error = %e,
                        "CONNECT tunnel failed"
                    );
                }
            }
        } else {
            tracing::info!(method = %request.method, url = %request.target, "Plain request");
            handle_plain(&mut stream, request, &state).await;
        }
    }
    .instrument(span)
    .await;

    drop(guard);
}
