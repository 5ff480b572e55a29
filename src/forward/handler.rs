//! Plain (non-CONNECT) request handling.

use std::time::Instant;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::forward::executor::{filter_headers, ExecRequest, ExecutorError};
use crate::http::request::ParsedRequest;
use crate::http::response;
use crate::http::server::RelayState;
use crate::observability::metrics;

/// Turn a request target into the absolute URL handed to the executor.
///
/// Absolute `http`/`https` targets pass through untouched. Origin-form
/// targets are completed from the `Host` header; anything else is assumed
/// to be scheme-less and gets `http://`.
pub fn normalize_target(request: &ParsedRequest) -> Result<String, url::ParseError> {
    let target = request.target.as_str();
    let lower = target.to_ascii_lowercase();

    let absolute = if lower.starts_with("http://") || lower.starts_with("https://") {
        target.to_string()
    } else if target.starts_with('/') {
        let host = request.header("Host").ok_or(url::ParseError::EmptyHost)?;
        format!("http://{host}{target}")
    } else {
        format!("http://{target}")
    };

    url::Url::parse(&absolute)?;
    Ok(absolute)
}

/// Execute one plain request and write the result back to the client.
///
/// Always writes exactly one response (relayed or synthesized 500) unless
/// the client itself fails or never finishes its body within
/// `timeouts.body_secs`, and always shuts the client down afterwards.
pub async fn handle_plain<S>(client: &mut S, mut request: ParsedRequest, state: &RelayState)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let config = &state.config;

    if config.framing.honor_content_length {
        let body = tokio::time::timeout(
            config.timeouts.body(),
            request.complete_body(client, config.limits.max_body_bytes),
        )
        .await;

        match body {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Failed to read request body");
                let _ = client.shutdown().await;
                return;
            }
            Err(_) => {
                tracing::warn!(
                    declared = ?request.content_length(),
                    timeout = ?config.timeouts.body(),
                    "Timed out waiting for request body, closing"
                );
                let _ = client.shutdown().await;
                return;
            }
        }
    }

    let start = Instant::now();
    let response = match execute(&request, state).await {
        Ok(bytes) => {
            tracing::debug!(
                method = %request.method,
                url = %request.target,
                response_bytes = bytes.len(),
                "Executor response relayed"
            );
            metrics::record_executor("ok", start);
            bytes
        }
        Err(e) => {
            tracing::warn!(
                method = %request.method,
                url = %request.target,
                error = %e,
                "Plain request failed"
            );
            metrics::record_executor(e.kind(), start);
            response::internal_server_error()
        }
    };

    if let Err(e) = client.write_all(&response).await {
        tracing::debug!(error = %e, "Client went away before response was written");
    }
    let _ = client.flush().await;
    let _ = client.shutdown().await;
}

#[derive(Debug, thiserror::Error)]
enum PlainError {
    #[error("invalid request target: {0}")]
    Target(#[from] url::ParseError),

    #[error(transparent)]
    Executor(#[from] ExecutorError),
}

impl PlainError {
    fn kind(&self) -> &'static str {
        match self {
            PlainError::Target(_) => "bad_target",
            PlainError::Executor(e) => e.kind(),
        }
    }
}

async fn execute(request: &ParsedRequest, state: &RelayState) -> Result<Vec<u8>, PlainError> {
    let url = normalize_target(request)?;

    let proxy_url = state.executor.passes_proxy().then(|| state.upstream_proxy_url());

    let exec_request = ExecRequest {
        method: &request.method,
        url: &url,
        headers: filter_headers(request.headers()),
        body: request.body(),
        proxy_url,
    };

    Ok(state.executor.execute(&exec_request).await?)
}
