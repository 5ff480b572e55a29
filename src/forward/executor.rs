//! External HTTP executor.
//!
//! Runs one plain request through an external client (curl by default) and
//! captures its raw response from stdout.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::config::ExecutorConfig;

/// Headers that manage the hop to this proxy and are never forwarded.
const HOP_HEADERS: [&str; 3] = ["host", "connection", "proxy-connection"];

/// Errors from running the executor.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("failed to spawn executor '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("executor I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("executor timed out after {0:?}")]
    Timeout(Duration),

    #[error("executor produced no response ({status}): {stderr}")]
    NoResponse { status: ExitStatus, stderr: String },
}

impl ExecutorError {
    pub fn kind(&self) -> &'static str {
        match self {
            ExecutorError::Spawn { .. } => "spawn",
            ExecutorError::Io(_) => "io",
            ExecutorError::Timeout(_) => "timeout",
            ExecutorError::NoResponse { .. } => "no_response",
        }
    }
}

/// Drop hop headers; keep every other pair in order, duplicates included.
pub fn filter_headers(headers: &[(String, String)]) -> Vec<(String, String)> {
    headers
        .iter()
        .filter(|(key, _)| !HOP_HEADERS.iter().any(|hop| key.eq_ignore_ascii_case(hop)))
        .cloned()
        .collect()
}

/// One request as handed to the executor.
#[derive(Debug, Clone)]
pub struct ExecRequest<'a> {
    pub method: &'a str,
    pub url: &'a str,
    pub headers: Vec<(String, String)>,
    pub body: Option<&'a [u8]>,
    /// Upstream proxy passed explicitly on the command line.
    pub proxy_url: Option<String>,
}

/// Spawns the configured executor program.
#[derive(Debug, Clone)]
pub struct HttpExecutor {
    program: String,
    leading_args: Vec<String>,
    pass_proxy: bool,
    timeout: Duration,
}

impl HttpExecutor {
    pub fn new(config: &ExecutorConfig, timeout: Duration) -> Self {
        Self {
            program: config.program.clone(),
            leading_args: config.leading_args.clone(),
            pass_proxy: config.pass_proxy,
            timeout,
        }
    }

    pub fn passes_proxy(&self) -> bool {
        self.pass_proxy
    }

    /// Argument list for one request, in curl syntax.
    pub fn command_args(&self, request: &ExecRequest<'_>) -> Vec<String> {
        let mut args = self.leading_args.clone();
        args.extend(["-s", "-i", "-X", request.method].map(String::from));

        for (key, value) in &request.headers {
            args.push("-H".to_string());
            args.push(format!("{key}: {value}"));
        }

        if self.pass_proxy {
            if let Some(proxy) = &request.proxy_url {
                args.push("--proxy".to_string());
                args.push(proxy.clone());
            }
        }

        if request.body.is_some() {
            args.push("--data-binary".to_string());
            args.push("@-".to_string());
        }

        args.push(request.url.to_string());
        args
    }

    /// Run the executor and return its stdout.
    ///
    /// The child is killed if the timeout elapses.
    pub async fn execute(&self, request: &ExecRequest<'_>) -> Result<Vec<u8>, ExecutorError> {
        let mut command = Command::new(&self.program);
        command
            .args(self.command_args(request))
            .stdin(if request.body.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|source| ExecutorError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        // Feed the body concurrently so a chatty child cannot deadlock on stdout.
        if let (Some(body), Some(mut stdin)) = (request.body, child.stdin.take()) {
            let body = body.to_vec();
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(&body).await {
                    tracing::debug!(error = %e, "Executor stdin closed early");
                }
            });
        }

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ExecutorError::Timeout(self.timeout))??;

        if output.stdout.is_empty() {
            return Err(ExecutorError::NoResponse {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        if !output.status.success() {
            tracing::warn!(
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "Executor exited unsuccessfully; relaying partial response"
            );
        }

        Ok(output.stdout)
    }
}
