//! Request framing.
//!
//! # Responsibilities
//! - Read a client connection until a full request head is buffered
//! - Split the head into method, target, protocol and headers
//! - Capture the bytes that arrived after the head as the body
//! - Optionally complete a body declared with `Content-Length`
//!
//! # Design Decisions
//! - Header names keep the case they arrived in; lookups ignore case
//! - Duplicate headers are all kept in arrival order; lookups return the last
//! - A peer that closes before sending a whole head produces no request

use tokio::io::{AsyncRead, AsyncReadExt};

/// Chunk size for head reads.
pub const HEAD_READ_CHUNK: usize = 4096;

const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Errors produced while framing a request.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The request line did not split into method, target and protocol.
    #[error("malformed request line: {0:?}")]
    MalformedRequestLine(String),

    /// The head exceeded the configured limit before its terminator arrived.
    #[error("request head exceeds {limit} bytes")]
    HeadTooLarge { limit: usize },

    /// A CONNECT target that is not `host[:port]`.
    #[error("invalid CONNECT target: {0:?}")]
    InvalidConnectTarget(String),

    /// Reading from the client failed.
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
}

/// One parsed request head plus whatever body bytes arrived with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRequest {
    pub method: String,
    pub target: String,
    pub protocol: String,
    headers: Vec<(String, String)>,
    body: Option<Vec<u8>>,
}

impl ParsedRequest {
    /// Parse a buffer that contains a complete head.
    pub fn parse(buf: &[u8]) -> Result<Self, FrameError> {
        let (head, rest) = match find_terminator(buf) {
            Some(pos) => (&buf[..pos], &buf[pos + HEAD_TERMINATOR.len()..]),
            None => (buf, &[][..]),
        };

        let head = String::from_utf8_lossy(head);
        let mut lines = head.split("\r\n");

        let request_line = lines.next().unwrap_or_default();
        let parts: Vec<&str> = request_line.split(' ').collect();
        if parts.len() < 3 {
            return Err(FrameError::MalformedRequestLine(request_line.to_string()));
        }

        let headers = lines
            .take_while(|line| !line.is_empty())
            .filter_map(|line| line.split_once(':'))
            .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
            .collect();

        Ok(Self {
            method: parts[0].to_string(),
            target: parts[1].to_string(),
            protocol: parts[2].to_string(),
            headers,
            body: (!rest.is_empty()).then(|| rest.to_vec()),
        })
    }

    pub fn is_connect(&self) -> bool {
        self.method == "CONNECT"
    }

    /// Last value received for `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .rev()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Every header pair in arrival order, duplicates included.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Declared `Content-Length`, if present and numeric.
    pub fn content_length(&self) -> Option<usize> {
        self.header("Content-Length")?.parse().ok()
    }

    /// Split a CONNECT target into host and port. Port defaults to 443.
    pub fn connect_target(&self) -> Result<(String, u16), FrameError> {
        parse_authority(&self.target)
    }

    /// Read the rest of a body declared with `Content-Length`.
    ///
    /// Stops at the declared length, at `max_body` bytes, or when the peer
    /// closes. Bytes past the declared length are dropped.
    pub async fn complete_body<R>(&mut self, reader: &mut R, max_body: usize) -> Result<(), FrameError>
    where
        R: AsyncRead + Unpin,
    {
        let Some(declared) = self.content_length() else {
            return Ok(());
        };
        let wanted = declared.min(max_body);

        let mut body = self.body.take().unwrap_or_default();
        let mut chunk = [0u8; HEAD_READ_CHUNK];
        while body.len() < wanted {
            let n = reader.read(&mut chunk).await?;
            if n == 0 {
                tracing::debug!(
                    declared,
                    received = body.len(),
                    "Client closed before declared body was complete"
                );
                break;
            }
            body.extend_from_slice(&chunk[..n]);
        }
        body.truncate(wanted);

        self.body = (!body.is_empty()).then_some(body);
        Ok(())
    }
}

/// Read from `reader` until a full request head has been buffered.
///
/// Returns `Ok(None)` when the peer closes before the head is complete.
pub async fn read_request<R>(reader: &mut R, max_head: usize) -> Result<Option<ParsedRequest>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::with_capacity(HEAD_READ_CHUNK);
    let mut chunk = [0u8; HEAD_READ_CHUNK];
    let mut scanned = 0usize;

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            if !buf.is_empty() {
                tracing::debug!(buffered = buf.len(), "Client closed mid-head");
            }
            return Ok(None);
        }
        buf.extend_from_slice(&chunk[..n]);

        // Resume the scan just before the new bytes so a split terminator is found.
        let from = scanned.saturating_sub(HEAD_TERMINATOR.len() - 1);
        if find_terminator(&buf[from..]).is_some() {
            return ParsedRequest::parse(&buf).map(Some);
        }
        if buf.len() > max_head {
            return Err(FrameError::HeadTooLarge { limit: max_head });
        }
        scanned = buf.len();
    }
}

fn find_terminator(buf: &[u8]) -> Option<usize> {
    buf.windows(HEAD_TERMINATOR.len())
        .position(|window| window == HEAD_TERMINATOR)
}

fn parse_authority(target: &str) -> Result<(String, u16), FrameError> {
    let invalid = || FrameError::InvalidConnectTarget(target.to_string());

    // Bracketed IPv6 literal: [::1]:443
    if let Some(rest) = target.strip_prefix('[') {
        let (host, after) = rest.split_once(']').ok_or_else(invalid)?;
        let port = match after.strip_prefix(':') {
            Some(port) => port.parse().map_err(|_| invalid())?,
            None if after.is_empty() => 443,
            None => return Err(invalid()),
        };
        return Ok((format!("[{host}]"), port));
    }

    match target.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() => {
            let port = port.parse().map_err(|_| invalid())?;
            Ok((host.to_string(), port))
        }
        Some(_) => Err(invalid()),
        None if !target.is_empty() => Ok((target.to_string(), 443)),
        None => Err(invalid()),
    }
}
