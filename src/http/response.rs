//! Responses the relay writes itself rather than relaying.

/// Sent to the client as soon as a CONNECT request is accepted.
pub const CONNECTION_ESTABLISHED: &[u8] = b"HTTP/1.1 200 Connection Established\r\n\r\n";

const PROXY_ERROR_BODY: &str = "Proxy error";

/// Response written when the HTTP executor fails or times out.
pub fn internal_server_error() -> Vec<u8> {
    format!(
        "HTTP/1.1 500 Internal Server Error\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        PROXY_ERROR_BODY.len(),
        PROXY_ERROR_BODY
    )
    .into_bytes()
}

/// Status code token from a response status line, e.g. `"200"`.
pub fn status_code(status_line: &str) -> Option<&str> {
    let mut parts = status_line.split_whitespace();
    let version = parts.next()?;
    if !version.starts_with("HTTP/") {
        return None;
    }
    parts.next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_response_is_framed() {
        let response = String::from_utf8(internal_server_error()).unwrap();
        assert!(response.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
        assert!(response.ends_with("\r\n\r\nProxy error"));
        assert!(response.contains("Content-Length: 11\r\n"));
    }

    #[test]
    fn extracts_status_code() {
        assert_eq!(status_code("HTTP/1.1 200 Connection established"), Some("200"));
        assert_eq!(status_code("HTTP/1.0 407 Proxy Authentication Required"), Some("407"));
        assert_eq!(status_code("garbage"), None);
        assert_eq!(status_code(""), None);
    }
}
