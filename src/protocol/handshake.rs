//! WebSocket opening handshake (RFC 6455 Section 4).
//!
//! Only the subset of HTTP/1.1 needed for the Upgrade exchange is handled:
//! one request or status line followed by `name: value` header lines.

use std::collections::HashMap;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use sha1::{Digest, Sha1};

use crate::error::{Error, Result};
use crate::protocol::mask::MaskGenerator;

/// The WebSocket GUID used in the Sec-WebSocket-Accept calculation (RFC 6455).
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Response written by a server before dropping a rejected upgrade.
pub const BAD_REQUEST: &[u8] = b"HTTP/1.1 400 Bad Request\r\n\r\n";

/// Lower-cased header name to value.
pub type Headers = HashMap<String, String>;

/// Locate the end of the header block.
///
/// Returns the index just past the first `\r\n\r\n`, or `None` if the block
/// is not complete yet.
pub fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|pos| pos + 4)
}

/// Computes the Sec-WebSocket-Accept value from the client's Sec-WebSocket-Key.
///
/// The accept key is calculated as: Base64(SHA-1(key + GUID))
///
/// # Example
///
/// ```
/// use wsconn::protocol::handshake::compute_accept_key;
///
/// let key = "dGhlIHNhbXBsZSBub25jZQ==";
/// let accept = compute_accept_key(key);
/// assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
/// ```
pub fn compute_accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Generate a fresh Sec-WebSocket-Key: 16 random bytes, base64 encoded.
pub fn generate_key() -> String {
    let mut nonce = [0u8; 16];
    if getrandom::getrandom(&mut nonce).is_err() {
        let mut masks = MaskGenerator::new();
        for chunk in nonce.chunks_exact_mut(4) {
            chunk.copy_from_slice(&masks.next_mask());
        }
    }
    BASE64.encode(nonce)
}

/// Collect header lines, skipping the first (request or status) line.
///
/// A line counts as a header only if it has the form `name: value` where the
/// name is ASCII letters and dashes and the value is non-empty. Anything else
/// is ignored. Later duplicates replace earlier ones.
fn parse_headers<'a>(lines: impl Iterator<Item = &'a str>) -> Headers {
    lines
        .skip(1)
        .filter_map(parse_header_line)
        .map(|(name, value)| (name.to_ascii_lowercase(), value.to_string()))
        .collect()
}

fn parse_header_line(line: &str) -> Option<(&str, &str)> {
    let (name, value) = line.split_once(": ")?;
    let valid_name = !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphabetic() || b == b'-');
    (valid_name && !value.is_empty()).then_some((name, value))
}

/// `HTTP/<digit>.<digit>`, case-insensitive.
fn is_http_version(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() == 8
        && b[..5].eq_ignore_ascii_case(b"HTTP/")
        && b[5].is_ascii_digit()
        && b[6] == b'.'
        && b[7].is_ascii_digit()
}

/// Extract the path from `GET <path> HTTP/<d>.<d>`.
fn parse_request_line(line: &str) -> Option<&str> {
    let method = line.get(..4)?;
    if !method.eq_ignore_ascii_case("GET ") {
        return None;
    }
    let (path, version) = line[4..].rsplit_once(' ')?;
    (!path.is_empty() && is_http_version(version)).then_some(path)
}

/// Match `HTTP/<d>.<d> 101` with an optional reason phrase.
fn is_switching_status(line: &str) -> bool {
    let (Some(version), Some(rest)) = (line.get(..8), line.get(8..)) else {
        return false;
    };
    is_http_version(version) && (rest == " 101" || rest.starts_with(" 101 "))
}

fn require<'a>(headers: &'a Headers, name: &str) -> Result<&'a str> {
    headers
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| Error::InvalidHandshake(format!("Missing {name} header")))
}

/// Check the Upgrade and Connection headers shared by both directions.
fn check_upgrade(headers: &Headers) -> Result<()> {
    let upgrade = require(headers, "upgrade")?;
    if !upgrade.eq_ignore_ascii_case("websocket") {
        return Err(Error::InvalidHandshake(format!(
            "Invalid Upgrade header: {upgrade}"
        )));
    }

    let connection = require(headers, "connection")?;
    if !connection
        .split(',')
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"))
    {
        return Err(Error::InvalidHandshake(format!(
            "Invalid Connection header: {connection}"
        )));
    }
    Ok(())
}

/// Opening handshake request, sent by clients and parsed by servers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRequest {
    /// The request path (e.g., "/chat").
    pub path: String,
    /// The Host header value.
    pub host: String,
    /// The Sec-WebSocket-Key header value.
    pub key: String,
    /// All request headers, names lower-cased.
    pub headers: Headers,
}

impl HandshakeRequest {
    /// Build a client request for `host` and `path` with a fresh key.
    pub fn new(host: impl Into<String>, path: impl Into<String>) -> Self {
        let host = host.into();
        let key = generate_key();
        let headers = Headers::from([
            ("host".to_string(), host.clone()),
            ("upgrade".to_string(), "websocket".to_string()),
            ("connection".to_string(), "Upgrade".to_string()),
            ("sec-websocket-key".to_string(), key.clone()),
            ("sec-websocket-version".to_string(), "13".to_string()),
        ]);
        Self {
            path: path.into(),
            host,
            key,
            headers,
        }
    }

    /// Parse and validate a complete request header block.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHandshake`] if:
    /// - The request line is not `GET <path> HTTP/<d>.<d>`.
    /// - Any of `Host`, `Sec-WebSocket-Key`, `Upgrade`, `Connection` is missing.
    /// - The `Upgrade` header is not `websocket`.
    /// - The `Connection` header does not list `upgrade`.
    /// - The `Sec-WebSocket-Version` is not exactly `13`.
    pub fn parse(block: &[u8]) -> Result<Self> {
        let text = String::from_utf8_lossy(block);
        let request_line = text.split("\r\n").next().unwrap_or_default();
        let path = parse_request_line(request_line).ok_or_else(|| {
            Error::InvalidHandshake(format!("Invalid request line: {request_line}"))
        })?;

        let headers = parse_headers(text.split("\r\n"));
        let host = require(&headers, "host")?.to_string();
        let key = require(&headers, "sec-websocket-key")?.to_string();
        check_upgrade(&headers)?;

        match headers.get("sec-websocket-version").map(String::as_str) {
            Some("13") => {}
            other => {
                return Err(Error::InvalidHandshake(format!(
                    "Unsupported WebSocket version: {}",
                    other.unwrap_or("(none)")
                )));
            }
        }

        Ok(Self {
            path: path.to_string(),
            host,
            key,
            headers,
        })
    }

    /// Write the HTTP request.
    pub fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(format!("GET {} HTTP/1.1\r\n", self.path).as_bytes());
        buf.extend_from_slice(format!("Host: {}\r\n", self.host).as_bytes());
        buf.extend_from_slice(b"Upgrade: websocket\r\n");
        buf.extend_from_slice(b"Connection: Upgrade\r\n");
        buf.extend_from_slice(format!("Sec-WebSocket-Key: {}\r\n", self.key).as_bytes());
        buf.extend_from_slice(b"Sec-WebSocket-Version: 13\r\n");
        buf.extend_from_slice(b"\r\n");
    }
}

/// Opening handshake response, sent by servers and parsed by clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeResponse {
    /// The Sec-WebSocket-Accept value.
    pub accept: String,
    /// All response headers, names lower-cased.
    pub headers: Headers,
}

impl HandshakeResponse {
    /// Create the 101 response for a validated request.
    pub fn from_request(req: &HandshakeRequest) -> Self {
        let accept = compute_accept_key(&req.key);
        let headers = Headers::from([
            ("upgrade".to_string(), "websocket".to_string()),
            ("connection".to_string(), "Upgrade".to_string()),
            ("sec-websocket-accept".to_string(), accept.clone()),
        ]);
        Self { accept, headers }
    }

    /// Write the HTTP response.
    pub fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(b"HTTP/1.1 101 Switching Protocols\r\n");
        buf.extend_from_slice(b"Upgrade: websocket\r\n");
        buf.extend_from_slice(b"Connection: Upgrade\r\n");
        buf.extend_from_slice(format!("Sec-WebSocket-Accept: {}\r\n", self.accept).as_bytes());
        buf.extend_from_slice(b"\r\n");
    }

    /// Parse a complete response header block.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHandshake`] if the status is not 101, if any of
    /// `Upgrade`, `Connection`, `Sec-WebSocket-Accept` is missing, or if the
    /// Upgrade or Connection values are wrong.
    pub fn parse(block: &[u8]) -> Result<Self> {
        let text = String::from_utf8_lossy(block);
        let status_line = text.split("\r\n").next().unwrap_or_default();
        if !is_switching_status(status_line) {
            return Err(Error::InvalidHandshake(format!(
                "Expected 101 status, got: {status_line}"
            )));
        }

        let headers = parse_headers(text.split("\r\n"));
        check_upgrade(&headers)?;
        let accept = require(&headers, "sec-websocket-accept")?.to_string();

        Ok(Self { accept, headers })
    }

    /// Check the accept value against the key this client sent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHandshake`] on mismatch.
    pub fn verify(&self, key: &str) -> Result<()> {
        if self.accept == compute_accept_key(key) {
            Ok(())
        } else {
            Err(Error::InvalidHandshake(format!(
                "Sec-WebSocket-Accept mismatch: {}",
                self.accept
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;

    const RFC_REQUEST: &[u8] = b"GET /chat HTTP/1.1\r\n\
        Host: x\r\n\
        Upgrade: websocket\r\n\
        Connection: Upgrade\r\n\
        Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
        Sec-WebSocket-Version: 13\r\n\r\n";

    fn request_with(replace: &str, with: &str) -> Vec<u8> {
        String::from_utf8_lossy(RFC_REQUEST)
            .replace(replace, with)
            .into_bytes()
    }

    #[test]
    fn test_compute_accept_key_rfc_vector() {
        assert_eq!(
            compute_accept_key("dGhlIHNhbXBsZSBub25jZQ=="),
            "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
        );
    }

    #[test]
    fn test_find_header_end() {
        assert_eq!(find_header_end(b"GET / HTTP/1.1\r\n"), None);
        assert_eq!(find_header_end(b"a\r\n\r\nrest"), Some(5));
        assert_eq!(find_header_end(RFC_REQUEST), Some(RFC_REQUEST.len()));
    }

    #[test]
    fn test_parse_request() {
        let req = HandshakeRequest::parse(RFC_REQUEST).unwrap();
        assert_eq!(req.path, "/chat");
        assert_eq!(req.host, "x");
        assert_eq!(req.key, "dGhlIHNhbXBsZSBub25jZQ==");
        assert_eq!(req.headers.get("sec-websocket-version").unwrap(), "13");
    }

    #[test]
    fn test_response_for_rfc_request() {
        let req = HandshakeRequest::parse(RFC_REQUEST).unwrap();
        let resp = HandshakeResponse::from_request(&req);
        assert_eq!(resp.accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");

        let mut buf = Vec::new();
        resp.write(&mut buf);
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
        assert!(text.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_request_line_is_case_insensitive() {
        let data = request_with("GET /chat HTTP/1.1", "get /a b http/1.0");
        let req = HandshakeRequest::parse(&data).unwrap();
        assert_eq!(req.path, "/a b");
    }

    #[test]
    fn test_bad_request_line_rejected() {
        for line in ["POST /chat HTTP/1.1", "GET /chat", "GET  HTTP/1.1", "GET /chat HTTP/11"] {
            let data = request_with("GET /chat HTTP/1.1", line);
            assert!(
                matches!(HandshakeRequest::parse(&data), Err(Error::InvalidHandshake(_))),
                "accepted {line:?}"
            );
        }
    }

    #[test]
    fn test_missing_headers_rejected() {
        for line in [
            "Host: x\r\n",
            "Upgrade: websocket\r\n",
            "Connection: Upgrade\r\n",
            "Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n",
        ] {
            let data = request_with(line, "");
            assert!(HandshakeRequest::parse(&data).is_err(), "missing {line:?}");
        }
    }

    #[test]
    fn test_wrong_version_rejected() {
        let data = request_with("Version: 13", "Version: 8");
        assert!(HandshakeRequest::parse(&data).is_err());
        let data = request_with("Sec-WebSocket-Version: 13\r\n", "");
        assert!(HandshakeRequest::parse(&data).is_err());
    }

    #[test]
    fn test_upgrade_and_connection_values() {
        let data = request_with("Upgrade: websocket", "Upgrade: WebSocket");
        assert!(HandshakeRequest::parse(&data).is_ok());

        let data = request_with("Connection: Upgrade", "Connection: keep-alive, Upgrade");
        assert!(HandshakeRequest::parse(&data).is_ok());

        let data = request_with("Upgrade: websocket", "Upgrade: h2c");
        assert!(HandshakeRequest::parse(&data).is_err());

        let data = request_with("Connection: Upgrade", "Connection: keep-alive");
        assert!(HandshakeRequest::parse(&data).is_err());
    }

    #[test]
    fn test_malformed_header_lines_ignored() {
        let data = request_with(
            "Host: x\r\n",
            "Host: x\r\nnot a header\r\nX_Bad: y\r\nEmpty: \r\n",
        );
        let req = HandshakeRequest::parse(&data).unwrap();
        assert!(!req.headers.contains_key("x_bad"));
        assert!(!req.headers.contains_key("empty"));
    }

    #[test]
    fn test_client_request_roundtrip() {
        let req = HandshakeRequest::new("example.com", "/ws");
        assert_eq!(BASE64.decode(&req.key).unwrap().len(), 16);

        let mut buf = Vec::new();
        req.write(&mut buf);
        let parsed = HandshakeRequest::parse(&buf).unwrap();
        assert_eq!(parsed.path, "/ws");
        assert_eq!(parsed.host, "example.com");
        assert_eq!(parsed.key, req.key);
    }

    #[test]
    fn test_client_keys_differ() {
        assert_ne!(generate_key(), generate_key());
    }

    #[test]
    fn test_parse_and_verify_response() {
        let req = HandshakeRequest::new("example.com", "/");
        let mut buf = Vec::new();
        HandshakeResponse::from_request(&req).write(&mut buf);

        let resp = HandshakeResponse::parse(&buf).unwrap();
        assert!(resp.verify(&req.key).is_ok());
        assert!(resp.verify("dGhlIHNhbXBsZSBub25jZQ==").is_err());
    }

    #[test]
    fn test_response_status_line() {
        let ok = b"HTTP/1.1 101\r\nUpgrade: websocket\r\nConnection: upgrade\r\nSec-WebSocket-Accept: a\r\n\r\n";
        assert!(HandshakeResponse::parse(ok).is_ok());

        let not_101 = b"HTTP/1.1 200 OK\r\nUpgrade: websocket\r\nConnection: upgrade\r\nSec-WebSocket-Accept: a\r\n\r\n";
        assert!(HandshakeResponse::parse(not_101).is_err());

        let no_accept = b"HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: upgrade\r\n\r\n";
        assert!(HandshakeResponse::parse(no_accept).is_err());
    }
}
