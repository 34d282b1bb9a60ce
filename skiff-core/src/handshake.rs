//! Client opening handshake
//!
//! Builds the HTTP/1.1 Upgrade request and validates the server's answer as
//! described in RFC 6455 section 4. Reading the response stops at the blank
//! line that ends the head, so any frame bytes the server pipelines right
//! behind it stay in the reader's buffer.

use crate::error::{Error, HandshakeError, Result};
use crate::protocol::{constants::*, http::*};
use base64::{engine::general_purpose, Engine as _};
use sha1::{Digest, Sha1};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Generate a random `Sec-WebSocket-Key`: 16 random bytes, base64 encoded
pub fn generate_key() -> String {
    use rand::RngCore;
    let mut key_bytes = [0u8; WEBSOCKET_KEY_LEN];
    rand::thread_rng().fill_bytes(&mut key_bytes);
    general_purpose::STANDARD.encode(key_bytes)
}

/// Compute the `Sec-WebSocket-Accept` value a server must send for `client_key`
pub fn compute_accept_key(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.as_bytes());
    hasher.update(WEBSOCKET_MAGIC.as_bytes());
    general_purpose::STANDARD.encode(hasher.finalize())
}

/// Validate WebSocket key format
pub fn validate_key(key: &str) -> bool {
    matches!(general_purpose::STANDARD.decode(key), Ok(bytes) if bytes.len() == WEBSOCKET_KEY_LEN)
}

/// Whether `name` can be written as an HTTP header name
pub fn is_valid_header_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_graphic() && b != b':')
}

/// The client's Upgrade request
#[derive(Debug, Clone)]
pub struct HandshakeRequest {
    path: String,
    key: String,
    headers: Vec<(String, String)>,
}

impl HandshakeRequest {
    /// Create a request for `path` (path and query) on `host` with a fresh key
    pub fn new(host: &str, path: &str) -> Self {
        Self::with_key(host, path, generate_key())
    }

    /// Create a request with a caller-chosen key
    pub fn with_key(host: &str, path: &str, key: String) -> Self {
        let headers = vec![
            (HOST.to_string(), host.to_string()),
            (UPGRADE.to_string(), WEBSOCKET.to_string()),
            (CONNECTION.to_string(), UPGRADE_VALUE.to_string()),
            (SEC_WEBSOCKET_KEY.to_string(), key.clone()),
            (SEC_WEBSOCKET_VERSION.to_string(), WEBSOCKET_VERSION.to_string()),
        ];
        Self {
            path: path.to_string(),
            key,
            headers,
        }
    }

    /// Append a header. Names containing `:` or whitespace are rejected.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self> {
        if !is_valid_header_name(name) {
            return Err(HandshakeError::InvalidHeaderName(name.to_string()).into());
        }
        self.headers.push((name.to_string(), value.to_string()));
        Ok(self)
    }

    /// The `Sec-WebSocket-Key` sent with this request
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Request target
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Headers in the order they are written
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Serialize the request head
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = format!("GET {} HTTP/1.1\r\n", self.path);
        for (name, value) in &self.headers {
            out.push_str(name);
            out.push_str(": ");
            out.push_str(value);
            out.push_str("\r\n");
        }
        out.push_str("\r\n");
        out.into_bytes()
    }
}

/// The server's answer to the Upgrade request
#[derive(Debug, Clone)]
pub struct HandshakeResponse {
    /// HTTP status code
    pub status: u16,
    /// Reason phrase
    pub reason: String,
    /// Response headers in arrival order
    pub headers: Vec<(String, String)>,
}

impl HandshakeResponse {
    /// Parse a complete response head
    pub fn parse(head: &[u8]) -> Result<Self> {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut response = httparse::Response::new(&mut headers);

        match response.parse(head) {
            Ok(httparse::Status::Complete(_)) => {}
            Ok(httparse::Status::Partial) => {
                return Err(HandshakeError::Malformed("incomplete response head".to_string()).into())
            }
            Err(e) => return Err(HandshakeError::Malformed(e.to_string()).into()),
        }

        let status = response
            .code
            .ok_or_else(|| HandshakeError::Malformed("missing status code".to_string()))?;
        let reason = response.reason.unwrap_or_default().to_string();
        let headers = response
            .headers
            .iter()
            .map(|h| {
                (
                    h.name.to_string(),
                    String::from_utf8_lossy(h.value).trim().to_string(),
                )
            })
            .collect();

        Ok(Self {
            status,
            reason,
            headers,
        })
    }

    /// Read a response head from `reader` and parse it.
    ///
    /// Bytes after the terminating blank line are left unread.
    pub async fn read<R>(reader: &mut R) -> Result<Self>
    where
        R: AsyncBufRead + Unpin + ?Sized,
    {
        let head = read_response_head(reader).await?;
        Self::parse(&head)
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

async fn read_response_head<R>(reader: &mut R) -> Result<Vec<u8>>
where
    R: AsyncBufRead + Unpin + ?Sized,
{
    let mut head = Vec::new();
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed during handshake",
            )));
        }

        // Never copy past the end of the current line, so the bytes after
        // the blank line stay buffered for the frame reader.
        let (len, line_done) = match available.iter().position(|&b| b == b'\n') {
            Some(pos) => (pos + 1, true),
            None => (available.len(), false),
        };
        head.extend_from_slice(&available[..len]);
        reader.consume(len);

        if line_done && (head.ends_with(b"\r\n\r\n") || head.ends_with(b"\n\n")) {
            return Ok(head);
        }
        if head.len() > MAX_HEADER_SIZE {
            return Err(HandshakeError::Malformed("response head too large".to_string()).into());
        }
    }
}

/// Check the server's response against the key we sent.
///
/// Requires status 101, `Upgrade: websocket` (compared without regard to
/// case) and an exact `Sec-WebSocket-Accept` match.
pub fn validate_server_handshake(
    response: &HandshakeResponse,
    client_key: &str,
) -> std::result::Result<(), HandshakeError> {
    if response.status != SWITCHING_PROTOCOLS {
        return Err(HandshakeError::UnexpectedStatus {
            status: response.status,
            reason: response.reason.clone(),
        });
    }

    let upgrade = response
        .header(UPGRADE)
        .ok_or(HandshakeError::MissingHeader(UPGRADE))?;
    if !upgrade.eq_ignore_ascii_case(WEBSOCKET) {
        return Err(HandshakeError::InvalidUpgrade(upgrade.to_string()));
    }

    let accept = response
        .header(SEC_WEBSOCKET_ACCEPT)
        .ok_or(HandshakeError::MissingHeader(SEC_WEBSOCKET_ACCEPT))?;
    let expected = compute_accept_key(client_key);
    if accept != expected {
        return Err(HandshakeError::InvalidAcceptKey {
            expected,
            received: accept.to_string(),
        });
    }

    Ok(())
}
