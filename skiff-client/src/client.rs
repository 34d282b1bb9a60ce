//! Endpoint parsing and the connection builder

use crate::config::ClientConfig;
use crate::connection::WebSocket;
use crate::events::EventHandler;
use skiff_core::error::ConfigError;
use skiff_core::{Connector, Result};
use std::fmt;
use std::sync::Arc;

/// Where a connection goes: parsed from a `ws`, `wss`, `http` or `https` URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Whether the stream must be wrapped in TLS
    pub secure: bool,
    /// Host name or address, without IPv6 brackets
    pub host: String,
    /// TCP port
    pub port: u16,
    /// Path and query sent in the request line
    pub path: String,
}

impl Endpoint {
    /// Parse a URL. `http` and `https` are treated as `ws` and `wss`.
    pub fn parse(url: &str) -> Result<Self> {
        let uri: http::Uri = url.parse().map_err(|e: http::uri::InvalidUri| {
            ConfigError::InvalidUrl {
                url: url.to_string(),
                reason: e.to_string(),
            }
        })?;

        let secure = match uri.scheme_str().map(str::to_ascii_lowercase).as_deref() {
            Some("ws") | Some("http") => false,
            Some("wss") | Some("https") => true,
            _ => return Err(ConfigError::InvalidScheme(url.to_string()).into()),
        };

        let host = uri
            .host()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ConfigError::InvalidUrl {
                url: url.to_string(),
                reason: "missing host".to_string(),
            })?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();

        let port = uri.port_u16().unwrap_or(if secure { 443 } else { 80 });

        let path = match uri.path_and_query().map(|pq| pq.as_str()) {
            None | Some("") => "/".to_string(),
            Some(pq) if pq.starts_with('/') => pq.to_string(),
            Some(pq) => format!("/{}", pq),
        };

        Ok(Self {
            secure,
            host,
            port,
            path,
        })
    }

    /// Port implied by the scheme
    pub fn default_port(&self) -> u16 {
        if self.secure {
            443
        } else {
            80
        }
    }

    /// Value of the `Host` request header
    pub fn host_header(&self) -> String {
        let host = if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };

        if self.port == self.default_port() {
            host
        } else {
            format!("{}:{}", host, self.port)
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = if self.secure { "wss" } else { "ws" };
        write!(f, "{}://{}{}", scheme, self.host_header(), self.path)
    }
}

/// Builds a [`WebSocket`]
pub struct WebSocketBuilder {
    url: String,
    config: ClientConfig,
    handler: Arc<dyn EventHandler>,
    connector: Option<Arc<dyn Connector>>,
}

impl WebSocketBuilder {
    /// Start building a connection to `url`
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            config: ClientConfig::default(),
            handler: Arc::new(()),
            connector: None,
        }
    }

    /// Set client configuration
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Receive notifications through `handler`
    pub fn handler(mut self, handler: impl EventHandler) -> Self {
        self.handler = Arc::new(handler);
        self
    }

    /// Use a specific connector instead of picking TCP or TLS from the scheme
    pub fn connector(mut self, connector: impl Connector) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    /// Validate the settings, create the connection and, if `auto_connect`
    /// is set, perform the opening handshake.
    pub async fn build(self) -> Result<WebSocket> {
        let endpoint = Endpoint::parse(&self.url)?;
        self.config.validate()?;

        let connector = match self.connector {
            Some(connector) => connector,
            None => default_connector(&endpoint)?,
        };

        let auto_connect = self.config.auto_connect;
        let socket = WebSocket::new(endpoint, self.config, connector, self.handler);
        if auto_connect {
            socket.connect().await?;
        }

        Ok(socket)
    }
}

impl fmt::Debug for WebSocketBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSocketBuilder")
            .field("url", &self.url)
            .field("config", &self.config)
            .field("connector", &self.connector.as_ref().map(|c| c.name()))
            .finish()
    }
}

fn default_connector(endpoint: &Endpoint) -> Result<Arc<dyn Connector>> {
    if endpoint.secure {
        tls_connector(endpoint)
    } else {
        tcp_connector()
    }
}

#[cfg(feature = "transport-tls")]
fn tls_connector(_endpoint: &Endpoint) -> Result<Arc<dyn Connector>> {
    Ok(Arc::new(skiff_transport_tls::TlsConnector::new()))
}

#[cfg(not(feature = "transport-tls"))]
fn tls_connector(endpoint: &Endpoint) -> Result<Arc<dyn Connector>> {
    Err(ConfigError::TlsUnavailable(endpoint.to_string()).into())
}

#[cfg(feature = "transport-tcp")]
fn tcp_connector() -> Result<Arc<dyn Connector>> {
    Ok(Arc::new(skiff_transport_tcp::TcpConnector::new()))
}

#[cfg(not(feature = "transport-tcp"))]
fn tcp_connector() -> Result<Arc<dyn Connector>> {
    Err(ConfigError::InvalidValue {
        field: "connector",
        value: "no transport feature enabled".to_string(),
    }
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use skiff_core::Error;

    #[test]
    fn test_endpoint_defaults() {
        let endpoint = Endpoint::parse("ws://example.com").unwrap();
        assert!(!endpoint.secure);
        assert_eq!(endpoint.host, "example.com");
        assert_eq!(endpoint.port, 80);
        assert_eq!(endpoint.path, "/");
        assert_eq!(endpoint.host_header(), "example.com");

        let endpoint = Endpoint::parse("wss://example.com/chat?room=7").unwrap();
        assert!(endpoint.secure);
        assert_eq!(endpoint.port, 443);
        assert_eq!(endpoint.path, "/chat?room=7");
    }

    #[test]
    fn test_endpoint_http_schemes() {
        let endpoint = Endpoint::parse("http://localhost:8080/socket").unwrap();
        assert!(!endpoint.secure);
        assert_eq!(endpoint.port, 8080);
        assert_eq!(endpoint.host_header(), "localhost:8080");
        assert_eq!(endpoint.to_string(), "ws://localhost:8080/socket");

        assert!(Endpoint::parse("https://localhost").unwrap().secure);
    }

    #[test]
    fn test_endpoint_ipv6() {
        let endpoint = Endpoint::parse("ws://[::1]:9001/").unwrap();
        assert_eq!(endpoint.host, "::1");
        assert_eq!(endpoint.host_header(), "[::1]:9001");
    }

    #[test]
    fn test_endpoint_rejects_other_schemes() {
        assert!(matches!(
            Endpoint::parse("ftp://example.com"),
            Err(Error::Config(ConfigError::InvalidScheme(_)))
        ));
        assert!(matches!(
            Endpoint::parse("not a url"),
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_builder_rejects_invalid_config() {
        let result = WebSocketBuilder::new("ws://localhost:9")
            .config(ClientConfig::default().receive_interval(std::time::Duration::ZERO))
            .build()
            .await;
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
