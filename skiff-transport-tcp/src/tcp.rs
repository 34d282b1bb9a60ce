//! TCP connector implementation

use async_trait::async_trait;
use skiff_core::{transport::Connector, BoxedStream, Result};
use tokio::net::TcpStream;

/// Connects over plain TCP with Nagle's algorithm disabled
#[derive(Debug, Clone)]
pub struct TcpConnector {
    nodelay: bool,
}

impl TcpConnector {
    /// Create a connector with `TCP_NODELAY` enabled
    pub fn new() -> Self {
        Self { nodelay: true }
    }

    /// Toggle `TCP_NODELAY` on new streams
    pub fn nodelay(mut self, enabled: bool) -> Self {
        self.nodelay = enabled;
        self
    }

    /// Open a tokio stream to `host:port`
    pub async fn connect_stream(&self, host: &str, port: u16) -> Result<TcpStream> {
        let stream = TcpStream::connect((host, port)).await?;
        stream.set_nodelay(self.nodelay)?;
        tracing::debug!(
            host,
            port,
            local = ?stream.local_addr().ok(),
            "tcp stream connected"
        );
        Ok(stream)
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, host: &str, port: u16) -> Result<BoxedStream> {
        Ok(Box::new(self.connect_stream(host, port).await?))
    }

    fn name(&self) -> &'static str {
        "tcp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_tcp_connector_roundtrip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4];
            stream.read_exact(&mut buf).await.unwrap();
            stream.write_all(&buf).await.unwrap();
        });

        let connector = TcpConnector::new();
        assert_eq!(connector.name(), "tcp");
        let mut stream = connector.connect("127.0.0.1", port).await.unwrap();
        stream.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_tcp_connector_nodelay() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let stream = TcpConnector::new()
            .connect_stream("127.0.0.1", port)
            .await
            .unwrap();
        assert!(stream.nodelay().unwrap());

        let stream = TcpConnector::new()
            .nodelay(false)
            .connect_stream("127.0.0.1", port)
            .await
            .unwrap();
        assert!(!stream.nodelay().unwrap());
    }

    #[tokio::test]
    async fn test_tcp_connector_default_enables_nodelay() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let stream = TcpConnector::default()
            .connect_stream("127.0.0.1", port)
            .await
            .unwrap();
        assert!(stream.nodelay().unwrap());
    }

    #[tokio::test]
    async fn test_tcp_connector_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        match TcpConnector::new().connect("127.0.0.1", port).await {
            Err(err) => assert!(matches!(err, skiff_core::Error::Io(_))),
            Ok(_) => panic!("connect to a closed port succeeded"),
        }
    }
}
