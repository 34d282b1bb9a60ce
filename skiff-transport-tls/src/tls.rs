//! TLS connector implementation

use async_trait::async_trait;
use rustls::{ClientConfig, OwnedTrustAnchor, RootCertStore, ServerName};
use skiff_core::{transport::Connector, BoxedStream, Result};
use skiff_transport_tcp::TcpConnector;
use std::sync::Arc;

/// Connects over TCP and then performs a TLS handshake, using the URL host
/// for SNI and certificate verification
#[derive(Clone)]
pub struct TlsConnector {
    config: Arc<ClientConfig>,
    tcp: TcpConnector,
}

impl TlsConnector {
    /// Create a connector that trusts the webpki root certificates
    pub fn new() -> Self {
        Self::with_config(Arc::new(Self::default_client_config()))
    }

    /// Create a connector with a caller-supplied rustls configuration
    pub fn with_config(config: Arc<ClientConfig>) -> Self {
        Self {
            config,
            tcp: TcpConnector::new(),
        }
    }

    /// Client configuration trusting the webpki root certificates
    pub fn default_client_config() -> ClientConfig {
        let mut root_store = RootCertStore::empty();
        root_store.add_trust_anchors(webpki_roots::TLS_SERVER_ROOTS.iter().map(|ta| {
            OwnedTrustAnchor::from_subject_spki_name_constraints(
                ta.subject,
                ta.spki,
                ta.name_constraints,
            )
        }));

        ClientConfig::builder()
            .with_safe_defaults()
            .with_root_certificates(root_store)
            .with_no_client_auth()
    }
}

impl Default for TlsConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TlsConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConnector")
            .field("alpn_protocols", &self.config.alpn_protocols)
            .field("tcp", &self.tcp)
            .finish()
    }
}

#[async_trait]
impl Connector for TlsConnector {
    async fn connect(&self, host: &str, port: u16) -> Result<BoxedStream> {
        let server_name = ServerName::try_from(host).map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid server name \"{}\": {}", host, e),
            )
        })?;

        let tcp = self.tcp.connect_stream(host, port).await?;
        let stream = tokio_rustls::TlsConnector::from(Arc::clone(&self.config))
            .connect(server_name, tcp)
            .await?;

        let (_, session) = stream.get_ref();
        tracing::debug!(
            host,
            port,
            version = ?session.protocol_version(),
            "tls session established"
        );
        Ok(Box::new(stream))
    }

    fn name(&self) -> &'static str {
        "tls"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcgen::{BasicConstraints, Certificate, CertificateParams, IsCa};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    struct TestPki {
        ca_der: Vec<u8>,
        leaf_der: Vec<u8>,
        leaf_key: Vec<u8>,
    }

    fn test_pki() -> TestPki {
        let mut ca_params = CertificateParams::new(Vec::new());
        ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        let ca = Certificate::from_params(ca_params).unwrap();

        let leaf = Certificate::from_params(CertificateParams::new(vec!["localhost".to_string()]))
            .unwrap();

        TestPki {
            ca_der: ca.serialize_der().unwrap(),
            leaf_der: leaf.serialize_der_with_signer(&ca).unwrap(),
            leaf_key: leaf.serialize_private_key_der(),
        }
    }

    fn client_config(ca_der: &[u8]) -> Arc<ClientConfig> {
        let mut roots = RootCertStore::empty();
        roots.add(&rustls::Certificate(ca_der.to_vec())).unwrap();
        Arc::new(
            ClientConfig::builder()
                .with_safe_defaults()
                .with_root_certificates(roots)
                .with_no_client_auth(),
        )
    }

    #[test]
    fn test_tls_connector_defaults() {
        let connector = TlsConnector::new();
        assert_eq!(connector.name(), "tls");
        assert!(format!("{:?}", connector).contains("TlsConnector"));
    }

    #[tokio::test]
    async fn test_tls_connector_rejects_bad_server_name() {
        match TlsConnector::new().connect("bad host!", 443).await {
            Err(skiff_core::Error::Io(err)) => {
                assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput)
            }
            Err(other) => panic!("unexpected error: {:?}", other),
            Ok(_) => panic!("bad server name was accepted"),
        }
    }

    #[tokio::test]
    async fn test_tls_connector_roundtrip() {
        let pki = test_pki();
        let server_config = rustls::ServerConfig::builder()
            .with_safe_defaults()
            .with_no_client_auth()
            .with_single_cert(
                vec![rustls::Certificate(pki.leaf_der.clone())],
                rustls::PrivateKey(pki.leaf_key.clone()),
            )
            .unwrap();
        let acceptor = tokio_rustls::TlsAcceptor::from(Arc::new(server_config));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut stream = acceptor.accept(tcp).await.unwrap();
            let mut buf = [0u8; 5];
            stream.read_exact(&mut buf).await.unwrap();
            stream.write_all(&buf).await.unwrap();
            stream.flush().await.unwrap();
        });

        let connector = TlsConnector::with_config(client_config(&pki.ca_der));
        let mut stream = connector.connect("localhost", port).await.unwrap();
        stream.write_all(b"hello").await.unwrap();
        stream.flush().await.unwrap();
        let mut buf = [0u8; 5];
        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_tls_connector_rejects_untrusted_certificate() {
        let pki = test_pki();
        let other = test_pki();
        let server_config = rustls::ServerConfig::builder()
            .with_safe_defaults()
            .with_no_client_auth()
            .with_single_cert(
                vec![rustls::Certificate(pki.leaf_der.clone())],
                rustls::PrivateKey(pki.leaf_key.clone()),
            )
            .unwrap();
        let acceptor = tokio_rustls::TlsAcceptor::from(Arc::new(server_config));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let _ = acceptor.accept(tcp).await;
        });

        let connector = TlsConnector::with_config(client_config(&other.ca_der));
        assert!(connector.connect("localhost", port).await.is_err());
    }
}
