//! Transport abstraction
//!
//! The WebSocket engine only needs a bidirectional byte stream. A
//! [`Connector`] produces one for a host and port; the TCP and TLS transport
//! crates provide the usual implementations and tests plug in in-memory
//! pipes.

use crate::error::Result;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};

/// A bidirectional byte stream usable by the connection engine
pub trait AsyncStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> AsyncStream for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

/// Type-erased stream handed out by a [`Connector`]
pub type BoxedStream = Box<dyn AsyncStream>;

/// Opens byte streams to a remote endpoint
#[async_trait::async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a stream to `host:port`
    async fn connect(&self, host: &str, port: u16) -> Result<BoxedStream>;

    /// Short name used in logs
    fn name(&self) -> &'static str {
        "custom"
    }
}

#[async_trait::async_trait]
impl<C: Connector + ?Sized> Connector for Arc<C> {
    async fn connect(&self, host: &str, port: u16) -> Result<BoxedStream> {
        (**self).connect(host, port).await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
