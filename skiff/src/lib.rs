//! # Skiff
//!
//! A small, thread-safe RFC 6455 WebSocket client that speaks the protocol
//! directly over a byte stream.
//!
//! Sending and receiving are guarded independently, so one task can send
//! while another pumps incoming data. Incoming messages and lifecycle
//! changes are delivered through an [`EventHandler`](client::EventHandler).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use skiff::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//!     let (events, mut rx) = tokio::sync::mpsc::unbounded_channel();
//!     let socket = WebSocket::builder("ws://localhost:9001")
//!         .config(ClientConfig::default().chunking_mode(ChunkingMode::NeverUseExtendedLength))
//!         .handler(events)
//!         .build()
//!         .await?;
//!
//!     socket.send_binary(vec![0u8; 300]).await?;
//!
//!     while let Some(event) = rx.recv().await {
//!         match event {
//!             Event::Binary(data) => println!("{} bytes", data.len()),
//!             Event::Closed { code, reason } => {
//!                 println!("closed: {} {:?}", code, reason);
//!                 break;
//!             }
//!             _ => {}
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `transport-tcp` (default): `ws://` support
//! - `transport-tls`: `wss://` support through rustls
//! - `metrics`: counters through the `metrics` facade

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

pub use skiff_core::*;

pub use skiff_client as client;
pub use skiff_client::{blocking, ClientConfig, Endpoint, Event, EventHandler, WebSocket, WebSocketBuilder};

#[cfg(feature = "transport-tcp")]
pub use skiff_transport_tcp as transport_tcp;

#[cfg(feature = "transport-tls")]
pub use skiff_transport_tls as transport_tls;

/// Prelude module with common imports
pub mod prelude {
    pub use skiff_client::prelude::*;

    #[cfg(feature = "transport-tcp")]
    pub use skiff_transport_tcp::prelude::*;

    #[cfg(feature = "transport-tls")]
    pub use skiff_transport_tls::prelude::*;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facade_reexports() {
        assert_eq!(env!("CARGO_PKG_NAME"), "skiff");
        let config = ClientConfig::default();
        assert_eq!(config.chunking_mode, ChunkingMode::LimitTo16Bit);
        assert!(Endpoint::parse("ws://localhost").is_ok());
    }
}
