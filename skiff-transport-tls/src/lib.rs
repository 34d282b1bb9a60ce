//! TLS Transport for Skiff
//!
//! Opens `wss://` connections with rustls, verifying servers against the
//! Mozilla root store by default.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

pub mod tls;

pub use tls::TlsConnector;

/// Prelude module
pub mod prelude {
    pub use crate::tls::TlsConnector;
    pub use skiff_core::transport::{BoxedStream, Connector};
}
