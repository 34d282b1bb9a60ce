//! TCP Transport for Skiff
//!
//! Opens plain `ws://` connections.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

pub mod tcp;

pub use tcp::TcpConnector;

/// Prelude module
pub mod prelude {
    pub use crate::tcp::TcpConnector;
    pub use skiff_core::transport::{BoxedStream, Connector};
}
