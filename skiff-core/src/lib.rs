//! # Skiff Core
//!
//! Protocol engine pieces shared by the Skiff WebSocket client:
//!
//! - Error types and close codes
//! - The wire [`Fragment`] codec (header, extended length, mask, payload)
//! - The [`Frame`] assembler that chunks outgoing payloads and reassembles
//!   incoming fragment sequences
//! - The typed [`Message`] layer
//! - Opening-handshake helpers (key generation, accept validation)
//! - The [`Connector`] transport abstraction

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]
#![doc(html_root_url = "https://docs.rs/skiff-core/")]

pub mod error;
pub mod fragment;
pub mod frame;
pub mod handshake;
pub mod message;
pub mod protocol;
pub mod transport;

pub mod prelude;

pub use error::{CloseCode, Error, Result};
pub use fragment::Fragment;
pub use frame::{ChunkingMode, Frame, FrameAssembler};
pub use handshake::{HandshakeRequest, HandshakeResponse};
pub use message::Message;
pub use protocol::{ConnectionState, Opcode};
pub use transport::{BoxedStream, Connector};
