//! Prelude module for Skiff Core
//!
//! Re-exports the types most callers need.

pub use crate::error::{CloseCode, Error, Result};
pub use crate::fragment::Fragment;
pub use crate::frame::{ChunkingMode, Frame, FrameAssembler};
pub use crate::message::{CloseMessage, Message};
pub use crate::protocol::{ConnectionState, Opcode};
pub use crate::transport::{BoxedStream, Connector};

pub use bytes::Bytes;
