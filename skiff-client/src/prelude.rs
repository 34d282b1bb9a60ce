//! Prelude module for Skiff Client
//!
//! Re-exports the types most programs need.

pub use crate::client::{Endpoint, WebSocketBuilder};
pub use crate::config::ClientConfig;
pub use crate::connection::WebSocket;
pub use crate::events::{Event, EventHandler};

pub use skiff_core::prelude::*;

pub use std::time::Duration;
