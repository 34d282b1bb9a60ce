//! Skiff Client
//!
//! The connection engine of the Skiff WebSocket client: URL handling,
//! configuration, the open/close state machine and event delivery.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use skiff_client::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//!     let (events, mut rx) = tokio::sync::mpsc::unbounded_channel();
//!     let socket = WebSocket::builder("ws://localhost:9001/chat")
//!         .handler(events)
//!         .build()
//!         .await?;
//!
//!     socket.send_text("Hello, Skiff!").await?;
//!
//!     while let Some(event) = rx.recv().await {
//!         if let Event::Text(text) = event {
//!             println!("Received: {}", text);
//!             break;
//!         }
//!     }
//!
//!     socket.send_close(CloseCode::Normal, None).await?;
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

pub mod blocking;
pub mod client;
pub mod config;
pub mod connection;
pub mod events;

pub mod prelude;

pub use client::{Endpoint, WebSocketBuilder};
pub use config::ClientConfig;
pub use connection::WebSocket;
pub use events::{Event, EventHandler};
