//! Synchronous facade over [`WebSocket`](crate::WebSocket)
//!
//! Each blocking socket owns a small tokio runtime. The background receive
//! task, when enabled, runs on that runtime's worker thread, so events keep
//! flowing between calls.
//!
//! Event callbacks may call back into the socket to send or close. They must
//! not call [`WebSocket::receive_all_available`], which waits on the pump that
//! is delivering the event.

use crate::client::{Endpoint, WebSocketBuilder};
use crate::connection::WebSocket as AsyncWebSocket;
use skiff_core::{CloseCode, ConnectionState, Message, Result};
use std::future::Future;
use tokio::runtime::{Handle, Runtime, RuntimeFlavor};

/// A WebSocket driven from synchronous code
#[derive(Debug)]
pub struct WebSocket {
    runtime: Runtime,
    socket: AsyncWebSocket,
}

impl WebSocket {
    /// Build the connection on a private runtime. Connects immediately when
    /// the builder's configuration has `auto_connect` set.
    ///
    /// Must not be called from inside an async context.
    pub fn new(builder: WebSocketBuilder) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("skiff-blocking")
            .enable_all()
            .build()?;
        let socket = runtime.block_on(builder.build())?;
        Ok(Self { runtime, socket })
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.socket.state()
    }

    /// Target endpoint
    pub fn endpoint(&self) -> &Endpoint {
        self.socket.endpoint()
    }

    /// See [`AsyncWebSocket::connect`]
    pub fn connect(&self) -> Result<()> {
        self.block_on(self.socket.connect())
    }

    /// See [`AsyncWebSocket::send`]
    pub fn send(&self, message: Message) -> Result<()> {
        self.block_on(self.socket.send(message))
    }

    /// See [`AsyncWebSocket::send_text`]
    pub fn send_text(&self, text: impl Into<String>) -> Result<()> {
        self.block_on(self.socket.send_text(text))
    }

    /// See [`AsyncWebSocket::send_binary`]
    pub fn send_binary(&self, data: impl Into<bytes::Bytes>) -> Result<()> {
        self.block_on(self.socket.send_binary(data))
    }

    /// See [`AsyncWebSocket::ping`]
    pub fn ping(&self, data: impl Into<bytes::Bytes>) -> Result<()> {
        self.block_on(self.socket.ping(data))
    }

    /// See [`AsyncWebSocket::send_close`]
    pub fn send_close(&self, code: CloseCode, reason: Option<&str>) -> Result<()> {
        self.block_on(self.socket.send_close(code, reason))
    }

    /// See [`AsyncWebSocket::receive_all_available`]
    pub fn receive_all_available(&self) -> usize {
        self.block_on(self.socket.receive_all_available())
    }

    /// The async handle backing this socket
    pub fn as_async(&self) -> &AsyncWebSocket {
        &self.socket
    }

    // Callbacks run on a runtime worker, where a plain `block_on` panics.
    fn block_on<F: Future>(&self, future: F) -> F::Output {
        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| self.runtime.block_on(future))
            }
            _ => self.runtime.block_on(future),
        }
    }
}
