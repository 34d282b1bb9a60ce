//! Connection notifications
//!
//! The engine reports lifecycle changes and incoming messages through an
//! [`EventHandler`]. Callbacks run synchronously on whichever task performed
//! the pump, so they should hand work off rather than block. Callers that
//! prefer a stream of values can pass an
//! [`UnboundedSender<Event>`](tokio::sync::mpsc::UnboundedSender) instead.

use bytes::Bytes;
use skiff_core::{CloseCode, Message};
use tokio::sync::mpsc::UnboundedSender;

/// Receives connection notifications. Every method defaults to a no-op.
#[allow(unused_variables)]
pub trait EventHandler: Send + Sync + 'static {
    /// The handshake succeeded and the connection is open
    fn on_open(&self) {}

    /// A close frame has been sent and the connection is closing
    fn on_closing(&self, code: CloseCode, reason: Option<&str>) {}

    /// The connection is closed; `code` and `reason` are final
    fn on_closed(&self, code: CloseCode, reason: Option<&str>) {}

    /// A pong arrived
    fn on_pong(&self, payload: &[u8]) {}

    /// A binary message arrived
    fn on_binary(&self, payload: &[u8]) {}

    /// A text message arrived
    fn on_text(&self, text: &str) {}

    /// Any message arrived, after the type-specific callback
    fn on_message(&self, message: &Message) {}
}

impl EventHandler for () {}

/// Owned form of a notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// See [`EventHandler::on_open`]
    Opened,
    /// See [`EventHandler::on_closing`]
    Closing {
        /// Close code sent
        code: CloseCode,
        /// Reason sent
        reason: Option<String>,
    },
    /// See [`EventHandler::on_closed`]
    Closed {
        /// Final close code
        code: CloseCode,
        /// Final reason
        reason: Option<String>,
    },
    /// See [`EventHandler::on_pong`]
    Pong(Bytes),
    /// See [`EventHandler::on_binary`]
    Binary(Bytes),
    /// See [`EventHandler::on_text`]
    Text(String),
    /// See [`EventHandler::on_message`]
    Message(Message),
}

// A dropped receiver just means nobody is listening any more.
impl EventHandler for UnboundedSender<Event> {
    fn on_open(&self) {
        let _ = self.send(Event::Opened);
    }

    fn on_closing(&self, code: CloseCode, reason: Option<&str>) {
        let _ = self.send(Event::Closing {
            code,
            reason: reason.map(str::to_string),
        });
    }

    fn on_closed(&self, code: CloseCode, reason: Option<&str>) {
        let _ = self.send(Event::Closed {
            code,
            reason: reason.map(str::to_string),
        });
    }

    fn on_pong(&self, payload: &[u8]) {
        let _ = self.send(Event::Pong(Bytes::copy_from_slice(payload)));
    }

    fn on_binary(&self, payload: &[u8]) {
        let _ = self.send(Event::Binary(Bytes::copy_from_slice(payload)));
    }

    fn on_text(&self, text: &str) {
        let _ = self.send(Event::Text(text.to_string()));
    }

    fn on_message(&self, message: &Message) {
        let _ = self.send(Event::Message(message.clone()));
    }
}
