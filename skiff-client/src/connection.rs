//! The connection engine
//!
//! [`WebSocket`] owns the connection state machine:
//!
//! ```text
//! Closed --connect--> Connecting --101 + valid accept--> Open
//! Open --close sent--> Closing --peer close / stream end--> Closed
//! any --stream dropped--> Closed (AbnormalClosure)
//! ```
//!
//! Sending and receiving are guarded by two independent locks so a send
//! never waits for a pump and vice versa. The state itself is an atomic tag
//! that can be read without either lock.

use crate::client::{Endpoint, WebSocketBuilder};
use crate::config::ClientConfig;
use crate::events::EventHandler;
use futures_util::FutureExt;
use skiff_core::error::{HandshakeError, MessageError};
use skiff_core::handshake::{validate_server_handshake, HandshakeRequest, HandshakeResponse};
use skiff_core::message::CloseMessage;
use skiff_core::protocol::constants::{MAX_CONTROL_PAYLOAD, UNEXPECTED_CLOSE_REASON};
use skiff_core::protocol::http::USER_AGENT;
use skiff_core::{
    BoxedStream, CloseCode, ConnectionState, Connector, Error, Fragment, Frame, FrameAssembler,
    Message, Result,
};
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};

type Reader = BufReader<ReadHalf<BoxedStream>>;
type Writer = WriteHalf<BoxedStream>;

/// A client WebSocket connection.
///
/// Cloning is cheap and every clone drives the same connection.
#[derive(Clone)]
pub struct WebSocket {
    inner: Arc<Shared>,
}

struct Shared {
    endpoint: Endpoint,
    config: ClientConfig,
    connector: Arc<dyn Connector>,
    handler: Arc<dyn EventHandler>,
    state: AtomicU8,
    // Bumped on every open and close; a receive task exits once it no
    // longer matches the value it was started with.
    generation: AtomicU64,
    writer: tokio::sync::Mutex<Option<Writer>>,
    reader: tokio::sync::Mutex<Option<Reader>>,
    assembler: Mutex<FrameAssembler>,
    close_message: Mutex<Option<CloseMessage>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl WebSocket {
    /// Start building a connection to `url`
    pub fn builder(url: impl Into<String>) -> WebSocketBuilder {
        WebSocketBuilder::new(url)
    }

    pub(crate) fn new(
        endpoint: Endpoint,
        config: ClientConfig,
        connector: Arc<dyn Connector>,
        handler: Arc<dyn EventHandler>,
    ) -> Self {
        Self {
            inner: Arc::new(Shared {
                endpoint,
                config,
                connector,
                handler,
                state: AtomicU8::new(ConnectionState::Closed as u8),
                generation: AtomicU64::new(0),
                writer: tokio::sync::Mutex::new(None),
                reader: tokio::sync::Mutex::new(None),
                assembler: Mutex::new(FrameAssembler::new()),
                close_message: Mutex::new(None),
            }),
        }
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.inner.state()
    }

    /// The endpoint this connection targets
    pub fn endpoint(&self) -> &Endpoint {
        &self.inner.endpoint
    }

    /// The configuration the connection was built with
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Open the stream and perform the opening handshake.
    ///
    /// Only allowed while `Closed`. On failure the connection is left
    /// `Closed`, the error is returned and `on_closed` fires with
    /// `ProtocolError` and the error text.
    #[tracing::instrument(skip(self), fields(endpoint = %self.inner.endpoint))]
    pub async fn connect(&self) -> Result<()> {
        let inner = &self.inner;
        if !inner.transition(ConnectionState::Closed, ConnectionState::Connecting) {
            return Err(Error::InvalidState {
                operation: "connect",
                state: inner.state(),
            });
        }

        match inner.open_stream().await {
            Ok((reader, writer)) => {
                Shared::on_open(inner, reader, writer).await;
                Ok(())
            }
            Err(err) => {
                tracing::warn!(error = %err, "connect failed");
                inner.set_state(ConnectionState::Closed);
                inner
                    .handler
                    .on_closed(CloseCode::ProtocolError, Some(&err.to_string()));
                Err(err)
            }
        }
    }

    /// Send a message. Only allowed while `Open`.
    ///
    /// The message is chunked per the configured [`ChunkingMode`] and all of
    /// its fragments are written under the send lock. A failed write still
    /// returns the error, but also closes the connection: with `AbnormalClosure`
    /// when the peer is gone, otherwise by sending `InternalError`.
    ///
    /// [`ChunkingMode`]: skiff_core::ChunkingMode
    pub async fn send(&self, message: Message) -> Result<()> {
        let state = self.inner.state();
        if state != ConnectionState::Open {
            return Err(Error::InvalidState {
                operation: "send",
                state,
            });
        }
        if let Err(err) = self.inner.write_message(&message).await {
            self.inner.handle_failure(&err).await;
            return Err(err);
        }
        Ok(())
    }

    /// Send a text message
    pub async fn send_text(&self, text: impl Into<String>) -> Result<()> {
        self.send(Message::text(text)).await
    }

    /// Send a binary message
    pub async fn send_binary(&self, data: impl Into<bytes::Bytes>) -> Result<()> {
        self.send(Message::binary(data)).await
    }

    /// Send a ping; payloads over 125 bytes are rejected before anything is
    /// written
    pub async fn ping(&self, data: impl Into<bytes::Bytes>) -> Result<()> {
        self.send(Message::ping(data)?).await
    }

    /// Start the close handshake.
    ///
    /// Does nothing when already `Closed`. While `Closing` the request is
    /// ignored, except that an `InternalError` close is still reported
    /// through `on_closing`. Codes that may not appear on the wire are
    /// rejected.
    pub async fn send_close(&self, code: CloseCode, reason: Option<&str>) -> Result<()> {
        let inner = &self.inner;
        match inner.state() {
            ConnectionState::Closed => return Ok(()),
            ConnectionState::Connecting => {
                return Err(Error::InvalidState {
                    operation: "close",
                    state: ConnectionState::Connecting,
                })
            }
            ConnectionState::Closing => {
                if code == CloseCode::InternalError {
                    inner.handler.on_closing(code, reason);
                }
                return Ok(());
            }
            ConnectionState::Open => {}
        }

        if !code.is_sendable() {
            return Err(MessageError::ReservedCloseCode(code.code()).into());
        }

        inner
            .initiate_close(CloseMessage::new(code, reason.map(str::to_string)))
            .await;
        Ok(())
    }

    /// Normal close without a reason
    pub async fn close(&self) -> Result<()> {
        self.send_close(CloseCode::Normal, None).await
    }

    /// Pump the stream once: decode every fragment that is already
    /// available, reassemble and dispatch them. Returns the number of
    /// fragments read.
    pub async fn receive_all_available(&self) -> usize {
        self.inner.receive_all_available().await
    }
}

impl fmt::Debug for WebSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSocket")
            .field("endpoint", &self.inner.endpoint)
            .field("state", &self.inner.state())
            .field("connector", &self.inner.connector.name())
            .finish()
    }
}

impl Shared {
    fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    fn transition(&self, from: ConnectionState, to: ConnectionState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn is_live(&self) -> bool {
        matches!(
            self.state(),
            ConnectionState::Open | ConnectionState::Closing
        )
    }

    async fn open_stream(&self) -> Result<(Reader, Writer)> {
        let stream = self
            .connector
            .connect(&self.endpoint.host, self.endpoint.port)
            .await?;
        let (read_half, mut writer) = tokio::io::split(stream);
        let mut reader = BufReader::new(read_half);

        let mut request = HandshakeRequest::new(&self.endpoint.host_header(), &self.endpoint.path)
            .header(USER_AGENT, &self.config.user_agent)?;
        for (name, value) in &self.config.headers {
            request = request.header(name, value)?;
        }

        writer.write_all(&request.to_bytes()).await?;
        writer.flush().await?;
        tracing::debug!(path = %self.endpoint.path, "sent upgrade request");

        let response = tokio::time::timeout(
            self.config.handshake_timeout,
            HandshakeResponse::read(&mut reader),
        )
        .await
        .map_err(|_| HandshakeError::Timeout)??;
        validate_server_handshake(&response, request.key())?;
        tracing::debug!("handshake accepted");

        Ok((reader, writer))
    }

    async fn on_open(self: &Arc<Self>, reader: Reader, writer: Writer) {
        *lock(&self.close_message) = None;
        lock(&self.assembler).clear();
        *self.writer.lock().await = Some(writer);
        *self.reader.lock().await = Some(reader);

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.set_state(ConnectionState::Open);
        tracing::info!(endpoint = %self.endpoint, "connection open");
        self.handler.on_open();

        if self.config.use_receive_task {
            let shared = Arc::clone(self);
            tokio::spawn(async move { shared.receive_loop(generation).await });
        }
    }

    async fn receive_loop(self: Arc<Self>, generation: u64) {
        tracing::debug!(generation, "receive task started");
        while self.generation.load(Ordering::SeqCst) == generation && self.is_live() {
            if self.receive_all_available().await == 0 {
                tokio::time::sleep(self.config.receive_interval).await;
            }
        }
        tracing::debug!(generation, "receive task stopped");
    }

    async fn write_message(&self, message: &Message) -> Result<()> {
        let fragments = message.to_frame().to_fragments(self.config.chunking_mode);

        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "stream is closed",
            ))
        })?;

        #[cfg(feature = "metrics")]
        let mut bytes_sent = 0u64;

        for fragment in &fragments {
            fragment.write(writer).await?;
            #[cfg(feature = "metrics")]
            {
                bytes_sent += fragment.encoded_len() as u64;
            }
        }
        writer.flush().await?;

        #[cfg(feature = "metrics")]
        {
            metrics::counter!("skiff_client_messages_sent_total").increment(1);
            metrics::counter!("skiff_client_bytes_sent_total").increment(bytes_sent);
        }

        tracing::trace!(opcode = ?message.opcode(), fragments = fragments.len(), "sent message");
        Ok(())
    }

    async fn receive_all_available(&self) -> usize {
        if !self.is_live() {
            return 0;
        }

        // Held for the whole pump so fragments reach the assembler in wire
        // order even when a manual pump races the receive task.
        let mut guard = self.reader.lock().await;
        let Some(reader) = guard.as_mut() else {
            return 0;
        };

        let mut fragments = Vec::new();
        let mut failure = None;
        while has_data(reader) {
            match Fragment::read(reader).await {
                Ok(fragment) => fragments.push(fragment),
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }

        let count = fragments.len();
        for fragment in fragments {
            if !self.is_live() {
                break;
            }

            let pushed = lock(&self.assembler).push(fragment);
            let outcome = match pushed {
                Ok(Some(frame)) => self.dispatch(frame).await,
                Ok(None) => Ok(()),
                Err(violation) => Err(violation.into()),
            };
            if let Err(err) = outcome {
                failure = Some(err);
                break;
            }
        }

        if let Some(err) = failure {
            self.handle_failure(&err).await;
        }

        if self.state() == ConnectionState::Closed {
            guard.take();
        }
        count
    }

    async fn dispatch(&self, frame: Frame) -> Result<()> {
        let message = Message::from_frame(frame)?;

        #[cfg(feature = "metrics")]
        metrics::counter!("skiff_client_messages_received_total").increment(1);

        match &message {
            Message::Ping(ping) => {
                if self.state() == ConnectionState::Open {
                    self.write_message(&Message::pong(ping.encode())).await?;
                }
            }
            Message::Pong(pong) => self.handler.on_pong(pong.as_bytes()),
            Message::Close(close) => {
                if self.state() == ConnectionState::Closing {
                    tracing::debug!(code = %close.code(), "close acknowledged by peer");
                    *lock(&self.close_message) = Some(close.clone());
                    self.finish_close().await;
                } else {
                    tracing::debug!(code = %close.code(), "peer started close handshake");
                    self.initiate_close(close.clone()).await;
                }
            }
            Message::Binary(binary) => self.handler.on_binary(binary.as_bytes()),
            Message::Text(text) => self.handler.on_text(text.as_str()),
        }

        self.handler.on_message(&message);
        Ok(())
    }

    async fn handle_failure(&self, err: &Error) {
        match err {
            Error::Protocol(violation) => {
                tracing::warn!(%violation, "protocol violation");
                let reason = truncate_reason(violation.to_string());
                self.initiate_close(CloseMessage::new(CloseCode::ProtocolError, Some(reason)))
                    .await;
            }
            err if err.is_connection_dropped() || self.state() == ConnectionState::Closing => {
                tracing::debug!(error = %err, "stream ended");
                self.finish_close().await;
            }
            err => {
                tracing::warn!(error = %err, "stream failed");
                let reason = truncate_reason(err.to_string());
                self.initiate_close(CloseMessage::new(CloseCode::InternalError, Some(reason)))
                    .await;
            }
        }
    }

    async fn initiate_close(&self, close: CloseMessage) {
        if self.state() == ConnectionState::Closing {
            if close.code() == CloseCode::InternalError {
                self.handler.on_closing(close.code(), close.reason());
            }
            return;
        }

        if !self.transition(ConnectionState::Open, ConnectionState::Closing) {
            return;
        }

        *lock(&self.close_message) = Some(close.clone());
        tracing::debug!(code = %close.code(), "sending close");
        self.handler.on_closing(close.code(), close.reason());

        if let Err(err) = self.write_message(&Message::Close(close)).await {
            tracing::warn!(error = %err, "failed to send close");
            *lock(&self.close_message) = Some(CloseMessage::new(
                CloseCode::InternalError,
                Some(format!("Error sending close message: {}", err)),
            ));
            self.finish_close().await;
        }
    }

    async fn finish_close(&self) {
        let previous =
            ConnectionState::from_u8(self.state.swap(ConnectionState::Closed as u8, Ordering::SeqCst));
        if previous == ConnectionState::Closed {
            return;
        }
        self.generation.fetch_add(1, Ordering::SeqCst);

        let recorded = lock(&self.close_message).take();
        let (code, reason) = match (previous, recorded) {
            (ConnectionState::Closing, Some(close)) => close.into_parts(),
            _ => (
                CloseCode::AbnormalClosure,
                Some(UNEXPECTED_CLOSE_REASON.to_string()),
            ),
        };

        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
        if let Ok(mut reader) = self.reader.try_lock() {
            reader.take();
        }
        lock(&self.assembler).clear();

        #[cfg(feature = "metrics")]
        metrics::counter!("skiff_client_connections_closed_total").increment(1);

        tracing::info!(%code, reason = reason.as_deref().unwrap_or(""), "connection closed");
        self.handler.on_closed(code, reason.as_deref());
    }
}

fn has_data(reader: &mut Reader) -> bool {
    // A ready poll means bytes, end of stream or an error; all of them need
    // a read to be observed.
    !reader.buffer().is_empty() || reader.fill_buf().now_or_never().is_some()
}

fn truncate_reason(mut reason: String) -> String {
    let max = MAX_CONTROL_PAYLOAD - 2;
    if reason.len() > max {
        let mut end = max;
        while !reason.is_char_boundary(end) {
            end -= 1;
        }
        reason.truncate(end);
    }
    reason
}
