//! Typed WebSocket messages
//!
//! Each variant knows the opcode it is sent with and how its payload is
//! encoded and decoded. Conversion to and from [`Frame`] dispatches on the
//! opcode.

use crate::{
    error::{CloseCode, Error, MessageError, ProtocolError, Result},
    frame::Frame,
    protocol::{constants::MAX_CONTROL_PAYLOAD, Opcode},
};
use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

/// A complete WebSocket message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// UTF-8 text
    Text(TextMessage),
    /// Opaque bytes
    Binary(BinaryMessage),
    /// Ping with up to 125 bytes of payload
    Ping(PingMessage),
    /// Pong with up to 125 bytes of payload
    Pong(PongMessage),
    /// Close with a status code and optional reason
    Close(CloseMessage),
}

impl Message {
    /// Create a text message
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(TextMessage::new(text))
    }

    /// Create a binary message
    pub fn binary(data: impl Into<Bytes>) -> Self {
        Self::Binary(BinaryMessage::new(data))
    }

    /// Create a ping message. Fails if `data` is longer than 125 bytes.
    pub fn ping(data: impl Into<Bytes>) -> Result<Self> {
        Ok(Self::Ping(PingMessage::new(data)?))
    }

    /// Create a pong message
    pub fn pong(data: impl Into<Bytes>) -> Self {
        Self::Pong(PongMessage::new(data))
    }

    /// Create a close message
    pub fn close(code: CloseCode, reason: Option<String>) -> Self {
        Self::Close(CloseMessage::new(code, reason))
    }

    /// Opcode the message is sent with
    pub fn opcode(&self) -> Opcode {
        match self {
            Message::Text(_) => TextMessage::OPCODE,
            Message::Binary(_) => BinaryMessage::OPCODE,
            Message::Ping(_) => PingMessage::OPCODE,
            Message::Pong(_) => PongMessage::OPCODE,
            Message::Close(_) => CloseMessage::OPCODE,
        }
    }

    /// Check if this is a control message
    pub fn is_control(&self) -> bool {
        self.opcode().is_control()
    }

    /// Text content of a text message
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Message::Text(msg) => Some(msg.as_str()),
            _ => None,
        }
    }

    /// Encoded payload
    pub fn payload(&self) -> Bytes {
        match self {
            Message::Text(msg) => msg.encode(),
            Message::Binary(msg) => msg.encode(),
            Message::Ping(msg) => msg.encode(),
            Message::Pong(msg) => msg.encode(),
            Message::Close(msg) => msg.encode(),
        }
    }

    /// Convert to a frame ready for chunking
    pub fn to_frame(&self) -> Frame {
        Frame::new(self.opcode(), self.payload())
    }

    /// Decode a reassembled frame.
    ///
    /// Reserved opcodes are protocol violations. A continuation opcode can
    /// only get here if reassembly is broken and is reported as an internal
    /// error.
    pub fn from_frame(frame: Frame) -> Result<Self> {
        let Frame { opcode, payload } = frame;
        match opcode {
            Opcode::Text => Ok(Message::Text(TextMessage::decode(payload)?)),
            Opcode::Binary => Ok(Message::Binary(BinaryMessage::decode(payload))),
            Opcode::Ping => Ok(Message::Ping(PingMessage::decode(payload)?)),
            Opcode::Pong => Ok(Message::Pong(PongMessage::decode(payload)?)),
            Opcode::Close => Ok(Message::Close(CloseMessage::decode(payload)?)),
            Opcode::Continuation => Err(Error::Internal(
                "continuation opcode reached message decoding".to_string(),
            )),
            reserved => Err(ProtocolError::ReservedOpcode(reserved.value()).into()),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Text(msg) => write!(f, "Text({})", msg.as_str()),
            Message::Binary(msg) => write!(f, "Binary({} bytes)", msg.len()),
            Message::Ping(msg) => write!(f, "Ping({} bytes)", msg.as_bytes().len()),
            Message::Pong(msg) => write!(f, "Pong({} bytes)", msg.as_bytes().len()),
            Message::Close(msg) => match msg.reason() {
                Some(reason) => write!(f, "Close({}, {})", msg.code(), reason),
                None => write!(f, "Close({})", msg.code()),
            },
        }
    }
}

/// Text message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextMessage {
    text: String,
}

impl TextMessage {
    /// Opcode text messages are sent with
    pub const OPCODE: Opcode = Opcode::Text;

    /// Create a new text message
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Get the text content
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Consume the message and return the text
    pub fn into_string(self) -> String {
        self.text
    }

    /// UTF-8 bytes of the text
    pub fn encode(&self) -> Bytes {
        Bytes::copy_from_slice(self.text.as_bytes())
    }

    /// Decode a text payload
    pub fn decode(payload: Bytes) -> Result<Self> {
        let text = String::from_utf8(payload.to_vec())
            .map_err(|_| ProtocolError::InvalidUtf8("text message"))?;
        Ok(Self { text })
    }
}

/// Binary message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryMessage {
    data: Bytes,
}

impl BinaryMessage {
    /// Opcode binary messages are sent with
    pub const OPCODE: Opcode = Opcode::Binary;

    /// Create a new binary message
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// Get the binary data
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Get the data length
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the data is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Raw bytes
    pub fn encode(&self) -> Bytes {
        self.data.clone()
    }

    /// Any payload is a valid binary message
    pub fn decode(payload: Bytes) -> Self {
        Self { data: payload }
    }
}

fn check_control_len(len: usize) -> std::result::Result<(), ProtocolError> {
    if len > MAX_CONTROL_PAYLOAD {
        return Err(ProtocolError::ControlFrameTooLarge(len));
    }
    Ok(())
}

/// Ping message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingMessage {
    data: Bytes,
}

impl PingMessage {
    /// Opcode ping messages are sent with
    pub const OPCODE: Opcode = Opcode::Ping;

    /// Create a ping. Payloads above 125 bytes are rejected.
    pub fn new(data: impl Into<Bytes>) -> Result<Self> {
        let data = data.into();
        if data.len() > MAX_CONTROL_PAYLOAD {
            return Err(MessageError::ControlPayloadTooLarge {
                len: data.len(),
                max: MAX_CONTROL_PAYLOAD,
            }
            .into());
        }
        Ok(Self { data })
    }

    /// Get the ping data
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Raw bytes
    pub fn encode(&self) -> Bytes {
        self.data.clone()
    }

    /// Decode a ping received from the peer
    pub fn decode(payload: Bytes) -> Result<Self> {
        check_control_len(payload.len())?;
        Ok(Self { data: payload })
    }
}

/// Pong message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PongMessage {
    data: Bytes,
}

impl PongMessage {
    /// Opcode pong messages are sent with
    pub const OPCODE: Opcode = Opcode::Pong;

    /// Create a pong
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// Get the pong data
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Raw bytes
    pub fn encode(&self) -> Bytes {
        self.data.clone()
    }

    /// Decode a pong received from the peer
    pub fn decode(payload: Bytes) -> Result<Self> {
        check_control_len(payload.len())?;
        Ok(Self { data: payload })
    }
}

/// Close message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseMessage {
    code: CloseCode,
    reason: Option<String>,
}

impl CloseMessage {
    /// Opcode close messages are sent with
    pub const OPCODE: Opcode = Opcode::Close;

    /// Create a close message
    pub fn new(code: CloseCode, reason: Option<String>) -> Self {
        Self { code, reason }
    }

    /// Close status code
    pub fn code(&self) -> CloseCode {
        self.code
    }

    /// Optional reason text
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// Split into code and reason
    pub fn into_parts(self) -> (CloseCode, Option<String>) {
        (self.code, self.reason)
    }

    /// Encode as a two byte big-endian code followed by the reason.
    ///
    /// `NoStatus` encodes to an empty payload since a close frame cannot
    /// carry a reason without a code.
    pub fn encode(&self) -> Bytes {
        if self.code == CloseCode::NoStatus {
            return Bytes::new();
        }

        let reason = self.reason.as_deref().unwrap_or_default();
        let mut buf = BytesMut::with_capacity(2 + reason.len());
        buf.put_u16(self.code.code());
        buf.put_slice(reason.as_bytes());
        buf.freeze()
    }

    /// Decode a close payload.
    ///
    /// An empty payload means `NoStatus`. One byte is a protocol violation.
    pub fn decode(payload: Bytes) -> Result<Self> {
        check_control_len(payload.len())?;
        match payload.len() {
            0 => return Ok(Self::new(CloseCode::NoStatus, None)),
            1 => return Err(ProtocolError::ClosePayloadTooShort(1).into()),
            _ => {}
        }

        let code = CloseCode::from(u16::from_be_bytes([payload[0], payload[1]]));
        let reason = if payload.len() > 2 {
            let text = std::str::from_utf8(&payload[2..])
                .map_err(|_| ProtocolError::InvalidUtf8("close reason"))?;
            Some(text.to_string())
        } else {
            None
        };

        Ok(Self { code, reason })
    }
}
