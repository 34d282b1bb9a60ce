//! Error types for Skiff
//!
//! Every fallible operation in the workspace returns [`Result`]. The variants
//! of [`Error`] follow the failure classes the connection engine reacts to:
//! protocol violations are answered with a Close frame, transport failures
//! either finish or abort the close handshake, and the rest are reported
//! straight back to the caller.

use crate::protocol::{ConnectionState, Opcode};
use std::fmt;
use thiserror::Error;

/// Result type alias for Skiff operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Error, Debug)]
pub enum Error {
    /// The peer violated RFC 6455
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The underlying byte stream failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The HTTP Upgrade exchange did not produce a valid WebSocket
    #[error("Handshake error: {0}")]
    Handshake(#[from] HandshakeError),

    /// A message could not be constructed
    #[error("Message error: {0}")]
    Message(#[from] MessageError),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The operation is not allowed in the current connection state
    #[error("Cannot {operation} while the connection is {state}")]
    InvalidState {
        /// The rejected operation
        operation: &'static str,
        /// State observed when the operation was attempted
        state: ConnectionState,
    },

    /// Internal consistency failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error means the peer has gone away: end of stream, reset,
    /// abort or a broken pipe.
    pub fn is_connection_dropped(&self) -> bool {
        match self {
            Error::Io(err) => matches!(
                err.kind(),
                std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}

/// Violations of the WebSocket wire protocol
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// RSV1..RSV3 set without a negotiated extension
    #[error("Reserved bits set in fragment")]
    ReservedBitsSet,

    /// Opcode in one of the reserved ranges
    #[error("Received frame with reserved opcode {0:#x}")]
    ReservedOpcode(u8),

    /// Continuation fragment with nothing to continue
    #[error("Received unexpected continuation fragment with no partial fragments")]
    UnexpectedContinuation,

    /// A new data fragment arrived before the previous message finished
    #[error("Received non-continuation, non-control fragment with incomplete frame in buffer")]
    InterleavedDataFrame,

    /// Control frames must carry FIN
    #[error("Received fragmented control frame (opcode: {0:?})")]
    FragmentedControlFrame(Opcode),

    /// Control frame over the 125 byte limit
    #[error("Control frame payload of {0} bytes exceeds 125 bytes")]
    ControlFrameTooLarge(usize),

    /// Close payload of exactly one byte
    #[error("Close message payload is too short. Expected at least 2 bytes, got {0}")]
    ClosePayloadTooShort(usize),

    /// 64-bit extended length with the most significant bit set
    #[error("64-bit extended payload length has the most significant bit set")]
    InvalidPayloadLength,

    /// Payload longer than a single in-memory buffer may hold
    #[error("Cannot read payload of {len} bytes (limit is {max})")]
    PayloadTooLarge {
        /// Length announced in the header
        len: u64,
        /// Largest accepted length
        max: u64,
    },

    /// Text payload or close reason is not UTF-8
    #[error("Invalid UTF-8 in {0}")]
    InvalidUtf8(&'static str),
}

/// Opening handshake failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    /// Status other than 101 Switching Protocols
    #[error("Expecting HTTP 101 Switching Protocols, got {status} {reason}")]
    UnexpectedStatus {
        /// Status code
        status: u16,
        /// Reason phrase
        reason: String,
    },

    /// Required response header absent
    #[error("Missing required header: {0}")]
    MissingHeader(&'static str),

    /// `Upgrade` header present with the wrong value
    #[error("Expecting Upgrade: websocket, got \"{0}\"")]
    InvalidUpgrade(String),

    /// `Sec-WebSocket-Accept` does not match the key we sent
    #[error("Invalid Sec-WebSocket-Accept header (got \"{received}\", expected \"{expected}\")")]
    InvalidAcceptKey {
        /// Value derived from our key
        expected: String,
        /// Value the server sent
        received: String,
    },

    /// The response head could not be parsed
    #[error("Malformed HTTP response: {0}")]
    Malformed(String),

    /// Header name that cannot be written into a request
    #[error("Invalid HTTP header name \"{0}\"")]
    InvalidHeaderName(String),

    /// No complete response within the configured timeout
    #[error("Timeout waiting for response to initial handshake")]
    Timeout,
}

/// Construction-time argument errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MessageError {
    /// Ping/pong payloads are limited to 125 bytes
    #[error("Control frame payload must be at most {max} bytes, got {len}")]
    ControlPayloadTooLarge {
        /// Payload length
        len: usize,
        /// Largest allowed length
        max: usize,
    },

    /// Close code that must never be put on the wire
    #[error("Cannot use reserved close code {0}")]
    ReservedCloseCode(u16),
}

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}")]
    InvalidValue {
        /// Field name
        field: &'static str,
        /// Offending value
        value: String,
    },

    /// URL that is not http(s) or ws(s)
    #[error("Invalid url \"{0}\": scheme must be one of http, https, ws or wss")]
    InvalidScheme(String),

    /// URL that could not be parsed at all
    #[error("Invalid url \"{url}\": {reason}")]
    InvalidUrl {
        /// The URL as given
        url: String,
        /// Parser message
        reason: String,
    },

    /// `wss://` requested without a TLS-capable connector
    #[error("No connector available for secure url \"{0}\"")]
    TlsUnavailable(String),
}

/// WebSocket close codes as defined in RFC 6455 section 7.4
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseCode {
    /// 1000, both endpoints completed the close handshake
    Normal,
    /// 1001, the endpoint is going away
    GoingAway,
    /// 1002, protocol error
    ProtocolError,
    /// 1003, data type cannot be accepted
    UnsupportedData,
    /// 1004, reserved
    Reserved,
    /// 1005, close frame carried no status (never sent)
    NoStatus,
    /// 1006, connection dropped without a close frame (never sent)
    AbnormalClosure,
    /// 1007, payload inconsistent with the message type
    MismatchedPayload,
    /// 1008, policy violation
    PolicyViolation,
    /// 1009, message too big
    MessageTooBig,
    /// 1010, required extension was not negotiated
    MissingExtension,
    /// 1011, unexpected condition
    InternalError,
    /// 1015, TLS handshake failure (never sent)
    TlsHandshakeFailure,
    /// Any other code seen on the wire or chosen by the application
    Other(u16),
}

impl CloseCode {
    /// Numeric value of the close code
    pub fn code(self) -> u16 {
        u16::from(self)
    }

    /// Whether an application may put this code into an outgoing close frame.
    ///
    /// `NoStatus` is accepted and means "send no code at all".
    pub fn is_sendable(self) -> bool {
        matches!(self.code(), 1000..=1003 | 1005 | 1007..=1014 | 3000..=4999)
    }
}

impl From<u16> for CloseCode {
    fn from(code: u16) -> Self {
        match code {
            1000 => CloseCode::Normal,
            1001 => CloseCode::GoingAway,
            1002 => CloseCode::ProtocolError,
            1003 => CloseCode::UnsupportedData,
            1004 => CloseCode::Reserved,
            1005 => CloseCode::NoStatus,
            1006 => CloseCode::AbnormalClosure,
            1007 => CloseCode::MismatchedPayload,
            1008 => CloseCode::PolicyViolation,
            1009 => CloseCode::MessageTooBig,
            1010 => CloseCode::MissingExtension,
            1011 => CloseCode::InternalError,
            1015 => CloseCode::TlsHandshakeFailure,
            other => CloseCode::Other(other),
        }
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> u16 {
        match code {
            CloseCode::Normal => 1000,
            CloseCode::GoingAway => 1001,
            CloseCode::ProtocolError => 1002,
            CloseCode::UnsupportedData => 1003,
            CloseCode::Reserved => 1004,
            CloseCode::NoStatus => 1005,
            CloseCode::AbnormalClosure => 1006,
            CloseCode::MismatchedPayload => 1007,
            CloseCode::PolicyViolation => 1008,
            CloseCode::MessageTooBig => 1009,
            CloseCode::MissingExtension => 1010,
            CloseCode::InternalError => 1011,
            CloseCode::TlsHandshakeFailure => 1015,
            CloseCode::Other(code) => code,
        }
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseCode::Other(code) => write!(f, "{}", code),
            named => write!(f, "{:?} ({})", named, named.code()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_code_conversion() {
        assert_eq!(CloseCode::from(1000), CloseCode::Normal);
        assert_eq!(CloseCode::from(1011), CloseCode::InternalError);
        assert_eq!(CloseCode::from(3000), CloseCode::Other(3000));
        assert_eq!(u16::from(CloseCode::AbnormalClosure), 1006);
        assert_eq!(CloseCode::Other(4321).code(), 4321);
    }

    #[test]
    fn test_sendable_close_codes() {
        assert!(CloseCode::Normal.is_sendable());
        assert!(CloseCode::InternalError.is_sendable());
        assert!(CloseCode::NoStatus.is_sendable());
        assert!(CloseCode::Other(4000).is_sendable());

        assert!(!CloseCode::Reserved.is_sendable());
        assert!(!CloseCode::AbnormalClosure.is_sendable());
        assert!(!CloseCode::TlsHandshakeFailure.is_sendable());
        assert!(!CloseCode::Other(999).is_sendable());
        assert!(!CloseCode::Other(2000).is_sendable());
    }

    #[test]
    fn test_close_code_display() {
        assert_eq!(CloseCode::Normal.to_string(), "Normal (1000)");
        assert_eq!(CloseCode::Other(4001).to_string(), "4001");
    }

    #[test]
    fn test_connection_dropped_classification() {
        let eof = Error::Io(std::io::Error::from(std::io::ErrorKind::UnexpectedEof));
        let reset = Error::Io(std::io::Error::from(std::io::ErrorKind::ConnectionReset));
        let other = Error::Io(std::io::Error::from(std::io::ErrorKind::PermissionDenied));

        assert!(eof.is_connection_dropped());
        assert!(reset.is_connection_dropped());
        assert!(!other.is_connection_dropped());
        assert!(!Error::Protocol(ProtocolError::ReservedBitsSet).is_connection_dropped());
    }

    #[test]
    fn test_error_display() {
        let err = Error::InvalidState {
            operation: "send",
            state: ConnectionState::Closing,
        };
        assert_eq!(err.to_string(), "Cannot send while the connection is Closing");
    }
}
