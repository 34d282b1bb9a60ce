//! WebSocket protocol constants
//!
//! Opcodes, header bit layout and the handful of numbers RFC 6455 fixes.

use std::fmt;

/// WebSocket opcodes as defined in RFC 6455 Section 5.2
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Continuation of a fragmented data message
    Continuation = 0x0,
    /// UTF-8 text data
    Text = 0x1,
    /// Opaque binary data
    Binary = 0x2,
    /// Reserved for future data frames
    Reserved3 = 0x3,
    /// Reserved for future data frames
    Reserved4 = 0x4,
    /// Reserved for future data frames
    Reserved5 = 0x5,
    /// Reserved for future data frames
    Reserved6 = 0x6,
    /// Reserved for future data frames
    Reserved7 = 0x7,
    /// Close control frame
    Close = 0x8,
    /// Ping control frame
    Ping = 0x9,
    /// Pong control frame
    Pong = 0xA,
    /// Reserved for future control frames
    ReservedB = 0xB,
    /// Reserved for future control frames
    ReservedC = 0xC,
    /// Reserved for future control frames
    ReservedD = 0xD,
    /// Reserved for future control frames
    ReservedE = 0xE,
    /// Reserved for future control frames
    ReservedF = 0xF,
}

/// Decodes the low four bits; the FIN and RSV bits are ignored.
impl From<u8> for Opcode {
    fn from(value: u8) -> Self {
        match value & frame::OPCODE_MASK {
            0x0 => Opcode::Continuation,
            0x1 => Opcode::Text,
            0x2 => Opcode::Binary,
            0x3 => Opcode::Reserved3,
            0x4 => Opcode::Reserved4,
            0x5 => Opcode::Reserved5,
            0x6 => Opcode::Reserved6,
            0x7 => Opcode::Reserved7,
            0x8 => Opcode::Close,
            0x9 => Opcode::Ping,
            0xA => Opcode::Pong,
            0xB => Opcode::ReservedB,
            0xC => Opcode::ReservedC,
            0xD => Opcode::ReservedD,
            0xE => Opcode::ReservedE,
            _ => Opcode::ReservedF,
        }
    }
}

impl Opcode {
    /// Numeric value of the opcode
    pub fn value(self) -> u8 {
        self as u8
    }

    /// Close, ping or pong
    pub fn is_control(self) -> bool {
        matches!(self, Opcode::Close | Opcode::Ping | Opcode::Pong)
    }

    /// Text, binary or continuation
    pub fn is_data(self) -> bool {
        matches!(self, Opcode::Text | Opcode::Binary | Opcode::Continuation)
    }

    /// Whether the opcode falls into one of the reserved ranges
    pub fn is_reserved(self) -> bool {
        matches!(self.value(), 0x3..=0x7 | 0xB..=0xF)
    }
}

/// Lifecycle state of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectionState {
    /// No stream; `connect` may be called
    Closed = 0,
    /// Opening handshake in flight
    Connecting = 1,
    /// Messages may be sent and received
    Open = 2,
    /// A close frame has been sent and the peer's answer is awaited
    Closing = 3,
}

impl ConnectionState {
    /// Decode a value previously produced by `as u8`
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Open,
            3 => ConnectionState::Closing,
            _ => ConnectionState::Closed,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// WebSocket protocol constants
pub mod constants {
    use std::time::Duration;

    /// WebSocket protocol version
    pub const WEBSOCKET_VERSION: &str = "13";

    /// GUID appended to the client key before hashing
    pub const WEBSOCKET_MAGIC: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

    /// Number of random bytes in `Sec-WebSocket-Key`
    pub const WEBSOCKET_KEY_LEN: usize = 16;

    /// Largest payload a control frame may carry
    pub const MAX_CONTROL_PAYLOAD: usize = 125;

    /// Largest payload accepted from the wire (2 GiB - 1)
    pub const MAX_PAYLOAD_LEN: u64 = i32::MAX as u64;

    /// Fixed reason reported when the stream drops without a close handshake
    pub const UNEXPECTED_CLOSE_REASON: &str = "Unexpected close";

    /// Pause between pumps of the background receive loop
    pub const DEFAULT_RECEIVE_INTERVAL: Duration = Duration::from_millis(10);

    /// How long to wait for the 101 response
    pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Upper bound on the HTTP response head
    pub const MAX_HEADER_SIZE: usize = 8192;

    /// Maximum number of response headers parsed
    pub const MAX_HEADERS: usize = 64;
}

/// Frame header bit positions and masks
pub mod frame {
    /// FIN bit
    pub const FIN_BIT: u8 = 0x80;

    /// RSV1 bit
    pub const RSV1_BIT: u8 = 0x40;

    /// RSV2 bit
    pub const RSV2_BIT: u8 = 0x20;

    /// RSV3 bit
    pub const RSV3_BIT: u8 = 0x10;

    /// Opcode mask
    pub const OPCODE_MASK: u8 = 0x0F;

    /// MASK bit
    pub const MASK_BIT: u8 = 0x80;

    /// Payload length mask for the 7-bit length code
    pub const PAYLOAD_LEN_MASK: u8 = 0x7F;

    /// Largest length the 7-bit code holds directly
    pub const MAX_SHORT_PAYLOAD_LEN: u8 = 125;

    /// Extended payload length (16-bit) marker
    pub const PAYLOAD_LEN_16: u8 = 126;

    /// Extended payload length (64-bit) marker
    pub const PAYLOAD_LEN_64: u8 = 127;

    /// Masking key length
    pub const MASKING_KEY_LEN: usize = 4;
}

/// HTTP pieces of the opening handshake
pub mod http {
    /// HTTP Switching Protocols status
    pub const SWITCHING_PROTOCOLS: u16 = 101;

    /// Host header
    pub const HOST: &str = "Host";

    /// User-Agent header
    pub const USER_AGENT: &str = "User-Agent";

    /// Upgrade header
    pub const UPGRADE: &str = "Upgrade";

    /// Connection header
    pub const CONNECTION: &str = "Connection";

    /// Sec-WebSocket-Key header
    pub const SEC_WEBSOCKET_KEY: &str = "Sec-WebSocket-Key";

    /// Sec-WebSocket-Version header
    pub const SEC_WEBSOCKET_VERSION: &str = "Sec-WebSocket-Version";

    /// Sec-WebSocket-Accept header
    pub const SEC_WEBSOCKET_ACCEPT: &str = "Sec-WebSocket-Accept";

    /// Upgrade header value
    pub const WEBSOCKET: &str = "websocket";

    /// Connection header value
    pub const UPGRADE_VALUE: &str = "Upgrade";
}
