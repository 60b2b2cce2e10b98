//! Error types for the WebSocket connection engine.
//!
//! Failures fall into four groups: protocol violations and resource
//! exhaustion (both close the connection with a status code), handshake
//! failures (the connection never opens), and usage errors (the offending
//! call is rejected, the connection carries on).

use thiserror::Error;

use crate::message::CloseCode;

/// Result type alias for WebSocket operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during WebSocket operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Protocol violation detected.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Reserved bits set without extension.
    #[error("Reserved bits set without negotiated extension")]
    ReservedBitsSet,

    /// Reserved opcode used.
    #[error("Reserved opcode: {0:#x}")]
    ReservedOpcode(u8),

    /// Control frame fragmented (RFC violation).
    #[error("Control frames cannot be fragmented")]
    FragmentedControlFrame,

    /// Control frame payload longer than 125 bytes.
    #[error("Control frame payload too large: length code {0}")]
    ControlFrameTooLarge(u8),

    /// Unmasked client frame (security violation).
    #[error("Client frame must be masked")]
    UnmaskedClientFrame,

    /// Masked server frame (security violation).
    #[error("Server frame must not be masked")]
    MaskedServerFrame,

    /// Declared payload length cannot be represented on this platform.
    #[error("Payload too large: {size} bytes")]
    PayloadTooLarge {
        /// Declared payload length.
        size: u64,
    },

    /// Unconsumed receive buffer grew past the configured maximum.
    #[error("Receive buffer overflow: {size} bytes (max: {max})")]
    BufferOverflow {
        /// Buffered bytes.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Incomplete frame data.
    #[error("Incomplete frame: need {needed} more bytes")]
    IncompleteFrame {
        /// Number of additional bytes needed.
        needed: usize,
    },

    /// Invalid WebSocket handshake.
    #[error("Invalid handshake: {0}")]
    InvalidHandshake(String),

    /// Handshake header block exceeds the buffer limit.
    #[error("Handshake too large: {size} bytes (max: {max})")]
    HandshakeTooLarge {
        /// Buffered handshake bytes.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Operation requires an open connection.
    #[error("Connection is not open")]
    NotOpen,

    /// A chunked binary send is still in progress.
    #[error("A binary stream is still being sent")]
    BinaryStreamActive,

    /// No chunked binary send is in progress.
    #[error("No binary stream is being sent")]
    NoBinaryStream,

    /// Connection has been closed.
    #[error("Connection closed: {0:?}")]
    ConnectionClosed(Option<u16>),

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),
}

impl Error {
    /// Returns `true` if more bytes are needed before decoding can continue.
    #[inline]
    #[must_use]
    pub const fn is_incomplete(&self) -> bool {
        matches!(self, Error::IncompleteFrame { .. })
    }

    /// Returns `true` for errors caused by the caller rather than the peer.
    #[must_use]
    pub const fn is_usage(&self) -> bool {
        matches!(
            self,
            Error::NotOpen | Error::BinaryStreamActive | Error::NoBinaryStream
        )
    }

    /// The close code the engine sends when this error ends a connection.
    #[must_use]
    pub const fn close_code(&self) -> CloseCode {
        match self {
            Error::BufferOverflow { .. }
            | Error::PayloadTooLarge { .. }
            | Error::HandshakeTooLarge { .. } => CloseCode::MessageTooBig,
            _ => CloseCode::ProtocolError,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}
