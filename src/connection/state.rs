//! Connection lifecycle (RFC 6455 Section 4 and 7).
//!
//! States only move forward: CONNECTING, OPEN, CLOSING, CLOSED, with
//! CLOSING skippable.

/// Lifecycle state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[non_exhaustive]
pub enum ConnectionState {
    /// Opening handshake in progress.
    #[default]
    Connecting,
    /// Handshake done; data may flow both ways.
    Open,
    /// Close frame sent, waiting for the peer's echo.
    Closing,
    /// Terminated.
    Closed,
}

impl ConnectionState {
    /// Returns `false` once closed.
    #[must_use]
    #[inline]
    pub const fn is_active(&self) -> bool {
        !matches!(self, ConnectionState::Closed)
    }

    /// Application data may only be sent while open.
    #[must_use]
    #[inline]
    pub const fn can_send(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    /// Frames are still read while open or closing.
    #[must_use]
    #[inline]
    pub const fn can_receive(&self) -> bool {
        matches!(self, ConnectionState::Open | ConnectionState::Closing)
    }

    /// Whether moving to `next` goes forward.
    #[must_use]
    #[inline]
    pub fn can_transition_to(&self, next: ConnectionState) -> bool {
        next > *self
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Connecting => write!(f, "CONNECTING"),
            ConnectionState::Open => write!(f, "OPEN"),
            ConnectionState::Closing => write!(f, "CLOSING"),
            ConnectionState::Closed => write!(f, "CLOSED"),
        }
    }
}
