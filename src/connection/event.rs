//! Notifications produced by a connection, in arrival order.

use crate::connection::stream::BinaryStream;
use crate::error::Error;

/// Something the application should know about.
#[derive(Debug)]
pub enum Event {
    /// The opening handshake completed.
    Connected,
    /// A complete text message.
    Text(String),
    /// A binary message started. Its chunks arrive on the stream as the
    /// fragments are received, which only happens while the connection keeps
    /// being polled: read the stream from a separate task.
    Binary(BinaryStream),
    /// The connection is closed or closing. Emitted exactly once.
    Close {
        /// Effective status code.
        code: u16,
        /// Reason text, possibly empty.
        reason: String,
    },
    /// A transport or handshake failure. Always followed by [`Event::Close`].
    Error(Error),
}

impl Event {
    /// Returns `true` for [`Event::Close`].
    #[must_use]
    pub fn is_close(&self) -> bool {
        matches!(self, Event::Close { .. })
    }
}
