//! Configuration for WebSocket connections.
//!
//! Two limits shape a connection: the outbound fragmentation threshold for
//! chunked binary sends, and the maximum number of received bytes that may
//! sit unconsumed in the receive buffer. Both have process-wide defaults
//! that can be changed at runtime; a [`Config`] captures the defaults at the
//! moment it is built.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Initial outbound fragmentation threshold: 512 KiB.
pub const DEFAULT_FRAGMENT_SIZE: usize = 512 * 1024;

/// Initial maximum unconsumed receive-buffer size: 2 MiB.
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 2 * 1024 * 1024;

/// Default number of bytes requested per transport read.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 8192;

static FRAGMENT_SIZE: AtomicUsize = AtomicUsize::new(DEFAULT_FRAGMENT_SIZE);
static MAX_BUFFER_SIZE: AtomicUsize = AtomicUsize::new(DEFAULT_MAX_BUFFER_SIZE);

/// Set the process-wide default fragmentation threshold for chunked binary sends.
///
/// Affects configurations created afterwards with [`Config::default`].
pub fn set_default_fragment_size(bytes: usize) {
    FRAGMENT_SIZE.store(bytes.max(1), Ordering::Relaxed);
}

/// Set the process-wide default maximum unconsumed receive-buffer size.
///
/// Affects configurations created afterwards with [`Config::default`].
pub fn set_default_max_buffer_size(bytes: usize) {
    MAX_BUFFER_SIZE.store(bytes, Ordering::Relaxed);
}

/// Current process-wide default fragmentation threshold.
#[must_use]
pub fn default_fragment_size() -> usize {
    FRAGMENT_SIZE.load(Ordering::Relaxed)
}

/// Current process-wide default maximum receive-buffer size.
#[must_use]
pub fn default_max_buffer_size() -> usize {
    MAX_BUFFER_SIZE.load(Ordering::Relaxed)
}

/// WebSocket connection configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Minimum number of bytes a chunked binary send accumulates before
    /// emitting a frame.
    ///
    /// Default: the process-wide value, initially 512 KiB.
    pub fragment_size: usize,

    /// Maximum number of received bytes allowed to sit unconsumed.
    ///
    /// A handshake block or frame that cannot be completed within this many
    /// bytes ends the connection. The same limit caps a partial text message
    /// and the bytes of a binary message its consumer has not read yet.
    ///
    /// Default: the process-wide value, initially 2 MiB.
    pub max_buffer_size: usize,

    /// Read buffer size (in bytes).
    ///
    /// Default: 8 KB (8192)
    pub read_buffer_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fragment_size: default_fragment_size(),
            max_buffer_size: default_max_buffer_size(),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }
}

impl Config {
    /// Create a new configuration from the process-wide defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the fragmentation threshold for chunked binary sends.
    #[must_use]
    pub const fn with_fragment_size(mut self, size: usize) -> Self {
        self.fragment_size = if size == 0 { 1 } else { size };
        self
    }

    /// Set the maximum unconsumed receive-buffer size.
    #[must_use]
    pub const fn with_max_buffer_size(mut self, size: usize) -> Self {
        self.max_buffer_size = size;
        self
    }

    /// Set read buffer size.
    #[must_use]
    pub const fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Check that `size` buffered bytes are within the limit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BufferOverflow`](crate::Error::BufferOverflow) if `size`
    /// exceeds the configured maximum.
    pub const fn check_buffer_size(&self, size: usize) -> Result<(), crate::Error> {
        if size > self.max_buffer_size {
            Err(crate::Error::BufferOverflow {
                size,
                max: self.max_buffer_size,
            })
        } else {
            Ok(())
        }
    }
}
