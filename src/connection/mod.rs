//! Per-connection state machine and its drivers.
//!
//! ## Connection Lifecycle
//!
//! 1. **Connecting** - opening handshake in progress
//! 2. **Open** - data flows both ways
//! 3. **Closing** - close frame sent, waiting for the peer's echo
//! 4. **Closed** - terminated, either cleanly or abruptly (code 1006)
//!
//! [`Engine`] holds the protocol logic and does no I/O. With the
//! `async-tokio` feature, [`Connection`] drives an engine over an async
//! stream.

mod engine;
mod event;
mod fragmenter;
mod role;
mod state;
pub(crate) mod stream;

pub use engine::Engine;
pub use event::Event;
pub use fragmenter::BinaryFragmenter;
pub use role::Role;
pub use state::ConnectionState;
pub use stream::{BinaryStream, TryChunk};

#[cfg(feature = "async-tokio")]
#[allow(clippy::module_inception)]
mod connection;

#[cfg(feature = "async-tokio")]
pub use connection::{BinaryWriter, Connection};
