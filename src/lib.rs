//! # wsconn - WebSocket connections over raw byte streams
//!
//! `wsconn` implements the RFC 6455 protocol for both ends of a connection:
//! the HTTP Upgrade handshake, frame encoding and decoding, fragmentation
//! and reassembly, and the ping/pong/close control flow.
//!
//! ## Features
//!
//! - **Sans-IO engine**: [`Engine`] turns received bytes into events and
//!   queues bytes to send, without touching a socket
//! - **Streaming binary messages**: a [`BinaryStream`] is handed out on the
//!   first fragment and yields chunks as they arrive
//! - **Chunked sends**: large binary messages are written piecewise and
//!   leave in fragments
//! - **Tokio driver**: [`Connection`] runs the engine over any
//!   `AsyncRead + AsyncWrite` stream
//!
//! Socket setup (listening, connecting, TLS) and subprotocols or extensions
//! are left to the caller.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use wsconn::{Config, Connection, Event};
//!
//! let (stream, _) = listener.accept().await?;
//! let mut conn = Connection::accept(stream, Config::default()).await?;
//! while let Some(event) = conn.next_event().await {
//!     if let Event::Text(text) = event {
//!         conn.send_text(&text).await?;
//!     }
//! }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod message;
pub mod protocol;

pub use config::{Config, set_default_fragment_size, set_default_max_buffer_size};
pub use connection::{BinaryStream, ConnectionState, Engine, Event, Role, TryChunk};
#[cfg(feature = "async-tokio")]
pub use connection::{BinaryWriter, Connection};
pub use error::{Error, Result};
pub use message::{CloseCode, CloseFrame};
pub use protocol::{Frame, HandshakeRequest, HandshakeResponse, OpCode, WS_GUID, compute_accept_key};
