use bytes::BytesMut;
use log::debug;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::config::Config;
use crate::connection::engine::Engine;
use crate::connection::event::Event;
use crate::connection::{ConnectionState, Role};
use crate::error::{Error, Result};
use crate::message::CloseCode;
use crate::protocol::Headers;

/// A WebSocket connection over an async byte stream.
///
/// `Connection` is the sole owner of its stream and its [`Engine`]: reads,
/// protocol work and writes for one connection all happen through `&mut self`,
/// so nothing is shared between tasks.
///
/// ## Type Parameters
///
/// - `T`: The underlying async I/O stream (e.g., `TcpStream`, `TlsStream`)
///
/// ## Example
///
/// ```rust,ignore
/// use wsconn::{CloseCode, Config, Connection, Event};
///
/// let stream = tokio::net::TcpStream::connect("localhost:8080").await?;
/// let mut conn = Connection::connect(stream, "localhost", "/chat", Config::default()).await?;
///
/// conn.send_text("Hello").await?;
/// while let Some(event) = conn.next_event().await {
///     match event {
///         Event::Text(text) => println!("Received: {text}"),
///         Event::Binary(stream) => {
///             // Chunks only arrive while `next_event` keeps being called.
///             tokio::spawn(async move {
///                 println!("Received {} bytes", stream.read_to_end().await.len());
///             });
///         }
///         Event::Close { code, .. } => println!("Closed with {code}"),
///         _ => {}
///     }
/// }
/// ```
pub struct Connection<T> {
    io: T,
    engine: Engine,
    read_buf: Vec<u8>,
    /// Encoded bytes taken from the engine that the stream has not accepted.
    write_buf: BytesMut,
    shut_down: bool,
}

impl<T> Connection<T> {
    fn new(io: T, engine: Engine) -> Self {
        let read_buf = vec![0; engine.config().read_buffer_size.max(1)];
        Self {
            io,
            engine,
            read_buf,
            write_buf: BytesMut::new(),
            shut_down: false,
        }
    }

    /// Get the current connection state.
    pub fn state(&self) -> ConnectionState {
        self.engine.state()
    }

    /// Get the connection role.
    pub fn role(&self) -> Role {
        self.engine.role()
    }

    /// Check if the connection is in an open state.
    pub fn is_open(&self) -> bool {
        self.engine.state() == ConnectionState::Open
    }

    /// Handshake headers received from the peer, names lower-cased.
    pub fn headers(&self) -> &Headers {
        self.engine.headers()
    }

    /// The request path of the handshake.
    pub fn path(&self) -> Option<&str> {
        self.engine.path()
    }

    /// The protocol engine driving this connection.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Consume the connection and return the stream.
    pub fn into_inner(self) -> T {
        self.io
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> Connection<T> {
    /// Run the server side of the opening handshake on an accepted stream.
    ///
    /// A rejected request is answered with `400 Bad Request` and the stream
    /// is shut down.
    ///
    /// ## Errors
    ///
    /// - `Error::InvalidHandshake` or `Error::HandshakeTooLarge` for a bad request
    /// - `Error::Io` or `Error::ConnectionClosed` if the stream fails first
    pub async fn accept(io: T, config: Config) -> Result<Self> {
        let mut conn = Self::new(io, Engine::server(config));
        conn.handshake().await?;
        Ok(conn)
    }

    /// Run the client side of the opening handshake on a connected stream.
    ///
    /// ## Errors
    ///
    /// - `Error::InvalidHandshake` if the server's answer is not an accepting 101
    /// - `Error::Io` or `Error::ConnectionClosed` if the stream fails first
    pub async fn connect(io: T, host: &str, path: &str, config: Config) -> Result<Self> {
        let mut conn = Self::new(io, Engine::client(host, path, config));
        conn.handshake().await?;
        Ok(conn)
    }

    async fn handshake(&mut self) -> Result<()> {
        match self.next_event().await {
            Some(Event::Connected) => Ok(()),
            Some(Event::Error(err)) => {
                self.shutdown().await;
                Err(err)
            }
            Some(Event::Close { code, .. }) => Err(Error::ConnectionClosed(Some(code))),
            _ => Err(Error::ConnectionClosed(None)),
        }
    }

    /// Wait for the next event.
    ///
    /// Pending outgoing bytes (pongs, close echoes) are written before
    /// anything is returned. Returns `None` once the connection is closed and
    /// every event has been delivered.
    ///
    /// Cancel safe: a future dropped mid-write leaves the unwritten bytes
    /// queued for the next call, and no received bytes are lost. An
    /// [`Event::Binary`] stream is fed by this loop, so it must be read from
    /// another task while this is called.
    pub async fn next_event(&mut self) -> Option<Event> {
        loop {
            // Write failures are reported through the engine as events.
            let _ = self.flush().await;

            if let Some(event) = self.engine.poll_event() {
                return Some(event);
            }
            if self.engine.wants_shutdown() {
                self.shutdown().await;
                return None;
            }
            self.read_some().await;
        }
    }

    /// Send a text message.
    ///
    /// ## Errors
    ///
    /// - `Error::NotOpen` if the connection is not open
    /// - `Error::BinaryStreamActive` while a [`BinaryWriter`] is unfinished
    /// - I/O errors from the underlying stream
    pub async fn send_text(&mut self, text: &str) -> Result<()> {
        self.engine.send_text(text)?;
        self.flush().await
    }

    /// Send a binary message in one frame.
    ///
    /// ## Errors
    ///
    /// Same as [`Connection::send_text`].
    pub async fn send_binary(&mut self, data: impl Into<bytes::Bytes>) -> Result<()> {
        self.engine.send_binary(data)?;
        self.flush().await
    }

    /// Start a chunked binary message.
    ///
    /// Bytes written to the returned writer leave in fragments of at least
    /// `Config::fragment_size` bytes. Until [`BinaryWriter::finish`] is called
    /// other sends are rejected.
    ///
    /// ## Errors
    ///
    /// Same as [`Connection::send_text`], without the I/O part.
    pub fn begin_binary(&mut self) -> Result<BinaryWriter<'_, T>> {
        self.engine.begin_binary()?;
        Ok(BinaryWriter { conn: self })
    }

    /// Send a ping.
    ///
    /// ## Errors
    ///
    /// - `Error::NotOpen` if the connection is not open
    /// - `Error::ProtocolViolation` if the payload exceeds 125 bytes
    /// - I/O errors from the underlying stream
    pub async fn ping(&mut self, payload: impl Into<bytes::Bytes>) -> Result<()> {
        self.engine.ping(payload)?;
        self.flush().await
    }

    /// Start the closing handshake.
    ///
    /// The close frame is sent right away and the [`Event::Close`] is queued.
    /// Keep calling [`Connection::next_event`] to receive the peer's echo,
    /// after which the stream is shut down.
    ///
    /// ## Errors
    ///
    /// I/O errors from the underlying stream.
    pub async fn close(&mut self, code: CloseCode, reason: &str) -> Result<()> {
        self.engine.close(code, reason);
        self.flush().await?;
        if self.engine.wants_shutdown() {
            self.shutdown().await;
        }
        Ok(())
    }

    /// Write out everything the engine has queued.
    async fn flush(&mut self) -> Result<()> {
        if self.shut_down {
            return Ok(());
        }
        if self.engine.has_outgoing() {
            let data = self.engine.take_outgoing();
            self.write_buf.extend_from_slice(&data);
        }
        if self.write_buf.is_empty() {
            return Ok(());
        }
        self.write_pending().await.map_err(|err| {
            self.write_buf.clear();
            let err = Error::from(err);
            self.engine.transport_error(err.clone());
            err
        })
    }

    // `write_buf` advances only past bytes the stream accepted.
    async fn write_pending(&mut self) -> std::io::Result<()> {
        while !self.write_buf.is_empty() {
            if self.io.write_buf(&mut self.write_buf).await? == 0 {
                return Err(std::io::ErrorKind::WriteZero.into());
            }
        }
        self.io.flush().await
    }

    async fn read_some(&mut self) {
        match self.io.read(&mut self.read_buf).await {
            Ok(0) => self.engine.transport_closed(),
            Ok(n) => self.engine.feed(&self.read_buf[..n]),
            Err(err) => self.engine.transport_error(err.into()),
        }
    }

    async fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        debug!("{} shutting down transport", self.engine.role());
        let _ = self.io.shutdown().await;
    }
}

/// Writer half of a chunked binary message.
///
/// Dropping the writer without calling [`BinaryWriter::finish`] leaves the
/// message open on the connection.
pub struct BinaryWriter<'a, T> {
    conn: &'a mut Connection<T>,
}

impl<T: AsyncRead + AsyncWrite + Unpin> BinaryWriter<'_, T> {
    /// Append bytes to the message.
    ///
    /// Bytes written after the connection left the open state are dropped.
    ///
    /// ## Errors
    ///
    /// I/O errors from the underlying stream.
    pub async fn write(&mut self, data: &[u8]) -> Result<()> {
        self.conn.engine.write_binary(data)?;
        self.conn.flush().await
    }

    /// Send the final fragment.
    ///
    /// ## Errors
    ///
    /// I/O errors from the underlying stream.
    pub async fn finish(self) -> Result<()> {
        self.conn.engine.finish_binary()?;
        self.conn.flush().await
    }
}
