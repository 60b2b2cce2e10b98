//! Per-connection protocol engine.
//!
//! [`Engine`] performs no I/O. Received bytes go in through [`Engine::feed`];
//! bytes to transmit come out of [`Engine::take_outgoing`]; notifications come
//! out of [`Engine::poll_event`] in the order they happened. When
//! [`Engine::wants_shutdown`] turns true the transport should be flushed and
//! closed.
//!
//! ```
//! use wsconn::{Config, Engine, Event};
//!
//! let mut engine = Engine::server(Config::default());
//! engine.feed(
//!     b"GET /chat HTTP/1.1\r\n\
//!       Host: example.com\r\n\
//!       Upgrade: websocket\r\n\
//!       Connection: Upgrade\r\n\
//!       Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
//!       Sec-WebSocket-Version: 13\r\n\r\n",
//! );
//! assert!(matches!(engine.poll_event(), Some(Event::Connected)));
//! let response = engine.take_outgoing();
//! assert!(response.starts_with(b"HTTP/1.1 101"));
//! ```

use std::collections::VecDeque;

use bytes::{Buf, Bytes, BytesMut};
use log::{debug, trace, warn};

use crate::config::Config;
use crate::connection::event::Event;
use crate::connection::fragmenter::BinaryFragmenter;
use crate::connection::{ConnectionState, Role};
use crate::error::{Error, Result};
use crate::message::{CloseCode, CloseFrame};
use crate::protocol::{
    BAD_REQUEST, Delivery, Frame, HandshakeRequest, HandshakeResponse, Headers, MaskGenerator,
    MessageAssembler, OpCode, find_header_end,
};

/// Largest control frame payload (RFC 6455 Section 5.5).
const MAX_CONTROL_PAYLOAD: usize = 125;

/// Largest close reason that fits a control frame next to the status code.
const MAX_CLOSE_REASON: usize = MAX_CONTROL_PAYLOAD - 2;

/// Sans-IO WebSocket connection.
#[derive(Debug)]
pub struct Engine {
    role: Role,
    config: Config,
    state: ConnectionState,
    /// Received bytes not yet consumed.
    buffer: BytesMut,
    /// Encoded bytes waiting to be written.
    outgoing: BytesMut,
    events: VecDeque<Event>,
    assembler: MessageAssembler,
    outbound: Option<BinaryFragmenter>,
    masks: MaskGenerator,
    key: Option<String>,
    path: Option<String>,
    headers: Headers,
    close_reported: bool,
    shutdown: bool,
}

impl Engine {
    /// Engine for an accepted connection. Waits for the client's request.
    #[must_use]
    pub fn server(config: Config) -> Self {
        Self::new(Role::Server, config)
    }

    /// Engine for an outgoing connection.
    ///
    /// The upgrade request for `host` and `path` is queued immediately.
    #[must_use]
    pub fn client(host: &str, path: &str, config: Config) -> Self {
        let mut engine = Self::new(Role::Client, config);
        let request = HandshakeRequest::new(host, path);

        let mut buf = Vec::new();
        request.write(&mut buf);
        engine.outgoing.extend_from_slice(&buf);
        debug!("client handshake sent for {host}{path}");

        engine.key = Some(request.key);
        engine.path = Some(request.path);
        engine
    }

    fn new(role: Role, config: Config) -> Self {
        let assembler = MessageAssembler::with_limit(config.max_buffer_size);
        Self {
            role,
            config,
            state: ConnectionState::Connecting,
            buffer: BytesMut::new(),
            outgoing: BytesMut::new(),
            events: VecDeque::new(),
            assembler,
            outbound: None,
            masks: MaskGenerator::new(),
            key: None,
            path: None,
            headers: Headers::new(),
            close_reported: false,
            shutdown: false,
        }
    }

    /// Get the connection role.
    #[inline]
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Get the current connection state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Get the configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Handshake headers received from the peer, names lower-cased.
    ///
    /// Empty until the handshake completes.
    #[must_use]
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Request path: the one requested by the client, or the one this
    /// client asked for.
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Whether a chunked binary send is in progress.
    #[must_use]
    pub fn is_sending_binary(&self) -> bool {
        self.outbound.is_some()
    }

    /// Whether the transport should now be flushed and closed.
    #[must_use]
    pub fn wants_shutdown(&self) -> bool {
        self.shutdown
    }

    /// Whether encoded bytes are waiting to be written.
    #[must_use]
    pub fn has_outgoing(&self) -> bool {
        !self.outgoing.is_empty()
    }

    /// Take all bytes waiting to be written.
    pub fn take_outgoing(&mut self) -> Bytes {
        self.outgoing.split().freeze()
    }

    /// Next pending notification.
    pub fn poll_event(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    /// Process bytes received from the transport.
    ///
    /// Bytes arriving after the connection closed are discarded.
    pub fn feed(&mut self, data: &[u8]) {
        if !self.state.is_active() {
            return;
        }
        self.buffer.extend_from_slice(data);

        if self.state == ConnectionState::Connecting && !self.read_handshake() {
            return;
        }
        self.read_frames();
    }

    /// Send a text message.
    ///
    /// # Errors
    ///
    /// `Error::NotOpen` unless open, `Error::BinaryStreamActive` while a
    /// chunked binary send is in progress.
    pub fn send_text(&mut self, text: &str) -> Result<()> {
        self.ensure_idle()?;
        self.queue(&Frame::text(text));
        Ok(())
    }

    /// Send a binary message as one frame.
    ///
    /// # Errors
    ///
    /// Same as [`Engine::send_text`].
    pub fn send_binary(&mut self, data: impl Into<Bytes>) -> Result<()> {
        self.ensure_idle()?;
        self.queue(&Frame::binary(data));
        Ok(())
    }

    /// Start a chunked binary send.
    ///
    /// Follow with [`Engine::write_binary`] calls and one
    /// [`Engine::finish_binary`].
    ///
    /// # Errors
    ///
    /// Same as [`Engine::send_text`].
    pub fn begin_binary(&mut self) -> Result<()> {
        self.ensure_idle()?;
        self.outbound = Some(BinaryFragmenter::new(self.config.fragment_size));
        Ok(())
    }

    /// Append bytes to the chunked binary send.
    ///
    /// Once the connection has left the open state the bytes are dropped;
    /// the send stays in progress until [`Engine::finish_binary`].
    ///
    /// # Errors
    ///
    /// `Error::NoBinaryStream` if no chunked send was started.
    pub fn write_binary(&mut self, data: &[u8]) -> Result<()> {
        if self.outbound.is_none() {
            warn!("binary write without begin_binary");
            return Err(Error::NoBinaryStream);
        }
        if !self.state.can_send() {
            return Ok(());
        }
        let Some(fragmenter) = self.outbound.as_mut() else {
            return Ok(());
        };
        if let Some(frame) = fragmenter.write(data) {
            self.queue(&frame);
        }
        Ok(())
    }

    /// Complete the chunked binary send with a final fragment.
    ///
    /// # Errors
    ///
    /// `Error::NoBinaryStream` if no chunked send was started.
    pub fn finish_binary(&mut self) -> Result<()> {
        let fragmenter = self.outbound.take().ok_or_else(|| {
            warn!("binary finish without begin_binary");
            Error::NoBinaryStream
        })?;
        if !self.state.can_send() {
            return Ok(());
        }
        self.queue(&fragmenter.finish());
        Ok(())
    }

    /// Send a ping. The peer's pong is not tracked.
    ///
    /// # Errors
    ///
    /// `Error::NotOpen` unless open, `Error::ProtocolViolation` if the
    /// payload exceeds 125 bytes.
    pub fn ping(&mut self, payload: impl Into<Bytes>) -> Result<()> {
        self.ensure_open()?;
        let payload = payload.into();
        if payload.len() > MAX_CONTROL_PAYLOAD {
            return Err(Error::ProtocolViolation(format!(
                "Ping payload of {} bytes exceeds {MAX_CONTROL_PAYLOAD}",
                payload.len()
            )));
        }
        self.queue(&Frame::ping(payload));
        Ok(())
    }

    /// Start the closing handshake.
    ///
    /// While open a close frame is sent and the engine waits for the peer's
    /// echo. In any other active state the transport is terminated directly.
    /// [`CloseCode::NoStatus`] sends an empty close payload. Reasons longer
    /// than fit in a control frame are cut at a character boundary.
    pub fn close(&mut self, code: CloseCode, reason: &str) {
        let reason = truncate_reason(reason);
        match self.state {
            ConnectionState::Open => {
                self.queue(&Frame::close(&CloseFrame::new(code, reason)));
                self.set_state(ConnectionState::Closing);
                self.report_close(code.as_u16(), reason.to_string());
            }
            ConnectionState::Closed => {}
            _ => self.terminate(code.as_u16(), reason.to_string()),
        }
    }

    /// The transport ended without a closing handshake.
    pub fn transport_closed(&mut self) {
        if self.state.is_active() {
            debug!("{} transport closed in state {}", self.role, self.state);
            self.terminate(CloseCode::Abnormal.as_u16(), String::new());
        }
    }

    /// The transport failed.
    pub fn transport_error(&mut self, err: Error) {
        if self.state.is_active() {
            warn!("{} transport error: {err}", self.role);
            self.events.push_back(Event::Error(err));
        }
        self.transport_closed();
    }

    /// Returns `true` once the handshake block is consumed and the connection
    /// is open.
    fn read_handshake(&mut self) -> bool {
        if self.buffer.len() > self.config.max_buffer_size {
            self.reject_handshake(Error::HandshakeTooLarge {
                size: self.buffer.len(),
                max: self.config.max_buffer_size,
            });
            return false;
        }

        let Some(end) = find_header_end(&self.buffer) else {
            return false;
        };
        let block = self.buffer.split_to(end);

        let result = match self.role {
            Role::Server => self.answer_handshake(&block),
            Role::Client => self.check_handshake(&block),
        };
        match result {
            Ok(()) => {
                self.set_state(ConnectionState::Open);
                self.events.push_back(Event::Connected);
                true
            }
            Err(err) => {
                self.reject_handshake(err);
                false
            }
        }
    }

    fn answer_handshake(&mut self, block: &[u8]) -> Result<()> {
        let request = HandshakeRequest::parse(block)?;
        let mut buf = Vec::new();
        HandshakeResponse::from_request(&request).write(&mut buf);
        self.outgoing.extend_from_slice(&buf);

        debug!("server accepted upgrade for {}", request.path);
        self.path = Some(request.path);
        self.key = Some(request.key);
        self.headers = request.headers;
        Ok(())
    }

    fn check_handshake(&mut self, block: &[u8]) -> Result<()> {
        let response = HandshakeResponse::parse(block)?;
        let key = self
            .key
            .as_deref()
            .ok_or_else(|| Error::InvalidHandshake("No key was sent".into()))?;
        response.verify(key)?;

        debug!("client upgrade accepted");
        self.headers = response.headers;
        Ok(())
    }

    fn reject_handshake(&mut self, err: Error) {
        warn!("{} handshake failed: {err}", self.role);
        if self.role == Role::Server {
            self.outgoing.extend_from_slice(BAD_REQUEST);
        }
        self.events.push_back(Event::Error(err));
        self.terminate(CloseCode::Abnormal.as_u16(), String::new());
    }

    fn read_frames(&mut self) {
        while self.state.can_receive() {
            match Frame::decode(&self.buffer, self.role) {
                Ok((frame, consumed)) => {
                    self.buffer.advance(consumed);
                    trace!(
                        "{} received {} frame, fin={}, {} bytes",
                        self.role,
                        frame.opcode,
                        frame.fin,
                        frame.payload().len()
                    );
                    self.handle_frame(frame);
                }
                Err(err) if err.is_incomplete() => break,
                Err(err) => {
                    self.fail(&err);
                    return;
                }
            }
        }

        if self.state.can_receive() {
            if let Err(err) = self.config.check_buffer_size(self.buffer.len()) {
                self.fail(&err);
            }
        }
    }

    fn handle_frame(&mut self, frame: Frame) {
        match frame.opcode {
            OpCode::Close => self.on_close_frame(frame.payload()),
            OpCode::Ping => {
                if self.state == ConnectionState::Open {
                    self.queue(&Frame::pong(frame.into_payload()));
                }
            }
            OpCode::Pong => {}
            _ => self.on_data_frame(frame),
        }
    }

    fn on_close_frame(&mut self, payload: &[u8]) {
        match self.state {
            ConnectionState::Closing => {
                debug!("{} received close echo", self.role);
                self.terminate(CloseCode::NoStatus.as_u16(), String::new());
            }
            ConnectionState::Open => {
                let close = CloseFrame::from_payload(payload);
                debug!("{} received close {}", self.role, close.code.as_u16());
                self.queue(&Frame::close(&close));
                self.terminate(close.code.as_u16(), close.reason);
            }
            _ => {}
        }
    }

    fn on_data_frame(&mut self, frame: Frame) {
        if self.state != ConnectionState::Open {
            return;
        }
        match self.assembler.push(frame) {
            Ok(Some(Delivery::Text(text))) => self.events.push_back(Event::Text(text)),
            Ok(Some(Delivery::Binary(stream))) => self.events.push_back(Event::Binary(stream)),
            Ok(None) => {}
            Err(err) => self.fail(&err),
        }
    }

    /// Close because the peer broke the protocol or a limit.
    fn fail(&mut self, err: &Error) {
        let code = err.close_code();
        warn!("{} closing with {}: {err}", self.role, code.as_u16());
        if self.state == ConnectionState::Open {
            self.queue(&Frame::close(&CloseFrame::new(code, "")));
        }
        self.terminate(code.as_u16(), String::new());
    }

    /// Move to CLOSED, report the close once and ask for the transport to go.
    fn terminate(&mut self, code: u16, reason: String) {
        self.set_state(ConnectionState::Closed);
        self.report_close(code, reason);
        self.buffer.clear();
        self.assembler.reset();
        self.shutdown = true;
    }

    fn report_close(&mut self, code: u16, reason: String) {
        if self.close_reported {
            return;
        }
        self.close_reported = true;
        self.events.push_back(Event::Close { code, reason });
    }

    fn set_state(&mut self, next: ConnectionState) {
        if self.state.can_transition_to(next) {
            debug!("{} state {} -> {}", self.role, self.state, next);
            self.state = next;
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state.can_send() {
            Ok(())
        } else {
            warn!("{} send rejected in state {}", self.role, self.state);
            Err(Error::NotOpen)
        }
    }

    fn ensure_idle(&self) -> Result<()> {
        self.ensure_open()?;
        if self.outbound.is_some() {
            warn!("{} send rejected while a binary stream is open", self.role);
            return Err(Error::BinaryStreamActive);
        }
        Ok(())
    }

    fn queue(&mut self, frame: &Frame) {
        let mask = self.role.must_mask().then(|| self.masks.next_mask());
        trace!(
            "{} sending {} frame, fin={}, {} bytes",
            self.role,
            frame.opcode,
            frame.fin,
            frame.payload().len()
        );
        frame.encode_into(&mut self.outgoing, mask);
    }
}

fn truncate_reason(reason: &str) -> &str {
    if reason.len() <= MAX_CLOSE_REASON {
        return reason;
    }
    let mut end = MAX_CLOSE_REASON;
    while !reason.is_char_boundary(end) {
        end -= 1;
    }
    &reason[..end]
}
