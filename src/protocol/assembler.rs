//! Reassembly of fragmented inbound messages (RFC 6455 Section 5.4).
//!
//! Text fragments are buffered until the final fragment and delivered as one
//! string. Binary messages stream: the consumer receives a [`BinaryStream`]
//! on the first fragment and reads chunks while later fragments are still
//! arriving.
//!
//! Both kinds are held to a byte limit: text by the size of the partial
//! message, binary by the bytes the consumer has not read yet.

use bytes::BytesMut;

use crate::connection::stream::{BinarySink, BinaryStream, binary_channel};
use crate::error::{Error, Result};
use crate::protocol::{Frame, OpCode};

/// In-progress inbound message.
#[derive(Debug, Default)]
enum Partial {
    #[default]
    None,
    Text(BytesMut),
    Binary(BinarySink),
}

/// What a data frame produced for the consumer.
#[derive(Debug)]
pub enum Delivery {
    /// A complete text message.
    Text(String),
    /// A binary message has started; the stream yields its fragments.
    Binary(BinaryStream),
}

/// Reassembles data frames into messages.
#[derive(Debug)]
pub struct MessageAssembler {
    partial: Partial,
    limit: usize,
}

impl Default for MessageAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageAssembler {
    /// Assembler without a size limit.
    pub fn new() -> Self {
        Self::with_limit(usize::MAX)
    }

    /// Assembler that fails once a message holds more than `limit` bytes
    /// not yet handed to the consumer.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            partial: Partial::None,
            limit,
        }
    }

    /// Feed one data frame.
    ///
    /// Returns a delivery when a text message completes or a binary message
    /// begins. A single-frame binary message yields a stream that already
    /// holds its only chunk and is already ended.
    ///
    /// # Errors
    ///
    /// `Error::ProtocolViolation` if a continuation arrives with no message
    /// in progress, a new message starts before the previous one finished,
    /// or a control frame is passed in. `Error::BufferOverflow` once the
    /// limit is exceeded. In both cases the open message, if any, is
    /// abandoned.
    pub fn push(&mut self, frame: Frame) -> Result<Option<Delivery>> {
        let fin = frame.fin;
        match (frame.opcode, std::mem::take(&mut self.partial)) {
            (opcode, _) if opcode.is_control() => Err(Error::ProtocolViolation(format!(
                "{opcode} frame is not part of a message"
            ))),
            (OpCode::Continuation, Partial::None) => Err(Error::ProtocolViolation(
                "Unexpected continuation frame".into(),
            )),
            (OpCode::Text | OpCode::Binary, Partial::Text(_) | Partial::Binary(_)) => Err(
                Error::ProtocolViolation("Expected continuation frame".into()),
            ),
            (OpCode::Text, Partial::None) => {
                self.check_text(0, frame.payload().len())?;
                if fin {
                    return Ok(Some(Delivery::Text(into_text(frame.payload()))));
                }
                self.partial = Partial::Text(BytesMut::from(frame.payload()));
                Ok(None)
            }
            (_, Partial::None) => {
                let (sink, stream) = binary_channel(self.limit);
                sink.push(frame.into_payload())?;
                if !fin {
                    self.partial = Partial::Binary(sink);
                }
                Ok(Some(Delivery::Binary(stream)))
            }
            (_, Partial::Text(mut buf)) => {
                self.check_text(buf.len(), frame.payload().len())?;
                buf.extend_from_slice(frame.payload());
                if fin {
                    return Ok(Some(Delivery::Text(into_text(&buf))));
                }
                self.partial = Partial::Text(buf);
                Ok(None)
            }
            (_, Partial::Binary(sink)) => {
                sink.push(frame.into_payload())?;
                // Dropping the sink on the final fragment ends the stream.
                if !fin {
                    self.partial = Partial::Binary(sink);
                }
                Ok(None)
            }
        }
    }

    /// Returns `true` while a fragmented message is open.
    pub fn is_assembling(&self) -> bool {
        !matches!(self.partial, Partial::None)
    }

    /// Abandon the open message. An open binary stream is ended.
    pub fn reset(&mut self) {
        self.partial = Partial::None;
    }

    fn check_text(&self, held: usize, incoming: usize) -> Result<()> {
        let size = held.saturating_add(incoming);
        if size > self.limit {
            return Err(Error::BufferOverflow {
                size,
                max: self.limit,
            });
        }
        Ok(())
    }
}

// Invalid sequences are replaced, not rejected.
fn into_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
