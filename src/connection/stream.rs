//! Streaming delivery of inbound binary messages.
//!
//! A binary message is handed to the consumer as soon as its first fragment
//! arrives. Each fragment's payload is pushed as one [`Bytes`] chunk, and the
//! stream ends when the final fragment has been pushed or the connection
//! goes away.
//!
//! Chunks only arrive while the connection is being read, so a consumer must
//! drain the stream from its own task while the connection keeps being
//! polled. The bytes pushed but not yet read are capped; a peer that outruns
//! the consumer past the cap fails the connection.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::{Bytes, BytesMut};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::error::{Error, Result};

/// Create a connected sink/stream pair holding at most `limit` unread bytes.
pub(crate) fn binary_channel(limit: usize) -> (BinarySink, BinaryStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    let unread = Arc::new(AtomicUsize::new(0));
    let sink = BinarySink {
        tx,
        unread: Arc::clone(&unread),
        limit,
    };
    (sink, BinaryStream { rx, unread })
}

/// Producer half, held by the engine while the message is in progress.
///
/// Dropping the sink ends the stream.
#[derive(Debug)]
pub(crate) struct BinarySink {
    tx: UnboundedSender<Bytes>,
    unread: Arc<AtomicUsize>,
    limit: usize,
}

impl BinarySink {
    /// Push one fragment. Empty fragments are skipped.
    ///
    /// # Errors
    ///
    /// `Error::BufferOverflow` if the chunk would leave more than the limit
    /// unread.
    pub(crate) fn push(&self, chunk: Bytes) -> Result<()> {
        // A consumer that dropped its stream no longer wants the data.
        if chunk.is_empty() || self.tx.is_closed() {
            return Ok(());
        }
        let size = self
            .unread
            .load(Ordering::Acquire)
            .saturating_add(chunk.len());
        if size > self.limit {
            return Err(Error::BufferOverflow {
                size,
                max: self.limit,
            });
        }
        // Counted before sending so the reader never subtracts first.
        self.unread.fetch_add(chunk.len(), Ordering::AcqRel);
        let _ = self.tx.send(chunk);
        Ok(())
    }
}

/// Readable byte stream of one inbound binary message.
///
/// Fragments are pushed into the stream while the owning connection is
/// read, so reading the stream to its end requires the connection to be
/// polled at the same time. Move the stream into a spawned task and keep
/// calling `Connection::next_event`.
#[derive(Debug)]
pub struct BinaryStream {
    rx: UnboundedReceiver<Bytes>,
    unread: Arc<AtomicUsize>,
}

/// Result of a non-blocking read from a [`BinaryStream`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TryChunk {
    /// A chunk was available.
    Chunk(Bytes),
    /// No chunk yet; more fragments are still expected.
    Pending,
    /// The message is complete.
    End,
}

impl BinaryStream {
    /// Wait for the next chunk. Returns `None` once the message is complete.
    pub async fn recv(&mut self) -> Option<Bytes> {
        let chunk = self.rx.recv().await;
        self.taken(chunk)
    }

    /// Take the next chunk without waiting.
    pub fn try_recv(&mut self) -> TryChunk {
        match self.rx.try_recv() {
            Ok(chunk) => {
                self.unread.fetch_sub(chunk.len(), Ordering::AcqRel);
                TryChunk::Chunk(chunk)
            }
            Err(TryRecvError::Empty) => TryChunk::Pending,
            Err(TryRecvError::Disconnected) => TryChunk::End,
        }
    }

    /// Collect the remainder of the message.
    ///
    /// Only completes if the connection keeps being read meanwhile.
    pub async fn read_to_end(mut self) -> Bytes {
        let mut out = BytesMut::new();
        while let Some(chunk) = self.recv().await {
            out.extend_from_slice(&chunk);
        }
        out.freeze()
    }

    /// Bytes received from the peer that have not been read yet.
    #[must_use]
    pub fn unread_len(&self) -> usize {
        self.unread.load(Ordering::Acquire)
    }

    fn taken(&self, chunk: Option<Bytes>) -> Option<Bytes> {
        if let Some(chunk) = &chunk {
            self.unread.fetch_sub(chunk.len(), Ordering::AcqRel);
        }
        chunk
    }
}

#[cfg(feature = "async-tokio")]
impl futures_core::Stream for BinaryStream {
    type Item = Bytes;

    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Bytes>> {
        let polled = self.rx.poll_recv(cx);
        polled.map(|chunk| self.taken(chunk))
    }
}
