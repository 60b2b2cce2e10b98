//! Fragmentation of chunked outbound binary messages (RFC 6455 Section 5.4).

use bytes::BytesMut;

use crate::protocol::Frame;

/// Accumulates written bytes and cuts them into binary fragments.
///
/// Bytes are held until at least `threshold` of them are pending, then all
/// pending bytes leave as one non-final fragment. Finishing emits whatever
/// is left as the final fragment, so a message that never reached the
/// threshold goes out as a single unfragmented frame.
#[derive(Debug)]
pub struct BinaryFragmenter {
    pending: BytesMut,
    threshold: usize,
    has_sent: bool,
}

impl BinaryFragmenter {
    /// Create a fragmenter that emits once `threshold` bytes are pending.
    #[must_use]
    pub fn new(threshold: usize) -> Self {
        Self {
            pending: BytesMut::new(),
            threshold: threshold.max(1),
            has_sent: false,
        }
    }

    /// Append `data`, returning a fragment if the threshold was reached.
    pub fn write(&mut self, data: &[u8]) -> Option<Frame> {
        self.pending.extend_from_slice(data);
        if self.pending.len() < self.threshold {
            return None;
        }
        let first = !self.has_sent;
        self.has_sent = true;
        Some(Frame::binary_fragment(
            self.pending.split().freeze(),
            first,
            false,
        ))
    }

    /// Emit the final fragment carrying the remaining bytes, possibly none.
    #[must_use]
    pub fn finish(mut self) -> Frame {
        Frame::binary_fragment(self.pending.split().freeze(), !self.has_sent, true)
    }

    /// Bytes written but not yet emitted.
    #[inline]
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Whether a fragment has been emitted yet.
    #[inline]
    #[must_use]
    pub fn has_sent(&self) -> bool {
        self.has_sent
    }
}
