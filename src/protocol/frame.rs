//! WebSocket frame encoding and decoding (RFC 6455 Section 5.2).
//!
//! Decoding works on a byte prefix that may hold only part of a frame: an
//! incomplete frame is reported as [`Error::IncompleteFrame`] and nothing is
//! consumed, so the caller keeps its buffer and retries once more bytes have
//! arrived.

use bytes::{BufMut, Bytes, BytesMut};

use crate::connection::Role;
use crate::error::{Error, Result};
use crate::message::CloseFrame;
use crate::protocol::OpCode;
use crate::protocol::mask::apply_mask_fast;
use crate::protocol::validation::FrameValidator;

/// Largest payload length that fits the 7-bit length field.
const MAX_SHORT_LEN: usize = 125;

/// Largest payload length that fits the 16-bit extended length field.
const MAX_MEDIUM_LEN: usize = 65535;

/// A WebSocket frame as defined in RFC 6455.
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-------+-+-------------+-------------------------------+
/// |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
/// |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
/// |N|V|V|V|       |S|             |   (if payload len==126/127)   |
/// | |1|2|3|       |K|             |                               |
/// +-+-+-+-+-------+-+-------------+-------------------------------+
/// |                    Masking key (if present)                   |
/// +---------------------------------------------------------------+
/// |                         Payload data                          |
/// +---------------------------------------------------------------+
/// ```
///
/// RSV bits are always zero on frames this crate builds, and decoding
/// rejects frames that set them, so they are not represented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Final fragment flag. True if this is the last fragment of a message.
    pub fin: bool,
    /// Frame opcode defining the interpretation of payload data.
    pub opcode: OpCode,
    /// Unmasked payload bytes.
    payload: Bytes,
}

impl Frame {
    /// Create a new frame with the given parameters.
    #[must_use]
    pub fn new(fin: bool, opcode: OpCode, payload: impl Into<Bytes>) -> Self {
        Self {
            fin,
            opcode,
            payload: payload.into(),
        }
    }

    /// Create a single-frame text message.
    #[must_use]
    pub fn text(data: impl Into<String>) -> Self {
        Self::new(true, OpCode::Text, Bytes::from(data.into()))
    }

    /// Create a single-frame binary message.
    #[must_use]
    pub fn binary(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Binary, data)
    }

    /// Create one fragment of a binary message.
    ///
    /// The first fragment carries the binary opcode, later ones are
    /// continuations.
    #[must_use]
    pub fn binary_fragment(data: impl Into<Bytes>, first: bool, fin: bool) -> Self {
        let opcode = if first {
            OpCode::Binary
        } else {
            OpCode::Continuation
        };
        Self::new(fin, opcode, data)
    }

    /// Create a close frame.
    #[must_use]
    pub fn close(close: &CloseFrame) -> Self {
        Self::new(true, OpCode::Close, close.to_payload())
    }

    /// Create a ping frame.
    #[must_use]
    pub fn ping(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Ping, data)
    }

    /// Create a pong frame.
    #[must_use]
    pub fn pong(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Pong, data)
    }

    /// Get the payload bytes.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Take ownership of the payload.
    #[must_use]
    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// Decode one frame from the front of `buf`, as received by `role`.
    ///
    /// Returns the frame with its payload unmasked, and the number of bytes
    /// it occupied.
    ///
    /// # Errors
    ///
    /// - `Error::IncompleteFrame` if `buf` does not yet hold the whole frame
    /// - the base-header violations of [`FrameValidator::validate`]
    /// - `Error::ProtocolViolation` if a 64-bit length has its top bit set
    /// - `Error::PayloadTooLarge` if the length does not fit in `usize`
    pub fn decode(buf: &[u8], role: Role) -> Result<(Self, usize)> {
        if buf.len() < 2 {
            return Err(Error::IncompleteFrame {
                needed: 2 - buf.len(),
            });
        }

        let header = FrameValidator::new(role).validate(buf[0], buf[1])?;

        let (payload_len, mut offset) = match header.len_code {
            126 => {
                need(buf, 4)?;
                (u16::from_be_bytes([buf[2], buf[3]]) as u64, 4)
            }
            127 => {
                need(buf, 10)?;
                let len = u64::from_be_bytes([
                    buf[2], buf[3], buf[4], buf[5], buf[6], buf[7], buf[8], buf[9],
                ]);
                if len >> 63 != 0 {
                    return Err(Error::ProtocolViolation(
                        "Most significant bit of 64-bit payload length is set".into(),
                    ));
                }
                (len, 10)
            }
            short => (short as u64, 2),
        };
        let payload_len =
            usize::try_from(payload_len).map_err(|_| Error::PayloadTooLarge { size: payload_len })?;

        let mask = if header.masked {
            need(buf, offset + 4)?;
            let key = [
                buf[offset],
                buf[offset + 1],
                buf[offset + 2],
                buf[offset + 3],
            ];
            offset += 4;
            Some(key)
        } else {
            None
        };

        let total = offset
            .checked_add(payload_len)
            .ok_or(Error::PayloadTooLarge {
                size: payload_len as u64,
            })?;
        need(buf, total)?;

        let mut payload = BytesMut::from(&buf[offset..total]);
        if let Some(mask) = mask {
            apply_mask_fast(&mut payload, mask);
        }

        let frame = Frame {
            fin: header.fin,
            opcode: header.opcode,
            payload: payload.freeze(),
        };
        Ok((frame, total))
    }

    /// Encode the frame, masking the payload with `mask` if given.
    #[must_use]
    pub fn encode(&self, mask: Option<[u8; 4]>) -> BytesMut {
        let mut dst = BytesMut::with_capacity(self.wire_size(mask.is_some()));
        self.encode_into(&mut dst, mask);
        dst
    }

    /// Append the encoded frame to `dst`.
    ///
    /// The masked copy of the payload lives only in `dst`; the frame itself
    /// is left untouched.
    pub fn encode_into(&self, dst: &mut BytesMut, mask: Option<[u8; 4]>) {
        let payload_len = self.payload.len();
        dst.reserve(self.wire_size(mask.is_some()));

        let mut byte0 = self.opcode.as_u8();
        if self.fin {
            byte0 |= 0x80;
        }
        dst.put_u8(byte0);

        let mask_bit = if mask.is_some() { 0x80 } else { 0x00 };
        if payload_len <= MAX_SHORT_LEN {
            dst.put_u8(mask_bit | payload_len as u8);
        } else if payload_len <= MAX_MEDIUM_LEN {
            dst.put_u8(mask_bit | 126);
            dst.put_u16(payload_len as u16);
        } else {
            dst.put_u8(mask_bit | 127);
            dst.put_u64(payload_len as u64);
        }

        match mask {
            Some(key) => {
                dst.put_slice(&key);
                let start = dst.len();
                dst.put_slice(&self.payload);
                apply_mask_fast(&mut dst[start..], key);
            }
            None => dst.put_slice(&self.payload),
        }
    }

    /// Calculate the size needed to write this frame.
    #[must_use]
    pub fn wire_size(&self, masked: bool) -> usize {
        let payload_len = self.payload.len();
        let extended_len_size = if payload_len <= MAX_SHORT_LEN {
            0
        } else if payload_len <= MAX_MEDIUM_LEN {
            2
        } else {
            8
        };
        let mask_size = if masked { 4 } else { 0 };
        2 + extended_len_size + mask_size + payload_len
    }
}

#[inline]
fn need(buf: &[u8], len: usize) -> Result<()> {
    if buf.len() < len {
        Err(Error::IncompleteFrame {
            needed: len - buf.len(),
        })
    } else {
        Ok(())
    }
}
