//! Payload masking (RFC 6455 Section 5.3).
//!
//! Masking XORs every payload byte with `mask[i % 4]`. Applying the same
//! mask twice restores the original bytes, so one function both masks and
//! unmasks, in place.

/// Byte-by-byte XOR masking.
#[inline]
pub fn apply_mask(data: &mut [u8], mask: [u8; 4]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= mask[i % 4];
    }
}

/// Word-at-a-time XOR masking, equivalent to [`apply_mask`].
#[inline]
pub fn apply_mask_fast(data: &mut [u8], mask: [u8; 4]) {
    let mask_u32 = u32::from_ne_bytes(mask);
    let mut chunks = data.chunks_exact_mut(4);
    for chunk in &mut chunks {
        let val = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        chunk.copy_from_slice(&(val ^ mask_u32).to_ne_bytes());
    }
    for (byte, m) in chunks.into_remainder().iter_mut().zip(mask) {
        *byte ^= m;
    }
}

/// Random seed for mask generation.
/// Falls back to system time if getrandom fails.
fn random_seed() -> u32 {
    let mut buf = [0u8; 4];
    if getrandom::getrandom(&mut buf).is_ok() {
        u32::from_le_bytes(buf)
    } else {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u32)
            .unwrap_or(0x1234_5678)
    }
}

/// Produces a fresh 4-byte masking key per outgoing client frame.
///
/// Seeded once from the OS; each key is derived by stepping a counter
/// and running it through an integer mixer. RFC 6455 only asks that keys
/// be unpredictable to scripts, not cryptographically strong.
#[derive(Debug, Clone)]
pub struct MaskGenerator {
    counter: u32,
}

impl Default for MaskGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl MaskGenerator {
    /// Create a generator with a random seed.
    #[must_use]
    pub fn new() -> Self {
        Self {
            counter: random_seed(),
        }
    }

    /// Next masking key.
    pub fn next_mask(&mut self) -> [u8; 4] {
        self.counter = self.counter.wrapping_add(0x9E37_79B9);
        let a = self.counter;
        let b = a.wrapping_mul(0x85EB_CA6B);
        let c = b ^ (b >> 13);
        let d = c.wrapping_mul(0xC2B2_AE35);
        d.to_le_bytes()
    }
}
