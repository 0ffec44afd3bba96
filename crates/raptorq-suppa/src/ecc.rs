//! Per-packet integrity check carried in the packed header.
//!
//! The check covers the packed SBN/ESI bits and the symbol payload. A packet
//! whose check fails is treated as lost: `RaptorQ` repairs erasures, not
//! errors, so a corrupted symbol must never reach the decoder.

use std::fmt;
use std::sync::Arc;

/// Checksum over a packet's identifying header bytes and payload.
pub trait Checksum: Send + Sync {
    /// Checksum of `data`. Only the low `external_bits` bits are kept.
    fn checksum(&self, data: &[u8]) -> u64;
}

impl<F> Checksum for F
where
    F: Fn(&[u8]) -> u64 + Send + Sync,
{
    fn checksum(&self, data: &[u8]) -> u64 {
        self(data)
    }
}

/// CRC-32 (IEEE).
#[derive(Clone, Copy, Debug, Default)]
pub struct Crc32;

impl Checksum for Crc32 {
    fn checksum(&self, data: &[u8]) -> u64 {
        u64::from(crc32fast::hash(data))
    }
}

/// A checksum truncated to a fixed number of header bits.
#[derive(Clone)]
pub struct Ecc {
    bits: usize,
    checksum: Arc<dyn Checksum>,
}

impl Ecc {
    /// Keep the low `bits` bits of `checksum`.
    ///
    /// # Panics
    ///
    /// Panics unless `bits` is in `1..=32`; strategy resolution rejects other
    /// widths before an `Ecc` is built.
    #[must_use]
    pub fn new(bits: usize, checksum: Arc<dyn Checksum>) -> Self {
        assert!((1..=32).contains(&bits), "ECC width {bits} outside 1..=32");
        Self { bits, checksum }
    }

    /// Header bits occupied by the check.
    #[must_use]
    pub const fn bits(&self) -> usize {
        self.bits
    }

    /// Check value for a packet.
    #[must_use]
    pub fn compute(&self, ids: &[u8], payload: &[u8]) -> u64 {
        let mut data = Vec::with_capacity(ids.len() + payload.len());
        data.extend_from_slice(ids);
        data.extend_from_slice(payload);
        self.checksum.checksum(&data) & ((1u64 << self.bits) - 1)
    }
}

impl fmt::Debug for Ecc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ecc")
            .field("bits", &self.bits)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc32_known_vector() {
        assert_eq!(Crc32.checksum(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn compute_masks_to_width() {
        let ecc = Ecc::new(8, Arc::new(Crc32));
        let full = Crc32.checksum(b"\x01\x02payload");
        assert_eq!(ecc.compute(&[1, 2], b"payload"), full & 0xFF);
    }

    #[test]
    fn closures_are_checksums() {
        let ecc = Ecc::new(4, Arc::new(|data: &[u8]| data.len() as u64));
        assert_eq!(ecc.compute(&[0; 3], &[0; 20]), 23 & 0xF);
    }

    #[test]
    #[should_panic(expected = "outside 1..=32")]
    fn zero_width_panics() {
        let _ = Ecc::new(0, Arc::new(Crc32));
    }
}
