//! Fixed-length, MSB-first bit buffer.
//!
//! Bit 0 is the most significant bit of the first byte. Values are read and
//! written big-endian across the whole vector, so a field packed at offset 4
//! with width 12 occupies the low nibble of byte 0 and all of byte 1.
//!
//! Width violations here are internal bugs: every value is range-checked by
//! the remap layer before it reaches a bit vector, so the constructors assert
//! rather than return errors.

/// An ordered sequence of bits with a fixed length.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct BitVector {
    bytes: Vec<u8>,
    len: usize,
}

impl BitVector {
    /// All-zero vector of `len` bits.
    #[must_use]
    pub fn zeros(len: usize) -> Self {
        Self {
            bytes: vec![0; len.div_ceil(8)],
            len,
        }
    }

    /// `value` written into exactly `width` bits.
    ///
    /// # Panics
    ///
    /// Panics if `width > 64` or `value` does not fit in `width` bits.
    #[must_use]
    pub fn from_value(value: u64, width: usize) -> Self {
        assert!(width <= 64, "bit width {width} exceeds 64");
        assert!(
            width == 64 || value >> width == 0,
            "value {value} does not fit in {width} bits"
        );

        let mut bits = Self::zeros(width);
        for i in 0..width {
            if (value >> (width - 1 - i)) & 1 == 1 {
                bits.set(i, true);
            }
        }
        bits
    }

    /// The first `width` bits of `bytes`.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` holds fewer than `width` bits.
    #[must_use]
    pub fn from_packed_bytes(bytes: &[u8], width: usize) -> Self {
        let needed = width.div_ceil(8);
        assert!(
            bytes.len() >= needed,
            "{} bytes cannot hold {width} bits",
            bytes.len()
        );

        let mut packed = bytes[..needed].to_vec();
        let tail = width % 8;
        if tail != 0 {
            if let Some(last) = packed.last_mut() {
                *last &= 0xFF << (8 - tail);
            }
        }
        Self {
            bytes: packed,
            len: width,
        }
    }

    /// Length in bits.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// True for a zero-length vector.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bit at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    #[must_use]
    pub fn get(&self, index: usize) -> bool {
        assert!(index < self.len, "bit {index} out of bounds ({})", self.len);
        self.bytes[index / 8] & (0x80 >> (index % 8)) != 0
    }

    fn set(&mut self, index: usize, bit: bool) {
        let mask = 0x80 >> (index % 8);
        if bit {
            self.bytes[index / 8] |= mask;
        } else {
            self.bytes[index / 8] &= !mask;
        }
    }

    /// Bits `start..end` as a new vector.
    ///
    /// # Panics
    ///
    /// Panics unless `start <= end <= len`.
    #[must_use]
    pub fn slice(&self, start: usize, end: usize) -> Self {
        assert!(
            start <= end && end <= self.len,
            "slice {start}..{end} out of bounds ({})",
            self.len
        );

        let mut out = Self::zeros(end - start);
        for i in start..end {
            if self.get(i) {
                out.set(i - start, true);
            }
        }
        out
    }

    /// Overwrite `other.len()` bits starting at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if `other` does not fit at `offset`.
    pub fn set_bits_at(&mut self, offset: usize, other: &Self) {
        assert!(
            offset + other.len <= self.len,
            "{} bits at offset {offset} overflow {}",
            other.len,
            self.len
        );
        for i in 0..other.len {
            self.set(offset + i, other.get(i));
        }
    }

    /// Append `other` to the end, growing the vector.
    pub fn append(&mut self, other: &Self) {
        let offset = self.len;
        self.len += other.len;
        self.bytes.resize(self.len.div_ceil(8), 0);
        self.set_bits_at(offset, other);
    }

    /// The bits read as an unsigned big-endian integer.
    ///
    /// # Panics
    ///
    /// Panics if the vector is longer than 64 bits.
    #[must_use]
    pub fn to_u64(&self) -> u64 {
        assert!(self.len <= 64, "{} bits do not fit in u64", self.len);
        (0..self.len).fold(0, |acc, i| (acc << 1) | u64::from(self.get(i)))
    }

    /// Packed bytes, zero-padded to a whole number of bytes.
    #[must_use]
    pub fn to_packed_bytes(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    /// Borrow the packed bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_value_is_msb_first() {
        let bits = BitVector::from_value(0b101, 3);
        assert_eq!(bits.len(), 3);
        assert!(bits.get(0));
        assert!(!bits.get(1));
        assert!(bits.get(2));
        assert_eq!(bits.to_packed_bytes(), vec![0b1010_0000]);
    }

    #[test]
    fn packed_bytes_round_up_and_zero_pad() {
        assert_eq!(BitVector::zeros(0).to_packed_bytes(), Vec::<u8>::new());
        assert_eq!(BitVector::zeros(9).to_packed_bytes(), vec![0, 0]);
        assert_eq!(
            BitVector::from_value(0xABC, 12).to_packed_bytes(),
            vec![0xAB, 0xC0]
        );
    }

    #[test]
    fn from_packed_bytes_masks_padding() {
        let bits = BitVector::from_packed_bytes(&[0xFF, 0xFF, 0xFF], 10);
        assert_eq!(bits.to_packed_bytes(), vec![0xFF, 0xC0]);
        assert_eq!(bits.to_u64(), 0x3FF);
    }

    #[test]
    fn slice_and_set_bits_at() {
        let mut header = BitVector::zeros(16);
        header.set_bits_at(0, &BitVector::from_value(7, 4));
        header.set_bits_at(4, &BitVector::from_value(0x123, 12));
        assert_eq!(header.to_packed_bytes(), vec![0x71, 0x23]);

        assert_eq!(header.slice(0, 4).to_u64(), 7);
        assert_eq!(header.slice(4, 16).to_u64(), 0x123);
        assert!(header.slice(5, 5).is_empty());
    }

    #[test]
    fn append_grows_across_byte_boundary() {
        let mut bits = BitVector::from_value(0b11, 2);
        bits.append(&BitVector::from_value(0x1FF, 9));
        assert_eq!(bits.len(), 11);
        assert_eq!(bits.to_u64(), 0b11_1_1111_1111);
        assert_eq!(bits.to_packed_bytes(), vec![0xFF, 0xE0]);
    }

    #[test]
    fn forty_bit_values() {
        let value = 942_574_504_275;
        let bits = BitVector::from_value(value, 40);
        assert_eq!(bits.to_packed_bytes().len(), 5);
        assert_eq!(BitVector::from_packed_bytes(bits.as_bytes(), 40).to_u64(), value);
    }

    #[test]
    #[should_panic(expected = "does not fit")]
    fn oversized_value_panics() {
        let _ = BitVector::from_value(16, 4);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn slice_past_end_panics() {
        let _ = BitVector::zeros(8).slice(4, 9);
    }

    #[test]
    #[should_panic(expected = "overflow")]
    fn set_bits_past_end_panics() {
        let mut bits = BitVector::zeros(8);
        bits.set_bits_at(6, &BitVector::zeros(3));
    }
}
