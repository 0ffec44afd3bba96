//! OTI field codec: native 12-byte layout and custom packed layout.

// Allow truncation casts - each value is bounded by its field's native width
#![allow(clippy::cast_possible_truncation)]

use raptorq_raw::{
    EncodeOptions, FEC_ENCODING_ID, MAX_SOURCE_SYMBOLS_PER_BLOCK, MAX_TRANSFER_LENGTH, OTI_LEN,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bits::BitVector;
use crate::error::OtiError;
use crate::field::Field;
use crate::remap::SafeRemap;

/// Semantic OTI values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OtiFields {
    /// Object length in bytes.
    pub transfer_length: u64,
    /// FEC encoding ID (6 for `RaptorQ`).
    pub fec_encoding_id: u8,
    /// Symbol size in bytes.
    pub symbol_size: u16,
    /// Number of source blocks.
    pub num_source_blocks: u8,
    /// Number of sub-blocks per source block.
    pub num_sub_blocks: u16,
    /// Symbol alignment in bytes.
    pub symbol_alignment: u8,
}

impl OtiFields {
    /// The OTI the raw codec will produce for `transfer_length` bytes under
    /// `options`.
    #[must_use]
    pub const fn for_options(options: &EncodeOptions, transfer_length: u64) -> Self {
        Self {
            transfer_length,
            fec_encoding_id: FEC_ENCODING_ID,
            symbol_size: options.symbol_size,
            num_source_blocks: options.num_source_blocks,
            num_sub_blocks: options.num_sub_blocks,
            symbol_alignment: options.symbol_alignment,
        }
    }

    /// Extract the six fields from a native OTI. No range checks.
    ///
    /// # Errors
    ///
    /// Returns `OtiError::Length` unless `bytes` is exactly 12 bytes.
    pub fn decode_native(bytes: &[u8]) -> Result<Self, OtiError> {
        if bytes.len() != OTI_LEN {
            return Err(OtiError::Length {
                expected: OTI_LEN,
                got: bytes.len(),
            });
        }

        let bits = BitVector::from_packed_bytes(bytes, OTI_LEN * 8);
        let mut values = [0u64; 6];
        let mut offset = 0;
        for (value, field) in values.iter_mut().zip(Field::OTI) {
            let width = field.native_bits() as usize;
            *value = bits.slice(offset, offset + width).to_u64();
            offset += width;
        }
        Ok(Self::from_values(values))
    }

    /// Serialize into the native 12-byte layout.
    ///
    /// # Errors
    ///
    /// Returns `OtiError` if any field fails [`validate`](Self::validate).
    pub fn encode_native(&self) -> Result<[u8; OTI_LEN], OtiError> {
        self.validate()?;

        let mut bits = BitVector::zeros(OTI_LEN * 8);
        let mut offset = 0;
        for (value, field) in self.values().into_iter().zip(Field::OTI) {
            let width = field.native_bits() as usize;
            bits.set_bits_at(offset, &BitVector::from_value(value, width));
            offset += width;
        }

        let mut native = [0u8; OTI_LEN];
        native.copy_from_slice(bits.as_bytes());
        Ok(native)
    }

    /// Check native ranges and the symbols-per-block ceiling.
    ///
    /// # Errors
    ///
    /// Returns the first failing check.
    pub fn validate(&self) -> Result<(), OtiError> {
        if self.fec_encoding_id != FEC_ENCODING_ID {
            return Err(OtiError::UnsupportedFecEncodingId(u64::from(
                self.fec_encoding_id,
            )));
        }

        for (value, field) in self.values().into_iter().zip(Field::OTI) {
            let (min, max) = native_range(field);
            if value < min || value > max {
                return Err(OtiError::FieldRange {
                    field,
                    value,
                    min,
                    max,
                });
            }
        }

        let symbols = self.symbols_per_block();
        if symbols > MAX_SOURCE_SYMBOLS_PER_BLOCK {
            return Err(OtiError::TooManySymbolsPerBlock {
                symbols,
                max: MAX_SOURCE_SYMBOLS_PER_BLOCK,
            });
        }
        Ok(())
    }

    /// `ceil(transfer_length / (symbol_size * num_source_blocks))`.
    #[must_use]
    pub fn symbols_per_block(&self) -> u64 {
        let per_block_bytes = u64::from(self.symbol_size) * u64::from(self.num_source_blocks);
        if per_block_bytes == 0 {
            return u64::MAX;
        }
        self.transfer_length.div_ceil(per_block_bytes)
    }

    fn values(&self) -> [u64; 6] {
        [
            self.transfer_length,
            u64::from(self.fec_encoding_id),
            u64::from(self.symbol_size),
            u64::from(self.num_source_blocks),
            u64::from(self.num_sub_blocks),
            u64::from(self.symbol_alignment),
        ]
    }

    fn from_values(values: [u64; 6]) -> Self {
        Self {
            transfer_length: values[0],
            fec_encoding_id: values[1] as u8,
            symbol_size: values[2] as u16,
            num_source_blocks: values[3] as u8,
            num_sub_blocks: values[4] as u16,
            symbol_alignment: values[5] as u8,
        }
    }
}

const fn native_range(field: Field) -> (u64, u64) {
    match field {
        Field::TransferLength => (1, MAX_TRANSFER_LENGTH),
        Field::FecEncodingId => (FEC_ENCODING_ID as u64, FEC_ENCODING_ID as u64),
        Field::SymbolSize | Field::NumSubBlocks => (1, u16::MAX as u64),
        _ => (1, u8::MAX as u64),
    }
}

/// Packs and unpacks the custom OTI described by a strategy.
///
/// Fields are laid out in wire order, each at its external width; hardcoded
/// fields take no bits. When every field is hardcoded the OTI is absent.
#[derive(Clone, Debug)]
pub struct OtiCodec {
    fields: [SafeRemap; 6],
}

impl OtiCodec {
    /// Codec over per-field remaps in wire order.
    ///
    /// # Panics
    ///
    /// Panics if the remaps are not in [`Field::OTI`] order.
    #[must_use]
    pub fn new(fields: [SafeRemap; 6]) -> Self {
        for (remap, field) in fields.iter().zip(Field::OTI) {
            assert_eq!(remap.field(), field, "OTI remaps out of order");
        }
        Self { fields }
    }

    /// Native layout: every field present at its native width.
    #[must_use]
    pub fn native() -> Self {
        Self::new(Field::OTI.map(|field| SafeRemap::identity(field, field.native_bits() as usize)))
    }

    /// Packed length in bits.
    #[must_use]
    pub fn bit_len(&self) -> usize {
        self.fields.iter().map(SafeRemap::external_bits).sum()
    }

    /// Packed length in bytes; zero when the OTI is absent.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.bit_len().div_ceil(8)
    }

    /// Pack `fields`, or `None` when every field is hardcoded.
    ///
    /// # Errors
    ///
    /// Returns `OtiError` if the fields are out of range, a remap fails, or a
    /// hardcoded field disagrees with the actual value.
    pub fn pack_custom(&self, fields: &OtiFields) -> Result<Option<Vec<u8>>, OtiError> {
        fields.validate()?;

        let mut bits = BitVector::zeros(0);
        for (remap, value) in self.fields.iter().zip(fields.values()) {
            bits.append(&remap.encode(value)?);
        }

        if bits.is_empty() {
            return Ok(None);
        }
        debug!(bits = bits.len(), "custom OTI packed");
        Ok(Some(bits.to_packed_bytes()))
    }

    /// Rebuild the fields from a packed OTI (`None` when absent).
    ///
    /// # Errors
    ///
    /// Returns `OtiError::Length` if the input is not exactly
    /// [`byte_len`](Self::byte_len) bytes, or any remap, range or
    /// symbols-per-block failure.
    pub fn unpack_custom(&self, bytes: Option<&[u8]>) -> Result<OtiFields, OtiError> {
        let bytes = bytes.unwrap_or_default();
        let expected = self.byte_len();
        if bytes.len() != expected {
            return Err(OtiError::Length {
                expected,
                got: bytes.len(),
            });
        }

        let bits = BitVector::from_packed_bytes(bytes, self.bit_len());
        let mut values = [0u64; 6];
        let mut offset = 0;
        for (value, remap) in values.iter_mut().zip(&self.fields) {
            let width = remap.external_bits();
            *value = remap.decode(&bits.slice(offset, offset + width))?;
            offset += width;
        }

        let fields = OtiFields::from_values(values);
        fields.validate()?;
        debug!(?fields, "custom OTI unpacked");
        Ok(fields)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::FieldError;
    use crate::remap::Hardcoded;

    fn sample() -> OtiFields {
        OtiFields {
            transfer_length: 1000,
            fec_encoding_id: 6,
            symbol_size: 64,
            num_source_blocks: 1,
            num_sub_blocks: 1,
            symbol_alignment: 8,
        }
    }

    fn hardcoded(field: Field, value: u64) -> SafeRemap {
        SafeRemap::new(field, Arc::new(Hardcoded(value)), 0, field.native_bits() as usize)
    }

    #[test]
    fn native_layout_is_bit_exact() {
        let native = sample().encode_native().unwrap();
        assert_eq!(native, [0, 0, 0, 0x03, 0xE8, 6, 0, 64, 1, 0, 1, 8]);
        assert_eq!(OtiFields::decode_native(&native), Ok(sample()));
    }

    #[test]
    fn decode_native_requires_twelve_bytes() {
        assert_eq!(
            OtiFields::decode_native(&[0; 11]),
            Err(OtiError::Length {
                expected: 12,
                got: 11
            })
        );
    }

    #[test]
    fn encode_native_validates() {
        let fields = OtiFields {
            fec_encoding_id: 5,
            ..sample()
        };
        assert_eq!(
            fields.encode_native(),
            Err(OtiError::UnsupportedFecEncodingId(5))
        );

        let fields = OtiFields {
            symbol_size: 0,
            ..sample()
        };
        assert!(matches!(
            fields.encode_native(),
            Err(OtiError::FieldRange {
                field: Field::SymbolSize,
                ..
            })
        ));

        let fields = OtiFields {
            transfer_length: 64 * 8192 + 1,
            ..sample()
        };
        assert_eq!(
            fields.encode_native(),
            Err(OtiError::TooManySymbolsPerBlock {
                symbols: 8193,
                max: 8192
            })
        );
    }

    #[test]
    fn native_codec_packs_native_bytes() {
        let codec = OtiCodec::native();
        assert_eq!(codec.byte_len(), 12);
        let packed = codec.pack_custom(&sample()).unwrap().unwrap();
        assert_eq!(packed, sample().encode_native().unwrap().to_vec());
        assert_eq!(codec.unpack_custom(Some(&packed)), Ok(sample()));
    }

    #[test]
    fn narrowed_fields_pack_tightly() {
        let codec = OtiCodec::new([
            SafeRemap::identity(Field::TransferLength, 20),
            hardcoded(Field::FecEncodingId, 6),
            SafeRemap::identity(Field::SymbolSize, 7),
            hardcoded(Field::NumSourceBlocks, 1),
            hardcoded(Field::NumSubBlocks, 1),
            SafeRemap::identity(Field::SymbolAlignment, 5),
        ]);
        assert_eq!(codec.bit_len(), 32);

        let packed = codec.pack_custom(&sample()).unwrap().unwrap();
        assert_eq!(packed.len(), 4);
        assert_eq!(codec.unpack_custom(Some(&packed)), Ok(sample()));
    }

    #[test]
    fn fully_hardcoded_oti_is_absent() {
        let codec = OtiCodec::new([
            hardcoded(Field::TransferLength, 1000),
            hardcoded(Field::FecEncodingId, 6),
            hardcoded(Field::SymbolSize, 64),
            hardcoded(Field::NumSourceBlocks, 1),
            hardcoded(Field::NumSubBlocks, 1),
            hardcoded(Field::SymbolAlignment, 8),
        ]);
        assert_eq!(codec.byte_len(), 0);
        assert_eq!(codec.pack_custom(&sample()), Ok(None));
        assert_eq!(codec.unpack_custom(None), Ok(sample()));
    }

    #[test]
    fn hardcode_disagreement_fails_pack() {
        let codec = OtiCodec::new([
            hardcoded(Field::TransferLength, 999),
            SafeRemap::identity(Field::FecEncodingId, 8),
            SafeRemap::identity(Field::SymbolSize, 16),
            SafeRemap::identity(Field::NumSourceBlocks, 8),
            SafeRemap::identity(Field::NumSubBlocks, 16),
            SafeRemap::identity(Field::SymbolAlignment, 8),
        ]);
        assert_eq!(
            codec.pack_custom(&sample()),
            Err(OtiError::Field(FieldError::HardcodeMismatch {
                field: Field::TransferLength,
                hardcoded: 999,
                actual: 1000,
            }))
        );
    }

    #[test]
    fn unpack_checks_length_and_invariants() {
        let codec = OtiCodec::native();
        assert_eq!(
            codec.unpack_custom(Some(&[0; 13])),
            Err(OtiError::Length {
                expected: 12,
                got: 13
            })
        );
        assert_eq!(
            codec.unpack_custom(None),
            Err(OtiError::Length {
                expected: 12,
                got: 0
            })
        );

        let mut native = sample().encode_native().unwrap();
        native[5] = 7;
        assert_eq!(
            codec.unpack_custom(Some(&native)),
            Err(OtiError::UnsupportedFecEncodingId(7))
        );
    }

    #[test]
    fn field_too_wide_for_external_bits() {
        let codec = OtiCodec::new([
            SafeRemap::identity(Field::TransferLength, 8),
            SafeRemap::identity(Field::FecEncodingId, 8),
            SafeRemap::identity(Field::SymbolSize, 16),
            SafeRemap::identity(Field::NumSourceBlocks, 8),
            SafeRemap::identity(Field::NumSubBlocks, 16),
            SafeRemap::identity(Field::SymbolAlignment, 8),
        ]);
        assert!(matches!(
            codec.pack_custom(&sample()),
            Err(OtiError::Field(FieldError::OutOfRange {
                field: Field::TransferLength,
                value: 1000,
                ..
            }))
        ));
    }
}
