//! Framing strategy: a partial description and its resolved form.
//!
//! [`Strategy`] mirrors what a caller writes: every part optional, bit widths
//! and placement deserializable from JSON, remaps attached in code.
//! [`ResolvedStrategy::resolve`] is the only place defaults are applied. The
//! rules:
//!
//! | field                       | widths  | default |
//! |-----------------------------|---------|---------|
//! | `encoding_packet.sbn`       | 0..=8   | 8       |
//! | `encoding_packet.esi`       | 2..=24  | 24      |
//! | `encoding_packet.ecc`       | 1..=32  | absent  |
//! | `oti.transfer_length`       | 0..=40  | 40      |
//! | `oti.fec_encoding_id`       | 0 or 8  | 8       |
//! | `oti.symbol_size`           | 0..=16  | 16      |
//! | `oti.num_source_blocks`     | 0..=8   | 8       |
//! | `oti.num_sub_blocks`        | 0..=16  | 16      |
//! | `oti.symbol_alignment`      | 0..=8   | 8       |
//! | `payload.transfer_length_trim` | 0..=40 | absent |
//!
//! A field with non-zero width and no remap gets the identity. A zero-width
//! field must carry a remap whose `to_internal(None)` supplies its value.
//! Supplying an `oti` object defaults all six OTI fields, so an `oti` object
//! that only sets `placement` still describes the full native layout.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ecc::{Checksum, Crc32, Ecc};
use crate::error::StrategyError;
use crate::field::Field;
use crate::header::PacketHeaderCodec;
use crate::oti::OtiCodec;
use crate::placement::Placement;
use crate::remap::{Hardcoded, Identity, LengthRemap, Remap, SafeRemap};
use crate::trim::{LengthTrim, Pump};

/// Top-level framing strategy. The default reproduces native framing.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Strategy {
    /// Per-packet header fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding_packet: Option<EncodingPacketStrategy>,
    /// OTI layout and placement.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oti: Option<OtiStrategy>,
    /// Payload transforms.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<PayloadStrategy>,
}

/// Width and remap for one field.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FieldStrategy {
    /// Bits on the wire; `None` takes the field default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_bits: Option<u32>,
    /// Value mapping; `None` is the identity.
    #[serde(skip)]
    pub remap: Option<Arc<dyn Remap>>,
}

impl FieldStrategy {
    /// Identity mapping at `bits` wide.
    #[must_use]
    pub const fn bits(bits: u32) -> Self {
        Self {
            external_bits: Some(bits),
            remap: None,
        }
    }

    /// `remap` at `bits` wide.
    #[must_use]
    pub fn remapped(bits: u32, remap: impl Remap + 'static) -> Self {
        Self {
            external_bits: Some(bits),
            remap: Some(Arc::new(remap)),
        }
    }

    /// Omitted from the wire; always `value`.
    #[must_use]
    pub fn hardcoded(value: u64) -> Self {
        Self::remapped(0, Hardcoded(value))
    }
}

/// Header strategy for encoding packets.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncodingPacketStrategy {
    /// Source block number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sbn: Option<FieldStrategy>,
    /// Encoding symbol ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub esi: Option<FieldStrategy>,
    /// Optional per-packet check.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ecc: Option<EccStrategy>,
}

/// Per-packet check appended after the ESI bits.
#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EccStrategy {
    /// Bits of the checksum kept on the wire.
    pub external_bits: u32,
    /// Checksum function; CRC-32 unless set in code.
    #[serde(skip, default = "default_checksum")]
    pub checksum: Arc<dyn Checksum>,
}

fn default_checksum() -> Arc<dyn Checksum> {
    Arc::new(Crc32)
}

impl EccStrategy {
    /// CRC-32 truncated to `bits`.
    #[must_use]
    pub fn crc32(bits: u32) -> Self {
        Self {
            external_bits: bits,
            checksum: default_checksum(),
        }
    }
}

impl fmt::Debug for EccStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EccStrategy")
            .field("external_bits", &self.external_bits)
            .finish_non_exhaustive()
    }
}

/// The FEC encoding ID is either carried whole or omitted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FecEncodingIdStrategy {
    /// `0` or `8`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_bits: Option<u32>,
}

/// OTI layout and placement.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OtiStrategy {
    /// Where the OTI travels.
    pub placement: Placement,
    /// Transfer length.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_length: Option<FieldStrategy>,
    /// FEC encoding ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fec_encoding_id: Option<FecEncodingIdStrategy>,
    /// Symbol size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol_size: Option<FieldStrategy>,
    /// Number of source blocks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_source_blocks: Option<FieldStrategy>,
    /// Number of sub-blocks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_sub_blocks: Option<FieldStrategy>,
    /// Symbol alignment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol_alignment: Option<FieldStrategy>,
}

/// Payload transforms.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PayloadStrategy {
    /// Exact-length prefix.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_length_trim: Option<TrimStrategy>,
}

/// Length prefix written before the plaintext.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrimStrategy {
    /// Prefix width; `None` is 40.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_bits: Option<u32>,
    /// Length mapping; `None` is the identity.
    #[serde(skip)]
    pub remap: Option<Arc<dyn LengthRemap>>,
    /// Rounds the wrapped length up; `None` leaves it unchanged.
    #[serde(skip)]
    pub pump_transfer_length: Option<Pump>,
}

impl TrimStrategy {
    /// Identity prefix at `bits` wide.
    #[must_use]
    pub const fn bits(bits: u32) -> Self {
        Self {
            external_bits: Some(bits),
            remap: None,
            pump_transfer_length: None,
        }
    }

    /// Use `remap` for the prefix.
    #[must_use]
    pub fn with_remap(mut self, remap: impl LengthRemap + 'static) -> Self {
        self.remap = Some(Arc::new(remap));
        self
    }

    /// Round the wrapped length with `pump`.
    #[must_use]
    pub fn with_pump(mut self, pump: Pump) -> Self {
        self.pump_transfer_length = Some(pump);
        self
    }
}

impl fmt::Debug for TrimStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrimStrategy")
            .field("external_bits", &self.external_bits)
            .field("remap", &self.remap)
            .field("pump_transfer_length", &self.pump_transfer_length.is_some())
            .finish()
    }
}

/// A fully populated, validated strategy.
#[derive(Clone, Debug)]
pub struct ResolvedStrategy {
    header: PacketHeaderCodec,
    oti: OtiCodec,
    placement: Placement,
    trim: Option<LengthTrim>,
}

impl ResolvedStrategy {
    /// Apply defaults and validate every width.
    ///
    /// # Errors
    ///
    /// Returns `StrategyError` naming the first field that is out of range or
    /// hardcoded without a remap.
    pub fn resolve(strategy: &Strategy) -> Result<Self, StrategyError> {
        let packet = strategy.encoding_packet.clone().unwrap_or_default();
        let sbn = resolve_field(Field::Sbn, packet.sbn.as_ref(), 0, 8)?;
        let esi = resolve_field(Field::Esi, packet.esi.as_ref(), 2, 24)?;
        let ecc = packet.ecc.as_ref().map(resolve_ecc).transpose()?;
        let header = PacketHeaderCodec::new(sbn, esi, ecc);

        let oti_strategy = strategy.oti.clone().unwrap_or_default();
        let oti = OtiCodec::new([
            resolve_field(
                Field::TransferLength,
                oti_strategy.transfer_length.as_ref(),
                0,
                40,
            )?,
            resolve_fec(oti_strategy.fec_encoding_id)?,
            resolve_field(Field::SymbolSize, oti_strategy.symbol_size.as_ref(), 0, 16)?,
            resolve_field(
                Field::NumSourceBlocks,
                oti_strategy.num_source_blocks.as_ref(),
                0,
                8,
            )?,
            resolve_field(
                Field::NumSubBlocks,
                oti_strategy.num_sub_blocks.as_ref(),
                0,
                16,
            )?,
            resolve_field(
                Field::SymbolAlignment,
                oti_strategy.symbol_alignment.as_ref(),
                0,
                8,
            )?,
        ]);

        let trim = strategy
            .payload
            .as_ref()
            .and_then(|payload| payload.transfer_length_trim.as_ref())
            .map(resolve_trim)
            .transpose()?;

        let resolved = Self {
            header,
            oti,
            placement: oti_strategy.placement,
            trim,
        };
        debug!(
            header_bits = resolved.header.header_bits(),
            oti_bits = resolved.oti.bit_len(),
            placement = %resolved.placement,
            trim = resolved.trim.is_some(),
            "strategy resolved"
        );
        Ok(resolved)
    }

    /// Packet header codec.
    #[must_use]
    pub const fn header(&self) -> &PacketHeaderCodec {
        &self.header
    }

    /// OTI codec.
    #[must_use]
    pub const fn oti(&self) -> &OtiCodec {
        &self.oti
    }

    /// OTI placement.
    #[must_use]
    pub const fn placement(&self) -> Placement {
        self.placement
    }

    /// Length trim, if enabled.
    #[must_use]
    pub const fn trim(&self) -> Option<&LengthTrim> {
        self.trim.as_ref()
    }

    /// Bytes of OTI prefixed to each packet.
    #[must_use]
    pub fn embedded_prefix_len(&self) -> usize {
        match self.placement {
            Placement::Negotiated => 0,
            Placement::Embedded => self.oti.byte_len(),
        }
    }
}

fn check_width(field: Field, bits: u32, min: u32, max: u32) -> Result<usize, StrategyError> {
    if bits < min || bits > max {
        return Err(StrategyError::BitWidth {
            field,
            bits,
            min,
            max,
        });
    }
    Ok(bits as usize)
}

fn resolve_field(
    field: Field,
    strategy: Option<&FieldStrategy>,
    min: u32,
    max: u32,
) -> Result<SafeRemap, StrategyError> {
    let bits = strategy.and_then(|s| s.external_bits).unwrap_or(max);
    let bits = check_width(field, bits, min, max)?;

    let remap: Arc<dyn Remap> = match strategy.and_then(|s| s.remap.clone()) {
        Some(remap) => remap,
        None if bits == 0 => return Err(StrategyError::MissingHardcode { field }),
        None => Arc::new(Identity),
    };
    if bits == 0 {
        check_hardcode(field, remap.as_ref())?;
    }
    Ok(SafeRemap::new(
        field,
        remap,
        bits,
        field.native_bits() as usize,
    ))
}

/// A field with no wire bits must supply a constant and map it nowhere.
fn check_hardcode(field: Field, remap: &dyn Remap) -> Result<(), StrategyError> {
    let internal = remap
        .to_internal(None)
        .map_err(|rejected| StrategyError::HardcodeRejected {
            field,
            reason: rejected.0,
        })?;
    match remap.to_external(internal) {
        Some(external) => Err(StrategyError::HardcodeHasExternal {
            field,
            internal,
            external,
        }),
        None => Ok(()),
    }
}

fn resolve_fec(strategy: Option<FecEncodingIdStrategy>) -> Result<SafeRemap, StrategyError> {
    let field = Field::FecEncodingId;
    match strategy.and_then(|s| s.external_bits).unwrap_or(8) {
        8 => Ok(SafeRemap::identity(field, 8)),
        0 => Ok(SafeRemap::new(
            field,
            Arc::new(Hardcoded(u64::from(raptorq_raw::FEC_ENCODING_ID))),
            0,
            8,
        )),
        bits => Err(StrategyError::FecEncodingIdWidth { bits }),
    }
}

fn resolve_ecc(strategy: &EccStrategy) -> Result<Ecc, StrategyError> {
    let bits = check_width(Field::Ecc, strategy.external_bits, 1, 32)?;
    Ok(Ecc::new(bits, Arc::clone(&strategy.checksum)))
}

fn resolve_trim(strategy: &TrimStrategy) -> Result<LengthTrim, StrategyError> {
    let field = Field::TransferLengthTrim;
    let bits = check_width(field, strategy.external_bits.unwrap_or(40), 0, 40)?;

    let remap: Arc<dyn LengthRemap> = match &strategy.remap {
        Some(remap) => Arc::clone(remap),
        None if bits == 0 => return Err(StrategyError::MissingHardcode { field }),
        None => Arc::new(Identity),
    };
    let pump = strategy
        .pump_transfer_length
        .clone()
        .unwrap_or_else(|| Arc::new(|len: u64| len));

    Ok(LengthTrim::new(
        SafeRemap::for_length(field, remap, bits, field.native_bits() as usize),
        pump,
    ))
}
