//! Value remapping between wire (external) and codec (internal) values.
//!
//! A remap is arbitrary caller code, so [`SafeRemap`] re-verifies every
//! crossing: the result must fit its bit budget and must map back to the
//! value it came from. A field with zero external bits is hardcoded; its
//! value comes from `to_internal(None)` and never touches the wire.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::bits::BitVector;
use crate::error::FieldError;
use crate::field::Field;

/// Refusal returned by a remap's `to_internal`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct RemapRejected(pub String);

/// A bijection between external (wire) values and internal (codec) values.
pub trait Remap: Send + Sync + fmt::Debug {
    /// Map a wire value to the codec value. `None` asks a hardcoded field for
    /// its constant.
    ///
    /// # Errors
    ///
    /// Returns `RemapRejected` if the input has no internal meaning.
    fn to_internal(&self, external: Option<u64>) -> Result<u64, RemapRejected>;

    /// Map a codec value to its wire value, or `None` if it has no
    /// representation.
    fn to_external(&self, internal: u64) -> Option<u64>;
}

/// A remap for the payload length prefix, given the codec's transfer length.
pub trait LengthRemap: Send + Sync + fmt::Debug {
    /// Map a wire value to the original payload length.
    ///
    /// # Errors
    ///
    /// Returns `RemapRejected` if the input has no internal meaning.
    fn to_internal(&self, external: Option<u64>, transfer_length: u64)
    -> Result<u64, RemapRejected>;

    /// Map a payload length to its wire value, or `None` if it has no
    /// representation.
    fn to_external(&self, internal: u64, transfer_length: u64) -> Option<u64>;
}

/// Wire value equals codec value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Identity;

impl Remap for Identity {
    fn to_internal(&self, external: Option<u64>) -> Result<u64, RemapRejected> {
        external.ok_or_else(|| RemapRejected("identity remap has no hardcoded value".into()))
    }

    fn to_external(&self, internal: u64) -> Option<u64> {
        Some(internal)
    }
}

impl LengthRemap for Identity {
    fn to_internal(
        &self,
        external: Option<u64>,
        _transfer_length: u64,
    ) -> Result<u64, RemapRejected> {
        Remap::to_internal(self, external)
    }

    fn to_external(&self, internal: u64, _transfer_length: u64) -> Option<u64> {
        Some(internal)
    }
}

/// A constant for a field that is omitted from the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Hardcoded(pub u64);

impl Remap for Hardcoded {
    fn to_internal(&self, _external: Option<u64>) -> Result<u64, RemapRejected> {
        Ok(self.0)
    }

    fn to_external(&self, _internal: u64) -> Option<u64> {
        None
    }
}

/// A remap built from a pair of closures.
///
/// Implements [`Remap`] for `Fn(Option<u64>)` / `Fn(u64)` pairs and
/// [`LengthRemap`] for `Fn(Option<u64>, u64)` / `Fn(u64, u64)` pairs.
#[derive(Clone)]
pub struct FnRemap<I, E> {
    to_internal: I,
    to_external: E,
}

impl<I, E> FnRemap<I, E> {
    /// Pair `to_internal` with `to_external`.
    pub const fn new(to_internal: I, to_external: E) -> Self {
        Self {
            to_internal,
            to_external,
        }
    }
}

impl<I, E> fmt::Debug for FnRemap<I, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnRemap").finish_non_exhaustive()
    }
}

impl<I, E> Remap for FnRemap<I, E>
where
    I: Fn(Option<u64>) -> Result<u64, RemapRejected> + Send + Sync,
    E: Fn(u64) -> Option<u64> + Send + Sync,
{
    fn to_internal(&self, external: Option<u64>) -> Result<u64, RemapRejected> {
        (self.to_internal)(external)
    }

    fn to_external(&self, internal: u64) -> Option<u64> {
        (self.to_external)(internal)
    }
}

impl<I, E> LengthRemap for FnRemap<I, E>
where
    I: Fn(Option<u64>, u64) -> Result<u64, RemapRejected> + Send + Sync,
    E: Fn(u64, u64) -> Option<u64> + Send + Sync,
{
    fn to_internal(
        &self,
        external: Option<u64>,
        transfer_length: u64,
    ) -> Result<u64, RemapRejected> {
        (self.to_internal)(external, transfer_length)
    }

    fn to_external(&self, internal: u64, transfer_length: u64) -> Option<u64> {
        (self.to_external)(internal, transfer_length)
    }
}

#[derive(Clone, Debug)]
enum Mapping {
    Plain(Arc<dyn Remap>),
    Length(Arc<dyn LengthRemap>),
}

impl Mapping {
    fn internal(&self, external: Option<u64>, context: u64) -> Result<u64, RemapRejected> {
        match self {
            Self::Plain(remap) => remap.to_internal(external),
            Self::Length(remap) => remap.to_internal(external, context),
        }
    }

    fn external(&self, internal: u64, context: u64) -> Option<u64> {
        match self {
            Self::Plain(remap) => remap.to_external(internal),
            Self::Length(remap) => remap.to_external(internal, context),
        }
    }
}

/// A remap bound to a field, an external width and an internal ceiling.
#[derive(Clone, Debug)]
pub struct SafeRemap {
    field: Field,
    mapping: Mapping,
    external_bits: usize,
    max_internal_bits: usize,
}

const fn max_for(bits: usize) -> u64 {
    if bits >= 64 { u64::MAX } else { (1 << bits) - 1 }
}

fn optional(value: Option<u64>) -> String {
    value.map_or_else(|| "none".to_string(), |v| v.to_string())
}

impl SafeRemap {
    /// Wrap a plain remap.
    #[must_use]
    pub fn new(
        field: Field,
        remap: Arc<dyn Remap>,
        external_bits: usize,
        max_internal_bits: usize,
    ) -> Self {
        Self {
            field,
            mapping: Mapping::Plain(remap),
            external_bits,
            max_internal_bits,
        }
    }

    /// Wrap a transfer-length-aware remap.
    #[must_use]
    pub fn for_length(
        field: Field,
        remap: Arc<dyn LengthRemap>,
        external_bits: usize,
        max_internal_bits: usize,
    ) -> Self {
        Self {
            field,
            mapping: Mapping::Length(remap),
            external_bits,
            max_internal_bits,
        }
    }

    /// Identity remap at the given width over the field's native range.
    #[must_use]
    pub fn identity(field: Field, external_bits: usize) -> Self {
        Self::new(
            field,
            Arc::new(Identity),
            external_bits,
            field.native_bits() as usize,
        )
    }

    /// Field this remap serves.
    #[must_use]
    pub const fn field(&self) -> Field {
        self.field
    }

    /// Bits the field occupies on the wire.
    #[must_use]
    pub const fn external_bits(&self) -> usize {
        self.external_bits
    }

    /// True when the field is omitted from the wire.
    #[must_use]
    pub const fn is_hardcoded(&self) -> bool {
        self.external_bits == 0
    }

    /// Largest internal value accepted.
    #[must_use]
    pub const fn max_internal(&self) -> u64 {
        max_for(self.max_internal_bits)
    }

    /// Largest external value the width allows.
    #[must_use]
    pub const fn max_external(&self) -> u64 {
        max_for(self.external_bits)
    }

    /// Map a wire value to its codec value, verifying range and round trip.
    ///
    /// # Errors
    ///
    /// Returns `FieldError` if the remap rejects the value, the result is out
    /// of range, or it does not map back to `external`.
    pub fn to_internal_safe(&self, external: Option<u64>) -> Result<u64, FieldError> {
        self.to_internal_in(external, 0)
    }

    /// [`to_internal_safe`](Self::to_internal_safe) with a transfer length
    /// for length remaps.
    ///
    /// # Errors
    ///
    /// See [`to_internal_safe`](Self::to_internal_safe).
    pub fn to_internal_in(&self, external: Option<u64>, context: u64) -> Result<u64, FieldError> {
        let internal = self
            .mapping
            .internal(external, context)
            .map_err(|RemapRejected(reason)| FieldError::RemapRejected {
                field: self.field,
                reason,
            })?;

        if internal > self.max_internal() {
            return Err(FieldError::OutOfRange {
                field: self.field,
                side: "internal",
                value: internal,
                max: self.max_internal(),
            });
        }

        if self.external_bits > 0 {
            let back = self.mapping.external(internal, context);
            if back != external {
                return Err(FieldError::RemapInconsistency {
                    field: self.field,
                    chain: format!(
                        "external {} -> internal {internal} -> external {}",
                        optional(external),
                        optional(back)
                    ),
                });
            }
        }

        Ok(internal)
    }

    /// Map a codec value to its wire value, verifying range and round trip.
    ///
    /// Hardcoded fields return `None` without consulting the remap.
    ///
    /// # Errors
    ///
    /// Returns `FieldError::NonRepresentableValue` if the remap has no wire
    /// value for `internal`, or a range or round-trip failure.
    pub fn to_external_safe(&self, internal: u64) -> Result<Option<u64>, FieldError> {
        self.to_external_in(internal, 0)
    }

    /// [`to_external_safe`](Self::to_external_safe) with a transfer length
    /// for length remaps.
    ///
    /// # Errors
    ///
    /// See [`to_external_safe`](Self::to_external_safe).
    pub fn to_external_in(&self, internal: u64, context: u64) -> Result<Option<u64>, FieldError> {
        if self.external_bits == 0 {
            return Ok(None);
        }

        let Some(external) = self.mapping.external(internal, context) else {
            return Err(FieldError::NonRepresentableValue {
                field: self.field,
                value: internal,
            });
        };

        if external > self.max_external() {
            return Err(FieldError::OutOfRange {
                field: self.field,
                side: "external",
                value: external,
                max: self.max_external(),
            });
        }

        let back = self
            .mapping
            .internal(Some(external), context)
            .map_err(|RemapRejected(reason)| FieldError::RemapRejected {
                field: self.field,
                reason,
            })?;
        if back != internal {
            return Err(FieldError::RemapInconsistency {
                field: self.field,
                chain: format!("internal {internal} -> external {external} -> internal {back}"),
            });
        }

        Ok(Some(external))
    }

    /// Wire bits for `internal`; empty for a hardcoded field whose constant
    /// matches.
    ///
    /// # Errors
    ///
    /// Returns `FieldError` if the value cannot cross the remap, or
    /// `FieldError::HardcodeMismatch` if a hardcoded field would decode to a
    /// different value.
    pub fn encode(&self, internal: u64) -> Result<BitVector, FieldError> {
        self.encode_in(internal, 0)
    }

    /// [`encode`](Self::encode) with a transfer length for length remaps.
    ///
    /// # Errors
    ///
    /// See [`encode`](Self::encode).
    pub fn encode_in(&self, internal: u64, context: u64) -> Result<BitVector, FieldError> {
        if let Some(external) = self.to_external_in(internal, context)? {
            return Ok(BitVector::from_value(external, self.external_bits));
        }

        let hardcoded = self.to_internal_in(None, context)?;
        if hardcoded != internal {
            return Err(FieldError::HardcodeMismatch {
                field: self.field,
                hardcoded,
                actual: internal,
            });
        }
        Ok(BitVector::zeros(0))
    }

    /// Codec value for wire bits (empty for a hardcoded field).
    ///
    /// # Errors
    ///
    /// See [`to_internal_safe`](Self::to_internal_safe).
    ///
    /// # Panics
    ///
    /// Panics if `bits` is not exactly `external_bits` long.
    pub fn decode(&self, bits: &BitVector) -> Result<u64, FieldError> {
        self.decode_in(bits, 0)
    }

    /// [`decode`](Self::decode) with a transfer length for length remaps.
    ///
    /// # Errors
    ///
    /// See [`to_internal_safe`](Self::to_internal_safe).
    ///
    /// # Panics
    ///
    /// Panics if `bits` is not exactly `external_bits` long.
    pub fn decode_in(&self, bits: &BitVector, context: u64) -> Result<u64, FieldError> {
        assert_eq!(
            bits.len(),
            self.external_bits,
            "{}: wrong bit count",
            self.field
        );
        let external = (self.external_bits > 0).then(|| bits.to_u64());
        self.to_internal_in(external, context)
    }
}
