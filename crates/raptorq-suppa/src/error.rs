//! Framing-layer error types.

use raptorq_raw::RawError;
use thiserror::Error;

use crate::field::Field;

/// Strategy shape or configuration rejected before any packet is touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StrategyError {
    /// External bit width outside the field's accepted range.
    #[error("{field}.external_bits must be between {min} and {max}, got {bits}")]
    BitWidth {
        /// Offending field.
        field: Field,
        /// Requested width.
        bits: u32,
        /// Smallest accepted width.
        min: u32,
        /// Largest accepted width.
        max: u32,
    },

    /// A zero-width field has no remap to supply its value.
    #[error("{field}.external_bits is 0 but no remap supplies the hardcoded value")]
    MissingHardcode {
        /// Offending field.
        field: Field,
    },

    /// A zero-width field's remap refused to supply its hardcoded value.
    #[error("{field}.external_bits is 0 but to_internal rejected the hardcode: {reason}")]
    HardcodeRejected {
        /// Offending field.
        field: Field,
        /// The remap's refusal.
        reason: String,
    },

    /// A zero-width field's remap still maps its value onto the wire.
    #[error("{field}.external_bits is 0 but to_external maps {internal} to {external}")]
    HardcodeHasExternal {
        /// Offending field.
        field: Field,
        /// The hardcoded value.
        internal: u64,
        /// What `to_external` returned for it.
        external: u64,
    },

    /// The FEC encoding ID can only be omitted or carried whole.
    #[error("oti.fec_encoding_id.external_bits must be 0 or 8, got {bits}")]
    FecEncodingIdWidth {
        /// Requested width.
        bits: u32,
    },

    /// Placement literal was not recognised.
    #[error("oti.placement must be \"negotiated\" or \"embedded\", got {0:?}")]
    InvalidPlacement(String),

    /// Length trim only applies to combined output.
    #[error("payload.transfer_length_trim requires output_format \"combined\"")]
    TrimRequiresCombinedOutput,
}

/// A single value failed to cross a remap boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    /// The remap pair is not inverse on this value.
    #[error("{field}: remap inconsistency: {chain}")]
    RemapInconsistency {
        /// Offending field.
        field: Field,
        /// The round trip that failed, e.g. `external 5 -> internal 7 -> external 6`.
        chain: String,
    },

    /// `to_external` has no representation for the value.
    #[error("{field}: internal value {value} cannot be represented externally")]
    NonRepresentableValue {
        /// Offending field.
        field: Field,
        /// Internal value.
        value: u64,
    },

    /// A remapped value does not fit its bit budget.
    #[error("{field}: {side} value {value} exceeds maximum {max}")]
    OutOfRange {
        /// Offending field.
        field: Field,
        /// `"internal"` or `"external"`.
        side: &'static str,
        /// Value produced.
        value: u64,
        /// Largest value the width allows.
        max: u64,
    },

    /// `to_internal` refused its input.
    #[error("{field}: remap rejected external value: {reason}")]
    RemapRejected {
        /// Offending field.
        field: Field,
        /// Reason given by the remap.
        reason: String,
    },

    /// A hardcoded field does not match the value actually produced.
    #[error("{field}: hardcoded value {hardcoded} does not match actual value {actual}")]
    HardcodeMismatch {
        /// Offending field.
        field: Field,
        /// Value the strategy hardcodes.
        hardcoded: u64,
        /// Value the codec produced.
        actual: u64,
    },
}

/// OTI validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OtiError {
    /// OTI byte length does not match the strategy.
    #[error("OTI must be {expected} bytes, got {got}")]
    Length {
        /// Length the strategy packs to.
        expected: usize,
        /// Length supplied.
        got: usize,
    },

    /// A field value is outside its native range.
    #[error("{field} = {value} outside {min}..={max}")]
    FieldRange {
        /// Offending field.
        field: Field,
        /// Value found.
        value: u64,
        /// Smallest accepted value.
        min: u64,
        /// Largest accepted value.
        max: u64,
    },

    /// FEC encoding ID is not `RaptorQ`.
    #[error("FEC encoding ID {0} is not RaptorQ (6)")]
    UnsupportedFecEncodingId(u64),

    /// Too many source symbols per block.
    #[error("{symbols} source symbols per block exceeds maximum {max}")]
    TooManySymbolsPerBlock {
        /// Implied symbols per block.
        symbols: u64,
        /// Codec ceiling.
        max: u64,
    },

    /// A field failed its remap.
    #[error(transparent)]
    Field(#[from] FieldError),
}

/// Packet framing, placement and trim failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Packet is shorter than its declared header.
    #[error("packet of {len} bytes is shorter than its {needed}-byte header")]
    TooShort {
        /// Packet length.
        len: usize,
        /// OTI prefix plus packed header length.
        needed: usize,
    },

    /// Embedded OTI differs from the first packet's.
    #[error("packet {packet_index}: embedded OTI {got:02x?} differs from {expected:02x?}")]
    OtiMismatch {
        /// Zero-based index of the offending packet.
        packet_index: u64,
        /// Prefix carried by the first packet.
        expected: Vec<u8>,
        /// Prefix carried by this packet.
        got: Vec<u8>,
    },

    /// Negotiated placement needs an OTI argument.
    #[error("strategy transmits an OTI but none was supplied")]
    MissingOti,

    /// Embedded placement takes no OTI argument.
    #[error("OTI argument supplied but strategy embeds it in packets")]
    UnexpectedOti,

    /// The stream ended before any packet carried the embedded OTI.
    #[error("packet stream ended before the embedded OTI was seen")]
    NoPackets,

    /// `pump_transfer_length` returned less than its input.
    #[error("pump_transfer_length shrank {input} to {output}")]
    PumpShrank {
        /// Length handed to the pump.
        input: u64,
        /// Length returned.
        output: u64,
    },

    /// Decoded payload cannot hold the declared length.
    #[error("length prefix declares {declared} bytes but only {available} follow it")]
    TrimOverrun {
        /// Length read from the prefix.
        declared: u64,
        /// Bytes available after the prefix.
        available: u64,
    },

    /// A header field failed its remap.
    #[error(transparent)]
    Field(#[from] FieldError),
}

/// Every error the framing layer can return.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SuppaError {
    /// Strategy rejected.
    #[error(transparent)]
    Strategy(#[from] StrategyError),

    /// OTI rejected.
    #[error(transparent)]
    Oti(#[from] OtiError),

    /// Packet framing failed.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// Passed through from the raw codec.
    #[error(transparent)]
    Raw(#[from] RawError),
}

impl From<FieldError> for SuppaError {
    fn from(err: FieldError) -> Self {
        Self::Frame(FrameError::Field(err))
    }
}
