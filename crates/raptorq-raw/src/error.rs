//! Raw codec error types.

use thiserror::Error;

/// Errors raised by the raw `RaptorQ` layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RawError {
    /// An encode option is outside its accepted range.
    #[error("invalid option {field}: {reason}")]
    InvalidOptions {
        /// Option name.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// Empty payload cannot be encoded.
    #[error("cannot encode empty payload")]
    EmptyPayload,

    /// Payload exceeds the 40-bit transfer length ceiling.
    #[error("transfer length {length} exceeds maximum {max}")]
    TransferLengthTooLarge {
        /// Requested transfer length.
        length: u64,
        /// Maximum allowed.
        max: u64,
    },

    /// Too many source symbols would land in one source block.
    #[error("{symbols} source symbols per block exceeds maximum {max}")]
    TooManySymbolsPerBlock {
        /// Source symbols per block implied by the parameters.
        symbols: u64,
        /// Maximum allowed.
        max: u64,
    },

    /// The 12-byte OTI header does not describe a decodable object.
    #[error("invalid OTI: {reason}")]
    InvalidOti {
        /// Why the header was rejected.
        reason: String,
    },

    /// A packet does not match the layout the OTI declares.
    #[error("malformed packet: {reason}")]
    MalformedPacket {
        /// Why the packet was rejected.
        reason: String,
    },

    /// The packet stream ended before every source block was reconstructed.
    #[error(
        "packet stream ended after {packets} packets with {decoded_blocks} of {total_blocks} blocks decoded"
    )]
    InsufficientPackets {
        /// Packets consumed.
        packets: u64,
        /// Source blocks reconstructed.
        decoded_blocks: usize,
        /// Source blocks in the object.
        total_blocks: usize,
    },

    /// Output format literal was not recognised.
    #[error("output format must be \"combined\" or \"blocks\", got {0:?}")]
    InvalidOutputFormat(String),
}
