//! Wire-exact `RaptorQ` layer.
//!
//! This crate speaks the native `RaptorQ` framing and nothing else:
//!
//! - a 12-byte Object Transmission Information (OTI) header
//!   (`transfer_length:40 | fec_encoding_id:8 | symbol_size:16 |
//!   num_source_blocks:8 | num_sub_blocks:16 | symbol_alignment:8`)
//! - encoding packets `[SBN:1][ESI:3, big-endian][symbol payload]`
//!
//! Encoding yields the OTI as a future and the packets as a lazy stream; decoding
//! consumes a packet stream and yields either the combined object or each source
//! block as soon as it completes.
//!
//! The symbol algebra itself is delegated to the [`raptorq`] crate. Callers that
//! need to substitute the codec (tests, out-of-process codecs) implement
//! [`RawCodec`].

#![forbid(unsafe_code)]

mod codec;
mod decode;
mod encode;
mod error;
mod layout;
mod options;

pub use codec::{RaptorQCodec, RawCodec};
pub use decode::{DecodedBlock, RawDecoding, decode};
pub use encode::{RawEncoding, encode};
pub use error::RawError;
pub use layout::BlockLayout;
pub use options::{EncodeOptions, OutputFormat};

use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;

/// Length of the native OTI header in bytes.
pub const OTI_LEN: usize = 12;

/// Length of the native payload ID (`SBN` + `ESI`) in bytes.
pub const PAYLOAD_ID_LEN: usize = 4;

/// FEC encoding ID carried in the OTI for `RaptorQ` (RFC 6330).
pub const FEC_ENCODING_ID: u8 = 6;

/// Largest transfer length representable in the 40-bit OTI field (RFC 6330 §4.4.1.2).
pub const MAX_TRANSFER_LENGTH: u64 = 942_574_504_275;

/// Source symbols per block accepted by the codec.
pub const MAX_SOURCE_SYMBOLS_PER_BLOCK: u64 = 8192;

/// Encoding symbols (source and repair) addressable per block by the 24-bit ESI.
pub const MAX_ENCODING_SYMBOLS_PER_BLOCK: u64 = 1 << 24;

/// Lazy stream of native encoding packets.
pub type PacketStream<E = RawError> = BoxStream<'static, Result<Vec<u8>, E>>;

/// Future resolving to the native 12-byte OTI.
pub type OtiFuture = BoxFuture<'static, Result<[u8; OTI_LEN], RawError>>;
