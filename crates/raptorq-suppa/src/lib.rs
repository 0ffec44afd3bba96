//! `RaptorQ` with a reshaped wire format.
//!
//! `raptorq-suppa` sits on top of [`raptorq_raw`] and rewrites its native
//! framing according to a [`Strategy`]:
//!
//! - packet header fields (`SBN`, `ESI`) narrowed, remapped or dropped, with an
//!   optional per-packet checksum
//! - the six OTI fields packed into a custom bit layout, either negotiated out
//!   of band or embedded in front of every packet
//! - an optional payload length trim so that a coarse or hardcoded transfer
//!   length still decodes to the exact plaintext
//!
//! Symbol payloads are never touched. Every value crossing a remap is checked
//! in both directions, so a strategy that cannot carry a value fails loudly
//! instead of corrupting the stream.
//!
//! ```no_run
//! # async fn demo() -> Result<(), raptorq_suppa::SuppaError> {
//! use futures_util::{StreamExt, TryStreamExt, stream};
//! use raptorq_suppa::{DecodeUsage, Decoded, EncodeOptions, Strategy, SuppaError};
//!
//! let strategy = Strategy::default();
//! let encoded = raptorq_suppa::encode(&EncodeOptions::default(), b"hello", &strategy)?;
//! let oti = encoded.oti.await?;
//! let packets: Vec<Vec<u8>> = encoded.packets.try_collect().await?;
//!
//! let stream = stream::iter(packets.into_iter().map(Ok::<_, SuppaError>)).boxed();
//! if let Decoded::Combined(object) =
//!     raptorq_suppa::decode(&DecodeUsage::default(), oti.as_deref(), stream, &strategy)?
//! {
//!     assert_eq!(object.await?, b"hello");
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

mod bits;
mod decode;
mod ecc;
mod encode;
mod error;
mod field;
mod header;
mod oti;
mod placement;
mod remap;
mod strategy;
mod trim;

use std::sync::Arc;

pub use bits::BitVector;
pub use decode::{DecodeUsage, Decoded, decode};
pub use ecc::{Checksum, Crc32, Ecc};
pub use encode::{Encoded, encode};
pub use error::{FieldError, FrameError, OtiError, StrategyError, SuppaError};
pub use field::Field;
pub use header::PacketHeaderCodec;
pub use oti::{OtiCodec, OtiFields};
pub use placement::Placement;
pub use raptorq_raw::{DecodedBlock, EncodeOptions, OutputFormat, RaptorQCodec, RawCodec};
pub use remap::{FnRemap, Hardcoded, Identity, LengthRemap, Remap, RemapRejected, SafeRemap};
pub use strategy::{
    EccStrategy, EncodingPacketStrategy, FecEncodingIdStrategy, FieldStrategy, OtiStrategy,
    PayloadStrategy, ResolvedStrategy, Strategy, TrimStrategy,
};
pub use trim::{LengthTrim, Pump, round_up_to};

/// Lazy stream of custom-framed packets.
pub type PacketStream = raptorq_raw::PacketStream<SuppaError>;

/// Framing engine over a raw codec.
#[derive(Debug)]
pub struct RaptorqSuppa<C = RaptorQCodec> {
    raw: Arc<C>,
}

impl RaptorqSuppa {
    /// Engine over the `raptorq` crate backend.
    #[must_use]
    pub fn new() -> Self {
        Self::with_codec(RaptorQCodec)
    }
}

impl Default for RaptorqSuppa {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> RaptorqSuppa<C> {
    /// Engine over a caller-supplied codec.
    pub fn with_codec(codec: C) -> Self {
        Self {
            raw: Arc::new(codec),
        }
    }
}

impl<C> Clone for RaptorqSuppa<C> {
    fn clone(&self) -> Self {
        Self {
            raw: Arc::clone(&self.raw),
        }
    }
}
