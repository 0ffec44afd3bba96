//! Pluggable raw codec seam.

use crate::decode::{RawDecoding, decode};
use crate::encode::{RawEncoding, encode};
use crate::error::RawError;
use crate::options::{EncodeOptions, OutputFormat};
use crate::{OTI_LEN, PacketStream};

/// A raw `RaptorQ` codec: native OTI plus native packets in, object out.
///
/// The framing layer only talks to this trait, so tests and alternate
/// backends can stand in for the default [`RaptorQCodec`].
pub trait RawCodec: Send + Sync {
    /// Encode `data`.
    ///
    /// # Errors
    ///
    /// Returns `RawError` if the options or payload are rejected.
    fn encode(&self, options: &EncodeOptions, data: &[u8]) -> Result<RawEncoding, RawError>;

    /// Decode a native packet stream described by `oti`.
    ///
    /// The returned variant must match `format`.
    ///
    /// # Errors
    ///
    /// Returns `RawError::InvalidOti` if `oti` is not decodable.
    fn decode<E>(
        &self,
        oti: [u8; OTI_LEN],
        packets: PacketStream<E>,
        format: OutputFormat,
    ) -> Result<RawDecoding<E>, RawError>
    where
        E: From<RawError> + Send + 'static;
}

/// The `raptorq` crate backend.
#[derive(Clone, Copy, Debug, Default)]
pub struct RaptorQCodec;

impl RawCodec for RaptorQCodec {
    fn encode(&self, options: &EncodeOptions, data: &[u8]) -> Result<RawEncoding, RawError> {
        encode(options, data)
    }

    fn decode<E>(
        &self,
        oti: [u8; OTI_LEN],
        packets: PacketStream<E>,
        format: OutputFormat,
    ) -> Result<RawDecoding<E>, RawError>
    where
        E: From<RawError> + Send + 'static,
    {
        decode(oti, packets, format)
    }
}
