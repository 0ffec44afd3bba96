//! Decode pipeline: custom packets restored to native framing and handed to
//! the raw codec.

use std::sync::Arc;

use futures_util::future::{self, BoxFuture, FutureExt, TryFutureExt};
use futures_util::stream::{self, BoxStream, StreamExt};
use raptorq_raw::{DecodedBlock, OutputFormat, RawCodec, RawDecoding};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::{FrameError, StrategyError, SuppaError};
use crate::header::PacketHeaderCodec;
use crate::oti::OtiCodec;
use crate::placement::{EmbeddedOti, Placement};
use crate::strategy::{ResolvedStrategy, Strategy};
use crate::trim::LengthTrim;
use crate::{PacketStream, RaptorqSuppa};

/// How the caller wants the decoded object.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DecodeUsage {
    /// Whole object or per-block output.
    pub output_format: OutputFormat,
}

/// Output of [`RaptorqSuppa::decode`].
pub enum Decoded {
    /// Resolves to the whole object.
    Combined(BoxFuture<'static, Result<Vec<u8>, SuppaError>>),
    /// Yields each source block as it completes.
    Blocks(BoxStream<'static, Result<DecodedBlock, SuppaError>>),
}

impl<C: RawCodec + 'static> RaptorqSuppa<C> {
    /// Decode custom-framed `packets` per `strategy`.
    ///
    /// With negotiated placement `oti` is the value [`encode`](Self::encode)
    /// returned (`None` or empty when every OTI field is hardcoded). With
    /// embedded placement `oti` must be `None`; the OTI is read from the first
    /// packet and every later packet must carry the same bytes.
    ///
    /// # Errors
    ///
    /// Returns `SuppaError` for an invalid strategy, a missing, unexpected or
    /// invalid OTI, or a raw codec refusal. Per-packet failures, including
    /// embedded OTI mismatches, surface on the returned future or stream.
    pub fn decode(
        &self,
        usage: &DecodeUsage,
        oti: Option<&[u8]>,
        packets: PacketStream,
        strategy: &Strategy,
    ) -> Result<Decoded, SuppaError> {
        let resolved = ResolvedStrategy::resolve(strategy)?;
        let format = usage.output_format;
        if resolved.trim().is_some() && format == OutputFormat::Blocks {
            return Err(StrategyError::TrimRequiresCombinedOutput.into());
        }

        let oti = oti.filter(|bytes| !bytes.is_empty());
        let prefix_len = resolved.embedded_prefix_len();
        let header = resolved.header().clone();
        let trim = resolved.trim().cloned();

        debug!(
            %format,
            placement = %resolved.placement(),
            header_bits = header.header_bits(),
            oti_bits = resolved.oti().bit_len(),
            "suppa decode"
        );

        if resolved.placement() == Placement::Embedded && oti.is_some() {
            return Err(FrameError::UnexpectedOti.into());
        }

        if prefix_len == 0 {
            if oti.is_none() && resolved.oti().byte_len() > 0 {
                return Err(FrameError::MissingOti.into());
            }
            let fields = resolved.oti().unpack_custom(oti)?;
            let native = fields.encode_native()?;
            debug!(?fields, "OTI resolved");

            let restored = restore(packets, None, header);
            let decoding = self.raw.decode(native, restored, format)?;
            return Ok(match format {
                OutputFormat::Combined => Decoded::Combined(trimmed(
                    into_combined(decoding),
                    trim,
                    fields.transfer_length,
                )),
                OutputFormat::Blocks => Decoded::Blocks(into_blocks(decoding)),
            });
        }

        let (signal, known) = oneshot::channel();
        let restored = restore(packets, Some(EmbeddedOti::new(prefix_len, signal)), header);
        let setup = start_embedded(
            Arc::clone(&self.raw),
            resolved.oti().clone(),
            restored,
            known,
            format,
        );

        Ok(match format {
            OutputFormat::Combined => Decoded::Combined(
                setup
                    .and_then(move |(decoding, transfer_length)| {
                        trimmed(into_combined(decoding), trim, transfer_length)
                    })
                    .boxed(),
            ),
            OutputFormat::Blocks => Decoded::Blocks(
                setup
                    .map_ok(|(decoding, _)| into_blocks(decoding))
                    .try_flatten_stream()
                    .boxed(),
            ),
        })
    }
}

/// Decode with the default codec.
///
/// # Errors
///
/// See [`RaptorqSuppa::decode`].
pub fn decode(
    usage: &DecodeUsage,
    oti: Option<&[u8]>,
    packets: PacketStream,
    strategy: &Strategy,
) -> Result<Decoded, SuppaError> {
    RaptorqSuppa::new().decode(usage, oti, packets, strategy)
}

/// Native packets from custom ones, one at a time. ECC-dropped packets are
/// skipped.
fn restore(
    packets: PacketStream,
    mut embedded: Option<EmbeddedOti>,
    header: PacketHeaderCodec,
) -> PacketStream {
    packets
        .map(move |packet| -> Result<Option<Vec<u8>>, SuppaError> {
            let packet = packet?;
            let rest = match embedded.as_mut() {
                Some(tracker) => tracker.split(&packet)?,
                None => packet.as_slice(),
            };
            Ok(header.decode_packet(rest)?)
        })
        .filter_map(|restored| future::ready(restored.transpose()))
        .boxed()
}

/// Pull the first packet, read the OTI it carried, then start the raw decode
/// over that packet followed by the rest of the stream.
async fn start_embedded<C: RawCodec>(
    raw: Arc<C>,
    oti_codec: OtiCodec,
    mut restored: PacketStream,
    mut known: oneshot::Receiver<Vec<u8>>,
    format: OutputFormat,
) -> Result<(RawDecoding<SuppaError>, u64), SuppaError> {
    let first = restored.next().await.ok_or(FrameError::NoPackets)??;
    let prefix = known.try_recv().map_err(|_| FrameError::NoPackets)?;

    let fields = oti_codec.unpack_custom(Some(&prefix))?;
    let native = fields.encode_native()?;
    debug!(?fields, "embedded OTI resolved");

    let packets = stream::iter(Some(Ok(first))).chain(restored).boxed();
    let decoding = raw.decode(native, packets, format)?;
    Ok((decoding, fields.transfer_length))
}

fn into_combined(decoding: RawDecoding<SuppaError>) -> BoxFuture<'static, Result<Vec<u8>, SuppaError>> {
    match decoding {
        RawDecoding::Combined(object) => object,
        RawDecoding::Blocks(_) => panic!("raw codec answered a combined request with blocks"),
    }
}

fn into_blocks(
    decoding: RawDecoding<SuppaError>,
) -> BoxStream<'static, Result<DecodedBlock, SuppaError>> {
    match decoding {
        RawDecoding::Blocks(blocks) => blocks,
        RawDecoding::Combined(_) => panic!("raw codec answered a blocks request with combined output"),
    }
}

fn trimmed(
    object: BoxFuture<'static, Result<Vec<u8>, SuppaError>>,
    trim: Option<LengthTrim>,
    transfer_length: u64,
) -> BoxFuture<'static, Result<Vec<u8>, SuppaError>> {
    match trim {
        None => object,
        Some(trim) => object
            .and_then(move |decoded| {
                future::ready(
                    trim.strip(decoded, transfer_length)
                        .map_err(SuppaError::from),
                )
            })
            .boxed(),
    }
}
