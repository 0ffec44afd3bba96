//! Encode pipeline: raw codec output reframed per strategy.

use std::borrow::Cow;

use futures_util::future::{BoxFuture, FutureExt, TryFutureExt};
use futures_util::stream::StreamExt;
use raptorq_raw::{EncodeOptions, OTI_LEN, RawCodec};
use tracing::debug;

use crate::error::SuppaError;
use crate::oti::OtiFields;
use crate::placement::Placement;
use crate::strategy::{ResolvedStrategy, Strategy};
use crate::{PacketStream, RaptorqSuppa};

/// Output of [`RaptorqSuppa::encode`].
pub struct Encoded {
    /// Custom OTI to hand the decoder; `None` when every field is hardcoded
    /// or the OTI is embedded in the packets.
    pub oti: BoxFuture<'static, Result<Option<Vec<u8>>, SuppaError>>,
    /// Native 12-byte OTI as produced by the raw codec.
    pub oti_spec: BoxFuture<'static, Result<[u8; OTI_LEN], SuppaError>>,
    /// Custom-framed packets.
    pub packets: PacketStream,
}

impl<C: RawCodec + 'static> RaptorqSuppa<C> {
    /// Encode `data` and reframe every packet per `strategy`.
    ///
    /// The strategy, options and predicted OTI are validated before the raw
    /// codec runs. Packets are produced lazily; each one is rewritten once as
    /// it is pulled.
    ///
    /// # Errors
    ///
    /// Returns `SuppaError` for an invalid strategy or options, an OTI that
    /// the strategy cannot carry, or a raw codec refusal. Per-packet failures
    /// surface on the packet stream.
    pub fn encode(
        &self,
        options: &EncodeOptions,
        data: &[u8],
        strategy: &Strategy,
    ) -> Result<Encoded, SuppaError> {
        let resolved = ResolvedStrategy::resolve(strategy)?;

        options.validate()?;
        let transfer_length = match resolved.trim() {
            Some(trim) => trim.wrapped_len(data.len())?,
            None => data.len() as u64,
        };
        options.validate_payload(transfer_length)?;
        let predicted = OtiFields::for_options(options, transfer_length);
        resolved.oti().pack_custom(&predicted)?;

        let payload = match resolved.trim() {
            Some(trim) => Cow::Owned(trim.wrap(data, transfer_length)?),
            None => Cow::Borrowed(data),
        };

        debug!(
            transfer_length,
            header_bits = resolved.header().header_bits(),
            oti_bits = resolved.oti().bit_len(),
            placement = %resolved.placement(),
            "suppa encode"
        );

        let raw = self.raw.encode(options, &payload)?;

        let oti_spec = raw.oti.map_err(SuppaError::from).boxed().shared();

        let oti_codec = resolved.oti().clone();
        let custom_oti = oti_spec
            .clone()
            .map(move |native| -> Result<Option<Vec<u8>>, SuppaError> {
                let fields = OtiFields::decode_native(&native?)?;
                Ok(oti_codec.pack_custom(&fields)?)
            })
            .boxed()
            .shared();

        let placement = resolved.placement();
        let header = resolved.header().clone();
        let raw_packets = raw.packets;
        let packets = custom_oti
            .clone()
            .map_ok(move |custom| {
                let prefix = match placement {
                    Placement::Negotiated => Vec::new(),
                    Placement::Embedded => custom.unwrap_or_default(),
                };
                raw_packets.map(move |native| -> Result<Vec<u8>, SuppaError> {
                    Ok(header.encode_packet(&prefix, &native?)?)
                })
            })
            .try_flatten_stream()
            .boxed();

        let oti = match placement {
            Placement::Negotiated => custom_oti.boxed(),
            Placement::Embedded => custom_oti.map_ok(|_| None).boxed(),
        };

        Ok(Encoded {
            oti,
            oti_spec: oti_spec.boxed(),
            packets,
        })
    }
}

/// Encode with the default codec.
///
/// # Errors
///
/// See [`RaptorqSuppa::encode`].
pub fn encode(
    options: &EncodeOptions,
    data: &[u8],
    strategy: &Strategy,
) -> Result<Encoded, SuppaError> {
    RaptorqSuppa::new().encode(options, data, strategy)
}
