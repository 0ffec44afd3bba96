//! `RaptorQ` decoder consuming a native packet stream.

// Allow truncation casts - block lengths are bounded by the OTI ceilings
#![allow(clippy::cast_possible_truncation)]

use futures_util::future::{BoxFuture, FutureExt};
use futures_util::stream::{self, BoxStream, StreamExt};
use raptorq::{Decoder, EncodingPacket, ObjectTransmissionInformation, SourceBlockDecoder};
use tracing::{debug, trace};

use crate::error::RawError;
use crate::layout::BlockLayout;
use crate::options::OutputFormat;
use crate::{
    FEC_ENCODING_ID, MAX_SOURCE_SYMBOLS_PER_BLOCK, MAX_TRANSFER_LENGTH, OTI_LEN, PAYLOAD_ID_LEN,
    PacketStream,
};

/// One reconstructed source block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedBlock {
    /// Source block number.
    pub sbn: u8,
    /// Block bytes, with trailing padding removed from the final block.
    pub data: Vec<u8>,
}

/// Output of a raw decode, shaped by [`OutputFormat`].
///
/// `E` is the error type carried by the input packet stream; codec failures are
/// converted into it so upstream errors pass through untouched.
pub enum RawDecoding<E = RawError> {
    /// Resolves to the whole object.
    Combined(BoxFuture<'static, Result<Vec<u8>, E>>),
    /// Yields each source block as it completes.
    Blocks(BoxStream<'static, Result<DecodedBlock, E>>),
}

/// Decode a native packet stream.
///
/// The OTI is validated before any packet is pulled. Packets are consumed one at
/// a time; the stream is dropped as soon as the object (or the last block) is
/// reconstructed.
///
/// # Errors
///
/// Returns `RawError::InvalidOti` if the header does not describe a decodable
/// object. Packet-level failures surface through the returned future or stream.
pub fn decode<E>(
    oti: [u8; OTI_LEN],
    packets: PacketStream<E>,
    format: OutputFormat,
) -> Result<RawDecoding<E>, RawError>
where
    E: From<RawError> + Send + 'static,
{
    let config = parse_oti(&oti)?;
    let layout = BlockLayout::new(
        config.transfer_length(),
        config.symbol_size(),
        config.source_blocks(),
    );

    debug!(
        transfer_length = config.transfer_length(),
        symbol_size = config.symbol_size(),
        source_blocks = config.source_blocks(),
        %format,
        "raw decode"
    );

    Ok(match format {
        OutputFormat::Combined => RawDecoding::Combined(decode_combined(config, packets).boxed()),
        OutputFormat::Blocks => RawDecoding::Blocks(decode_blocks(config, layout, packets)),
    })
}

fn parse_oti(oti: &[u8; OTI_LEN]) -> Result<ObjectTransmissionInformation, RawError> {
    if oti[5] != FEC_ENCODING_ID {
        return Err(invalid_oti(format!(
            "FEC encoding ID {} is not RaptorQ ({FEC_ENCODING_ID})",
            oti[5]
        )));
    }

    let config = ObjectTransmissionInformation::deserialize(oti);
    let transfer_length = config.transfer_length();
    let symbol_size = config.symbol_size();
    let source_blocks = config.source_blocks();
    let sub_blocks = config.sub_blocks();
    let alignment = config.symbol_alignment();

    if transfer_length == 0 || transfer_length > MAX_TRANSFER_LENGTH {
        return Err(invalid_oti(format!(
            "transfer length {transfer_length} outside 1..={MAX_TRANSFER_LENGTH}"
        )));
    }
    if symbol_size == 0 || source_blocks == 0 || sub_blocks == 0 || alignment == 0 {
        return Err(invalid_oti(
            "symbol size, block counts and alignment must be non-zero",
        ));
    }
    if symbol_size % u16::from(alignment) != 0
        || sub_blocks > symbol_size / u16::from(alignment)
    {
        return Err(invalid_oti(format!(
            "symbol size {symbol_size} incompatible with alignment {alignment} and {sub_blocks} sub-blocks"
        )));
    }

    let symbols = transfer_length.div_ceil(u64::from(symbol_size));
    if symbols < u64::from(source_blocks) {
        return Err(invalid_oti(format!(
            "{source_blocks} source blocks for only {symbols} symbols"
        )));
    }
    let per_block = transfer_length.div_ceil(u64::from(symbol_size) * u64::from(source_blocks));
    if per_block > MAX_SOURCE_SYMBOLS_PER_BLOCK {
        return Err(RawError::TooManySymbolsPerBlock {
            symbols: per_block,
            max: MAX_SOURCE_SYMBOLS_PER_BLOCK,
        });
    }

    Ok(config)
}

fn invalid_oti(reason: impl Into<String>) -> RawError {
    RawError::InvalidOti {
        reason: reason.into(),
    }
}

/// Check a native packet against the OTI and parse it.
fn parse_packet(
    bytes: &[u8],
    config: &ObjectTransmissionInformation,
) -> Result<EncodingPacket, RawError> {
    let expected = PAYLOAD_ID_LEN + usize::from(config.symbol_size());
    if bytes.len() != expected {
        return Err(RawError::MalformedPacket {
            reason: format!("length {} (expected {expected})", bytes.len()),
        });
    }
    if bytes[0] >= config.source_blocks() {
        return Err(RawError::MalformedPacket {
            reason: format!(
                "source block number {} outside 0..{}",
                bytes[0],
                config.source_blocks()
            ),
        });
    }
    Ok(EncodingPacket::deserialize(bytes))
}

async fn decode_combined<E>(
    config: ObjectTransmissionInformation,
    mut packets: PacketStream<E>,
) -> Result<Vec<u8>, E>
where
    E: From<RawError>,
{
    let mut decoder = Decoder::new(config);
    let mut received = 0u64;

    while let Some(packet) = packets.next().await {
        let packet = parse_packet(&packet?, &config)?;
        received += 1;
        if let Some(data) = decoder.decode(packet) {
            debug!(packets = received, bytes = data.len(), "object decoded");
            return Ok(data);
        }
    }

    Err(RawError::InsufficientPackets {
        packets: received,
        decoded_blocks: 0,
        total_blocks: usize::from(config.source_blocks()),
    }
    .into())
}

struct BlockState<E> {
    config: ObjectTransmissionInformation,
    layout: BlockLayout,
    packets: PacketStream<E>,
    decoders: Vec<Option<SourceBlockDecoder>>,
    remaining: usize,
    received: u64,
}

fn decode_blocks<E>(
    config: ObjectTransmissionInformation,
    layout: BlockLayout,
    packets: PacketStream<E>,
) -> BoxStream<'static, Result<DecodedBlock, E>>
where
    E: From<RawError> + Send + 'static,
{
    let decoders: Vec<Option<SourceBlockDecoder>> = (0..config.source_blocks())
        .map(|sbn| Some(SourceBlockDecoder::new(sbn, &config, layout.padded_len(sbn))))
        .collect();

    let state = BlockState {
        config,
        layout,
        packets,
        remaining: decoders.len(),
        decoders,
        received: 0,
    };

    stream::try_unfold(state, next_block).boxed()
}

/// Pull packets until one more block completes.
async fn next_block<E>(
    mut state: BlockState<E>,
) -> Result<Option<(DecodedBlock, BlockState<E>)>, E>
where
    E: From<RawError>,
{
    if state.remaining == 0 {
        return Ok(None);
    }

    while let Some(packet) = state.packets.next().await {
        let packet = parse_packet(&packet?, &state.config)?;
        state.received += 1;
        let sbn = packet.payload_id().source_block_number();

        // Packets for blocks already yielded are ignored.
        let Some(decoder) = state.decoders[usize::from(sbn)].as_mut() else {
            continue;
        };

        if let Some(mut data) = decoder.decode([packet]) {
            state.decoders[usize::from(sbn)] = None;
            state.remaining -= 1;
            data.truncate(state.layout.data_len(sbn) as usize);
            trace!(sbn, bytes = data.len(), packets = state.received, "block decoded");
            return Ok(Some((DecodedBlock { sbn, data }, state)));
        }
    }

    let total_blocks = state.decoders.len();
    Err(RawError::InsufficientPackets {
        packets: state.received,
        decoded_blocks: total_blocks - state.remaining,
        total_blocks,
    }
    .into())
}
