//! `RaptorQ` encoder producing the native OTI and a lazy packet stream.

use std::collections::VecDeque;

use futures_util::future::{self, FutureExt};
use futures_util::stream::{self, StreamExt};
use raptorq::{Encoder, EncodingPacket, ObjectTransmissionInformation};
use tracing::debug;

use crate::error::RawError;
use crate::options::EncodeOptions;
use crate::{FEC_ENCODING_ID, OTI_LEN, OtiFuture, PacketStream};

/// Repair packets generated per batch, bounding memory for large repair counts.
const REPAIR_BATCH: u32 = 50;

/// Output of a raw encode.
pub struct RawEncoding {
    /// Native 12-byte OTI.
    pub oti: OtiFuture,
    /// Native packets, source symbols first then repair symbols, block by block.
    pub packets: PacketStream,
}

/// Encode `data` with the given options.
///
/// The OTI is known immediately; packets are generated as the stream is pulled.
///
/// # Errors
///
/// Returns `RawError` if the options are invalid or the payload does not fit
/// them (empty, too long, too many source or repair symbols per block).
pub fn encode(options: &EncodeOptions, data: &[u8]) -> Result<RawEncoding, RawError> {
    options.validate()?;
    let transfer_length = data.len() as u64;
    options.validate_payload(transfer_length)?;

    let config = ObjectTransmissionInformation::new(
        transfer_length,
        options.symbol_size,
        options.num_source_blocks,
        options.num_sub_blocks,
        options.symbol_alignment,
    );
    let oti = serialize_oti(&config);

    debug!(
        transfer_length,
        symbol_size = options.symbol_size,
        source_blocks = options.num_source_blocks,
        sub_blocks = options.num_sub_blocks,
        repair_symbols = options.num_repair_symbols,
        "raw encode"
    );

    let producer = PacketProducer {
        encoder: Encoder::new(data, config),
        repair_symbols: options.num_repair_symbols,
        block: 0,
        source_done: false,
        repair_done: 0,
        pending: VecDeque::new(),
    };

    Ok(RawEncoding {
        oti: future::ready(Ok(oti)).boxed(),
        packets: stream::iter(producer.map(Ok)).boxed(),
    })
}

/// Native OTI bytes with the FEC encoding ID in the reserved octet.
fn serialize_oti(config: &ObjectTransmissionInformation) -> [u8; OTI_LEN] {
    let mut oti = config.serialize();
    oti[5] = FEC_ENCODING_ID;
    oti
}

/// Walks the block encoders, emitting source packets then repair packets per block.
struct PacketProducer {
    encoder: Encoder,
    repair_symbols: u32,
    block: usize,
    source_done: bool,
    repair_done: u32,
    pending: VecDeque<EncodingPacket>,
}

impl Iterator for PacketProducer {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Vec<u8>> {
        loop {
            if let Some(packet) = self.pending.pop_front() {
                return Some(packet.serialize());
            }

            let block = self.encoder.get_block_encoders().get(self.block)?;

            if !self.source_done {
                self.pending.extend(block.source_packets());
                self.source_done = true;
                continue;
            }

            if self.repair_done < self.repair_symbols {
                let batch = REPAIR_BATCH.min(self.repair_symbols - self.repair_done);
                self.pending
                    .extend(block.repair_packets(self.repair_done, batch));
                self.repair_done += batch;
                continue;
            }

            self.block += 1;
            self.source_done = false;
            self.repair_done = 0;
        }
    }
}
