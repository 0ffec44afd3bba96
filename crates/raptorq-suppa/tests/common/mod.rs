//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::sync::Once;

use futures_util::stream::{self, StreamExt, TryStreamExt};
use raptorq_suppa::{
    DecodeUsage, Decoded, DecodedBlock, EncodeOptions, OutputFormat, PacketStream, Strategy,
    SuppaError,
};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Initialize tracing once per test binary. `RUST_LOG` overrides the filter.
pub fn init_test_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,raptorq_suppa=debug"));

        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .compact(),
            )
            .init();
    });
}

/// 64-byte symbols, four repair symbols, one block.
pub fn small_options() -> EncodeOptions {
    EncodeOptions {
        symbol_size: 64,
        num_repair_symbols: 4,
        num_source_blocks: 1,
        num_sub_blocks: 1,
        symbol_alignment: 8,
    }
}

pub fn payload(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i * 31 % 251) as u8).collect()
}

/// Everything one encode call produced.
pub struct Collected {
    pub oti: Option<Vec<u8>>,
    pub oti_spec: [u8; 12],
    pub packets: Vec<Vec<u8>>,
}

pub async fn encode_all(
    options: &EncodeOptions,
    data: &[u8],
    strategy: &Strategy,
) -> Result<Collected, SuppaError> {
    let encoded = raptorq_suppa::encode(options, data, strategy)?;
    let oti = encoded.oti.await?;
    let oti_spec = encoded.oti_spec.await?;
    let packets = encoded.packets.try_collect().await?;
    Ok(Collected {
        oti,
        oti_spec,
        packets,
    })
}

pub fn stream_of(packets: Vec<Vec<u8>>) -> PacketStream {
    stream::iter(packets.into_iter().map(Ok::<_, SuppaError>)).boxed()
}

pub async fn decode_combined(
    oti: Option<&[u8]>,
    packets: Vec<Vec<u8>>,
    strategy: &Strategy,
) -> Result<Vec<u8>, SuppaError> {
    match raptorq_suppa::decode(&DecodeUsage::default(), oti, stream_of(packets), strategy)? {
        Decoded::Combined(object) => object.await,
        Decoded::Blocks(_) => panic!("combined output requested"),
    }
}

pub async fn decode_blocks(
    oti: Option<&[u8]>,
    packets: Vec<Vec<u8>>,
    strategy: &Strategy,
) -> Result<Vec<DecodedBlock>, SuppaError> {
    let usage = DecodeUsage {
        output_format: OutputFormat::Blocks,
    };
    match raptorq_suppa::decode(&usage, oti, stream_of(packets), strategy)? {
        Decoded::Blocks(blocks) => blocks.try_collect().await,
        Decoded::Combined(_) => panic!("blocks output requested"),
    }
}
