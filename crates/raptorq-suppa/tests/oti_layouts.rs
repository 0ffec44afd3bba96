//! OTI packing, placement and length trim.

mod common;

use std::sync::{Arc, Mutex};

use common::{decode_combined, encode_all, init_test_tracing, payload, small_options, stream_of};
use raptorq_raw::{PacketStream as RawPacketStream, RawDecoding, RawEncoding, RawError};
use raptorq_suppa::{
    DecodeUsage, Decoded, EncodeOptions, FecEncodingIdStrategy, FieldError, FieldStrategy,
    FnRemap, FrameError, OtiError, OtiStrategy, OutputFormat, PayloadStrategy, Placement,
    RaptorQCodec, RaptorqSuppa, RawCodec, RemapRejected, Strategy, StrategyError, SuppaError,
    TrimStrategy, round_up_to,
};

fn hardcoded_oti(transfer_length: u64) -> OtiStrategy {
    OtiStrategy {
        placement: Placement::Negotiated,
        transfer_length: Some(FieldStrategy::hardcoded(transfer_length)),
        fec_encoding_id: Some(FecEncodingIdStrategy {
            external_bits: Some(0),
        }),
        symbol_size: Some(FieldStrategy::hardcoded(64)),
        num_source_blocks: Some(FieldStrategy::hardcoded(1)),
        num_sub_blocks: Some(FieldStrategy::hardcoded(1)),
        symbol_alignment: Some(FieldStrategy::hardcoded(8)),
    }
}

/// Everything but a 16-bit transfer length hardcoded.
fn compact_oti(placement: Placement) -> OtiStrategy {
    OtiStrategy {
        placement,
        transfer_length: Some(FieldStrategy::bits(16)),
        ..hardcoded_oti(0)
    }
}

/// Transfer length carried in 64-byte units.
fn coarse_transfer_length() -> FieldStrategy {
    FieldStrategy::remapped(
        8,
        FnRemap::new(
            |external: Option<u64>| -> Result<u64, RemapRejected> {
                external
                    .map(|units| units * 64)
                    .ok_or_else(|| RemapRejected("transfer length is not hardcoded".into()))
            },
            |internal: u64| -> Option<u64> { (internal % 64 == 0).then_some(internal / 64) },
        ),
    )
}

fn with_oti(oti: OtiStrategy) -> Strategy {
    Strategy {
        oti: Some(oti),
        ..Strategy::default()
    }
}

#[tokio::test]
async fn fully_hardcoded_oti_is_never_sent() {
    init_test_tracing();
    let data = payload(1000);
    let options = EncodeOptions {
        symbol_alignment: 1,
        ..small_options()
    };
    let strategy = with_oti(OtiStrategy {
        symbol_alignment: Some(FieldStrategy::hardcoded(1)),
        ..hardcoded_oti(1000)
    });

    let collected = encode_all(&options, &data, &strategy).await.unwrap();
    assert_eq!(collected.oti, None);
    assert_eq!(&collected.oti_spec[..5], &[0, 0, 0, 0x03, 0xE8]);

    let decoded = decode_combined(None, collected.packets, &strategy)
        .await
        .unwrap();
    assert_eq!(decoded, data);
}

#[test]
fn hardcode_mismatch_rejected_before_encoding() {
    let strategy = with_oti(hardcoded_oti(1000));
    let err = raptorq_suppa::encode(&small_options(), &payload(999), &strategy)
        .err()
        .unwrap();
    assert_eq!(
        err,
        SuppaError::Oti(OtiError::Field(FieldError::HardcodeMismatch {
            field: raptorq_suppa::Field::TransferLength,
            hardcoded: 1000,
            actual: 999,
        }))
    );
}

#[test]
fn non_representable_value_is_named() {
    let strategy = with_oti(OtiStrategy {
        transfer_length: Some(coarse_transfer_length()),
        ..OtiStrategy::default()
    });
    let err = raptorq_suppa::encode(&small_options(), &payload(1000), &strategy)
        .err()
        .unwrap();
    assert_eq!(
        err.to_string(),
        "oti.transfer_length: internal value 1000 cannot be represented externally"
    );
}

#[tokio::test]
async fn trim_restores_exact_length_under_coarse_oti() {
    init_test_tracing();
    let strategy = Strategy {
        oti: Some(OtiStrategy {
            transfer_length: Some(coarse_transfer_length()),
            ..OtiStrategy::default()
        }),
        payload: Some(PayloadStrategy {
            transfer_length_trim: Some(TrimStrategy::bits(16).with_pump(round_up_to(64))),
        }),
        ..Strategy::default()
    };
    let data = payload(1000);
    let collected = encode_all(&small_options(), &data, &strategy).await.unwrap();

    // 2-byte prefix + 1000 bytes, pumped to 1024.
    assert_eq!(&collected.oti_spec[..5], &[0, 0, 0, 0x04, 0x00]);
    let oti = collected.oti.clone().unwrap();
    // 8 + 8 + 16 + 8 + 16 + 8 bits
    assert_eq!(oti.len(), 8);
    assert_eq!(oti[0], 16);

    let decoded = decode_combined(Some(oti.as_slice()), collected.packets, &strategy)
        .await
        .unwrap();
    assert_eq!(decoded, data);
}

#[test]
fn trim_requires_combined_output() {
    let strategy = Strategy {
        payload: Some(PayloadStrategy {
            transfer_length_trim: Some(TrimStrategy::bits(16)),
        }),
        ..Strategy::default()
    };
    let usage = DecodeUsage {
        output_format: OutputFormat::Blocks,
    };
    let err = raptorq_suppa::decode(&usage, Some(&[0; 12][..]), stream_of(Vec::new()), &strategy)
        .err()
        .unwrap();
    assert_eq!(
        err,
        SuppaError::Strategy(StrategyError::TrimRequiresCombinedOutput)
    );
}

#[test]
fn pump_past_block_limit_is_rejected_before_padding() {
    let strategy = Strategy {
        payload: Some(PayloadStrategy {
            transfer_length_trim: Some(
                TrimStrategy::bits(40).with_pump(Arc::new(|_len: u64| 200_000_000_000)),
            ),
        }),
        ..Strategy::default()
    };
    let err = raptorq_suppa::encode(&small_options(), &payload(10), &strategy)
        .err()
        .unwrap();
    assert_eq!(
        err,
        SuppaError::Raw(RawError::TooManySymbolsPerBlock {
            symbols: 3_125_000_000,
            max: 8192
        })
    );
}

#[tokio::test]
async fn embedded_native_oti_prefixes_every_packet() {
    init_test_tracing();
    let strategy = with_oti(OtiStrategy {
        placement: Placement::Embedded,
        ..OtiStrategy::default()
    });
    let data = payload(1000);
    let collected = encode_all(&small_options(), &data, &strategy).await.unwrap();

    assert_eq!(collected.oti, None);
    for packet in &collected.packets {
        assert_eq!(packet.len(), 12 + 4 + 64);
        assert_eq!(&packet[..12], &collected.oti_spec);
    }

    let decoded = decode_combined(None, collected.packets, &strategy)
        .await
        .unwrap();
    assert_eq!(decoded, data);
}

#[tokio::test]
async fn embedded_compact_oti_round_trip() {
    init_test_tracing();
    let strategy = with_oti(compact_oti(Placement::Embedded));
    let data = payload(1000);
    let collected = encode_all(&small_options(), &data, &strategy).await.unwrap();

    assert!(
        collected
            .packets
            .iter()
            .all(|p| p.len() == 2 + 4 + 64 && p[..2] == [0x03, 0xE8])
    );

    // The OTI is read from whichever packet arrives first.
    let mut packets = collected.packets;
    packets.reverse();
    let decoded = decode_combined(None, packets, &strategy).await.unwrap();
    assert_eq!(decoded, data);
}

#[tokio::test]
async fn embedded_oti_mismatch_is_rejected() {
    init_test_tracing();
    let strategy = with_oti(compact_oti(Placement::Embedded));
    let collected = encode_all(&small_options(), &payload(1000), &strategy)
        .await
        .unwrap();

    let mut packets = collected.packets;
    packets[3][1] ^= 0x01;
    let err = decode_combined(None, packets, &strategy).await.unwrap_err();
    assert_eq!(
        err,
        SuppaError::Frame(FrameError::OtiMismatch {
            packet_index: 3,
            expected: vec![0x03, 0xE8],
            got: vec![0x03, 0xE9],
        })
    );
    assert_eq!(
        err.to_string(),
        "packet 3: embedded OTI [03, e9] differs from [03, e8]"
    );
}

#[tokio::test]
async fn embedded_oti_needs_a_packet() {
    let strategy = with_oti(compact_oti(Placement::Embedded));
    let err = decode_combined(None, Vec::new(), &strategy)
        .await
        .unwrap_err();
    assert_eq!(err, SuppaError::Frame(FrameError::NoPackets));
}

#[test]
fn oti_argument_must_match_placement() {
    let usage = DecodeUsage::default();

    let embedded = with_oti(compact_oti(Placement::Embedded));
    let err = raptorq_suppa::decode(&usage, Some(&[3, 0xE8][..]), stream_of(Vec::new()), &embedded)
        .err()
        .unwrap();
    assert_eq!(err, SuppaError::Frame(FrameError::UnexpectedOti));

    let negotiated = with_oti(compact_oti(Placement::Negotiated));
    let err = raptorq_suppa::decode(&usage, None, stream_of(Vec::new()), &negotiated)
        .err()
        .unwrap();
    assert_eq!(err, SuppaError::Frame(FrameError::MissingOti));

    let err = raptorq_suppa::decode(&usage, Some(&[3][..]), stream_of(Vec::new()), &negotiated)
        .err()
        .unwrap();
    assert_eq!(
        err,
        SuppaError::Oti(OtiError::Length {
            expected: 2,
            got: 1
        })
    );
}

/// Delegates to the `raptorq` backend, recording every OTI it is asked to
/// decode.
#[derive(Default)]
struct RecordingCodec {
    seen: Arc<Mutex<Vec<[u8; 12]>>>,
}

impl RawCodec for RecordingCodec {
    fn encode(&self, options: &EncodeOptions, data: &[u8]) -> Result<RawEncoding, RawError> {
        RaptorQCodec.encode(options, data)
    }

    fn decode<E>(
        &self,
        oti: [u8; 12],
        packets: RawPacketStream<E>,
        format: OutputFormat,
    ) -> Result<RawDecoding<E>, RawError>
    where
        E: From<RawError> + Send + 'static,
    {
        self.seen.lock().unwrap().push(oti);
        RaptorQCodec.decode(oti, packets, format)
    }
}

#[tokio::test]
async fn codec_receives_reconstructed_native_oti() {
    init_test_tracing();
    let codec = RecordingCodec::default();
    let seen = Arc::clone(&codec.seen);
    let engine = RaptorqSuppa::with_codec(codec);

    let strategy = with_oti(compact_oti(Placement::Negotiated));
    let data = payload(1000);
    let encoded = engine.encode(&small_options(), &data, &strategy).unwrap();
    let oti = encoded.oti.await.unwrap().unwrap();
    let oti_spec = encoded.oti_spec.await.unwrap();
    assert_eq!(oti, vec![0x03, 0xE8]);

    let packets = futures_util::TryStreamExt::try_collect(encoded.packets)
        .await
        .unwrap();
    let Decoded::Combined(object) = engine
        .decode(&DecodeUsage::default(), Some(oti.as_slice()), stream_of(packets), &strategy)
        .unwrap()
    else {
        panic!("combined output requested");
    };
    assert_eq!(object.await.unwrap(), data);
    assert_eq!(*seen.lock().unwrap(), vec![oti_spec]);
}
