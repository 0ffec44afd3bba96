//! Custom packet header parsing.
//!
//! Arbitrary bytes are restored under a handful of header layouts. Parsing
//! must never panic, and every restored packet must carry the native 4-byte
//! payload ID in place of the custom header.

#![no_main]

use libfuzzer_sys::fuzz_target;
use raptorq_suppa::{
    EccStrategy, EncodingPacketStrategy, FieldStrategy, ResolvedStrategy, Strategy,
};

fn layouts() -> Vec<ResolvedStrategy> {
    let packet = |sbn, esi, ecc| Strategy {
        encoding_packet: Some(EncodingPacketStrategy {
            sbn: Some(sbn),
            esi: Some(esi),
            ecc,
        }),
        ..Strategy::default()
    };
    [
        Strategy::default(),
        packet(FieldStrategy::bits(4), FieldStrategy::bits(12), None),
        packet(FieldStrategy::hardcoded(0), FieldStrategy::bits(2), None),
        packet(
            FieldStrategy::bits(3),
            FieldStrategy::bits(10),
            Some(EccStrategy::crc32(16)),
        ),
    ]
    .iter()
    .map(|strategy| ResolvedStrategy::resolve(strategy).expect("fixed layouts resolve"))
    .collect()
}

fuzz_target!(|data: &[u8]| {
    for resolved in layouts() {
        let header = resolved.header();
        if let Ok(Some(native)) = header.decode_packet(data) {
            assert_eq!(native.len(), data.len() - header.header_len() + 4);
        }
    }
});
