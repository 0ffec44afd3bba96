//! Custom OTI unpacking.
//!
//! Anything that unpacks must validate and survive a native round trip.

#![no_main]

use libfuzzer_sys::fuzz_target;
use raptorq_suppa::{FieldStrategy, OtiFields, OtiStrategy, ResolvedStrategy, Strategy};

fuzz_target!(|data: &[u8]| {
    let compact = Strategy {
        oti: Some(OtiStrategy {
            transfer_length: Some(FieldStrategy::bits(24)),
            symbol_size: Some(FieldStrategy::bits(11)),
            num_sub_blocks: Some(FieldStrategy::hardcoded(1)),
            ..OtiStrategy::default()
        }),
        ..Strategy::default()
    };

    for strategy in [Strategy::default(), compact] {
        let resolved = ResolvedStrategy::resolve(&strategy).expect("fixed layouts resolve");
        let Ok(fields) = resolved.oti().unpack_custom(Some(data)) else {
            continue;
        };
        let native = fields.encode_native().expect("unpacked fields are valid");
        assert_eq!(OtiFields::decode_native(&native), Ok(fields));
    }
});
