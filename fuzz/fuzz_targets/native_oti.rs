//! Native OTI parsing in both layers.
//!
//! The raw decoder must reject or accept an arbitrary 12-byte header without
//! panicking. The framing layer checks a subset of the codec's rules, so any
//! header the codec accepts must pass framing validation too.

#![no_main]

use futures_util::StreamExt;
use futures_util::stream;
use libfuzzer_sys::fuzz_target;
use raptorq_raw::{OTI_LEN, OutputFormat, RawError};
use raptorq_suppa::OtiFields;

fuzz_target!(|data: &[u8]| {
    let Ok(oti) = <[u8; OTI_LEN]>::try_from(data) else {
        let _ = OtiFields::decode_native(data);
        return;
    };

    let accepted = OtiFields::decode_native(&oti).is_ok_and(|fields| fields.validate().is_ok());
    let raw = raptorq_raw::decode::<RawError>(
        oti,
        stream::empty().boxed(),
        OutputFormat::Combined,
    );
    if raw.is_ok() {
        assert!(accepted, "codec accepted an OTI the framing layer refuses");
    }
});
