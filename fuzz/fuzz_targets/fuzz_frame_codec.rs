//! Fuzz target: `codec::validate` / `codec::extract`
//!
//! Arbitrary writes must never panic, `extract` must agree with
//! `validate`, and any accepted frame must re-encode to the same bytes.
//!
//! cargo fuzz run fuzz_frame_codec

#![no_main]

use bleprov::protocol::codec::{self, MAX_PAYLOAD};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let verdict = codec::validate(data);
    match codec::extract(data) {
        Ok(frame) => {
            assert!(verdict.is_ok(), "extract accepted what validate rejected");
            assert!(frame.payload.len() <= MAX_PAYLOAD);
            assert_eq!(usize::from(frame.length), frame.payload.len());

            let again = codec::encode_dated(frame.sent, frame.kind, &frame.payload)
                .expect("payload within bounds");
            // Only the event date may differ from what was sent.
            assert_eq!(again[..4], data[..4]);
            assert_eq!(again[7..], data[7..]);
            assert_eq!(again.len(), data.len());
        }
        Err(e) => assert_eq!(verdict, Err(e), "validate and extract disagree"),
    }
});
