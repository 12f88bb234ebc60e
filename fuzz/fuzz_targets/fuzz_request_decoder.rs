//! Fuzz target: `RequestDecoder::feed`
//!
//! Splits arbitrary bytes at a fuzzer-chosen offset and feeds both halves.
//! The decoder must never panic, never hold more body than its cap, and
//! behave the same after a reset.
//!
//! cargo fuzz run fuzz_request_decoder

#![no_main]

use libfuzzer_sys::fuzz_target;
use scapeprop::http::codec::{MAX_BODY_SIZE, Phase, RequestDecoder};

fuzz_target!(|data: &[u8]| {
    let Some((&split, rest)) = data.split_first() else {
        return;
    };
    let at = usize::from(split).min(rest.len());

    let mut decoder = RequestDecoder::new();
    let first = decoder
        .feed(&rest[..at])
        .and_then(|_| decoder.feed(&rest[at..]));

    assert!(decoder.body().len() <= MAX_BODY_SIZE);
    if let Ok(Phase::Complete) = first {
        assert!(decoder.request_line().is_some());
    }

    // One-shot feed after a reset must reach the same verdict.
    decoder.reset();
    let whole = decoder.feed(rest);
    assert_eq!(first.is_ok(), whole.is_ok());
});
