//! Fuzz target: request routing
//!
//! Any request line plus body must route to exactly one outcome, and
//! every rejection must carry a non-empty message.
//!
//! cargo fuzz run fuzz_route

#![no_main]

use libfuzzer_sys::fuzz_target;
use scapeprop::http::codec::RequestDecoder;
use scapeprop::http::request::{Route, route};

fuzz_target!(|data: &[u8]| {
    let mut decoder = RequestDecoder::new();
    if decoder.feed(data).is_err() {
        return;
    }
    let Some(line) = decoder.request_line() else {
        return;
    };
    match route(&line, decoder.body()) {
        Route::Probe { time } => assert!(time.bytes().all(|b| b.is_ascii_digit())),
        Route::Control(_) => {}
        Route::Reject(r) => assert!(!r.message().is_empty()),
    }
});
