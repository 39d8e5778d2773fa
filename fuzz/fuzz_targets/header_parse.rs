//! Fuzz target for envelope header parsing
//!
//! Tests that the header scanner and parser handle arbitrary input without
//! panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use salty_core::EnvelopeHeader;
use salty_core::header::find_header_end;

fuzz_target!(|data: &[u8]| {
    if let Ok(Some(end)) = find_header_end(data) {
        let _ = EnvelopeHeader::parse(&data[..end]);
    }

    // Also parse the raw input as a whole header block
    if let Ok(header) = EnvelopeHeader::parse(data) {
        assert!(header.signed_bytes().len() <= data.len());
    }
});
