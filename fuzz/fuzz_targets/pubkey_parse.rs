//! Fuzz target for `salty-id` pubkey parsing
//!
//! Any text either parses or errors; a parsed identity must survive a
//! display/parse round trip.

#![no_main]

use libfuzzer_sys::fuzz_target;
use salty_core::Identity;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(identity) = Identity::parse(text) {
        let canonical = identity.to_string();
        let reparsed = Identity::parse(&canonical).expect("canonical text parses");
        assert_eq!(reparsed, identity);
    }
});
