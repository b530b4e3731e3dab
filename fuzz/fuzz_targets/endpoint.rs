//! Fuzz endpoint parsing and check that a parsed endpoint survives a
//! print-and-parse cycle.

#![no_main]

use connpool::Endpoint;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };

    let Ok(endpoint) = Endpoint::parse(input) else {
        return;
    };

    // Hosts with separators in them cannot be printed unambiguously
    if endpoint.host.contains(['/', ',', '[', ']']) || endpoint.host.trim() != endpoint.host {
        return;
    }

    let reparsed = Endpoint::parse(&endpoint.to_string()).expect("printed endpoint must parse");
    assert_eq!(reparsed, endpoint);
});
