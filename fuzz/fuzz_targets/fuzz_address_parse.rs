// SPDX-License-Identifier: Apache-2.0

#![no_main]

use libfuzzer_sys::fuzz_target;
use ramses_proto::address::{hex_to_id, pkt_addrs};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else { return };
    let _ = pkt_addrs(text);

    // hex_to_id is called on raw payload slices throughout the parsers;
    // it must never panic regardless of input length or content.
    let _ = hex_to_id(text);
});
