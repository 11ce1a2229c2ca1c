// SPDX-License-Identifier: Apache-2.0

#![no_main]

use libfuzzer_sys::fuzz_target;
use ramses_proto::opentherm::decode_frame;

fuzz_target!(|data: &[u8]| {
    let Ok(payload) = std::str::from_utf8(data) else { return };
    if !payload.chars().all(|c| c.is_ascii_hexdigit()) {
        return;
    }
    let _ = decode_frame(payload);
});
