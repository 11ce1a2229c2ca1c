// SPDX-License-Identifier: Apache-2.0

#![no_main]

use libfuzzer_sys::fuzz_target;
use ramses_proto::frame::Frame;

fuzz_target!(|data: &[u8]| {
    let Ok(line) = std::str::from_utf8(data) else { return };
    if let Ok(frame) = Frame::parse(line) {
        // Must round-trip without panicking and re-parse to itself.
        let rendered = frame.render();
        let _ = Frame::parse(&rendered);
    }
});
