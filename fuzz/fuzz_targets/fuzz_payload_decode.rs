// SPDX-License-Identifier: Apache-2.0

#![no_main]

use libfuzzer_sys::fuzz_target;
use ramses_proto::frame::Verb;
use ramses_proto::parsers::{self, ParseCtx};

const CODES: &[&str] = &[
    "0004", "0005", "0006", "0008", "0009", "000A", "000C", "000E", "0404", "0418", "042F",
    "0B04", "1030", "1060", "1081", "1090", "1098", "10A0", "10B0", "10D0", "10E0", "10E1",
    "10E2", "1100", "1260", "1290", "3200", "3210", "1F41", "1F09", "1F70", "1FC9", "1FCA",
    "1FD0", "1FD4", "2210", "22F1", "22F2", "22F3", "2249", "2309", "2349", "2E04", "3150",
    "30C9", "31D9", "31DA", "3220", "3B00", "3EF0", "3EF1", "7FFF",
];

fuzz_target!(|data: &[u8]| {
    if data.len() < 3 {
        return;
    }
    let code = CODES[data[0] as usize % CODES.len()];
    let verb = match data[1] % 4 {
        0 => Verb::I,
        1 => Verb::RQ,
        2 => Verb::RP,
        _ => Verb::W,
    };
    let Ok(payload) = std::str::from_utf8(&data[2..]) else { return };
    if !payload.chars().all(|c| c.is_ascii_hexdigit()) {
        return;
    }

    let ctx = ParseCtx {
        verb,
        src_type: "01",
        dst_type: "--",
        src: "01:145038",
        dst: "--:------",
        len: payload.len() / 2,
        has_array: payload.len() % 6 == 0,
    };
    let _ = parsers::decode(code, payload, &ctx);
});
