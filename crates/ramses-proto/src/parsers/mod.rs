// SPDX-License-Identifier: Apache-2.0

//! Per-opcode payload parsers.
//!
//! Each parser is a pure function `(payload, ctx) -> PayloadValue`: they
//! never see a clock, never mutate state, and are given only the small
//! slice of frame metadata ([`ParseCtx`]) the original package's parsers
//! read off `msg` (`src`/`dst` type, verb, array-ness, payload length).
//!
//! A hand-written, exact decoder exists for every opcode spec.md names as
//! needing exact fidelity, plus the handful of simple wrappers
//! `SPEC_FULL.md` adds on top. Anything else falls back to
//! [`generic::decode`], a schema-driven best-effort decode (hex passthrough
//! plus the common bitmap/percent/temperature shapes) — the original
//! package has ~80 parsers; only the ones with documented, non-trivial
//! semantics earn a bespoke implementation here.

mod binding;
mod climate;
mod device;
mod fault;
mod generic;
mod hvac;
mod supplemental;

use std::collections::BTreeMap;

use crate::error::PacketPayloadInvalid;
use crate::frame::Verb;

/// A single decoded field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Boolean field.
    Bool(bool),
    /// Signed integer field (covers u8/s8/u16/s16 after widening).
    Int(i64),
    /// Floating-point field (temperatures, percentages, fixed points).
    Float(f64),
    /// Text field.
    Str(String),
    /// List of small integers (e.g. a flag8 bit list).
    IntList(Vec<u8>),
    /// Explicit absence (a decoded sentinel).
    Null,
}

/// A decoded payload field map, e.g. `{"temperature": Float(21.5)}`.
pub type Fields = BTreeMap<&'static str, Value>;

/// The result of decoding one payload: either a single element (scalar
/// message) or several (array message, one dict per element).
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadValue {
    /// Non-array message.
    Scalar(Fields),
    /// Array message: one entry per fixed-width element.
    Array(Vec<Fields>),
}

impl PayloadValue {
    /// View this value as a single scalar field map, if it is one.
    #[must_use]
    pub fn as_scalar(&self) -> Option<&Fields> {
        match self {
            Self::Scalar(f) => Some(f),
            Self::Array(_) => None,
        }
    }
}

/// The slice of frame/message metadata a parser is allowed to read.
#[derive(Debug, Clone)]
pub struct ParseCtx<'a> {
    /// The frame's verb.
    pub verb: Verb,
    /// Source device-type prefix, e.g. `"01"` for a controller.
    pub src_type: &'a str,
    /// Destination device-type prefix.
    pub dst_type: &'a str,
    /// Full source device id, e.g. `"01:145038"`.
    pub src: &'a str,
    /// Full destination device id.
    pub dst: &'a str,
    /// Declared payload length in bytes (`Frame::len`).
    pub len: usize,
    /// Whether this frame was identified as an array message.
    pub has_array: bool,
}

/// Decode `payload` (hex, no leading RSSI/header) for opcode `code`.
///
/// # Errors
/// Returns [`PacketPayloadInvalid`] if the payload violates a documented
/// invariant for this opcode (parsers that only have warning-only
/// assertions in the original do not error here; they return a best-effort
/// value instead, matching spec.md §4.4).
pub fn decode(code: &str, payload: &str, ctx: &ParseCtx<'_>) -> Result<PayloadValue, PacketPayloadInvalid> {
    match code {
        "0004" => device::parser_0004(payload),
        "0005" => device::parser_0005(payload, ctx),
        "0006" => device::parser_0006(payload),
        "0008" => device::parser_0008(payload),
        "0009" => device::parser_0009(payload, ctx),
        "000A" => climate::parser_000a(payload, ctx),
        "000C" => device::parser_000c(payload, ctx),
        "000E" => supplemental::parser_000e(payload),
        "0404" => device::parser_0404(payload, ctx),
        "0418" => fault::parser_0418(payload),
        "042F" => supplemental::parser_042f(payload),
        "0B04" => supplemental::parser_0b04(payload),
        "1030" => supplemental::parser_1030(payload),
        "1060" => device::parser_1060(payload),
        "1081" => supplemental::parser_1081(payload),
        "1090" => supplemental::parser_1090(payload),
        "1098" => supplemental::parser_1098(payload),
        "10A0" => supplemental::parser_10a0(payload, ctx),
        "10B0" => supplemental::parser_10b0(payload),
        "10D0" => supplemental::parser_10d0(payload, ctx),
        "10E0" => device::parser_10e0(payload),
        "10E1" => supplemental::parser_10e1(payload),
        "10E2" => supplemental::parser_10e2(payload),
        "1100" => climate::parser_1100(payload),
        "1260" | "1290" | "3200" | "3210" => generic::parser_temperature(payload),
        "1F41" => climate::parser_1f41(payload),
        "1F09" => climate::parser_1f09(payload),
        "1F70" => supplemental::parser_1f70(payload),
        "1FC9" => binding::parser_1fc9(payload, ctx),
        "1FCA" => supplemental::parser_1fca(payload),
        "1FD0" => supplemental::parser_1fd0(payload),
        "1FD4" => supplemental::parser_1fd4(payload),
        "2210" => supplemental::parser_2210(payload),
        "22F1" => hvac::parser_22f1(payload, ctx),
        "22F2" => supplemental::parser_22f2(payload),
        "22F3" => hvac::parser_22f3(payload, ctx),
        "2249" => supplemental::parser_2249(payload, ctx),
        "2309" => climate::parser_2309(payload, ctx),
        "2349" => climate::parser_2349(payload, ctx),
        "2E04" => climate::parser_2e04(payload),
        "3150" => climate::parser_3150(payload, ctx),
        "30C9" => generic::parser_temperature_array("30C9", payload, ctx),
        "31D9" => hvac::parser_31d9(payload, ctx),
        "31DA" => hvac::parser_31da(payload),
        "3220" => generic::parser_opentherm(payload),
        "3B00" => climate::parser_3b00(payload, ctx),
        "3EF0" => climate::parser_3ef0(payload, ctx),
        "3EF1" => climate::parser_3ef1(payload, ctx),
        "7FFF" => generic::parser_puzzle(payload),
        _ => generic::decode(code, payload, ctx),
    }
}
