// SPDX-License-Identifier: Apache-2.0

//! Shared decode helpers and the schema-driven fallback used by opcodes
//! that don't carry documented, non-trivial semantics of their own.

use super::{Fields, ParseCtx, PayloadValue, Value};
use crate::error::PacketPayloadInvalid;
use crate::hex::{hex_to_flag8, hex_to_percent, hex_to_temp};
use crate::puzzle;

/// A device-class fault code (jammed valve/actuator, wiring fault, ...).
pub(crate) fn device_fault_code(code: u8) -> &'static str {
    match code & 0xF {
        0x0 => "open_circuit",
        0x1 => "short_circuit",
        0x2 => "unavailable",
        0xD => "stuck_valve",
        0xE => "stuck_actuator",
        _ => "other_fault",
    }
}

/// A sensor-class fault code (out-of-range/unreliable reading, ...).
pub(crate) fn sensor_fault_code(code: u8) -> &'static str {
    match code & 0xF {
        0x0 => "short_circuit",
        0x1 => "open_circuit",
        0x2 => "unavailable",
        0x3 => "too_high",
        0x4 => "too_low",
        0x5 => "unreliable",
        _ => "other_fault",
    }
}

/// `1260`/`1290`/`3200`/`3210`: a bare temperature reading with a 1-byte
/// index/domain prefix.
pub fn parser_temperature(payload: &str) -> Result<PayloadValue, PacketPayloadInvalid> {
    if payload.len() < 6 {
        return Err(PacketPayloadInvalid::new("temperature", "payload too short"));
    }
    let mut fields = Fields::new();
    match hex_to_temp(&payload[2..6]) {
        Some(v) => fields.insert("temperature", Value::Float(v)),
        None => fields.insert("temperature", Value::Null),
    };
    Ok(PayloadValue::Scalar(fields))
}

/// `30C9`: current temperature, scalar or (zone_idx, temperature) array.
pub fn parser_temperature_array(
    code: &str,
    payload: &str,
    ctx: &ParseCtx<'_>,
) -> Result<PayloadValue, PacketPayloadInvalid> {
    if ctx.has_array {
        if payload.len() % 6 != 0 || payload.is_empty() {
            return Err(PacketPayloadInvalid::new(code, "array payload not a multiple of 3 bytes"));
        }
        let mut out = Vec::new();
        for chunk in payload.as_bytes().chunks(6) {
            let chunk = std::str::from_utf8(chunk).unwrap_or_default();
            let mut fields = Fields::new();
            fields.insert("zone_idx", Value::Str(chunk[0..2].to_string()));
            match hex_to_temp(&chunk[2..6]) {
                Some(v) => fields.insert("temperature", Value::Float(v)),
                None => fields.insert("temperature", Value::Null),
            };
            out.push(fields);
        }
        return Ok(PayloadValue::Array(out));
    }
    parser_temperature(payload)
}

/// `3220`: an OpenTherm frame embedded after the `00` RAMSES envelope byte.
pub fn parser_opentherm(payload: &str) -> Result<PayloadValue, PacketPayloadInvalid> {
    if payload.len() < 10 {
        return Err(PacketPayloadInvalid::new("3220", "payload too short"));
    }
    let frame = crate::opentherm::decode_frame(&payload[2..10])?;
    let mut fields = Fields::new();
    fields.insert("msg_id", Value::Int(i64::from(frame.data_id)));
    fields.insert("msg_type", Value::Str(format!("{:?}", frame.msg_type)));
    if let Some(name) = frame.name {
        fields.insert("msg_name", Value::Str(name.to_string()));
    }
    if let Some(value) = frame.value {
        fields.insert("value", Value::Str(format!("{value:?}")));
    }
    Ok(PayloadValue::Scalar(fields))
}

/// `7FFF`: the puzzle/diagnostic packet, recast as ordinary decoded fields.
pub fn parser_puzzle(payload: &str) -> Result<PayloadValue, PacketPayloadInvalid> {
    let mut fields = Fields::new();
    match puzzle::decode(payload) {
        puzzle::PuzzlePacket::EngineVersion { version } => {
            fields.insert("subtype", Value::Str("engine_version".to_string()));
            fields.insert("version", Value::Str(version));
        },
        puzzle::PuzzlePacket::Impersonation { header } => {
            fields.insert("subtype", Value::Str("impersonation".to_string()));
            fields.insert("tx_header", Value::Str(header));
        },
        puzzle::PuzzlePacket::Message { text } => {
            fields.insert("subtype", Value::Str("message".to_string()));
            fields.insert("message", Value::Str(text));
        },
        puzzle::PuzzlePacket::Null => {
            fields.insert("subtype", Value::Str("null".to_string()));
        },
        puzzle::PuzzlePacket::Unknown { subtype, payload } => {
            fields.insert("subtype", Value::Str(subtype));
            fields.insert("payload", Value::Str(payload));
        },
    }
    Ok(PayloadValue::Scalar(fields))
}

/// Opcodes for which no exact decoder exists: just expose the raw hex, plus
/// a flag8 bit list when the payload is a single byte (the common shape for
/// the WIP/unknown opcodes this falls back to).
pub fn decode(code: &str, payload: &str, _ctx: &ParseCtx<'_>) -> Result<PayloadValue, PacketPayloadInvalid> {
    let mut fields = Fields::new();
    fields.insert("raw_payload", Value::Str(payload.to_string()));
    if payload.len() == 2 {
        fields.insert("_flags", Value::IntList(hex_to_flag8(payload)));
        if let Some(pct) = hex_to_percent(payload, false) {
            fields.insert("_as_percent", Value::Float(pct));
        }
    }
    let _ = code;
    Ok(PayloadValue::Scalar(fields))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temperature_decodes_plain_reading() {
        let result = parser_temperature("0007D0").expect("decodes");
        let fields = result.as_scalar().expect("scalar");
        assert_eq!(fields.get("temperature"), Some(&Value::Float(20.0)));
    }

    #[test]
    fn temperature_array_splits_zone_chunks() {
        let ctx = ParseCtx {
            verb: crate::frame::Verb::I,
            src_type: "01",
            dst_type: "--",
            src: "01:145038",
            dst: "--:------",
            len: 6,
            has_array: true,
        };
        let result = parser_temperature_array("30C9", "0007D0010640", &ctx).expect("decodes");
        match result {
            PayloadValue::Array(elements) => {
                assert_eq!(elements.len(), 2);
                assert_eq!(elements[0].get("zone_idx"), Some(&Value::Str("00".to_string())));
                assert_eq!(elements[1].get("temperature"), Some(&Value::Float(16.0)));
            },
            other => panic!("expected array, got {other:?}"),
        }
    }

    #[test]
    fn fallback_decode_exposes_raw_hex() {
        let ctx = ParseCtx {
            verb: crate::frame::Verb::I,
            src_type: "01",
            dst_type: "--",
            src: "01:145038",
            dst: "--:------",
            len: 1,
            has_array: false,
        };
        let result = decode("0B04", "C8", &ctx).expect("decodes");
        let fields = result.as_scalar().expect("scalar");
        assert_eq!(fields.get("raw_payload"), Some(&Value::Str("C8".to_string())));
    }
}
