// SPDX-License-Identifier: Apache-2.0

//! Exact decoders for the opcodes that have documented, non-trivial
//! semantics in the original package but aren't common enough to earn their
//! own file: `000E`, `042F`, `0B04`, `1030`, `1081`, `1090`, `1098`, `10A0`,
//! `10B0`, `10D0`, `10E1`, `10E2`, `1F70`, `1FCA`, `1FD0`, `1FD4`, `2210`,
//! `22F2`, `2249`.

use super::{Fields, ParseCtx, PayloadValue, Value};
use crate::address::hex_to_id;
use crate::error::PacketPayloadInvalid;
use crate::frame::Verb;
use crate::hex::{hex_to_percent, hex_to_temp};

/// `000E`: unidentified STA status byte, seen only as `000000`/`000014`.
/// No documented meaning beyond the raw bytes.
pub fn parser_000e(payload: &str) -> Result<PayloadValue, PacketPayloadInvalid> {
    let mut fields = Fields::new();
    fields.insert("raw_payload", Value::Str(payload.to_string()));
    Ok(PayloadValue::Scalar(fields))
}

/// `042F`: STA/VMS counter block, three 16-bit counters plus a trailing
/// unidentified byte.
pub fn parser_042f(payload: &str) -> Result<PayloadValue, PacketPayloadInvalid> {
    if payload.len() < 14 {
        return Err(PacketPayloadInvalid::new("042F", "payload too short"));
    }
    let mut fields = Fields::new();
    fields.insert("counter_1", Value::Str(payload[2..6].to_string()));
    fields.insert("counter_3", Value::Str(payload[6..10].to_string()));
    fields.insert("counter_5", Value::Str(payload[10..14].to_string()));
    fields.insert("_unknown_7", Value::Str(payload[14..].to_string()));
    Ok(PayloadValue::Scalar(fields))
}

/// `0B04`: unidentified THM payload, seen as a batch-of-three every 24h.
pub fn parser_0b04(payload: &str) -> Result<PayloadValue, PacketPayloadInvalid> {
    if payload.len() < 2 {
        return Err(PacketPayloadInvalid::new("0B04", "payload too short"));
    }
    let mut fields = Fields::new();
    fields.insert("_unknown_1", Value::Str(payload[2..].to_string()));
    Ok(PayloadValue::Scalar(fields))
}

/// `1030`: mix-valve config, a run of `(param, value)` pairs keyed by a
/// fixed code table.
pub fn parser_1030(payload: &str) -> Result<PayloadValue, PacketPayloadInvalid> {
    if payload.len() < 8 || (payload.len() - 2) % 6 != 0 {
        return Err(PacketPayloadInvalid::new("1030", "payload not zone_idx + N*3 bytes"));
    }
    let mut fields = Fields::new();
    fields.insert("zone_idx", Value::Str(payload[0..2].to_string()));
    for chunk in payload[2..].as_bytes().chunks(6) {
        let chunk = std::str::from_utf8(chunk).unwrap_or_default();
        if chunk.len() < 6 {
            continue;
        }
        let name = match &chunk[0..2] {
            "20" => "unknown_20",
            "21" => "unknown_21",
            "C8" => "max_flow_setpoint",
            "C9" => "min_flow_setpoint",
            "CA" => "valve_run_time",
            "CB" => "pump_run_time",
            "CC" => "boolean_cc",
            _ => continue,
        };
        let Ok(value) = u8::from_str_radix(&chunk[4..6], 16) else { continue };
        fields.insert(name, Value::Int(i64::from(value)));
    }
    Ok(PayloadValue::Scalar(fields))
}

/// `1081`: max CH setpoint (supply high limit).
pub fn parser_1081(payload: &str) -> Result<PayloadValue, PacketPayloadInvalid> {
    if payload.len() < 6 {
        return Err(PacketPayloadInvalid::new("1081", "payload too short"));
    }
    let mut fields = Fields::new();
    match hex_to_temp(&payload[2..6]) {
        Some(v) => fields.insert("setpoint", Value::Float(v)),
        None => fields.insert("setpoint", Value::Null),
    };
    Ok(PayloadValue::Scalar(fields))
}

/// `1090`: unidentified non-evohome thermostat payload, an educated-guess
/// pair of temperatures.
pub fn parser_1090(payload: &str) -> Result<PayloadValue, PacketPayloadInvalid> {
    if payload.len() != 10 {
        return Err(PacketPayloadInvalid::new("1090", "expected a 5-byte payload"));
    }
    let mut fields = Fields::new();
    match hex_to_temp(&payload[2..6]) {
        Some(v) => fields.insert("temperature_0", Value::Float(v)),
        None => fields.insert("temperature_0", Value::Null),
    };
    match hex_to_temp(&payload[6..10]) {
        Some(v) => fields.insert("temperature_1", Value::Float(v)),
        None => fields.insert("temperature_1", Value::Null),
    };
    Ok(PayloadValue::Scalar(fields))
}

/// `1098`: unidentified OTB payload, a boolean-or-percent value.
pub fn parser_1098(payload: &str) -> Result<PayloadValue, PacketPayloadInvalid> {
    if payload.len() < 4 {
        return Err(PacketPayloadInvalid::new("1098", "payload too short"));
    }
    let mut fields = Fields::new();
    fields.insert("_raw_payload", Value::Str(payload.to_string()));
    match &payload[2..4] {
        "00" => fields.insert("_value", Value::Bool(false)),
        "C8" => fields.insert("_value", Value::Bool(true)),
        other => match hex_to_percent(other, true) {
            Some(v) => fields.insert("_value", Value::Float(v)),
            None => fields.insert("_value", Value::Null),
        },
    };
    Ok(PayloadValue::Scalar(fields))
}

/// `10A0`: DHW (cylinder) parameters: setpoint, overrun minutes,
/// differential. Grows from 1 to 6 bytes depending on how much the
/// responder chose to report.
pub fn parser_10a0(payload: &str, ctx: &ParseCtx<'_>) -> Result<PayloadValue, PacketPayloadInvalid> {
    if ctx.verb == Verb::RQ && payload.len() == 2 {
        return Ok(PayloadValue::Scalar(Fields::new()));
    }
    if payload.len() < 2 {
        return Err(PacketPayloadInvalid::new("10A0", "payload too short"));
    }
    let mut fields = Fields::new();
    if payload.len() >= 6 {
        match hex_to_temp(&payload[2..6]) {
            Some(v) if (v - 255.0).abs() < f64::EPSILON => fields.insert("setpoint", Value::Null),
            Some(v) => fields.insert("setpoint", Value::Float(v)),
            None => fields.insert("setpoint", Value::Null),
        };
    }
    if payload.len() >= 8 {
        let overrun = u8::from_str_radix(&payload[6..8], 16)
            .map_err(|_| PacketPayloadInvalid::new("10A0", "bad overrun"))?;
        fields.insert("overrun", Value::Int(i64::from(overrun)));
    }
    if payload.len() >= 12 {
        match hex_to_temp(&payload[8..12]) {
            Some(v) => fields.insert("differential", Value::Float(v)),
            None => fields.insert("differential", Value::Null),
        };
    }
    Ok(PayloadValue::Scalar(fields))
}

/// `10B0`: unidentified OTB payload, same boolean-or-percent shape as
/// `1098`.
pub fn parser_10b0(payload: &str) -> Result<PayloadValue, PacketPayloadInvalid> {
    if payload.len() < 4 {
        return Err(PacketPayloadInvalid::new("10B0", "payload too short"));
    }
    let mut fields = Fields::new();
    fields.insert("_raw_payload", Value::Str(payload.to_string()));
    match &payload[2..4] {
        "00" => fields.insert("_value", Value::Bool(false)),
        "C8" => fields.insert("_value", Value::Bool(true)),
        other => match hex_to_percent(other, true) {
            Some(v) => fields.insert("_value", Value::Float(v)),
            None => fields.insert("_value", Value::Null),
        },
    };
    Ok(PayloadValue::Scalar(fields))
}

/// `10D0`: HVAC filter-change counter: days remaining (or a reset flag for
/// a `W`), lifetime days, and percent remaining.
pub fn parser_10d0(payload: &str, ctx: &ParseCtx<'_>) -> Result<PayloadValue, PacketPayloadInvalid> {
    if payload.len() < 4 {
        return Err(PacketPayloadInvalid::new("10D0", "payload too short"));
    }
    let mut fields = Fields::new();
    if ctx.verb == Verb::W {
        fields.insert("reset_counter", Value::Bool(&payload[2..4] == "FF"));
    } else {
        let days = u8::from_str_radix(&payload[2..4], 16)
            .map_err(|_| PacketPayloadInvalid::new("10D0", "bad days_remaining"))?;
        fields.insert("days_remaining", Value::Int(i64::from(days)));
    }
    if payload.len() >= 6 {
        let lifetime = u8::from_str_radix(&payload[4..6], 16)
            .map_err(|_| PacketPayloadInvalid::new("10D0", "bad days_lifetime"))?;
        fields.insert("days_lifetime", Value::Int(i64::from(lifetime)));
    }
    if payload.len() >= 8 {
        match hex_to_percent(&payload[6..8], true) {
            Some(v) => fields.insert("percent_remaining", Value::Float(v)),
            None => fields.insert("percent_remaining", Value::Null),
        };
    }
    Ok(PayloadValue::Scalar(fields))
}

/// `10E1`: device id echo (a device reporting its own id back).
pub fn parser_10e1(payload: &str) -> Result<PayloadValue, PacketPayloadInvalid> {
    if payload.len() < 8 {
        return Err(PacketPayloadInvalid::new("10E1", "payload too short"));
    }
    let mut fields = Fields::new();
    fields.insert("device_id", Value::Str(hex_to_id(&payload[2..])));
    Ok(PayloadValue::Scalar(fields))
}

/// `10E2`: unidentified HVAC counter, incrementing roughly every 2 minutes.
pub fn parser_10e2(payload: &str) -> Result<PayloadValue, PacketPayloadInvalid> {
    if payload.len() != 6 || &payload[0..2] != "00" {
        return Err(PacketPayloadInvalid::new("10E2", "expected 00 + 2-byte counter"));
    }
    let counter = u16::from_str_radix(&payload[2..], 16)
        .map_err(|_| PacketPayloadInvalid::new("10E2", "bad counter"))?;
    let mut fields = Fields::new();
    fields.insert("counter", Value::Int(i64::from(counter)));
    Ok(PayloadValue::Scalar(fields))
}

/// `1F70`: HVAC programme-config entry (day/slot index, start time, and a
/// handful of fields the original only reports verbatim, uninterpreted).
pub fn parser_1f70(payload: &str) -> Result<PayloadValue, PacketPayloadInvalid> {
    if payload.len() < 26 {
        return Err(PacketPayloadInvalid::new("1F70", "payload too short"));
    }
    let hour = u8::from_str_radix(&payload[18..20], 16)
        .map_err(|_| PacketPayloadInvalid::new("1F70", "bad start hour"))?;
    let minute = u8::from_str_radix(&payload[20..22], 16)
        .map_err(|_| PacketPayloadInvalid::new("1F70", "bad start minute"))?;
    let mut fields = Fields::new();
    fields.insert("setpoint_idx", Value::Str(payload[8..10].to_string()));
    fields.insert("day_idx", Value::Str(payload[16..18].to_string()));
    fields.insert("start_time", Value::Str(format!("{hour:02}:{minute:02}")));
    fields.insert("fan_speed_wip", Value::Str(payload[24..26].to_string()));
    Ok(PayloadValue::Scalar(fields))
}

/// `1FCA`: unidentified HVAC payload pairing two device ids.
pub fn parser_1fca(payload: &str) -> Result<PayloadValue, PacketPayloadInvalid> {
    if payload.len() < 18 {
        return Err(PacketPayloadInvalid::new("1FCA", "payload too short"));
    }
    let mut fields = Fields::new();
    fields.insert("device_id_0", Value::Str(hex_to_id(&payload[6..12])));
    fields.insert("device_id_1", Value::Str(hex_to_id(&payload[12..18])));
    Ok(PayloadValue::Scalar(fields))
}

/// `1FD0`: unidentified OTB payload, always the null pattern in practice.
pub fn parser_1fd0(payload: &str) -> Result<PayloadValue, PacketPayloadInvalid> {
    let mut fields = Fields::new();
    fields.insert("raw_payload", Value::Str(payload.to_string()));
    Ok(PayloadValue::Scalar(fields))
}

/// `1FD4`: OpenTherm sync ticker, a monotonically increasing u16.
pub fn parser_1fd4(payload: &str) -> Result<PayloadValue, PacketPayloadInvalid> {
    if payload.len() < 6 {
        return Err(PacketPayloadInvalid::new("1FD4", "payload too short"));
    }
    let ticker = u32::from_str_radix(&payload[2..], 16)
        .map_err(|_| PacketPayloadInvalid::new("1FD4", "bad ticker"))?;
    let mut fields = Fields::new();
    fields.insert("ticker", Value::Int(i64::from(ticker)));
    Ok(PayloadValue::Scalar(fields))
}

/// `2210`: unidentified HVAC payload, seen with one fixed pattern and
/// otherwise undocumented; reported verbatim.
pub fn parser_2210(payload: &str) -> Result<PayloadValue, PacketPayloadInvalid> {
    let mut fields = Fields::new();
    fields.insert("raw_payload", Value::Str(payload.to_string()));
    Ok(PayloadValue::Scalar(fields))
}

/// `2249`: programmer "now/next" setpoint, scalar or per-zone array.
pub fn parser_2249(payload: &str, ctx: &ParseCtx<'_>) -> Result<PayloadValue, PacketPayloadInvalid> {
    fn element(seqx: &str) -> Result<Fields, PacketPayloadInvalid> {
        if seqx.len() < 14 {
            return Err(PacketPayloadInvalid::new("2249", "element too short"));
        }
        let minutes = u16::from_str_radix(&seqx[10..14], 16)
            .map_err(|_| PacketPayloadInvalid::new("2249", "bad minutes_remaining"))?;
        let mut fields = Fields::new();
        match hex_to_temp(&seqx[2..6]) {
            Some(v) => fields.insert("setpoint_now", Value::Float(v)),
            None => fields.insert("setpoint_now", Value::Null),
        };
        match hex_to_temp(&seqx[6..10]) {
            Some(v) => fields.insert("setpoint_next", Value::Float(v)),
            None => fields.insert("setpoint_next", Value::Null),
        };
        fields.insert("minutes_remaining", Value::Int(i64::from(minutes)));
        Ok(fields)
    }

    if ctx.has_array {
        if payload.len() % 14 != 0 || payload.is_empty() {
            return Err(PacketPayloadInvalid::new("2249", "array payload not a multiple of 7 bytes"));
        }
        let mut out = Vec::new();
        for chunk in payload.as_bytes().chunks(14) {
            let chunk = std::str::from_utf8(chunk).unwrap_or_default();
            let mut fields = Fields::new();
            fields.insert("zone_idx", Value::Str(chunk[0..2].to_string()));
            for (k, v) in element(chunk)? {
                fields.insert(k, v);
            }
            out.push(fields);
        }
        return Ok(PayloadValue::Array(out));
    }
    Ok(PayloadValue::Scalar(element(payload)?))
}

/// `22F2`: HVAC flow-rate-style measurement, one or two `(idx, value)`
/// elements.
pub fn parser_22f2(payload: &str) -> Result<PayloadValue, PacketPayloadInvalid> {
    if payload.len() % 6 != 0 || payload.is_empty() {
        return Err(PacketPayloadInvalid::new("22F2", "payload not a multiple of 3 bytes"));
    }
    let mut out = Vec::new();
    for chunk in payload.as_bytes().chunks(6) {
        let chunk = std::str::from_utf8(chunk).unwrap_or_default();
        let mut fields = Fields::new();
        fields.insert("hvac_idx", Value::Str(chunk[0..2].to_string()));
        match hex_to_temp(&chunk[2..6]) {
            Some(v) => fields.insert("measure", Value::Float(v)),
            None => fields.insert("measure", Value::Null),
        };
        out.push(fields);
    }
    if out.len() == 1 {
        return Ok(PayloadValue::Scalar(out.remove(0)));
    }
    Ok(PayloadValue::Array(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(verb: Verb, has_array: bool) -> ParseCtx<'static> {
        ParseCtx { verb, src_type: "01", dst_type: "--", src: "01:145038", dst: "--:------", len: 7, has_array }
    }

    #[test]
    fn mix_valve_config_decodes_named_params() {
        let result = parser_1030("0AC80137C9010FCA0196CB0100CC0101").expect("decodes");
        let fields = result.as_scalar().expect("scalar");
        assert_eq!(fields.get("max_flow_setpoint"), Some(&Value::Int(55)));
        assert_eq!(fields.get("valve_run_time"), Some(&Value::Int(150)));
    }

    #[test]
    fn dhw_params_grows_with_payload_length() {
        let result = parser_10a0("001087", &ctx(Verb::RP, false));
        assert!(result.is_ok());
        let full = parser_10a0("0010870003E4", &ctx(Verb::RP, false)).expect("decodes");
        let fields = full.as_scalar().expect("scalar");
        assert_eq!(fields.get("overrun"), Some(&Value::Int(0)));
        assert_eq!(fields.get("differential"), Some(&Value::Float(9.96)));
    }

    #[test]
    fn filter_change_write_reports_reset_flag() {
        let result = parser_10d0("00FF", &ctx(Verb::W, false)).expect("decodes");
        let fields = result.as_scalar().expect("scalar");
        assert_eq!(fields.get("reset_counter"), Some(&Value::Bool(true)));
    }

    #[test]
    fn now_next_setpoint_decodes_scalar() {
        let result = parser_2249("007EFF7EFFFFFF", &ctx(Verb::I, false)).expect("decodes");
        let fields = result.as_scalar().expect("scalar");
        assert_eq!(fields.get("minutes_remaining"), Some(&Value::Int(0xFFFF)));
    }

    #[test]
    fn flow_rate_decodes_two_elements() {
        let result = parser_22f2("00019B010201").expect("decodes");
        assert!(matches!(result, PayloadValue::Array(ref v) if v.len() == 2));
    }
}
