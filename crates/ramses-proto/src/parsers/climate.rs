// SPDX-License-Identifier: Apache-2.0

//! Zone-control and heat-source opcodes: `000A`, `1100`, `1F09`, `1F41`,
//! `2309`, `2349`, `2E04`, `3150`, `3B00`, `3EF0`, `3EF1`.

use super::generic::device_fault_code;
use super::{Fields, ParseCtx, PayloadValue, Value};
use crate::error::PacketPayloadInvalid;
use crate::frame::Verb;
use crate::hex::{hex_to_bool, hex_to_flag8, hex_to_percent, hex_to_temp};

fn zone_mode_name(code: &str) -> Option<&'static str> {
    match code {
        "00" => Some("follow_schedule"),
        "01" => Some("advanced_override"),
        "02" => Some("permanent_override"),
        "03" => Some("countdown_override"),
        "04" => Some("temporary_override"),
        _ => None,
    }
}

fn system_mode_name(code: &str) -> Option<&'static str> {
    match code {
        "00" => Some("auto"),
        "01" => Some("heat_off"),
        "02" => Some("eco_boost"),
        "03" => Some("away"),
        "04" => Some("day_off"),
        "05" => Some("day_off_eco"),
        "06" => Some("auto_with_reset"),
        "07" => Some("custom"),
        _ => None,
    }
}

/// A fan-rate style percentage (`/200`, `0xEF`/faulted-nibble insertion
/// semantics from `parse_valve_demand`): `1.01` is a documented "maximum"
/// hack and clamps to `1.0`.
fn valve_demand(fields: &mut Fields, key: &'static str, byte: &str) -> Result<(), PacketPayloadInvalid> {
    if byte == "EF" {
        fields.insert(key, Value::Null);
        return Ok(());
    }
    let raw = u8::from_str_radix(byte, 16).map_err(|_| PacketPayloadInvalid::new("3150", "bad demand byte"))?;
    if raw & 0xF0 == 0xF0 {
        fields.insert("heat_demand_fault", Value::Str(device_fault_code(raw).to_string()));
        return Ok(());
    }
    let mut result = f64::from(raw) / 200.0;
    if (result - 1.01).abs() < 1e-9 {
        result = 1.0;
    } else if result > 1.0 {
        return Err(PacketPayloadInvalid::new("3150", format!("demand {result} (0x{byte}) is > 1")));
    }
    fields.insert(key, Value::Float(result));
    Ok(())
}

/// `000A`: zone parameters (min/max setpoint bounds, override flags).
/// Scalar, or an array when this frame was identified as a multi-zone
/// broadcast.
pub fn parser_000a(payload: &str, ctx: &ParseCtx<'_>) -> Result<PayloadValue, PacketPayloadInvalid> {
    fn element(seqx: &str) -> Result<Fields, PacketPayloadInvalid> {
        if seqx.len() < 12 {
            return Err(PacketPayloadInvalid::new("000A", "element too short"));
        }
        let bitmap = u8::from_str_radix(&seqx[2..4], 16)
            .map_err(|_| PacketPayloadInvalid::new("000A", "bad bitmap"))?;
        let mut fields = Fields::new();
        match hex_to_temp(&seqx[4..8]) {
            Some(v) => fields.insert("min_temp", Value::Float(v)),
            None => fields.insert("min_temp", Value::Null),
        };
        match hex_to_temp(&seqx[8..12]) {
            Some(v) => fields.insert("max_temp", Value::Float(v)),
            None => fields.insert("max_temp", Value::Null),
        };
        fields.insert("local_override", Value::Bool(bitmap & 1 == 0));
        fields.insert("openwindow_function", Value::Bool(bitmap & 2 == 0));
        fields.insert("multiroom_mode", Value::Bool(bitmap & 16 == 0));
        Ok(fields)
    }

    if ctx.has_array {
        if payload.len() % 12 != 0 || payload.is_empty() {
            return Err(PacketPayloadInvalid::new("000A", "array payload not a multiple of 6 bytes"));
        }
        let mut out = Vec::new();
        for chunk in payload.as_bytes().chunks(12) {
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

    if ctx.verb == Verb::RQ && ctx.len <= 2 {
        return Ok(PayloadValue::Scalar(Fields::new()));
    }
    Ok(PayloadValue::Scalar(element(payload)?))
}

/// `1100`: TPI (boiler relay) cycle-rate parameters.
pub fn parser_1100(payload: &str) -> Result<PayloadValue, PacketPayloadInvalid> {
    let mut fields = Fields::new();
    if payload.len() >= 2 && payload.starts_with('F') {
        fields.insert("domain_id", Value::Str(payload[0..2].to_string()));
    }
    if payload.len() < 10 {
        return Ok(PayloadValue::Scalar(fields));
    }
    let cycle_rate = u8::from_str_radix(&payload[2..4], 16)
        .map_err(|_| PacketPayloadInvalid::new("1100", "bad cycle_rate"))?;
    let min_on = u8::from_str_radix(&payload[4..6], 16)
        .map_err(|_| PacketPayloadInvalid::new("1100", "bad min_on_time"))?;
    let min_off = u8::from_str_radix(&payload[6..8], 16)
        .map_err(|_| PacketPayloadInvalid::new("1100", "bad min_off_time"))?;
    fields.insert("cycle_rate", Value::Int(i64::from(cycle_rate) / 4));
    fields.insert("min_on_time", Value::Float(f64::from(min_on) / 4.0));
    fields.insert("min_off_time", Value::Float(f64::from(min_off) / 4.0));
    if payload.len() > 10 {
        match hex_to_temp(&payload[10..14]) {
            Some(v) => fields.insert("proportional_band_width", Value::Float(v)),
            None => fields.insert("proportional_band_width", Value::Null),
        };
    }
    Ok(PayloadValue::Scalar(fields))
}

/// `1F09`: controller sync-cycle countdown.
pub fn parser_1f09(payload: &str) -> Result<PayloadValue, PacketPayloadInvalid> {
    if payload.len() < 6 {
        return Err(PacketPayloadInvalid::new("1F09", "payload too short"));
    }
    let raw = u16::from_str_radix(&payload[2..6], 16)
        .map_err(|_| PacketPayloadInvalid::new("1F09", "bad countdown"))?;
    let mut fields = Fields::new();
    fields.insert("domain_id", Value::Str(payload[0..2].to_string()));
    fields.insert("remaining_seconds", Value::Float(f64::from(raw) / 10.0));
    Ok(PayloadValue::Scalar(fields))
}

/// `1F41`: DHW (domestic hot water) mode.
pub fn parser_1f41(payload: &str) -> Result<PayloadValue, PacketPayloadInvalid> {
    if payload.len() < 12 {
        return Err(PacketPayloadInvalid::new("1F41", "payload too short"));
    }
    let mode_code = &payload[4..6];
    let Some(mode) = zone_mode_name(mode_code) else {
        return Err(PacketPayloadInvalid::new("1F41", format!("unknown zone mode {mode_code}")));
    };

    let mut fields = Fields::new();
    fields.insert("mode", Value::Str(mode.to_string()));
    if &payload[2..4] != "FF" {
        fields.insert(
            "active",
            match &payload[2..4] {
                "00" => Value::Bool(false),
                "01" => Value::Bool(true),
                _ => Value::Null,
            },
        );
    }
    if mode_code == "04" && payload.len() >= 24 {
        if let Some(dtm) = crate::hex::hex_to_dtm(&payload[12..24]) {
            fields.insert(
                "until",
                Value::Str(format!(
                    "{:04}-{:02}-{:02}T{:02}:{:02}",
                    dtm.year, dtm.month, dtm.day, dtm.hour, dtm.minute
                )),
            );
        } else {
            fields.insert("until", Value::Null);
        }
    }
    Ok(PayloadValue::Scalar(fields))
}

/// `2309`: zone setpoint, scalar or array.
pub fn parser_2309(payload: &str, ctx: &ParseCtx<'_>) -> Result<PayloadValue, PacketPayloadInvalid> {
    if ctx.has_array {
        if payload.len() % 6 != 0 || payload.is_empty() {
            return Err(PacketPayloadInvalid::new("2309", "array payload not a multiple of 3 bytes"));
        }
        let mut out = Vec::new();
        for chunk in payload.as_bytes().chunks(6) {
            let chunk = std::str::from_utf8(chunk).unwrap_or_default();
            let mut fields = Fields::new();
            fields.insert("zone_idx", Value::Str(chunk[0..2].to_string()));
            match hex_to_temp(&chunk[2..6]) {
                Some(v) => fields.insert("setpoint", Value::Float(v)),
                None => fields.insert("setpoint", Value::Null),
            };
            out.push(fields);
        }
        return Ok(PayloadValue::Array(out));
    }

    if ctx.verb == Verb::RQ && ctx.len == 1 {
        return Ok(PayloadValue::Scalar(Fields::new()));
    }
    if payload.len() < 6 {
        return Err(PacketPayloadInvalid::new("2309", "payload too short"));
    }
    let mut fields = Fields::new();
    match hex_to_temp(&payload[2..6]) {
        Some(v) => fields.insert("setpoint", Value::Float(v)),
        None => fields.insert("setpoint", Value::Null),
    };
    Ok(PayloadValue::Scalar(fields))
}

/// `2349`: zone mode (setpoint plus schedule-override mode and optional
/// duration/until fields).
pub fn parser_2349(payload: &str, ctx: &ParseCtx<'_>) -> Result<PayloadValue, PacketPayloadInvalid> {
    if ctx.verb == Verb::RQ && ctx.len <= 2 {
        return Ok(PayloadValue::Scalar(Fields::new()));
    }
    if payload.len() < 8 {
        return Err(PacketPayloadInvalid::new("2349", "payload too short"));
    }
    let mode_code = &payload[6..8];
    let Some(mode) = zone_mode_name(mode_code) else {
        return Err(PacketPayloadInvalid::new("2349", format!("unknown zone mode {mode_code}")));
    };

    let mut fields = Fields::new();
    fields.insert("mode", Value::Str(mode.to_string()));
    match hex_to_temp(&payload[2..6]) {
        Some(v) => fields.insert("setpoint", Value::Float(v)),
        None => fields.insert("setpoint", Value::Null),
    };

    if payload.len() >= 14 {
        if payload[8..14] == *"FFFFFF" {
            if mode_code == "03" {
                return Err(PacketPayloadInvalid::new("2349", "countdown mode with no duration"));
            }
        } else {
            if mode_code != "03" {
                return Err(PacketPayloadInvalid::new("2349", "duration present without countdown mode"));
            }
            let minutes = u32::from_str_radix(&payload[8..14], 16)
                .map_err(|_| PacketPayloadInvalid::new("2349", "bad duration"))?;
            fields.insert("duration_mins", Value::Int(i64::from(minutes)));
        }
    }

    if payload.len() >= 26 {
        if payload[14..] == *"FFFFFFFFFFFF" {
            if mode_code != "00" && mode_code != "02" {
                return Err(PacketPayloadInvalid::new("2349", "no-until with neither follow nor permanent mode"));
            }
            fields.insert("until", Value::Null);
        } else {
            if mode_code == "02" {
                return Err(PacketPayloadInvalid::new("2349", "until present with permanent mode"));
            }
            if let Some(dtm) = crate::hex::hex_to_dtm(&payload[14..26]) {
                fields.insert(
                    "until",
                    Value::Str(format!(
                        "{:04}-{:02}-{:02}T{:02}:{:02}",
                        dtm.year, dtm.month, dtm.day, dtm.hour, dtm.minute
                    )),
                );
            } else {
                fields.insert("until", Value::Null);
            }
        }
    }

    Ok(PayloadValue::Scalar(fields))
}

/// `2E04`: system operating mode.
pub fn parser_2e04(payload: &str) -> Result<PayloadValue, PacketPayloadInvalid> {
    if payload.len() != 8 && payload.len() != 16 {
        return Err(PacketPayloadInvalid::new("2E04", format!("expecting length 4 or 8, got {}", payload.len() / 2)));
    }
    let mode_code = &payload[0..2];
    let Some(mode) = system_mode_name(mode_code) else {
        return Err(PacketPayloadInvalid::new("2E04", format!("unknown system mode {mode_code}")));
    };

    let mut fields = Fields::new();
    fields.insert("system_mode", Value::Str(mode.to_string()));
    if !matches!(mode_code, "00" | "01" | "06") && payload.len() >= 16 && &payload[14..16] != "00" {
        match crate::hex::hex_to_dtm(&payload[2..14]) {
            Some(dtm) => fields.insert(
                "until",
                Value::Str(format!(
                    "{:04}-{:02}-{:02}T{:02}:{:02}",
                    dtm.year, dtm.month, dtm.day, dtm.hour, dtm.minute
                )),
            ),
            None => fields.insert("until", Value::Null),
        };
    }
    Ok(PayloadValue::Scalar(fields))
}

/// `3150`: heat/valve demand, scalar or per-zone array.
pub fn parser_3150(payload: &str, ctx: &ParseCtx<'_>) -> Result<PayloadValue, PacketPayloadInvalid> {
    if ctx.has_array {
        if payload.len() % 4 != 0 || payload.is_empty() {
            return Err(PacketPayloadInvalid::new("3150", "array payload not a multiple of 2 bytes"));
        }
        let mut out = Vec::new();
        for chunk in payload.as_bytes().chunks(4) {
            let chunk = std::str::from_utf8(chunk).unwrap_or_default();
            let mut fields = Fields::new();
            let idx_key = if chunk[0..1] == *"F" { "domain_id" } else { "zone_idx" };
            fields.insert(idx_key, Value::Str(chunk[0..2].to_string()));
            valve_demand(&mut fields, "heat_demand", &chunk[2..4])?;
            out.push(fields);
        }
        return Ok(PayloadValue::Array(out));
    }
    if payload.len() < 4 {
        return Err(PacketPayloadInvalid::new("3150", "payload too short"));
    }
    let mut fields = Fields::new();
    valve_demand(&mut fields, "heat_demand", &payload[2..4])?;
    Ok(PayloadValue::Scalar(fields))
}

/// `3B00`: actuator sync pulse (end/start of a TPI cycle).
pub fn parser_3b00(payload: &str, ctx: &ParseCtx<'_>) -> Result<PayloadValue, PacketPayloadInvalid> {
    if payload.len() != 4 || &payload[2..4] != "C8" {
        return Err(PacketPayloadInvalid::new("3B00", "expected a 2-byte payload ending C8"));
    }
    let mut fields = Fields::new();
    let domain = &payload[0..2];
    if ctx.verb == Verb::I && matches!(ctx.src_type, "01" | "23") {
        fields.insert("domain_id", Value::Str(domain.to_string()));
    }
    fields.insert("actuator_sync", Value::Bool(hex_to_bool(domain).unwrap_or(true)));
    Ok(PayloadValue::Scalar(fields))
}

/// `3EF0`: actuator (relay/OTB) modulation state.
pub fn parser_3ef0(payload: &str, _ctx: &ParseCtx<'_>) -> Result<PayloadValue, PacketPayloadInvalid> {
    if ![6, 12, 18].contains(&payload.len()) {
        return Err(PacketPayloadInvalid::new("3EF0", format!("invalid payload length {}", payload.len() / 2)));
    }
    let mut fields = Fields::new();
    let mod_level = if payload.len() == 6 {
        hex_to_percent(&payload[2..4], true)
    } else {
        hex_to_percent(&payload[2..4], false)
    };
    match mod_level {
        Some(v) => fields.insert("modulation_level", Value::Float(v)),
        None => fields.insert("modulation_level", Value::Null),
    };

    if payload.len() >= 12 {
        let flags3 = u8::from_str_radix(&payload[6..8], 16)
            .map_err(|_| PacketPayloadInvalid::new("3EF0", "bad flags byte"))?;
        fields.insert("ch_active", Value::Bool(flags3 & (1 << 1) != 0));
        fields.insert("dhw_active", Value::Bool(flags3 & (1 << 2) != 0));
        fields.insert("flame_on", Value::Bool(flags3 & (1 << 3) != 0));
        fields.insert("cool_active", Value::Bool(flags3 & (1 << 4) != 0));
    }

    if payload.len() >= 18 {
        let flags6 = u8::from_str_radix(&payload[12..14], 16)
            .map_err(|_| PacketPayloadInvalid::new("3EF0", "bad ch_enabled byte"))?;
        let setpoint = u8::from_str_radix(&payload[14..16], 16)
            .map_err(|_| PacketPayloadInvalid::new("3EF0", "bad ch_setpoint byte"))?;
        fields.insert("ch_enabled", Value::Bool(flags6 & 1 != 0));
        fields.insert("ch_setpoint", Value::Int(i64::from(setpoint)));
        match hex_to_percent(&payload[16..18], false) {
            Some(v) => fields.insert("max_rel_modulation", Value::Float(v)),
            None => fields.insert("max_rel_modulation", Value::Null),
        };
    }

    Ok(PayloadValue::Scalar(fields))
}

/// `3EF1`: actuator cycle-timing info (modulation level, countdown timers).
pub fn parser_3ef1(payload: &str, _ctx: &ParseCtx<'_>) -> Result<PayloadValue, PacketPayloadInvalid> {
    if payload.len() < 12 {
        return Err(PacketPayloadInvalid::new("3EF1", "payload too short"));
    }
    let mut fields = Fields::new();
    match hex_to_percent(&payload[10..12], true) {
        Some(v) => fields.insert("modulation_level", Value::Float(v)),
        None => fields.insert("modulation_level", Value::Null),
    };

    let cycle_countdown = if &payload[2..6] == "7FFF" {
        None
    } else {
        let raw = i32::from(u16::from_str_radix(&payload[2..6], 16).unwrap_or(0));
        Some(if raw > 0x7FFF { raw - 0x1_0000 } else { raw })
    };
    match cycle_countdown {
        Some(v) => fields.insert("cycle_countdown", Value::Int(i64::from(v))),
        None => fields.insert("cycle_countdown", Value::Null),
    };

    let actuator_countdown = if &payload[6..10] == "7FFF" {
        None
    } else {
        let raw = i32::from(u16::from_str_radix(&payload[6..10], 16).unwrap_or(0));
        let raw = if raw > 0x7FFF { cycle_countdown.unwrap_or(0) } else { raw };
        Some(raw)
    };
    match actuator_countdown {
        Some(v) => fields.insert("actuator_countdown", Value::Int(i64::from(v))),
        None => fields.insert("actuator_countdown", Value::Null),
    };

    Ok(PayloadValue::Scalar(fields))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(verb: Verb, len: usize, has_array: bool) -> ParseCtx<'static> {
        ParseCtx { verb, src_type: "01", dst_type: "--", src: "01:145038", dst: "--:------", len, has_array }
    }

    #[test]
    fn parses_zone_mode_temporary_override() {
        // setpoint=23.00 (08FC/100), mode=01(advanced_override), no duration/until.
        let result = parser_2349("0108FC01FFFFFF", &ctx(Verb::I, 7, false)).expect("decodes");
        let fields = result.as_scalar().expect("scalar");
        assert_eq!(fields.get("mode"), Some(&Value::Str("advanced_override".to_string())));
        assert_eq!(fields.get("setpoint"), Some(&Value::Float(23.0)));
    }

    #[test]
    fn valve_demand_clamps_101_to_1() {
        let mut fields = Fields::new();
        valve_demand(&mut fields, "heat_demand", "CA").expect("clamps");
        assert_eq!(fields.get("heat_demand"), Some(&Value::Float(1.0)));
    }

    #[test]
    fn system_mode_auto_has_no_until() {
        let result = parser_2e04("00FFFFFFFFFFFF00").expect("decodes");
        let fields = result.as_scalar().expect("scalar");
        assert_eq!(fields.get("system_mode"), Some(&Value::Str("auto".to_string())));
        assert_eq!(fields.get("until"), None);
    }

    #[test]
    fn dhw_mode_decodes_follow_schedule() {
        let result = parser_1f41("00FF00FFFFFF").expect("decodes");
        let fields = result.as_scalar().expect("scalar");
        assert_eq!(fields.get("mode"), Some(&Value::Str("follow_schedule".to_string())));
    }
}
