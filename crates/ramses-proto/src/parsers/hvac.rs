// SPDX-License-Identifier: Apache-2.0

//! Ventilation-unit opcodes: `22F1`, `22F3`, `31D9`, `31DA`.

use super::{Fields, ParseCtx, PayloadValue, Value};
use crate::error::PacketPayloadInvalid;
use crate::hex::{hex_to_flag8, hex_to_percent};

fn fan_mode_nuaire(code: &str) -> Option<&'static str> {
    match code {
        "02" => Some("normal"),
        "03" => Some("boost"),
        "09" => Some("heater_off"),
        "0A" => Some("heater_auto"),
        _ => None,
    }
}

fn fan_mode_orcon(code: &str) -> Option<&'static str> {
    match code {
        "00" => Some("away"),
        "01" => Some("low"),
        "02" => Some("medium"),
        "03" => Some("high"),
        "04" => Some("auto"),
        "05" => Some("auto_alt"),
        "06" => Some("boost"),
        "07" => Some("off"),
        _ => None,
    }
}

fn fan_info(code: u8) -> &'static str {
    match code {
        0x00 => "off",
        0x01..=0x0A => "running",
        0x0B..=0x14 => "temporary_override",
        0x15 => "away",
        0x16 => "absolute_minimum",
        0x17 => "boost",
        0x18 => "auto",
        0x19 => "auto_night",
        _ => "unknown",
    }
}

/// `22F1`: remote-control fan-rate setting. The scheme (Nuaire vs. Orcon)
/// is picked from the mode-max byte; Itho's scheme additionally keys off
/// the broadcast destination address, which this decoder doesn't see, so
/// it is not distinguished here.
pub fn parser_22f1(payload: &str, _ctx: &ParseCtx<'_>) -> Result<PayloadValue, PacketPayloadInvalid> {
    if payload.len() < 4 {
        return Err(PacketPayloadInvalid::new("22F1", "payload too short"));
    }
    let mode_code = &payload[2..4];
    let mode_max = payload.get(4..6).unwrap_or("");

    let (scheme, mode) = if mode_max == "0A" {
        ("nuaire", fan_mode_nuaire(mode_code))
    } else {
        ("orcon", fan_mode_orcon(mode_code))
    };

    let mut fields = Fields::new();
    fields.insert(
        "fan_mode",
        Value::Str(mode.map_or_else(|| format!("unknown_{mode_code}"), str::to_string)),
    );
    fields.insert("_scheme", Value::Str(scheme.to_string()));
    if !mode_max.is_empty() {
        fields.insert("_mode_max", Value::Str(mode_max.to_string()));
    }
    Ok(PayloadValue::Scalar(fields))
}

/// `22F3`: fan-boost timer (duration plus the speed to apply while the
/// timer runs and the speed to fall back to once it expires).
pub fn parser_22f3(payload: &str, ctx: &ParseCtx<'_>) -> Result<PayloadValue, PacketPayloadInvalid> {
    if payload.len() < 6 {
        return Err(PacketPayloadInvalid::new("22F3", "payload too short"));
    }
    let flags = u8::from_str_radix(&payload[2..4], 16)
        .map_err(|_| PacketPayloadInvalid::new("22F3", "bad flags byte"))?;

    let new_speed = match flags & 0x07 {
        0x00 => Some("fan_boost"),
        0x01 => Some("per_request"),
        0x02 => Some("per_vent_speed"),
        _ => None,
    };
    let fallback_speed = match flags & 0x38 {
        0x08 => Some("fan_off"),
        0x10 => Some("per_request"),
        0x18 => Some("per_vent_speed"),
        _ => None,
    };
    let units = match flags & 0xC0 {
        0x00 => "minutes",
        0x40 => "hours",
        _ => "index",
    };

    let raw_duration = u8::from_str_radix(&payload[4..6], 16)
        .map_err(|_| PacketPayloadInvalid::new("22F3", "bad duration byte"))?;
    let duration = if units == "hours" { i64::from(raw_duration) * 60 } else { i64::from(raw_duration) };

    let mut fields = Fields::new();
    fields.insert(if units == "index" { "index" } else { "minutes" }, Value::Int(duration));
    fields.insert("_flags", Value::IntList(hex_to_flag8(&payload[2..4])));
    if let Some(speed) = new_speed {
        fields.insert("_new_speed_mode", Value::Str(speed.to_string()));
    }
    if let Some(speed) = fallback_speed {
        fields.insert("_fallback_speed_mode", Value::Str(speed.to_string()));
    }

    if ctx.len >= 5 && payload.len() >= 10 && &payload[6..10] != "0000" {
        let rate = parser_22f1(&format!("00{}", &payload[6..10]), ctx)?;
        if let Some(rate_fields) = rate.as_scalar() {
            if let Some(mode) = rate_fields.get("fan_mode") {
                fields.insert("rate", mode.clone());
            }
        }
    }

    Ok(PayloadValue::Scalar(fields))
}

/// `31D9`: fan state (short form): exhaust rate plus status bitmap.
pub fn parser_31d9(payload: &str, ctx: &ParseCtx<'_>) -> Result<PayloadValue, PacketPayloadInvalid> {
    if payload.len() < 6 {
        return Err(PacketPayloadInvalid::new("31D9", "payload too short"));
    }
    let bitmap = u8::from_str_radix(&payload[2..4], 16)
        .map_err(|_| PacketPayloadInvalid::new("31D9", "bad status bitmap"))?;

    let mut fields = Fields::new();
    match hex_to_percent(&payload[4..6], false) {
        Some(v) => fields.insert("exhaust_fan_speed", Value::Float(v)),
        None => fields.insert("exhaust_fan_speed", Value::Null),
    };
    fields.insert("fan_mode", Value::Str(payload[4..6].to_string()));
    fields.insert("passive", Value::Bool(bitmap & 0x02 != 0));
    fields.insert("damper_only", Value::Bool(bitmap & 0x04 != 0));
    fields.insert("filter_dirty", Value::Bool(bitmap & 0x20 != 0));
    fields.insert("frost_cycle", Value::Bool(bitmap & 0x40 != 0));
    fields.insert("has_fault", Value::Bool(bitmap & 0x80 != 0));
    let _ = ctx;
    Ok(PayloadValue::Scalar(fields))
}

/// `31DA`: extended ventilation telemetry. Each field is decoded
/// independently of the others (a sensor fault in one field never blocks
/// the rest), matching the original's per-field fault reporting.
pub fn parser_31da(payload: &str) -> Result<PayloadValue, PacketPayloadInvalid> {
    if payload.len() < 58 {
        return Err(PacketPayloadInvalid::new("31DA", "payload too short"));
    }
    let mut fields = Fields::new();

    insert_air_quality(&mut fields, &payload[2..6]);
    insert_co2(&mut fields, &payload[6..10]);
    insert_humidity(&mut fields, "indoor_humidity", "indoor_humidity_fault", "dewpoint_temp", &payload[10..12], &payload[14..18]);
    insert_humidity(&mut fields, "outdoor_humidity", "outdoor_humidity_fault", "outdoor_dewpoint_temp", &payload[12..14], "");
    insert_hvac_temp(&mut fields, "exhaust_temp", &payload[14..18]);
    insert_hvac_temp(&mut fields, "supply_temp", &payload[18..22]);
    insert_hvac_temp(&mut fields, "indoor_temp", &payload[22..26]);
    insert_hvac_temp(&mut fields, "outdoor_temp", &payload[26..30]);
    insert_capabilities(&mut fields, &payload[30..34]);
    insert_hvac_percent(&mut fields, "bypass_position", &payload[34..36]);
    fields.insert("fan_info", Value::Str(fan_info(u8::from_str_radix(&payload[36..38], 16).unwrap_or(0)).to_string()));
    insert_hvac_percent(&mut fields, "exhaust_fan_speed", &payload[38..40]);
    insert_hvac_percent(&mut fields, "supply_fan_speed", &payload[40..42]);
    insert_remaining_mins(&mut fields, &payload[42..46]);
    insert_hvac_percent(&mut fields, "post_heater", &payload[46..48]);
    insert_hvac_percent(&mut fields, "pre_heater", &payload[48..50]);
    insert_flow(&mut fields, "supply_flow", &payload[50..54]);
    insert_flow(&mut fields, "exhaust_flow", &payload[54..58]);

    Ok(PayloadValue::Scalar(fields))
}

fn insert_air_quality(fields: &mut Fields, value: &str) {
    if value == "EF00" {
        fields.insert("air_quality", Value::Null);
        return;
    }
    let Ok(raw) = u8::from_str_radix(&value[0..2], 16) else { return };
    if raw & 0xF0 == 0xF0 {
        fields.insert("air_quality_fault", Value::Str(super::generic::sensor_fault_code(raw).to_string()));
        return;
    }
    fields.insert("air_quality", Value::Float(f64::from(raw) / 200.0));
    let basis = match &value[2..4] {
        "10" => "voc".to_string(),
        "20" => "co2".to_string(),
        "40" => "rel_humidity".to_string(),
        other => format!("unknown_{other}"),
    };
    fields.insert("air_quality_basis", Value::Str(basis));
}

fn insert_co2(fields: &mut Fields, value: &str) {
    if value == "7FFF" {
        fields.insert("co2_level", Value::Null);
        return;
    }
    let Ok(raw) = u16::from_str_radix(value, 16) else { return };
    let hi = (raw >> 8) as u8;
    if hi & 0x80 != 0 || raw >= 0x8000 {
        fields.insert("co2_level_fault", Value::Str(super::generic::sensor_fault_code(hi).to_string()));
        return;
    }
    fields.insert("co2_level", Value::Int(i64::from(raw)));
}

fn insert_humidity(
    fields: &mut Fields,
    key: &'static str,
    fault_key: &'static str,
    dewpoint_key: &'static str,
    value: &str,
    dewpoint: &str,
) {
    if value == "EF" {
        fields.insert(key, Value::Null);
        return;
    }
    let Ok(raw) = u8::from_str_radix(value, 16) else { return };
    if raw & 0xF0 == 0xF0 {
        fields.insert(fault_key, Value::Str(super::generic::sensor_fault_code(raw).to_string()));
        return;
    }
    fields.insert(key, Value::Float(f64::from(raw) / 100.0));
    if !dewpoint.is_empty() {
        match crate::hex::hex_to_temp(dewpoint) {
            Some(v) => fields.insert(dewpoint_key, Value::Float(v)),
            None => fields.insert(dewpoint_key, Value::Null),
        };
    }
}

fn insert_hvac_temp(fields: &mut Fields, key: &'static str, value: &str) {
    if value == "7FFF" || value == "31FF" {
        fields.insert(key, Value::Null);
        return;
    }
    let Ok(top) = u8::from_str_radix(&value[0..2], 16) else { return };
    if top & 0xF0 == 0x80 {
        fields.insert(key, Value::Null);
        return;
    }
    match crate::hex::hex_to_temp(value) {
        Some(v) if v > -273.0 => fields.insert(key, Value::Float(v)),
        _ => fields.insert(key, Value::Null),
    };
}

fn insert_capabilities(fields: &mut Fields, value: &str) {
    if value == "7FFF" {
        fields.insert("speed_capabilities", Value::Null);
        return;
    }
    let Ok(raw) = u16::from_str_radix(value, 16) else { return };
    const ABILITIES: &[(u32, &str)] = &[
        (15, "off"), (14, "low_med_high"), (13, "timer"), (12, "boost"), (11, "auto"),
        (10, "speed_4"), (9, "speed_5"), (8, "speed_6"), (7, "speed_7"), (6, "speed_8"),
        (5, "speed_9"), (4, "speed_10"), (3, "auto_night"), (2, "reserved"),
        (1, "post_heater"), (0, "pre_heater"),
    ];
    let bits: Vec<u8> = ABILITIES.iter().filter(|(bit, _)| u32::from(raw) & (1 << bit) != 0).map(|(bit, _)| *bit as u8).collect();
    fields.insert("speed_capabilities_bits", Value::IntList(bits));
}

fn insert_hvac_percent(fields: &mut Fields, key: &'static str, value: &str) {
    if value == "EF" {
        fields.insert(key, Value::Null);
        return;
    }
    let Ok(raw) = u8::from_str_radix(value, 16) else { return };
    if raw & 0xF0 == 0xF0 {
        fields.insert(key, Value::Null);
        return;
    }
    fields.insert(key, Value::Float(f64::from(raw) / 200.0));
}

fn insert_remaining_mins(fields: &mut Fields, value: &str) {
    match value {
        "0000" => fields.insert("remaining_mins", Value::Int(0)),
        "3FFF" => fields.insert("remaining_mins", Value::Null),
        _ => match u16::from_str_radix(value, 16) {
            Ok(v) => fields.insert("remaining_mins", Value::Int(i64::from(v))),
            Err(_) => fields.insert("remaining_mins", Value::Null),
        },
    };
}

fn insert_flow(fields: &mut Fields, key: &'static str, value: &str) {
    if value == "7FFF" {
        fields.insert(key, Value::Null);
        return;
    }
    let Ok(top) = u8::from_str_radix(&value[0..2], 16) else { return };
    if top & 0x80 != 0 {
        fields.insert(key, Value::Null);
        return;
    }
    match u16::from_str_radix(value, 16) {
        Ok(raw) => fields.insert(key, Value::Float(f64::from(raw) / 100.0)),
        Err(_) => fields.insert(key, Value::Null),
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Verb;

    fn ctx() -> ParseCtx<'static> {
        ParseCtx { verb: Verb::I, src_type: "20", dst_type: "--", src: "20:000730", dst: "--:------", len: 3, has_array: false }
    }

    #[test]
    fn fan_rate_decodes_orcon_scheme() {
        let result = parser_22f1("000307", &ctx()).expect("decodes");
        let fields = result.as_scalar().expect("scalar");
        assert_eq!(fields.get("fan_mode"), Some(&Value::Str("high".to_string())));
        assert_eq!(fields.get("_scheme"), Some(&Value::Str("orcon".to_string())));
    }

    #[test]
    fn fan_boost_timer_decodes_minutes() {
        let result = parser_22f3("00000A", &ctx()).expect("decodes");
        let fields = result.as_scalar().expect("scalar");
        assert_eq!(fields.get("minutes"), Some(&Value::Int(10)));
    }

    #[test]
    fn fan_state_decodes_status_bitmap() {
        let result = parser_31d9("0000C8", &ctx()).expect("decodes");
        let fields = result.as_scalar().expect("scalar");
        assert_eq!(fields.get("exhaust_fan_speed"), Some(&Value::Float(1.0)));
        assert_eq!(fields.get("has_fault"), Some(&Value::Bool(false)));
    }

    #[test]
    fn extended_state_decodes_humidity_and_fan_info_and_nulls_sentinels() {
        let payload = "00EF007FFF32EF08357FFF7FFF7FFF7FFFEF01EFEF3FFFEFEF7FFF7FFF";
        let result = parser_31da(payload).expect("decodes");
        let fields = result.as_scalar().expect("scalar");
        assert_eq!(fields.get("air_quality"), Some(&Value::Null));
        assert_eq!(fields.get("co2_level"), Some(&Value::Null));
        assert_eq!(fields.get("indoor_humidity"), Some(&Value::Float(0.5)));
        assert_eq!(fields.get("dewpoint_temp"), Some(&Value::Float(21.01)));
        assert_eq!(fields.get("fan_info"), Some(&Value::Str("running".to_string())));
        assert_eq!(fields.get("bypass_position"), Some(&Value::Null));
        assert_eq!(fields.get("remaining_mins"), Some(&Value::Null));
    }
}
