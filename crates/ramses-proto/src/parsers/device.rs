// SPDX-License-Identifier: Apache-2.0

//! Device-identity and zone-membership opcodes: `0004`, `0005`, `0006`,
//! `0008`, `0009`, `000C`, `0404`, `1060`, `10E0`.

use super::{Fields, ParseCtx, PayloadValue, Value};
use crate::error::PacketPayloadInvalid;
use crate::frame::Verb;
use crate::hex::{hex_to_bool, hex_to_percent, hex_to_str};

/// `0004`: zone name. ASCII text, `7F`/`00`-padded to a fixed width.
pub fn parser_0004(payload: &str) -> Result<PayloadValue, PacketPayloadInvalid> {
    if payload.len() < 2 {
        return Err(PacketPayloadInvalid::new("0004", "payload too short"));
    }
    let mut fields = Fields::new();
    fields.insert("zone_idx", Value::Str(payload[0..2].to_string()));
    fields.insert("name", Value::Str(hex_to_str(&payload[4..])));
    Ok(PayloadValue::Scalar(fields))
}

/// `0005`: zone-type schema. A bitmap of which zone indices are of the
/// declared zone-type.
pub fn parser_0005(payload: &str, _ctx: &ParseCtx<'_>) -> Result<PayloadValue, PacketPayloadInvalid> {
    if payload.len() < 8 {
        return Err(PacketPayloadInvalid::new("0005", "payload too short"));
    }
    let mut fields = Fields::new();
    fields.insert("zone_type", Value::Str(payload[2..4].to_string()));
    let bitmap = u16::from_str_radix(&payload[4..8], 16)
        .map_err(|_| PacketPayloadInvalid::new("0005", "bad zone bitmap"))?;
    let zones: Vec<u8> = (0..16u8).filter(|b| bitmap & (1 << b) != 0).collect();
    fields.insert("zone_mask", Value::IntList(zones));
    Ok(PayloadValue::Scalar(fields))
}

/// `0006`: schedule change counter, a monotonically increasing u32.
pub fn parser_0006(payload: &str) -> Result<PayloadValue, PacketPayloadInvalid> {
    if payload.len() < 10 {
        return Err(PacketPayloadInvalid::new("0006", "payload too short"));
    }
    let change_counter = u32::from_str_radix(&payload[4..10], 16)
        .map_err(|_| PacketPayloadInvalid::new("0006", "bad change counter"))?;
    let mut fields = Fields::new();
    fields.insert("change_counter", Value::Int(i64::from(change_counter)));
    Ok(PayloadValue::Scalar(fields))
}

/// `0008`: relay demand, a 1-byte percentage (hi-res, `/200`).
pub fn parser_0008(payload: &str) -> Result<PayloadValue, PacketPayloadInvalid> {
    if payload.len() < 4 {
        return Err(PacketPayloadInvalid::new("0008", "payload too short"));
    }
    let mut fields = Fields::new();
    fields.insert("domain_id", Value::Str(payload[0..2].to_string()));
    match hex_to_percent(&payload[2..4], true) {
        Some(v) => fields.insert("relay_demand", Value::Float(v)),
        None => fields.insert("relay_demand", Value::Null),
    };
    Ok(PayloadValue::Scalar(fields))
}

/// `0009`: relay failsafe mode, one or two 3-byte elements.
pub fn parser_0009(payload: &str, _ctx: &ParseCtx<'_>) -> Result<PayloadValue, PacketPayloadInvalid> {
    if payload.len() % 6 != 0 || payload.is_empty() {
        return Err(PacketPayloadInvalid::new("0009", "payload not a multiple of 3 bytes"));
    }
    let mut out = Vec::new();
    for chunk in payload.as_bytes().chunks(6) {
        let chunk = std::str::from_utf8(chunk).unwrap_or_default();
        let mut fields = Fields::new();
        fields.insert("domain_id", Value::Str(chunk[0..2].to_string()));
        fields.insert("failsafe_enabled", Value::Bool(hex_to_bool(&chunk[2..4]).unwrap_or(false)));
        out.push(fields);
    }
    if out.len() == 1 {
        return Ok(PayloadValue::Scalar(out.remove(0)));
    }
    Ok(PayloadValue::Array(out))
}

/// `000C` role byte -> role slug (`original_source/src/ramses_tx/const.py`'s
/// `DEV_ROLE_MAP`, lines 313-327).
const DEVICE_ROLES: &[(&str, &str)] = &[
    ("00", "zone_actuator"),
    ("04", "zone_sensor"),
    ("08", "rad_actuator"),
    ("09", "ufh_actuator"),
    ("0A", "val_actuator"),
    ("0B", "mix_actuator"),
    ("0C", "out_sensor"),
    ("0D", "dhw_sensor"),
    ("0E", "hotwater_valve"),
    ("0F", "appliance_control"),
    ("10", "remote_gateway"),
    ("11", "ele_actuator"),
];

/// A role byte of `0E` bound at idx `01` (rather than `00`) is a second
/// HTG-role relay on the same controller — the original's `DevRole::HT1`
/// special case (`original_source/src/ramses_tx/parsers.py:478-480`).
fn device_role_name(role_byte: &str, idx: &str) -> &'static str {
    if role_byte == "0E" && idx == "01" {
        return "heating_valve";
    }
    DEVICE_ROLES.iter().find(|(byte, _)| *byte == role_byte).map_or("unknown", |(_, name)| name)
}

/// `000C`'s routing index: a UFH circuit for UFC-sourced queries, a domain
/// id for DHW/HTG/APP roles, otherwise a plain zone index
/// (`original_source/src/ramses_tx/parsers.py`'s `complex_idx`, lines
/// 427-445).
fn complex_idx(fields: &mut Fields, idx: &str, role_byte: &str, src_type: &str, rest: &str) {
    if src_type == "02" {
        fields.insert("ufh_idx", Value::Str(idx.to_string()));
        let zone_idx = rest.get(0..2).filter(|b| *b != "7F");
        fields.insert("zone_idx", zone_idx.map_or(Value::Null, |z| Value::Str(z.to_string())));
        return;
    }
    if role_byte == "0D" || role_byte == "0E" {
        fields.insert("domain_id", Value::Str(if idx == "00" { "FA" } else { "F9" }.to_string()));
        return;
    }
    if role_byte == "0F" {
        fields.insert("domain_id", Value::Str("FC".to_string()));
        return;
    }
    fields.insert("zone_idx", Value::Str(idx.to_string()));
}

/// Whether `payload`'s per-device elements are "short" (10 hex chars) or
/// "long" (12 hex chars). Mirrors the original's `is_short_000C`: for any
/// length but 72, a clean `% 12` divides the call (72 is the only length at
/// which both 12- and 10-wide chunkings fit evenly, so it's the one case
/// genuinely needing the repeated-prefix-byte check)
/// (`original_source/src/ramses_tx/parsers.py:457-475`).
fn is_short_000c(payload: &str) -> Result<bool, PacketPayloadInvalid> {
    let len = payload.len();
    if len != 72 {
        return Ok(len % 12 != 0);
    }
    if (12..len).step_by(12).all(|i| payload[i..i + 4] == payload[0..4]) {
        return Ok(false);
    }
    if (12..len).step_by(10).all(|i| payload[i..i + 2] == payload[2..4]) {
        return Ok(true);
    }
    Err(PacketPayloadInvalid::new("000C", "indeterminate element width"))
}

/// The `(role_byte, device_hex)` pairs making up `payload`'s device list,
/// for "long" (12-wide) elements: each chunk repeats the header idx, then
/// carries its own role byte and device id
/// (`original_source/src/ramses_tx/parsers.py`'s `_parser`, for the
/// `is_short_000C() == False` branch).
fn long_elements(payload: &str) -> Vec<(&str, &str)> {
    payload
        .as_bytes()
        .chunks(12)
        .filter(|c| c.len() == 12)
        .map(|c| std::str::from_utf8(c).unwrap_or_default())
        .map(|c| (&c[4..6], &c[6..12]))
        .collect()
}

/// The `(role_byte, device_hex)` pairs for "short" (10-wide) elements: the
/// first element still spans the full 12-char header-plus-device block (the
/// idx/role header folds into it); every element after that is a bare
/// 10-char `??-role-device` chunk, with the idx not repeated.
fn short_elements(payload: &str) -> Vec<(&str, &str)> {
    let mut out = Vec::new();
    if payload.len() >= 12 {
        out.push((&payload[4..6], &payload[6..12]));
    }
    let mut i = 12;
    while i + 10 <= payload.len() {
        let chunk = &payload[i..i + 10];
        out.push((&chunk[2..4], &chunk[4..10]));
        i += 10;
    }
    out
}

/// `000C`: zone/domain device membership. `RQ`s carry only the idx/role
/// header (no device list); `I`/`RP` additionally list the bound devices,
/// excluding any element whose role byte is `7F` (unbound slot).
pub fn parser_000c(payload: &str, ctx: &ParseCtx<'_>) -> Result<PayloadValue, PacketPayloadInvalid> {
    if payload.len() < 4 {
        return Err(PacketPayloadInvalid::new("000C", "payload too short"));
    }
    let idx = &payload[0..2];
    let role_byte = &payload[2..4];
    let rest = &payload[4..];

    let mut fields = Fields::new();
    fields.insert("zone_type", Value::Str(role_byte.to_string()));
    complex_idx(&mut fields, idx, role_byte, ctx.src_type, rest);
    fields.insert("device_role", Value::Str(device_role_name(role_byte, idx).to_string()));

    if ctx.verb == Verb::RQ {
        return Ok(PayloadValue::Scalar(fields));
    }
    if rest.is_empty() {
        fields.insert("devices", Value::Str(String::new()));
        return Ok(PayloadValue::Scalar(fields));
    }
    if payload.len() < 12 || payload.len() % 6 != 0 {
        return Err(PacketPayloadInvalid::new("000C", "device list not a whole number of elements"));
    }

    let elements = if is_short_000c(payload)? { short_elements(payload) } else { long_elements(payload) };
    let devices: Vec<String> = elements
        .into_iter()
        .filter(|(role, _)| *role != "7F")
        .map(|(_, device_hex)| crate::address::hex_to_id(device_hex))
        .collect();
    fields.insert("devices", Value::Str(devices.join(",")));
    Ok(PayloadValue::Scalar(fields))
}

/// `0404`: schedule fragment. RQs are 7 bytes with no fragment data; I/RP
/// carry the fragment hex whose length must be `frag_length * 2`.
pub fn parser_0404(payload: &str, ctx: &ParseCtx<'_>) -> Result<PayloadValue, PacketPayloadInvalid> {
    if payload.len() < 14 {
        return Err(PacketPayloadInvalid::new("0404", "payload too short"));
    }
    let header6 = &payload[2..8];
    if header6 != "200008" && header6 != "230008" {
        return Err(PacketPayloadInvalid::new("0404", format!("unexpected header {header6}")));
    }
    let frag_length = u8::from_str_radix(&payload[8..10], 16)
        .map_err(|_| PacketPayloadInvalid::new("0404", "bad frag_length"))?;
    let frag_number = u8::from_str_radix(&payload[10..12], 16)
        .map_err(|_| PacketPayloadInvalid::new("0404", "bad frag_number"))?;
    let frag_total = u8::from_str_radix(&payload[12..14], 16)
        .map_err(|_| PacketPayloadInvalid::new("0404", "bad frag_total"))?;
    let fragment = &payload[14..];

    if ctx.verb != Verb::RQ && usize::from(frag_length) * 2 != fragment.len() {
        return Err(PacketPayloadInvalid::new(
            "0404",
            format!("frag_length {frag_length} * 2 != fragment len {}", fragment.len()),
        ));
    }

    let mut fields = Fields::new();
    fields.insert("zone_idx", Value::Str(payload[0..2].to_string()));
    fields.insert("frag_number", Value::Int(i64::from(frag_number)));
    fields.insert("frag_total", Value::Int(i64::from(frag_total)));
    fields.insert("fragment", Value::Str(fragment.to_string()));
    Ok(PayloadValue::Scalar(fields))
}

/// `1060`: battery state.
pub fn parser_1060(payload: &str) -> Result<PayloadValue, PacketPayloadInvalid> {
    if payload.len() < 6 {
        return Err(PacketPayloadInvalid::new("1060", "payload too short"));
    }
    let mut fields = Fields::new();
    fields.insert("domain_id", Value::Str(payload[0..2].to_string()));
    match hex_to_percent(&payload[2..4], true) {
        Some(v) => fields.insert("battery_level", Value::Float(v)),
        None => fields.insert("battery_level", Value::Null),
    };
    fields.insert("low_battery", Value::Bool(hex_to_bool(&payload[4..6]).unwrap_or(false)));
    Ok(PayloadValue::Scalar(fields))
}

/// `10E0`: device info (product id, manufacture/firmware dates,
/// free-text description).
pub fn parser_10e0(payload: &str) -> Result<PayloadValue, PacketPayloadInvalid> {
    if payload.len() < 20 {
        return Err(PacketPayloadInvalid::new("10E0", "payload too short"));
    }
    let mut fields = Fields::new();
    let product_id = u16::from_str_radix(&payload[0..4], 16)
        .map_err(|_| PacketPayloadInvalid::new("10E0", "bad product_id"))?;
    fields.insert("product_id", Value::Int(i64::from(product_id)));
    if let Some(d) = crate::hex::hex_to_date(&payload[4..12]) {
        fields.insert("date_2", Value::Str(format!("{:04}-{:02}-{:02}", d.year, d.month, d.day)));
    }
    if let Some(d) = crate::hex::hex_to_date(&payload[12..20]) {
        fields.insert("date_1", Value::Str(format!("{:04}-{:02}-{:02}", d.year, d.month, d.day)));
    }
    fields.insert("description", Value::Str(hex_to_str(&payload[20..])));
    Ok(PayloadValue::Scalar(fields))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(verb: Verb, src_type: &'static str) -> ParseCtx<'static> {
        ParseCtx { verb, src_type, dst_type: "18", src: "01:145038", dst: "18:013393", len: 6, has_array: false }
    }

    #[test]
    fn single_device_decodes_zone_idx_and_role() {
        // idx=00, role=00 (zone_actuator), one long element whose device
        // hex 280001 packs to type 10 / address 1.
        let result = parser_000c("000000280001", &ctx(Verb::RP, "01")).expect("decodes");
        let fields = result.as_scalar().expect("scalar");
        assert_eq!(fields.get("zone_idx"), Some(&Value::Str("00".to_string())));
        assert_eq!(fields.get("device_role"), Some(&Value::Str("zone_actuator".to_string())));
        assert_eq!(fields.get("devices"), Some(&Value::Str("10:000001".to_string())));
    }

    #[test]
    fn rq_has_no_device_list() {
        let result = parser_000c("0000", &ctx(Verb::RQ, "01")).expect("decodes");
        let fields = result.as_scalar().expect("scalar");
        assert_eq!(fields.get("zone_idx"), Some(&Value::Str("00".to_string())));
        assert_eq!(fields.get("devices"), None);
    }

    #[test]
    fn dhw_role_maps_to_domain_fa() {
        let result = parser_000c("000D0D280001", &ctx(Verb::RP, "01")).expect("decodes");
        let fields = result.as_scalar().expect("scalar");
        assert_eq!(fields.get("domain_id"), Some(&Value::Str("FA".to_string())));
        assert_eq!(fields.get("device_role"), Some(&Value::Str("dhw_sensor".to_string())));
    }

    #[test]
    fn htg_at_idx_01_is_the_ht1_second_relay() {
        let result = parser_000c("010E0E280001", &ctx(Verb::RP, "01")).expect("decodes");
        let fields = result.as_scalar().expect("scalar");
        assert_eq!(fields.get("domain_id"), Some(&Value::Str("F9".to_string())));
        assert_eq!(fields.get("device_role"), Some(&Value::Str("heating_valve".to_string())));
    }

    #[test]
    fn app_role_maps_to_domain_fc() {
        let result = parser_000c("000F0F280001", &ctx(Verb::RP, "01")).expect("decodes");
        let fields = result.as_scalar().expect("scalar");
        assert_eq!(fields.get("domain_id"), Some(&Value::Str("FC".to_string())));
    }

    #[test]
    fn ufc_source_gets_ufh_idx_and_zone_idx() {
        let result = parser_000c("000905280001", &ctx(Verb::RP, "02")).expect("decodes");
        let fields = result.as_scalar().expect("scalar");
        assert_eq!(fields.get("ufh_idx"), Some(&Value::Str("00".to_string())));
        assert_eq!(fields.get("zone_idx"), Some(&Value::Str("05".to_string())));
    }

    #[test]
    fn long_elements_excluding_unbound_7f_slots() {
        // Three long (12-wide) elements sharing idx "00"; the middle one is
        // an unbound "7F" slot and must be dropped from the device list.
        let payload = "00000028000100007FFFFFFF000000280002";
        let result = parser_000c(payload, &ctx(Verb::RP, "01")).expect("decodes");
        let fields = result.as_scalar().expect("scalar");
        let devices = match fields.get("devices") {
            Some(Value::Str(s)) => s.clone(),
            other => panic!("expected a device list, got {other:?}"),
        };
        assert_eq!(devices.split(',').count(), 2);
    }

    #[test]
    fn unknown_role_byte_falls_back_to_unknown() {
        let result = parser_000c("000303280001", &ctx(Verb::RP, "01")).expect("decodes");
        let fields = result.as_scalar().expect("scalar");
        assert_eq!(fields.get("device_role"), Some(&Value::Str("unknown".to_string())));
    }
}
