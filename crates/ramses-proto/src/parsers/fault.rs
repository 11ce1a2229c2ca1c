// SPDX-License-Identifier: Apache-2.0

//! Controller fault log: `0418`.

use super::{Fields, PayloadValue, Value};
use crate::error::PacketPayloadInvalid;
use crate::hex::hex_to_dts;

fn fault_state(code: &str) -> &'static str {
    match code {
        "00" => "fault",
        "40" => "restore",
        "C0" => "unknown_c0",
        _ => "unknown",
    }
}

fn fault_type(code: &str) -> &'static str {
    match code {
        "01" => "system_fault",
        "03" => "mains_low",
        "04" => "battery_low",
        "05" => "battery_error",
        "06" => "comms_fault",
        "07" => "sensor_fault",
        "0A" => "sensor_error",
        _ => "unknown",
    }
}

fn device_class(code: &str) -> &'static str {
    match code {
        "00" => "controller",
        "01" => "sensor",
        "02" => "setpoint",
        "04" => "actuator",
        "05" => "dhw_actuator",
        "06" => "rf_gateway",
        _ => "unknown",
    }
}

/// `0418`: one fault-log entry. A run of `00`s in the timestamp field means
/// a null (empty) log slot; every other semantic check here is
/// warning-only in the original, so a field we can't classify is reported
/// as its raw hex rather than failing the decode.
pub fn parser_0418(payload: &str) -> Result<PayloadValue, PacketPayloadInvalid> {
    if payload.len() < 44 {
        return Err(PacketPayloadInvalid::new("0418", "payload too short"));
    }

    let mut fields = Fields::new();

    let Some(timestamp) = hex_to_dts(&payload[18..30]) else {
        fields.insert("log_entry", Value::Null);
        return Ok(PayloadValue::Scalar(fields));
    };

    fields.insert(
        "timestamp",
        Value::Str(format!(
            "{:04}-{:02}-{:02}T{:02}:{:02}",
            timestamp.year, timestamp.month, timestamp.day, timestamp.hour, timestamp.minute
        )),
    );
    fields.insert("state", Value::Str(fault_state(&payload[2..4]).to_string()));
    fields.insert("fault_type", Value::Str(fault_type(&payload[8..10]).to_string()));

    let domain = &payload[10..12];
    let mut class = device_class(&payload[12..14]).to_string();
    if domain == "FC" && class == "actuator" {
        class = "app_relay".to_string();
    } else if domain == "FA" && class == "actuator" {
        class = "htg_relay".to_string();
    } else if domain == "F9" && class == "actuator" {
        class = "ht1_relay".to_string();
    }
    fields.insert("device_class", Value::Str(class));

    if &payload[12..14] != "00" {
        let key = if u8::from_str_radix(domain, 16).map(|v| v < 16).unwrap_or(false) {
            "zone_idx"
        } else {
            "domain_id"
        };
        fields.insert(key, Value::Str(domain.to_string()));
    }

    if !matches!(&payload[38..], "000000" | "000001" | "000002") {
        fields.insert("device_id", Value::Str(crate::address::hex_to_id(&payload[38..])));
    }

    Ok(PayloadValue::Scalar(fields))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_log_entry_decodes_to_none() {
        let null_payload = "00".to_string() + &"0".repeat(42);
        let result = parser_0418(&null_payload).expect("decodes");
        let fields = result.as_scalar().expect("scalar");
        assert_eq!(fields.get("log_entry"), Some(&Value::Null));
    }

    #[test]
    fn decodes_fault_state_and_type() {
        // idx=00 state=00(fault) [4:6]=00 _unknown_3=B0 type=01(system_fault)
        // domain=00 device_class=00(controller) _unknown_7=0000
        // timestamp=000000000001 (non-zero, so not treated as a null entry)
        // _unknown_15=FFFF7000 device_id field omitted (sentinel "000000")
        let payload = "0000" .to_string()
            + "00"
            + "B0"
            + "01"
            + "00"
            + "00"
            + "0000"
            + "000000000001"
            + "FFFF7000"
            + "000000";
        let result = parser_0418(&payload).expect("decodes");
        let fields = result.as_scalar().expect("scalar");
        assert_eq!(fields.get("state"), Some(&Value::Str("fault".to_string())));
        assert_eq!(fields.get("fault_type"), Some(&Value::Str("system_fault".to_string())));
        assert_eq!(fields.get("device_class"), Some(&Value::Str("controller".to_string())));
    }
}
