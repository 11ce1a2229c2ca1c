// SPDX-License-Identifier: Apache-2.0

//! OpenTherm sub-codec: decodes the 32-bit frame carried inside a `3220`
//! payload (`00 MMDD AABB` hex -> `MM DD AA BB` OpenTherm bytes).

use crate::error::PacketPayloadInvalid;

/// The three-bit OpenTherm message type, from bits 4-6 of the first byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtMsgType {
    /// Master -> slave, read request.
    ReadData,
    /// Master -> slave, write request.
    WriteData,
    /// Malformed/invalid request.
    InvalidData,
    /// Reserved, not used.
    Reserved,
    /// Slave -> master, read acknowledgement with value.
    ReadAck,
    /// Slave -> master, write acknowledgement.
    WriteAck,
    /// Slave reports the data-id's value as invalid.
    DataInvalid,
    /// Slave does not recognise the data-id.
    UnknownDataId,
}

impl OtMsgType {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x07 {
            0 => Self::ReadData,
            1 => Self::WriteData,
            2 => Self::InvalidData,
            3 => Self::Reserved,
            4 => Self::ReadAck,
            5 => Self::WriteAck,
            6 => Self::DataInvalid,
            _ => Self::UnknownDataId,
        }
    }
}

/// The declared value shape for an OpenTherm data-id, dictating how the
/// two data bytes are decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtValueShape {
    /// Two independent bytes, high is flags, low is a plain count (u8).
    Flag8AndU8,
    /// Two independent unsigned bytes (e.g. product id + version).
    U8AndU8,
    /// A single 16-bit unsigned integer.
    U16,
    /// A single 16-bit signed integer, value in tenths (temperature).
    S16Tenths,
    /// Signed 8.8 fixed point (value / 256).
    F88,
    /// Signed 8.8 fixed point, percentage-typed (0.5% rounding).
    F88Percent,
    /// Signed 8.8 fixed point, flow-rate-typed (0.01 L/min rounding).
    F88FlowRate,
    /// Signed 8.8 fixed point, pressure-typed (0.1 bar rounding).
    F88Pressure,
}

/// Which schema group a data-id belongs to (drives packet lifespan).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtSchemaKind {
    /// Identity/capability, effectively static.
    Schema,
    /// User/installer-adjustable parameter.
    Params,
    /// Live status/telemetry.
    Status,
}

struct OtDataIdInfo {
    name: &'static str,
    shape: OtValueShape,
    kind: OtSchemaKind,
}

const fn info(name: &'static str, shape: OtValueShape, kind: OtSchemaKind) -> OtDataIdInfo {
    OtDataIdInfo { name, shape, kind }
}

fn lookup_data_id(id: u8) -> Option<OtDataIdInfo> {
    use OtSchemaKind::{Params, Schema, Status};
    use OtValueShape::{F88, F88FlowRate, F88Percent, F88Pressure, Flag8AndU8, S16Tenths, U8AndU8, U16};
    Some(match id {
        0 => info("status", Flag8AndU8, Status),
        1 => info("control_setpoint", F88, Params),
        2 => info("master_config", Flag8AndU8, Schema),
        3 => info("slave_config", Flag8AndU8, Schema),
        4 => info("command_code", U8AndU8, Status),
        5 => info("fault_flags", Flag8AndU8, Status),
        6 => info("remote_param_flags", Flag8AndU8, Schema),
        9 => info("remote_override_room_setpoint", F88, Params),
        10 => info("tsp_count", U8AndU8, Schema),
        12 => info("fhb_size", U8AndU8, Schema),
        13 => info("fhb_entry", U8AndU8, Schema),
        14 => info("max_rel_modulation_level", F88Percent, Params),
        15 => info("max_boiler_capacity", U8AndU8, Schema),
        16 => info("room_setpoint", F88, Params),
        17 => info("rel_modulation_level", F88Percent, Status),
        18 => info("ch_water_pressure", F88Pressure, Status),
        19 => info("dhw_flow_rate", F88FlowRate, Status),
        23 => info("room_setpoint_ch2", F88, Params),
        24 => info("room_temp", F88, Status),
        25 => info("boiler_water_temp", F88, Status),
        26 => info("dhw_temp", F88, Status),
        27 => info("outside_temp", F88, Status),
        28 => info("return_water_temp", F88, Status),
        29 => info("solar_storage_temp", F88, Status),
        30 => info("solar_collector_temp", F88, Status),
        31 => info("flow_temp_ch2", F88, Status),
        32 => info("dhw_temp_2", F88, Status),
        33 => info("exhaust_temp", S16Tenths, Status),
        48 => info("dhw_setpoint_bounds", U8AndU8, Schema),
        49 => info("max_ch_setpoint_bounds", U8AndU8, Schema),
        56 => info("dhw_setpoint", F88, Params),
        57 => info("max_ch_water_setpoint", F88, Params),
        100 => info("remote_override_function", Flag8AndU8, Status),
        115 => info("oem_diagnostic_code", U16, Status),
        116 => info("burner_starts", U16, Status),
        117 => info("ch_pump_starts", U16, Status),
        118 => info("dhw_pump_valve_starts", U16, Status),
        119 => info("dhw_burner_starts", U16, Status),
        120 => info("burner_operation_hours", U16, Status),
        121 => info("ch_pump_operation_hours", U16, Status),
        122 => info("dhw_pump_valve_operation_hours", U16, Status),
        123 => info("dhw_burner_operation_hours", U16, Status),
        124 => info("opentherm_version_master", F88, Schema),
        125 => info("opentherm_version_slave", F88, Schema),
        126 => info("master_product_version", U8AndU8, Schema),
        127 => info("slave_product_version", U8AndU8, Schema),
        _ => return None,
    })
}

/// A decoded OpenTherm data value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OtValue {
    /// High byte flags, low byte plain count.
    Flag8AndU8(u8, u8),
    /// Two independent bytes.
    U8AndU8(u8, u8),
    /// Plain 16-bit unsigned integer.
    U16(u16),
    /// Signed value in tenths of a degree.
    TenthsC(f64),
    /// Plain f8.8 fixed-point value.
    F88(f64),
    /// Percentage, rounded to the nearest 0.5%.
    Percent(f64),
    /// Flow rate in L/min, rounded to the nearest 0.01.
    FlowRate(f64),
    /// Pressure in bar, rounded to the nearest 0.1.
    Pressure(f64),
}

/// A fully decoded OpenTherm (`3220`) frame.
#[derive(Debug, Clone, PartialEq)]
pub struct OtFrame {
    /// Message type (read/write request or ack/invalid/unknown).
    pub msg_type: OtMsgType,
    /// The 8-bit data-id.
    pub data_id: u8,
    /// Human-readable name for the data-id, if recognised.
    pub name: Option<&'static str>,
    /// The decoded value, if the data-id is recognised.
    pub value: Option<OtValue>,
    /// Which schema group the data-id belongs to, if recognised.
    pub schema_kind: Option<OtSchemaKind>,
}

fn f88(hi: u8, lo: u8) -> f64 {
    let raw = i32::from((u16::from(hi) << 8) | u16::from(lo));
    let signed = if raw & 0x8000 != 0 { raw - 0x1_0000 } else { raw };
    f64::from(signed) / 256.0
}

fn round_to(value: f64, step: f64) -> f64 {
    (value / step).round() * step
}

/// Decode a `3220` payload's 4 OpenTherm data bytes (already stripped of
/// the leading `00` RAMSES envelope byte): `MMDDAABB`.
///
/// # Errors
/// Returns [`PacketPayloadInvalid`] if the payload isn't 8 hex digits, the
/// parity bit doesn't match, or the spare bits are non-zero.
pub fn decode_frame(payload: &str) -> Result<OtFrame, PacketPayloadInvalid> {
    if payload.len() != 8 {
        return Err(PacketPayloadInvalid::new("3220", format!("expected 8 hex digits, got {}", payload.len())));
    }
    let raw = u32::from_str_radix(payload, 16)
        .map_err(|_| PacketPayloadInvalid::new("3220", "not valid hex"))?;

    let parity_bit = (raw >> 31) & 1 != 0;
    let computed_parity = (raw & 0x7FFF_FFFF).count_ones() % 2 != 0;
    if parity_bit != computed_parity {
        return Err(PacketPayloadInvalid::new("3220", "parity check failed"));
    }

    let mm = ((raw >> 24) & 0xFF) as u8;
    if mm & 0x0F != 0 {
        return Err(PacketPayloadInvalid::new("3220", format!("spare bits non-zero: {mm:#04x}")));
    }
    let msg_type = OtMsgType::from_bits((mm & 0x70) >> 4);

    let data_id = ((raw >> 16) & 0xFF) as u8;
    let aa = ((raw >> 8) & 0xFF) as u8;
    let bb = (raw & 0xFF) as u8;

    let Some(info) = lookup_data_id(data_id) else {
        if msg_type != OtMsgType::UnknownDataId {
            return Err(PacketPayloadInvalid::new(
                "3220",
                format!("unknown data_id {data_id:#04x} with non-unknown msg_type"),
            ));
        }
        return Ok(OtFrame { msg_type, data_id, name: None, value: None, schema_kind: None });
    };

    let value = match info.shape {
        OtValueShape::Flag8AndU8 => OtValue::Flag8AndU8(aa, bb),
        OtValueShape::U8AndU8 => OtValue::U8AndU8(aa, bb),
        OtValueShape::U16 => OtValue::U16((u16::from(aa) << 8) | u16::from(bb)),
        OtValueShape::S16Tenths => {
            let raw16 = (i32::from(aa) << 8) | i32::from(bb);
            let signed = if raw16 & 0x8000 != 0 { raw16 - 0x1_0000 } else { raw16 };
            OtValue::TenthsC(f64::from(signed) / 100.0)
        },
        OtValueShape::F88 => OtValue::F88(f88(aa, bb)),
        OtValueShape::F88Percent => OtValue::Percent(round_to(f88(aa, bb), 0.5)),
        OtValueShape::F88FlowRate => OtValue::FlowRate(round_to(f88(aa, bb), 0.01)),
        OtValueShape::F88Pressure => OtValue::Pressure(round_to(f88(aa, bb), 0.1)),
    };

    Ok(OtFrame {
        msg_type,
        data_id,
        name: Some(info.name),
        value: Some(value),
        schema_kind: Some(info.kind),
    })
}

/// Packet lifespan for a `3220` frame, per spec.md §3's `schema / params /
/// status` row: `2.1 ×` the nominal broadcast interval for that group
/// (360s / 60min / 5min respectively), to tolerate one missed poll.
/// `None` for an unrecognised data-id (falls back to the generic default).
#[must_use]
pub fn schema_lifespan(kind: OtSchemaKind) -> std::time::Duration {
    use std::time::Duration;
    match kind {
        OtSchemaKind::Schema => Duration::from_secs_f64(2.1 * 360.0),
        OtSchemaKind::Params => Duration::from_secs_f64(2.1 * 60.0 * 60.0),
        OtSchemaKind::Status => Duration::from_secs_f64(2.1 * 5.0 * 60.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn decodes_room_temp_read_ack() {
        // msg_type READ_ACK (4) -> MM top bits 0100_xxxx, data_id 24 (0x18)
        // parity over lower 31 bits must be even; compute MM with correct parity bit.
        let data_id: u32 = 0x18;
        let aabb: u32 = 0x07D0; // 20.0 exactly in f8.8
        let mm_body: u32 = 0x4; // msg type bits, spare 0
        let without_parity = (mm_body << 24) | (data_id << 16) | aabb;
        let parity = (without_parity & 0x7FFF_FFFF).count_ones() % 2 != 0;
        let raw = if parity { without_parity | (1 << 31) } else { without_parity };
        let payload = format!("{raw:08X}");

        let frame = decode_frame(&payload).expect("valid frame");
        assert_eq!(frame.msg_type, OtMsgType::ReadAck);
        assert_eq!(frame.data_id, 0x18);
        assert_eq!(frame.value, Some(OtValue::F88(20.0)));
    }

    #[test]
    fn rejects_parity_failure() {
        // Deliberately flip the parity bit.
        let payload = "9C1807D0";
        assert!(decode_frame(payload).is_err());
    }

    proptest! {
        #[test]
        fn parity_is_always_consistent(body in 0u32..0x7FFF_FFFF) {
            let parity = body.count_ones() % 2 != 0;
            let raw = if parity { body | (1 << 31) } else { body };
            prop_assert_eq!((raw >> 31) & 1 != 0, (raw & 0x7FFF_FFFF).count_ones() % 2 != 0);
        }
    }
}
