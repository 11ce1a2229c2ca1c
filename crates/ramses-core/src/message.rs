// SPDX-License-Identifier: Apache-2.0

//! [`Message`]: a [`Packet`] whose payload has been decoded by its opcode
//! parser, with the routing-index (`zone_idx`/`domain_id`) merged into the
//! field map.

use ramses_proto::error::PacketPayloadInvalid;
use ramses_proto::parsers::{self, Fields, ParseCtx, PayloadValue, Value};

use crate::packet::Packet;

/// A packet with a decoded payload.
#[derive(Debug, Clone)]
pub struct Message {
    /// The underlying packet (timestamp + frame).
    pub packet: Packet,
    /// The decoded payload: one field map, or one per array element.
    pub payload: PayloadValue,
}

impl Message {
    /// Decode `packet`'s payload via its opcode's parser, merging the
    /// routing index (`zone_idx`/`domain_id`, derived from [`Frame::context`])
    /// into the resulting field map(s) when the parser didn't already
    /// supply one under that key.
    ///
    /// # Errors
    /// Propagates [`PacketPayloadInvalid`] from the opcode parser.
    pub fn decode(packet: Packet) -> Result<Self, PacketPayloadInvalid> {
        let frame = &packet.frame;
        let ctx = ParseCtx {
            verb: frame.verb,
            src_type: frame.addrs.src.device_type(),
            dst_type: frame.addrs.dst.device_type(),
            src: frame.addrs.src.id(),
            dst: frame.addrs.dst.id(),
            len: frame.len,
            has_array: frame.has_array(),
        };
        let mut payload = parsers::decode(&frame.code, &frame.payload, &ctx)?;
        merge_context(&mut payload, frame.context());
        Ok(Self { packet, payload })
    }

    /// The opcode of the underlying frame.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.packet.frame.code
    }

    /// The QoS/correlation header of the underlying frame.
    #[must_use]
    pub fn header(&self) -> &str {
        self.packet.frame.header()
    }

    /// This message's packet lifespan, with the `3220` (OpenTherm)
    /// schema/params/status refinement from spec.md §3 applied on top of
    /// [`Packet::lifespan`]: an OpenTherm frame's authoritative lifetime
    /// depends on which group its data-id belongs to, not just its code.
    #[must_use]
    pub fn lifespan(&self) -> std::time::Duration {
        if self.packet.frame.code != "3220" || self.packet.lifespan().is_zero() {
            return self.packet.lifespan();
        }
        let Some(payload) = self.packet.frame.payload.get(2..10) else {
            return self.packet.lifespan();
        };
        match ramses_proto::opentherm::decode_frame(payload) {
            Ok(ot) => ot.schema_kind.map_or_else(|| self.packet.lifespan(), ramses_proto::opentherm::schema_lifespan),
            Err(_) => self.packet.lifespan(),
        }
    }

    /// View the payload as a single field map, if it is one (not an array
    /// message).
    #[must_use]
    pub fn as_scalar(&self) -> Option<&Fields> {
        self.payload.as_scalar()
    }
}

fn merge_context(payload: &mut PayloadValue, ctx: Option<&str>) {
    let Some(ctx) = ctx else { return };
    let key = if ctx.len() == 2 && ctx.chars().all(|c| c.is_ascii_hexdigit()) {
        "zone_idx"
    } else {
        "domain_id"
    };
    match payload {
        PayloadValue::Scalar(fields) => {
            fields.entry(key).or_insert_with(|| Value::Str(ctx.to_string()));
        },
        PayloadValue::Array(_) => {
            // Array messages carry their own per-element index; the
            // frame-level context is not merged (spec.md §4.2: "the index
            // lives per-element in the decoded payload, not in the header").
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::parse_log_line;

    #[test]
    fn decodes_temperature_message() {
        let line =
            "2023-11-05T12:30:01.123456 RP --- 01:145038 18:000730 --:------ 30C9 003 0008D9";
        let pkt = parse_log_line(line).expect("valid line");
        let msg = Message::decode(pkt).expect("decodes");
        let fields = msg.as_scalar().expect("scalar");
        assert_eq!(fields.get("zone_idx"), Some(&Value::Str("00".to_string())));
    }

    #[test]
    fn array_message_is_not_given_a_frame_level_idx() {
        let line = "2023-11-05T12:30:01.123456  I --- 01:145038 --:------ 01:145038 30C9 006 \
                     0007D0010640";
        let pkt = parse_log_line(line).expect("valid line");
        let msg = Message::decode(pkt).expect("decodes");
        assert!(matches!(msg.payload, PayloadValue::Array(_)));
    }

    #[test]
    fn opentherm_status_data_id_uses_the_status_lifespan() {
        // data_id 0x18 (room_temp) is Status-classed; parity bit set to match.
        let line = "2023-11-05T12:30:01.123456  I --- 01:145038 --:------ 01:145038 3220 005 \
                     00841807D0";
        let pkt = parse_log_line(line).expect("valid line");
        let msg = Message::decode(pkt).expect("decodes");
        assert_eq!(msg.lifespan(), std::time::Duration::from_secs_f64(2.1 * 5.0 * 60.0));
    }
}
