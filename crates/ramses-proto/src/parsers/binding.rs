// SPDX-License-Identifier: Apache-2.0

//! The `1FC9` binding handshake: `offer` / `accept` / `confirm`.

use super::{Fields, ParseCtx, PayloadValue, Value};
use crate::address::ALL_DEVICE_ID;
use crate::error::PacketPayloadInvalid;
use crate::frame::Verb;

/// One `(domain_id, opcode, device_id)` binding triple.
fn binding_triple(seqx: &str) -> String {
    format!("{}|{}|{}", &seqx[0..2], &seqx[2..6], crate::address::hex_to_id(&seqx[6..12]))
}

/// `1FC9`: a three-phase binding handshake. Phase is inferred from the verb
/// and how `dst` relates to `src`, exactly as the offerer/accepter/confirmer
/// address their own frames, not from payload length (a `confirm` can be as
/// short as one byte, but so can a same-length `offer` for a single opcode):
/// the offering device sends `I` to itself or to the broadcast id
/// (`63:262142`); the accepting device echoes back a `W` addressed to the
/// offerer (so `dst != src`); the offerer then sends a further `I` to
/// confirm.
pub fn parser_1fc9(payload: &str, ctx: &ParseCtx<'_>) -> Result<PayloadValue, PacketPayloadInvalid> {
    let phase = if ctx.verb == Verb::I && (ctx.dst == ctx.src || ctx.dst == ALL_DEVICE_ID) {
        "offer"
    } else if ctx.verb == Verb::W && ctx.dst != ctx.src {
        "accept"
    } else if ctx.verb == Verb::I {
        "confirm"
    } else {
        "unknown"
    };

    let mut fields = Fields::new();
    fields.insert("phase", Value::Str(phase.to_string()));

    if phase == "confirm" && payload.len() == 2 {
        fields.insert("bindings", Value::Str(payload.to_string()));
        return Ok(PayloadValue::Scalar(fields));
    }

    if payload.len() < 12 || payload.len() % 12 != 0 {
        return Err(PacketPayloadInvalid::new("1FC9", "payload not a multiple of 6 bytes"));
    }

    let bindings: Vec<String> = payload.as_bytes().chunks(12).map(|c| binding_triple(std::str::from_utf8(c).unwrap_or_default())).collect();
    fields.insert("bindings", Value::Str(bindings.join(";")));
    Ok(PayloadValue::Scalar(fields))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offer_addressed_to_self_decodes_binding_triples() {
        let ctx = ParseCtx {
            verb: Verb::I,
            src_type: "01",
            dst_type: "01",
            src: "01:145038",
            dst: "01:145038",
            len: 6,
            has_array: false,
        };
        let result = parser_1fc9("00230906368E", &ctx).expect("decodes");
        let fields = result.as_scalar().expect("scalar");
        assert_eq!(fields.get("phase"), Some(&Value::Str("offer".to_string())));
        assert_eq!(fields.get("bindings"), Some(&Value::Str("00|2309|01:145038".to_string())));
    }

    #[test]
    fn offer_addressed_to_broadcast_is_also_an_offer() {
        let ctx = ParseCtx {
            verb: Verb::I,
            src_type: "01",
            dst_type: "63",
            src: "01:145038",
            dst: ALL_DEVICE_ID,
            len: 6,
            has_array: false,
        };
        let result = parser_1fc9("00230906368E", &ctx).expect("decodes");
        let fields = result.as_scalar().expect("scalar");
        assert_eq!(fields.get("phase"), Some(&Value::Str("offer".to_string())));
    }

    #[test]
    fn w_addressed_back_to_the_offerer_is_an_accept() {
        let ctx = ParseCtx {
            verb: Verb::W,
            src_type: "13",
            dst_type: "01",
            src: "13:035462",
            dst: "01:145038",
            len: 6,
            has_array: false,
        };
        let result = parser_1fc9("00230906368E", &ctx).expect("decodes");
        let fields = result.as_scalar().expect("scalar");
        assert_eq!(fields.get("phase"), Some(&Value::Str("accept".to_string())));
    }

    #[test]
    fn short_i_not_addressed_to_self_or_broadcast_is_a_confirm() {
        let ctx = ParseCtx {
            verb: Verb::I,
            src_type: "01",
            dst_type: "--",
            src: "01:145038",
            dst: "--:------",
            len: 1,
            has_array: false,
        };
        let result = parser_1fc9("00", &ctx).expect("decodes");
        let fields = result.as_scalar().expect("scalar");
        assert_eq!(fields.get("phase"), Some(&Value::Str("confirm".to_string())));
    }
}
