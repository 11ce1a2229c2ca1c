// SPDX-License-Identifier: Apache-2.0

//! The `7FFF` "puzzle" packet: engine-version announcements, impersonation
//! warnings, free-form diagnostic messages, and the signature body used by
//! the transport's active-gateway discovery handshake.

use crate::hex::hex_to_str;

/// A decoded `7FFF` puzzle packet.
#[derive(Debug, Clone, PartialEq)]
pub enum PuzzlePacket {
    /// Engine version announcement (`10`/`20`), e.g. `"v0.31.10"`.
    EngineVersion {
        /// Semver string.
        version: String,
    },
    /// Impersonation announcement (`11`): `tx_header` of the command about
    /// to be sent on behalf of another device.
    Impersonation {
        /// The 15-char packed header (`code|verb|device_id`).
        header: String,
    },
    /// Free-form message (`12`/`13`), with or without a leading timestamp.
    Message {
        /// The decoded text.
        text: String,
    },
    /// Explicit discard / null marker (`7F`).
    Null,
    /// A subtype this decoder doesn't recognise; decoded best-effort.
    Unknown {
        /// The raw subtype byte, as hex.
        subtype: String,
        /// Remaining payload, hex-decoded as printable ASCII.
        payload: String,
    },
}

/// Decode a `7FFF` payload (hex, without the `00` length-field doubling).
#[must_use]
pub fn decode(payload: &str) -> PuzzlePacket {
    if payload.len() < 4 || &payload[0..2] != "00" {
        return PuzzlePacket::Unknown {
            subtype: payload.get(0..2).unwrap_or_default().to_string(),
            payload: hex_to_str(payload.get(2..).unwrap_or_default()),
        };
    }
    let subtype = &payload[2..4];
    let rest = &payload[4..];
    match subtype {
        "10" | "20" => PuzzlePacket::EngineVersion { version: hex_to_str(rest) },
        "11" => PuzzlePacket::Impersonation { header: hex_to_str(rest) },
        "12" | "13" => PuzzlePacket::Message { text: hex_to_str(rest) },
        "7F" => PuzzlePacket::Null,
        _ => PuzzlePacket::Unknown { subtype: subtype.to_string(), payload: hex_to_str(rest) },
    }
}

fn str_to_hex(s: &str) -> String {
    s.bytes().map(|b| format!("{b:02X}")).collect()
}

/// Build the payload hex for an engine-version announcement.
#[must_use]
pub fn encode_engine_version(version: &str) -> String {
    format!("0010{}", str_to_hex(version))
}

/// Build the payload hex for an impersonation announcement carrying the
/// 15-char packed header of the command about to be sent.
#[must_use]
pub fn encode_impersonation(header: &str) -> String {
    format!("0011{}", str_to_hex(header))
}

/// Build the payload hex for a signature body used in the active-gateway
/// discovery handshake: a process-unique opaque token echoed back by the
/// HGI that transmitted it.
#[must_use]
pub fn encode_signature(nonce: &str) -> String {
    format!("0012{}", str_to_hex(nonce))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_impersonation() {
        let payload = encode_impersonation("30C9W01:145038");
        match decode(&payload) {
            PuzzlePacket::Impersonation { header } => assert_eq!(header, "30C9W01:145038"),
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn signature_round_trips() {
        let payload = encode_signature("abc123");
        match decode(&payload) {
            PuzzlePacket::Message { text } => assert_eq!(text, "abc123"),
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
