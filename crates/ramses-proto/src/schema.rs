// SPDX-License-Identifier: Apache-2.0

//! Per-opcode schema tables: array element lengths, routing-index (context)
//! derivation, controller-class device types, and packet lifespans.
//!
//! This is the Rust analogue of the original package's `ramses.py`
//! `CODES_SCHEMA` / `CODE_IDX_*` tables: a handful of small, explicit
//! lookup tables keyed by 4-hex-digit opcode, consulted by [`crate::frame`]
//! and [`crate::parsers`].

use std::time::Duration;

/// True if `device_type` belongs to a controller-class device (eligible to
/// originate an array message): CTL (`01`), PRG (`23`), UFC (`02`).
#[must_use]
pub fn is_controller_class(device_type: &str) -> bool {
    matches!(device_type, "01" | "02" | "23")
}

/// Per-opcode fixed element byte-length for array messages, or `None` if
/// the opcode never carries an array.
#[must_use]
pub fn array_element_len(code: &str) -> Option<usize> {
    match code {
        "0009" => Some(3),
        "000A" => Some(6),
        "2249" => Some(7),
        "2309" => Some(3),
        "30C9" => Some(3),
        "3150" => Some(2),
        "22F2" => Some(3),
        _ => None,
    }
}

/// A handful of array-bearing opcodes are also legitimately sent by
/// non-controller devices (documented exceptions to the verb/src rule).
#[must_use]
pub fn allows_array_on_non_i(code: &str) -> bool {
    matches!(code, "0009")
}

/// Derive the opcode-specific routing index / context fragment used in the
/// QoS header fingerprint, e.g. a zone index or domain id.
///
/// Returns `None` for opcodes with no per-element disambiguation, or for
/// array messages (the index lives per-element in the decoded payload, not
/// in the header).
#[must_use]
pub fn context_of(code: &str, payload: &str, has_array: bool) -> Option<String> {
    if has_array || payload.len() < 2 {
        return None;
    }
    match code {
        "0008" | "0009" | "000A" | "0418" | "1060" | "1100" | "2309" | "2349" | "30C9" | "3150" => {
            Some(payload[0..2].to_string())
        },
        "3B00" | "3EF0" | "3EF1" if payload.starts_with("FC") => Some("FC".to_string()),
        _ => None,
    }
}

/// The packet lifespan (TTL for treating a received value as authoritative)
/// for a given `(code, is_array)` pair. Default is 60 minutes.
#[must_use]
pub fn lifespan(code: &str, has_array: bool) -> Duration {
    match code {
        "0005" | "000C" | "10E0" | "0404" => Duration::from_secs(24 * 3600),
        "0006" => Duration::from_secs(3600),
        "1F09" => Duration::from_secs(360),
        "000A" if has_array => Duration::from_secs(360),
        "2309" | "30C9" => {
            if has_array {
                Duration::from_secs(360)
            } else {
                Duration::from_secs(30 * 60)
            }
        },
        "313F" => Duration::from_secs(3),
        _ => Duration::from_secs(3600),
    }
}

/// OpenTherm (`3220`) sub-schema lifespans, multiplied against the base
/// interval the way the original scales schema/params/status differently.
#[must_use]
pub fn opentherm_lifespan(kind: OpenThermSchemaKind) -> Duration {
    const FACTOR: f64 = 2.1;
    match kind {
        OpenThermSchemaKind::Schema => Duration::from_secs_f64(FACTOR * 360.0),
        OpenThermSchemaKind::Params => Duration::from_secs_f64(FACTOR * 60.0),
        OpenThermSchemaKind::Status => Duration::from_secs_f64(FACTOR * 5.0 * 60.0),
    }
}

/// Which OpenTherm data-id group a given id belongs to, for lifespan
/// purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenThermSchemaKind {
    /// Identity/capability data, rarely changes.
    Schema,
    /// User-adjustable parameters.
    Params,
    /// Live status/telemetry.
    Status,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn controller_class_codes() {
        assert!(is_controller_class("01"));
        assert!(!is_controller_class("13"));
    }

    #[test]
    fn array_element_lengths() {
        assert_eq!(array_element_len("30C9"), Some(3));
        assert_eq!(array_element_len("1F09"), None);
    }
}
