// SPDX-License-Identifier: Apache-2.0

//! Error types for the wire-codec layer.
//!
//! These never propagate above the protocol boundary except as a failed
//! send-future or a dropped, logged packet: lower-layer errors are data, not
//! panics.

use thiserror::Error;

/// A frame failed to parse or re-render.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PacketInvalid {
    /// The line did not match the frame grammar at all.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// `len(payload) != 2 * int(len)`, or `int(len) > 48`.
    #[error("payload length mismatch: header says {declared} bytes, payload has {actual}")]
    LengthMismatch {
        /// Length declared in the `len` field.
        declared: usize,
        /// Actual number of bytes implied by the hex payload.
        actual: usize,
    },

    /// The address triple did not match any of the three valid patterns.
    #[error("invalid address set: {0}")]
    AddrSetInvalid(#[from] PacketAddrSetInvalid),
}

/// The three-address field did not match any valid pattern (point-to-point,
/// legacy point-to-point, or broadcast).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid address set: {0}")]
pub struct PacketAddrSetInvalid(pub String);

/// The payload's regex/length matched, but a semantic invariant inside it
/// did not (for example, an OpenTherm parity failure or a reserved byte with
/// an unexpected value).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid payload for code {code}: {reason}")]
pub struct PacketPayloadInvalid {
    /// The 4-hex-digit opcode being decoded.
    pub code: String,
    /// Human-readable reason.
    pub reason: String,
}

impl PacketPayloadInvalid {
    /// Construct a payload-invalid error for `code` with a formatted reason.
    pub fn new(code: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { code: code.into(), reason: reason.into() }
    }
}

/// Address construction/parsing failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// The device id did not match `^[0-9]{2}:[0-9]{6}$` (or a sentinel).
    #[error("invalid device_id: {0}")]
    InvalidDeviceId(String),
}
