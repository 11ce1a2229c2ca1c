// SPDX-License-Identifier: Apache-2.0

//! The `Frame`: the smallest syntactically valid unit on the wire.
//!
//! A frame is the ASCII line `<verb> <seqn> <addr0> <addr1> <addr2> <code>
//! <len> <payload>`, optionally preceded by an RSSI field on received
//! packets (stripped during parse; frame equality ignores it).

use std::fmt;
use std::sync::OnceLock;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::address::{AddrSet, pkt_addrs};
use crate::error::PacketInvalid;
use crate::schema;

/// One of the four RAMSES-II verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    /// Inform (`" I"`): an unsolicited broadcast/notification.
    I,
    /// Request (`"RQ"`).
    RQ,
    /// Reply (`"RP"`).
    RP,
    /// Write (`" W"`).
    W,
}

impl Verb {
    /// The exact two-character wire form, including the leading space for
    /// `I`/`W`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::I => " I",
            Self::RQ => "RQ",
            Self::RP => "RP",
            Self::W => " W",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "I" => Some(Self::I),
            "RQ" => Some(Self::RQ),
            "RP" => Some(Self::RP),
            "W" => Some(Self::W),
            _ => None,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

static FRAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
        ^(?:\d{3}|---)\s
        (?P<verb>\ I|RQ|RP|\ W)\s
        (?P<seqn>\d{3}|---)\s
        (?P<addrs>[0-9]{2}:[0-9]{6}\s[0-9]{2}:[0-9]{6}\s[0-9]{2}:[0-9]{6}|--:------\s--:------\s[0-9]{2}:[0-9]{6})\s
        (?P<code>[0-9A-Fa-f]{4})\s
        (?P<len>\d{3})\s
        (?P<payload>[0-9A-Fa-f]*)$
        ",
    )
    .expect("static regex is valid")
});

/// A parsed, validated frame.
pub struct Frame {
    /// The informational/request/reply/write verb.
    pub verb: Verb,
    /// Sequence number field, `"---"` if unused.
    pub seqn: String,
    /// The validated address triple plus derived `src`/`dst`.
    pub addrs: AddrSet,
    /// 4-hex-digit opcode, e.g. `"30C9"`.
    pub code: String,
    /// Declared payload length in bytes.
    pub len: usize,
    /// Raw hex payload, `2 * len` hex digits.
    pub payload: String,

    header: OnceLock<String>,
    context: OnceLock<Option<String>>,
    has_array: OnceLock<bool>,
}

impl Clone for Frame {
    fn clone(&self) -> Self {
        let header = OnceLock::new();
        if let Some(v) = self.header.get() {
            let _ = header.set(v.clone());
        }
        let context = OnceLock::new();
        if let Some(v) = self.context.get() {
            let _ = context.set(v.clone());
        }
        let has_array = OnceLock::new();
        if let Some(v) = self.has_array.get() {
            let _ = has_array.set(*v);
        }
        Self {
            verb: self.verb,
            seqn: self.seqn.clone(),
            addrs: self.addrs.clone(),
            code: self.code.clone(),
            len: self.len,
            payload: self.payload.clone(),
            header,
            context,
            has_array,
        }
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("verb", &self.verb)
            .field("seqn", &self.seqn)
            .field("src", &self.addrs.src.id())
            .field("dst", &self.addrs.dst.id())
            .field("code", &self.code)
            .field("len", &self.len)
            .field("payload", &self.payload)
            .finish()
    }
}

impl PartialEq for Frame {
    /// Equal iff everything from the verb onward matches — the leading RSSI
    /// field (not stored here) is never part of the comparison.
    fn eq(&self, other: &Self) -> bool {
        self.verb == other.verb
            && self.seqn == other.seqn
            && self.addrs.addr0.id() == other.addrs.addr0.id()
            && self.addrs.addr1.id() == other.addrs.addr1.id()
            && self.addrs.addr2.id() == other.addrs.addr2.id()
            && self.code == other.code
            && self.len == other.len
            && self.payload == other.payload
    }
}

impl Frame {
    /// Build a frame from already-validated components, typically by a
    /// command factory. Payload length is derived from `payload`.
    #[must_use]
    pub fn new(verb: Verb, seqn: &str, addrs: AddrSet, code: &str, payload: &str) -> Self {
        Self {
            verb,
            seqn: seqn.to_string(),
            addrs,
            code: code.to_uppercase(),
            len: payload.len() / 2,
            payload: payload.to_uppercase(),
            header: OnceLock::new(),
            context: OnceLock::new(),
            has_array: OnceLock::new(),
        }
    }

    /// Parse an ASCII wire line (with or without a leading RSSI field) into
    /// a `Frame`.
    ///
    /// # Errors
    /// Returns [`PacketInvalid::Malformed`] if the line doesn't match the
    /// frame grammar, [`PacketInvalid::LengthMismatch`] if the declared
    /// `len` doesn't match the payload's byte count (or exceeds 48), and
    /// [`PacketInvalid::AddrSetInvalid`] if the address triple is invalid.
    pub fn parse(line: &str) -> Result<Self, PacketInvalid> {
        let line = line.trim_end_matches(['\r', '\n']);
        let caps = FRAME_RE
            .captures(line)
            .ok_or_else(|| PacketInvalid::Malformed(line.to_string()))?;

        let verb = Verb::parse(&caps["verb"])
            .ok_or_else(|| PacketInvalid::Malformed(format!("bad verb in {line}")))?;
        let seqn = caps["seqn"].to_string();
        let addrs = pkt_addrs(&caps["addrs"])?;
        let code = caps["code"].to_uppercase();
        let declared: usize =
            caps["len"].parse().map_err(|_| PacketInvalid::Malformed(line.to_string()))?;
        let payload = caps["payload"].to_uppercase();

        let actual = payload.len() / 2;
        if payload.len() % 2 != 0 || actual != declared || declared > 48 {
            return Err(PacketInvalid::LengthMismatch { declared, actual });
        }

        Ok(Self {
            verb,
            seqn,
            addrs,
            code,
            len: declared,
            payload,
            header: OnceLock::new(),
            context: OnceLock::new(),
            has_array: OnceLock::new(),
        })
    }

    /// Render the frame back to its deterministic wire form (without the
    /// RSSI prefix). Round-trips with [`Frame::parse`] for any frame it
    /// produced.
    #[must_use]
    pub fn render(&self) -> String {
        format!(
            "{} {} {} {} {} {} {:03} {}",
            self.verb,
            self.seqn,
            self.addrs.addr0.id(),
            self.addrs.addr1.id(),
            self.addrs.addr2.id(),
            self.code,
            self.len,
            self.payload
        )
    }

    /// True if this frame is an array message: multiple fixed-width
    /// elements packed into one payload. Arrays only occur on `I` verbs
    /// (with documented exceptions) when the payload length is an exact
    /// multiple of the code's per-element length and the source is a
    /// controller-class device or addressed to itself.
    #[must_use]
    pub fn has_array(&self) -> bool {
        *self.has_array.get_or_init(|| {
            let Some(elem_len) = schema::array_element_len(&self.code) else { return false };
            if elem_len == 0 || self.payload.len() % (elem_len * 2) != 0 {
                return false;
            }
            if self.payload.is_empty() {
                return false;
            }
            let verb_ok = self.verb == Verb::I || schema::allows_array_on_non_i(&self.code);
            let src_ok = schema::is_controller_class(self.addrs.src.device_type())
                || self.addrs.src.id() == self.addrs.dst.id();
            verb_ok && src_ok
        })
    }

    /// The QoS fingerprint used to correlate commands with their echo/reply:
    /// `"{code}|{verb}|{device_id}[|{ctx}]"`.
    ///
    /// `device_id` is `src.id` for `I`/`RP` frames or whenever `src == dst`;
    /// otherwise it is `dst.id`. `1FC9` uses bespoke rules handled by the
    /// protocol layer, not here.
    #[must_use]
    pub fn header(&self) -> &str {
        self.header.get_or_init(|| {
            let device_id = if matches!(self.verb, Verb::I | Verb::RP)
                || self.addrs.src.id() == self.addrs.dst.id()
            {
                self.addrs.src.id()
            } else {
                self.addrs.dst.id()
            };
            match self.context() {
                Some(ctx) => format!("{}|{}|{device_id}|{ctx}", self.code, self.verb),
                None => format!("{}|{}|{device_id}", self.code, self.verb),
            }
        })
    }

    /// The opcode-specific routing index/context (e.g. a zone index or
    /// domain id), if this opcode has one. `None` for codes with no
    /// context-disambiguation rule.
    #[must_use]
    pub fn context(&self) -> Option<&str> {
        self.context
            .get_or_init(|| schema::context_of(&self.code, &self.payload, self.has_array()))
            .as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_point_to_point() {
        let line = " I --- 01:145038 --:------ 01:145038 1F09 003 FF073F";
        let frame = Frame::parse(line).expect("valid frame");
        assert_eq!(frame.render(), line);
    }

    #[test]
    fn round_trips_with_rssi_prefix() {
        let line = "RP --- 01:145038 18:013393 --:------ 000A 006 031002260B86";
        let with_rssi = format!("067 {line}");
        let frame = Frame::parse(&with_rssi).expect("valid frame");
        assert_eq!(frame.render(), line);
    }

    #[test]
    fn rejects_length_mismatch() {
        let line = " I --- 01:145038 --:------ 01:145038 1F09 004 FF073F";
        assert!(Frame::parse(line).is_err());
    }

    #[test]
    fn rejects_bad_address_set() {
        let line = " I --- 01:145038 02:123456 03:654321 1F09 003 FF073F";
        assert!(Frame::parse(line).is_err());
    }
}
