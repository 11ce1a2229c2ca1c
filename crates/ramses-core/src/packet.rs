// SPDX-License-Identifier: Apache-2.0

//! [`Packet`]: a timestamped [`Frame`], optionally recovered from a packet
//! log line, plus its lifespan (how long its decoded value stays
//! authoritative).

use std::time::Duration;

use chrono::{DateTime, Utc};
use ramses_proto::error::PacketInvalid;
use ramses_proto::frame::{Frame, Verb};

/// A packet: a `Frame` received (or replayed) at a given instant, plus
/// whatever the log line attached to it.
#[derive(Debug, Clone)]
pub struct Packet {
    /// When the packet was captured (microsecond precision, as logged).
    pub dtm: DateTime<Utc>,
    /// The decoded frame.
    pub frame: Frame,
    /// A `# comment` trailing the log line, if present.
    pub comment: Option<String>,
    /// A `* err_msg` trailing the log line, if present (the gateway's own
    /// error annotation, not a decode failure on our side).
    pub error_text: Option<String>,
}

/// `dtm ' ' frame [' < hint'] [' * err_msg'] [' # comment']`. Blank lines
/// and `#`-only lines are the caller's concern to skip; this only parses
/// one well-formed candidate line.
///
/// The `dtm` prefix is strict: the first 26 characters must be an
/// ISO-8601-with-microseconds timestamp. Everything else is forgiving.
///
/// # Errors
/// [`PacketInvalid::Malformed`] if the line is too short to hold a
/// timestamp, the timestamp doesn't parse, or the remaining frame text
/// doesn't parse as a [`Frame`].
pub fn parse_log_line(line: &str) -> Result<Packet, PacketInvalid> {
    const DTM_LEN: usize = 26;
    if line.len() < DTM_LEN + 1 {
        return Err(PacketInvalid::Malformed(line.to_string()));
    }
    let (dtm_str, rest) = line.split_at(DTM_LEN);
    let dtm = DateTime::parse_from_str(dtm_str, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|d| d.with_timezone(&Utc))
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(dtm_str, "%Y-%m-%d %H:%M:%S%.f")
                .map(|d| d.and_utc())
        })
        .map_err(|_| PacketInvalid::Malformed(line.to_string()))?;

    let rest = rest.trim_start();
    let (frame_part, comment) = match rest.split_once('#') {
        Some((f, c)) => (f.trim_end(), Some(c.trim().to_string())),
        None => (rest, None),
    };
    let (frame_part, error_text) = match frame_part.split_once('*') {
        Some((f, e)) => (f.trim_end(), Some(e.trim().to_string())),
        None => (frame_part, None),
    };
    let (frame_part, _hint) = match frame_part.split_once('<') {
        Some((f, h)) => (f.trim_end(), Some(h.trim().to_string())),
        None => (frame_part, None),
    };

    let frame = Frame::parse(frame_part)?;
    Ok(Packet { dtm, frame, comment, error_text })
}

impl Packet {
    /// Wrap an already-decoded frame with a capture timestamp; used by
    /// transports that didn't go through a log-line (serial/MQTT receive).
    #[must_use]
    pub fn new(dtm: DateTime<Utc>, frame: Frame) -> Self {
        Self { dtm, frame, comment: None, error_text: None }
    }

    /// How long this packet's decoded value remains authoritative. `RQ`/`W`
    /// verbs are never cached (spec.md §3): a request or write carries no
    /// standing value of its own.
    #[must_use]
    pub fn lifespan(&self) -> Duration {
        if matches!(self.frame.verb, Verb::RQ | Verb::W) {
            return Duration::ZERO;
        }
        ramses_proto::schema::lifespan(&self.frame.code, self.frame.has_array())
    }

    /// The timestamp at which this packet's value stops being authoritative,
    /// or `None` if it was never authoritative to begin with (`RQ`/`W`).
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let span = self.lifespan();
        if span.is_zero() {
            return None;
        }
        chrono::Duration::from_std(span).ok().map(|d| self.dtm + d)
    }

    /// Whether `self`'s value is still authoritative at `now`.
    #[must_use]
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|exp| now <= exp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_log_line() {
        let line =
            "2023-11-05T12:30:01.123456  I --- 01:145038 --:------ 01:145038 1F09 003 FF073F";
        let pkt = parse_log_line(line).expect("valid line");
        assert_eq!(pkt.frame.code, "1F09");
        assert!(pkt.comment.is_none());
        assert!(pkt.error_text.is_none());
    }

    #[test]
    fn parses_comment_and_error_suffix() {
        let line = "2023-11-05T12:30:01.123456  I --- 01:145038 --:------ 01:145038 1F09 003 \
                     FF073F * bad parity # schedule sync";
        let pkt = parse_log_line(line).expect("valid line");
        assert_eq!(pkt.comment.as_deref(), Some("schedule sync"));
        assert_eq!(pkt.error_text.as_deref(), Some("bad parity"));
    }

    #[test]
    fn rq_and_w_are_never_live() {
        let line = "2023-11-05T12:30:01.123456 RQ --- 18:000730 01:145038 --:------ 30C9 001 00";
        let pkt = parse_log_line(line).expect("valid line");
        assert_eq!(pkt.lifespan(), Duration::ZERO);
        assert!(pkt.expires_at().is_none());
    }

    #[test]
    fn default_lifespan_is_one_hour() {
        let line =
            "2023-11-05T12:30:01.123456  I --- 01:145038 --:------ 01:145038 10E0 002 0000";
        let pkt = parse_log_line(line).expect("valid line");
        assert_eq!(pkt.lifespan(), Duration::from_secs(24 * 3600));
    }
}
