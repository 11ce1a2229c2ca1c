// SPDX-License-Identifier: Apache-2.0

//! Replay backend: feeds pre-recorded packet-log lines (or any in-memory
//! line list) through the same `LineReader` pipeline a live serial/MQTT
//! backend would use, so `ramses-harness` and `ramses-protocol`'s tests can
//! exercise the full receive path without real I/O.

use crate::error::TransportSourceInvalid;
use crate::line::LineReader;

/// An ordered, in-memory source of raw wire lines, replayed one at a time.
#[derive(Debug, Clone, Default)]
pub struct ReplayBackend {
    lines: std::collections::VecDeque<String>,
    written: Vec<String>,
    reader: LineReader,
}

impl ReplayBackend {
    /// Build a replay source from an explicit line list (already in wire
    /// order, with or without a leading packet-log timestamp).
    #[must_use]
    pub fn from_lines(lines: impl IntoIterator<Item = String>) -> Self {
        Self {
            lines: lines.into_iter().collect(),
            written: Vec::new(),
            reader: LineReader::new(),
        }
    }

    /// Parse `text` as a packet-log file (one frame per non-blank,
    /// non-comment-only line) and build a replay source from it.
    ///
    /// # Errors
    /// Returns [`TransportSourceInvalid::ReplayUnreadable`] if `text`
    /// contains no usable lines.
    pub fn from_log_text(text: &str) -> Result<Self, TransportSourceInvalid> {
        let lines: Vec<String> = text
            .lines()
            .map(str::trim_end)
            .filter(|l| !l.is_empty() && !l.trim_start().starts_with('#'))
            .map(str::to_string)
            .collect();
        if lines.is_empty() {
            return Err(TransportSourceInvalid::ReplayUnreadable("empty packet log".to_string()));
        }
        Ok(Self::from_lines(lines))
    }

    /// Advance the source by one line, if any remain, feeding it through the
    /// same normalisation/reassembly path a live backend uses.
    pub fn pump(&mut self) -> bool {
        let Some(line) = self.lines.pop_front() else { return false };
        self.reader.feed(line.as_bytes());
        self.reader.feed(b"\n");
        true
    }

    /// Pop the next normalised line ready for decode, pumping the source
    /// first if the reader's queue is currently empty.
    pub fn next_line(&mut self) -> Option<String> {
        if let Some(line) = self.reader.next_line() {
            return Some(line);
        }
        if self.pump() { self.reader.next_line() } else { None }
    }

    /// Record a line the protocol layer wanted to write; replay sources
    /// never actually transmit, but harness tests assert against this log.
    pub fn record_write(&mut self, line: &str) {
        self.written.push(line.to_string());
    }

    /// Every line recorded via [`Self::record_write`], in order.
    #[must_use]
    pub fn written(&self) -> &[String] {
        &self.written
    }

    /// True once every pre-recorded line has been delivered.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.lines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replays_lines_in_order() {
        let mut backend = ReplayBackend::from_lines(vec![
            " I --- 01:145038 --:------ 01:145038 1F09 003 FF073F".to_string(),
            "RP --- 01:145038 18:013393 --:------ 000A 006 031002260B86".to_string(),
        ]);
        let first = backend.next_line().expect("first line");
        assert!(first.contains("1F09"));
        let second = backend.next_line().expect("second line");
        assert!(second.contains("000A"));
        assert!(backend.next_line().is_none());
        assert!(backend.is_exhausted());
    }

    #[test]
    fn skips_comment_and_blank_lines_from_log_text() {
        let text = "# header comment\n\n I --- 01:145038 --:------ 01:145038 1F09 003 FF073F\n";
        let mut backend = ReplayBackend::from_log_text(text).expect("valid log");
        assert!(backend.next_line().is_some());
        assert!(backend.next_line().is_none());
    }

    #[test]
    fn rejects_empty_log_text() {
        assert!(ReplayBackend::from_log_text("# just a comment\n").is_err());
    }

    #[test]
    fn records_writes_for_assertions() {
        let mut backend = ReplayBackend::default();
        backend.record_write("RQ --- 18:000730 01:145038 --:------ 30C9 001 00");
        assert_eq!(backend.written().len(), 1);
    }
}
