// SPDX-License-Identifier: Apache-2.0

//! [`Command`]: an application-built [`Frame`] plus the QoS attributes that
//! tell the protocol FSM how to send it, and the handful of factory
//! functions the application layer calls instead of building frames by hand.

use std::time::Duration;

use ramses_proto::address::{AddrSet, HGI_DEVICE_ID, NON_DEVICE_ID, pkt_addrs};
use ramses_proto::frame::{Frame, Verb};

use crate::error::CommandInvalid;

/// Send priority. Numerically lower sorts first; matches spec.md §4.7's
/// ordered set `{HIGHEST=-4, HIGH=-2, DEFAULT=0, LOW=2, LOWEST=4}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(pub i8);

impl Priority {
    /// Time-critical: bind handshakes, retries.
    pub const HIGHEST: Self = Self(-4);
    /// Above default: interactive requests.
    pub const HIGH: Self = Self(-2);
    /// Ordinary traffic.
    pub const DEFAULT: Self = Self(0);
    /// Below default: background polling.
    pub const LOW: Self = Self(2);
    /// Lowest: bulk/opportunistic requests.
    pub const LOWEST: Self = Self(4);
}

impl Default for Priority {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// An application-built frame with its QoS dispatch attributes.
#[derive(Debug, Clone)]
pub struct Command {
    /// The frame to transmit.
    pub frame: Frame,
    /// `== frame.header()`: the fingerprint the FSM expects to see echoed.
    pub tx_header: String,
    /// The header of the expected reply, if any. `None` means the command
    /// has no reply phase (an `I`/`W` that nothing replies to).
    pub rx_header: Option<String>,
    /// Send priority; ties broken by enqueue order.
    pub priority: Priority,
    /// How many times to resend on echo/reply timeout before failing.
    pub max_retries: u8,
    /// Outer wall-clock timeout from enqueue; spec.md default 30s.
    pub timeout: Duration,
    /// Whether the FSM should wait for a reply after the echo. `None`
    /// resolves to "wait if this is an `RQ`", per spec.md §4.7 — except for
    /// `1FC9`, which never waits for a reply regardless.
    pub wait_for_reply: Option<bool>,
}

const DEFAULT_OUTER_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_RETRIES: u8 = 3;

impl Command {
    /// Build a command from a raw frame, deriving `tx_header` and defaulting
    /// `rx_header` to `None` (no reply expected).
    #[must_use]
    pub fn new(frame: Frame) -> Self {
        let tx_header = frame.header().to_string();
        let wait_for_reply = if frame.code == "1FC9" { Some(false) } else { None };
        Self {
            frame,
            tx_header,
            rx_header: None,
            priority: Priority::DEFAULT,
            max_retries: DEFAULT_MAX_RETRIES,
            timeout: DEFAULT_OUTER_TIMEOUT,
            wait_for_reply,
        }
    }

    /// Attach the header of the reply this command expects.
    #[must_use]
    pub fn expecting_reply(mut self, rx_header: impl Into<String>) -> Self {
        if self.frame.code != "1FC9" {
            self.rx_header = Some(rx_header.into());
        }
        self
    }

    /// Override the default priority.
    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Resolve `wait_for_reply` per spec.md §4.7: explicit `true`/`false`
    /// wins; otherwise wait iff this is an `RQ` and a reply header exists.
    #[must_use]
    pub fn should_wait_for_reply(&self) -> bool {
        match self.wait_for_reply {
            Some(explicit) => explicit,
            None => self.rx_header.is_some() && self.frame.verb == Verb::RQ,
        }
    }
}

/// Build a validated `AddrSet` the same way a wire frame's address fragment
/// would decode, so `src`/`dst` (and hence `Frame::header()`) come out right
/// for whichever of the three address-set patterns `a0`/`a1`/`a2` forms.
fn addr_set(a0: &str, a1: &str, a2: &str) -> Result<AddrSet, CommandInvalid> {
    pkt_addrs(&format!("{a0} {a1} {a2}")).map_err(|e| CommandInvalid(e.to_string()))
}

fn hex_idx(zone_idx: u8) -> Result<String, CommandInvalid> {
    if zone_idx > 0x0F && !(0xF6..=0xFF).contains(&zone_idx) {
        return Err(CommandInvalid(format!("zone/domain idx {zone_idx:#04X} out of range")));
    }
    Ok(format!("{zone_idx:02X}"))
}

/// `RQ` for the current zone temperature (`30C9`), addressed from the
/// generic HGI id (substituted for the real active-gateway id by the
/// protocol layer before transmission).
///
/// # Errors
/// [`CommandInvalid`] if `ctl_id` isn't a valid device id or `zone_idx` is
/// out of range.
pub fn get_zone_temp(ctl_id: &str, zone_idx: u8) -> Result<Command, CommandInvalid> {
    let idx = hex_idx(zone_idx)?;
    let addrs = addr_set(HGI_DEVICE_ID, ctl_id, NON_DEVICE_ID)?;
    let frame = Frame::new(Verb::RQ, "---", addrs, "30C9", &idx);
    let rx_header = format!("30C9|RP|{ctl_id}|{idx}");
    Ok(Command::new(frame).expecting_reply(rx_header).with_priority(Priority::HIGH))
}

/// `RQ` for zone parameters (`000A`: min/max setpoint, override flags).
///
/// # Errors
/// [`CommandInvalid`] if `ctl_id` isn't a valid device id or `zone_idx` is
/// out of range.
pub fn get_zone_params(ctl_id: &str, zone_idx: u8) -> Result<Command, CommandInvalid> {
    let idx = hex_idx(zone_idx)?;
    let addrs = addr_set(HGI_DEVICE_ID, ctl_id, NON_DEVICE_ID)?;
    let frame = Frame::new(Verb::RQ, "---", addrs, "000A", &idx);
    let rx_header = format!("000A|RP|{ctl_id}|{idx}");
    Ok(Command::new(frame).expecting_reply(rx_header))
}

/// `W` a new zone setpoint via `2309`.
///
/// # Errors
/// [`CommandInvalid`] if `ctl_id` isn't a valid device id or `zone_idx` is
/// out of range.
pub fn set_zone_temp(
    ctl_id: &str,
    zone_idx: u8,
    setpoint_c: f64,
) -> Result<Command, CommandInvalid> {
    let idx = hex_idx(zone_idx)?;
    let temp_hex = ramses_proto::hex::hex_from_temp(Some(setpoint_c));
    let addrs = addr_set(HGI_DEVICE_ID, ctl_id, NON_DEVICE_ID)?;
    let payload = format!("{idx}{temp_hex}");
    let frame = Frame::new(Verb::W, "---", addrs, "2309", &payload);
    let rx_header = format!("2309|I|{ctl_id}|{idx}");
    Ok(Command::new(frame).expecting_reply(rx_header).with_priority(Priority::HIGH))
}

/// `RQ` the schedule-change counter (`0006`) — the "has the schedule
/// changed" poll the application uses before fetching fragments.
///
/// # Errors
/// [`CommandInvalid`] if `ctl_id` isn't a valid device id.
pub fn get_schedule_version(ctl_id: &str) -> Result<Command, CommandInvalid> {
    let addrs = addr_set(HGI_DEVICE_ID, ctl_id, NON_DEVICE_ID)?;
    let frame = Frame::new(Verb::RQ, "---", addrs, "0006", "00");
    let rx_header = format!("0006|RP|{ctl_id}");
    Ok(Command::new(frame).expecting_reply(rx_header).with_priority(Priority::LOW))
}

/// `RQ` a single schedule fragment (`0404`), per spec.md §4.4's frag-number
/// framing.
///
/// # Errors
/// [`CommandInvalid`] if `ctl_id` isn't a valid device id or `zone_idx` is
/// out of range.
pub fn get_schedule_fragment(
    ctl_id: &str,
    zone_idx: u8,
    frag_number: u8,
) -> Result<Command, CommandInvalid> {
    let idx = hex_idx(zone_idx)?;
    let addrs = addr_set(HGI_DEVICE_ID, ctl_id, NON_DEVICE_ID)?;
    let payload = format!("{idx}20000800{frag_number:02X}00");
    let frame = Frame::new(Verb::RQ, "---", addrs, "0404", &payload);
    let rx_header = format!("0404|RP|{ctl_id}|{idx}");
    Ok(Command::new(frame).expecting_reply(rx_header).with_priority(Priority::LOW))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_zone_temp_has_expected_headers() {
        let cmd = get_zone_temp("01:145038", 0).expect("valid");
        assert_eq!(cmd.frame.code, "30C9");
        assert_eq!(cmd.frame.verb, Verb::RQ);
        assert_eq!(cmd.rx_header.as_deref(), Some("30C9|RP|01:145038|00"));
        assert!(cmd.should_wait_for_reply());
    }

    #[test]
    fn non_rq_without_explicit_wait_does_not_wait() {
        let cmd = set_zone_temp("01:145038", 1, 21.5).expect("valid");
        assert_eq!(cmd.frame.verb, Verb::W);
        assert!(!cmd.should_wait_for_reply());
    }

    #[test]
    fn out_of_range_zone_idx_is_rejected() {
        assert!(get_zone_temp("01:145038", 200).is_err());
    }

    #[test]
    fn binding_command_never_waits_for_reply() {
        let addrs = addr_set(NON_DEVICE_ID, NON_DEVICE_ID, "01:145038").expect("valid");
        let frame = Frame::new(Verb::W, "---", addrs, "1FC9", "00");
        let cmd = Command::new(frame).expecting_reply("1FC9|I|01:145038");
        assert!(cmd.rx_header.is_none());
        assert!(!cmd.should_wait_for_reply());
    }
}
