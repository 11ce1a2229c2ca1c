// SPDX-License-Identifier: Apache-2.0

//! Active-gateway discovery: the signature handshake spec.md §4.6 step 3
//! describes. Pure state machine — the `Transport` drives it with ticks and
//! received frames, and executes the `Action`s it returns.

use std::ops::{Add, Sub};
use std::time::Duration;

use ramses_proto::frame::{Frame, Verb};
use ramses_proto::puzzle::{self, PuzzlePacket};

use crate::error::TransportSerialError;

/// Interval between signature retransmissions.
pub const RETRY_INTERVAL: Duration = Duration::from_millis(50);
/// Maximum number of signature attempts before giving up.
pub const MAX_TRIES: u32 = 24;

/// What the driver should do after calling into [`SignatureHandshake`].
#[derive(Debug)]
pub enum SignatureAction {
    /// Write this frame to the wire now.
    Send(Frame),
    /// The handshake is done: `hgi_id` is the active gateway's device id.
    Resolved(String),
    /// No attempts remain and no echo arrived: open must fail.
    Failed(TransportSerialError),
}

/// The active-gateway signature handshake (spec.md §4.6 step 3).
#[derive(Debug, Clone)]
pub struct SignatureHandshake<I> {
    nonce: String,
    tries: u32,
    last_sent: Option<I>,
    resolved: bool,
}

fn signature_frame(nonce: &str) -> Frame {
    use ramses_proto::address::{HGI_DEVICE_ID, NON_DEVICE_ID};
    // Broadcast self-announcement: addr2 carries the sender (us, still under
    // the generic placeholder id) with addr0/addr1 both NON. The gateway
    // substitutes its real hardware address when it transmits this over RF,
    // so the echo we read back carries the real id in the same slot.
    let addrs = ramses_proto::address::pkt_addrs(&format!(
        "{NON_DEVICE_ID} {NON_DEVICE_ID} {HGI_DEVICE_ID}"
    ))
    .expect("sentinel triple is always a valid broadcast address set");
    Frame::new(Verb::I, "---", addrs, "7FFF", &puzzle::encode_signature(nonce))
}

impl<I> SignatureHandshake<I>
where
    I: Copy + Ord + Sub<Output = Duration> + Add<Duration, Output = I>,
{
    /// Start a handshake with a process-unique nonce (the caller supplies
    /// the random bytes, typically from `ramses_core::env::Environment`).
    #[must_use]
    pub fn start(nonce_bytes: u32) -> Self {
        Self { nonce: format!("{nonce_bytes:08X}"), tries: 0, last_sent: None, resolved: false }
    }

    /// The first action to execute: always a `Send`.
    #[must_use]
    pub fn first_send(&mut self, now: I) -> SignatureAction {
        self.tries = 1;
        self.last_sent = Some(now);
        SignatureAction::Send(signature_frame(&self.nonce))
    }

    /// Called periodically (at least as often as [`RETRY_INTERVAL`]).
    /// Returns the next action, if the retry interval has elapsed.
    pub fn tick(&mut self, now: I) -> Option<SignatureAction> {
        if self.resolved {
            return None;
        }
        let due = self.last_sent.is_none_or(|last| now - last >= RETRY_INTERVAL);
        if !due {
            return None;
        }
        if self.tries >= MAX_TRIES {
            return Some(SignatureAction::Failed(TransportSerialError::SignatureTimeout {
                tries: self.tries,
            }));
        }
        self.tries += 1;
        self.last_sent = Some(now);
        Some(SignatureAction::Send(signature_frame(&self.nonce)))
    }

    /// Inspect a received frame; resolves the handshake if its payload
    /// echoes our signature.
    pub fn on_frame(&mut self, frame: &Frame) -> Option<SignatureAction> {
        if self.resolved || frame.code != "7FFF" {
            return None;
        }
        if let PuzzlePacket::Message { text } = puzzle::decode(&frame.payload) {
            if text == self.nonce {
                self.resolved = true;
                return Some(SignatureAction::Resolved(frame.addrs.src.id().to_string()));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
    struct Tick(u64);

    impl Sub for Tick {
        type Output = Duration;
        fn sub(self, rhs: Self) -> Duration {
            Duration::from_millis(self.0.saturating_sub(rhs.0))
        }
    }
    impl Add<Duration> for Tick {
        type Output = Tick;
        fn add(self, rhs: Duration) -> Tick {
            Tick(self.0 + rhs.as_millis() as u64)
        }
    }

    #[test]
    fn resolves_on_matching_echo() {
        let mut hs: SignatureHandshake<Tick> = SignatureHandshake::start(0xDEAD_BEEF);
        let send = hs.first_send(Tick(0));
        let SignatureAction::Send(sent_frame) = send else { panic!("expected Send") };

        // Simulate the echo arriving from the real HGI's address.
        let addrs = ramses_proto::address::pkt_addrs("--:------ --:------ 18:013393").unwrap();
        let echo = Frame::new(Verb::I, "---", addrs, "7FFF", &sent_frame.payload);

        match hs.on_frame(&echo) {
            Some(SignatureAction::Resolved(id)) => assert_eq!(id, "18:013393"),
            other => panic!("expected Resolved, got {other:?}"),
        }
    }

    #[test]
    fn gives_up_after_max_tries() {
        let mut hs: SignatureHandshake<Tick> = SignatureHandshake::start(1);
        hs.first_send(Tick(0));
        let mut now = Tick(0);
        let mut failed = false;
        for _ in 0..MAX_TRIES + 1 {
            now = now + RETRY_INTERVAL;
            if let Some(SignatureAction::Failed(_)) = hs.tick(now) {
                failed = true;
                break;
            }
        }
        assert!(failed);
    }
}
