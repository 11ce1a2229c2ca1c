// SPDX-License-Identifier: Apache-2.0

//! Write pacing: the three constraints spec.md §4.6 step 5 imposes on every
//! outbound frame, applied in order. Pure logic — no sleeping here, callers
//! sleep for the `Duration` a `reserve()` call returns.
//!
//! Generic over the clock's `Instant` type so the exact same bucket/gap
//! arithmetic runs under `ramses-harness`'s virtual clock as under
//! production wall time.

use std::ops::Sub;
use std::time::Duration;

/// Minimum gap enforced between any two writes.
pub const INTER_WRITE_GAP: Duration = Duration::from_millis(50);

/// Bit-bucket capacity: `38400 * 0.01 * 60` bits (one minute at a 1% duty
/// cycle, 38.4 kbit/s link rate).
pub const DUTY_CYCLE_CAPACITY_BITS: f64 = 38_400.0 * 0.01 * 60.0;

/// Refill rate: `38400 * 0.01` bit/s.
pub const DUTY_CYCLE_FILL_RATE: f64 = 38_400.0 * 0.01;

/// Bits "spent" transmitting a frame whose hex payload is `payload_hex_len`
/// characters long: `330 + 10 * len(payload_hex)`.
#[must_use]
pub fn frame_bits(payload_hex_len: usize) -> f64 {
    330.0 + 10.0 * payload_hex_len as f64
}

/// Token-bucket duty-cycle limiter plus the inter-write gap. One instance is
/// owned by a single `Transport`; it is not `Sync` and is never shared
/// across tasks.
#[derive(Debug, Clone)]
pub struct DutyCycleLimiter<I> {
    available_bits: f64,
    last_refill: Option<I>,
    last_write: Option<I>,
}

impl<I> Default for DutyCycleLimiter<I> {
    fn default() -> Self {
        Self { available_bits: DUTY_CYCLE_CAPACITY_BITS, last_refill: None, last_write: None }
    }
}

impl<I> DutyCycleLimiter<I>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    /// A fresh limiter with a full bucket.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn refill(&mut self, now: I) {
        if let Some(last) = self.last_refill {
            if now > last {
                let elapsed = (now - last).as_secs_f64();
                self.available_bits =
                    (self.available_bits + elapsed * DUTY_CYCLE_FILL_RATE).min(DUTY_CYCLE_CAPACITY_BITS);
            }
        }
        self.last_refill = Some(now);
    }

    /// How long the caller must wait (from `now`) before it is permitted to
    /// write a frame whose hex payload is `payload_hex_len` characters long.
    /// Internally reserves the bits and records `now + wait` as the last
    /// write instant — callers must actually write after waiting that long
    /// (or not call `reserve` again before they do).
    pub fn reserve(&mut self, now: I, payload_hex_len: usize) -> Duration {
        self.refill(now);

        let gap_wait = match self.last_write {
            Some(last) if now - last < INTER_WRITE_GAP => INTER_WRITE_GAP - (now - last),
            _ => Duration::ZERO,
        };

        let needed = frame_bits(payload_hex_len);
        let duty_wait = if self.available_bits >= needed {
            Duration::ZERO
        } else {
            Duration::from_secs_f64((needed - self.available_bits) / DUTY_CYCLE_FILL_RATE)
        };

        let wait = gap_wait.max(duty_wait);
        self.available_bits = (self.available_bits - needed).max(0.0);
        self.last_write = Some(now);
        wait
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

    #[test]
    fn first_write_is_never_delayed() {
        let mut limiter = DutyCycleLimiter::new();
        assert_eq!(limiter.reserve(Tick(0), 6), Duration::ZERO);
    }

    #[test]
    fn back_to_back_writes_enforce_inter_write_gap() {
        let mut limiter = DutyCycleLimiter::new();
        limiter.reserve(Tick(0), 6);
        let wait = limiter.reserve(Tick(10), 6);
        assert_eq!(wait, Duration::from_millis(40));
    }

    #[test]
    fn exhausted_bucket_forces_a_wait() {
        let mut limiter = DutyCycleLimiter::new();
        // Spend the whole bucket in one shot with a huge payload.
        let huge_payload_chars = (DUTY_CYCLE_CAPACITY_BITS / 10.0) as usize;
        limiter.reserve(Tick(0), huge_payload_chars);
        // Immediately try again: bucket should be near zero, so duty-cycle
        // wait dominates the inter-write gap.
        let wait = limiter.reserve(Tick(50), 6);
        assert!(wait > INTER_WRITE_GAP);
    }

    #[test]
    fn bucket_refills_over_time() {
        let mut limiter = DutyCycleLimiter::new();
        let huge_payload_chars = (DUTY_CYCLE_CAPACITY_BITS / 10.0) as usize;
        limiter.reserve(Tick(0), huge_payload_chars);
        // A full minute later the bucket should be back near capacity.
        let wait = limiter.reserve(Tick(60_000), 6);
        assert_eq!(wait, Duration::ZERO);
    }
}
