// SPDX-License-Identifier: Apache-2.0

//! Sync-cycle avoidance: tracks each controller's next `I|1F09|I|2309|I|30C9`
//! burst so the transport can defer writes around it (spec.md §4.6 step 6).

use std::ops::{Add, Sub};
use std::time::Duration;

/// A controller's predicted next sync-burst instant.
#[derive(Debug, Clone)]
struct SyncDeadline<I> {
    controller_id: String,
    due: I,
}

/// The window around a predicted sync burst during which writes are
/// deferred: `[-8ms, +44ms]`.
pub const PRE_SYNC_MARGIN: Duration = Duration::from_millis(8);
/// See [`PRE_SYNC_MARGIN`].
pub const POST_SYNC_MARGIN: Duration = Duration::from_millis(44);

/// The short defer applied on the first clash, before re-checking.
pub const FIRST_DEFER: Duration = Duration::from_millis(10);

/// Fixed-capacity (3 controllers) ring of predicted sync deadlines. Owned by
/// a single `Transport`, never shared across tasks (spec.md §5: "confine to
/// the protocol/transport object; do not expose globally").
#[derive(Debug, Clone, Default)]
pub struct SyncTracker<I> {
    deadlines: Vec<SyncDeadline<I>>,
}

const MAX_CONTROLLERS: usize = 3;

impl<I> SyncTracker<I>
where
    I: Copy + Ord + Sub<Output = Duration> + Add<Duration, Output = I>,
{
    /// An empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self { deadlines: Vec::new() }
    }

    /// Record (or update) a controller's next sync deadline, observed from
    /// an `I|1F09|003` frame at `observed_at` declaring `remaining_seconds`
    /// until its next sync burst.
    ///
    /// Prunes entries whose deadline has already passed, then evicts the
    /// oldest-due entry if the cap of 3 controllers would be exceeded by a
    /// genuinely new controller.
    pub fn record(&mut self, controller_id: &str, observed_at: I, remaining_seconds: f64) {
        self.prune(observed_at);
        let due = observed_at + Duration::from_secs_f64(remaining_seconds.max(0.0));

        if let Some(entry) = self.deadlines.iter_mut().find(|e| e.controller_id == controller_id) {
            entry.due = due;
            return;
        }

        if self.deadlines.len() >= MAX_CONTROLLERS {
            if let Some((idx, _)) =
                self.deadlines.iter().enumerate().min_by_key(|(_, e)| e.due)
            {
                self.deadlines.remove(idx);
            }
        }
        self.deadlines.push(SyncDeadline { controller_id: controller_id.to_string(), due });
    }

    fn prune(&mut self, now: I) {
        self.deadlines.retain(|e| if now >= e.due { now - e.due <= POST_SYNC_MARGIN } else { true });
    }

    /// If `now` falls within `[-8ms, +44ms]` of any tracked controller's
    /// predicted sync deadline, return how long to defer the write.
    /// Otherwise `None` (clear to write now).
    #[must_use]
    pub fn deferral(&self, now: I) -> Option<Duration> {
        for entry in &self.deadlines {
            let in_window = if now >= entry.due {
                now - entry.due <= POST_SYNC_MARGIN
            } else {
                entry.due - now <= PRE_SYNC_MARGIN
            };
            if in_window {
                return Some(FIRST_DEFER);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
    struct Tick(i64);

    impl Sub for Tick {
        type Output = Duration;
        fn sub(self, rhs: Self) -> Duration {
            Duration::from_millis((self.0 - rhs.0).max(0) as u64)
        }
    }

    impl Add<Duration> for Tick {
        type Output = Tick;
        fn add(self, rhs: Duration) -> Tick {
            Tick(self.0 + rhs.as_millis() as i64)
        }
    }

    #[test]
    fn no_deferral_far_from_deadline() {
        let mut tracker: SyncTracker<Tick> = SyncTracker::new();
        tracker.record("01:145038", Tick(0), 1.887);
        assert!(tracker.deferral(Tick(500)).is_none());
    }

    #[test]
    fn caps_at_three_controllers() {
        let mut tracker: SyncTracker<Tick> = SyncTracker::new();
        tracker.record("01:111111", Tick(0), 1.0);
        tracker.record("01:222222", Tick(0), 2.0);
        tracker.record("01:333333", Tick(0), 3.0);
        tracker.record("01:444444", Tick(0), 4.0);
        assert_eq!(tracker.deadlines.len(), 3);
    }
}
