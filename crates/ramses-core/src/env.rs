// SPDX-License-Identifier: Apache-2.0

//! Environment abstraction for deterministic testing.
//!
//! Decouples transport/protocol logic from wall-clock time and randomness so
//! that the same state machines can run against a real clock in production
//! and a virtual clock under `ramses-harness`'s turmoil simulation.

use std::time::Duration;

/// Abstract environment providing time, randomness, and async sleep.
///
/// Implementations MUST guarantee `now()` never goes backwards within one
/// execution, and that `random_bytes()` is deterministic for a given seed in
/// simulation (so replaying a failing seed reproduces the failure).
pub trait Environment: Clone + Send + Sync + 'static {
    /// The instant type this environment hands out: `std::time::Instant` in
    /// production, `turmoil::Instant` (or similar virtual time) in sim.
    type Instant: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>;

    /// Current time (monotonic).
    fn now(&self) -> Self::Instant;

    /// Sleep for `duration`. The only async method on this trait; driver
    /// code calls it, protocol/FSM logic never does.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Fill `buffer` with random bytes (puzzle-packet nonces, jitter).
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Convenience: a random `u32`, e.g. for a puzzle-packet nonce.
    fn random_u32(&self) -> u32 {
        let mut bytes = [0u8; 4];
        self.random_bytes(&mut bytes);
        u32::from_be_bytes(bytes)
    }
}

/// Production environment: the real clock and OS entropy.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealEnv;

impl Environment for RealEnv {
    type Instant = std::time::Instant;

    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        use rand::RngCore;
        rand::thread_rng().fill_bytes(buffer);
    }
}
