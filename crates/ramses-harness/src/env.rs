// SPDX-License-Identifier: Apache-2.0

//! [`SimEnv`]: the [`ramses_core::env::Environment`] implementation used
//! under `turmoil`. Time comes from `tokio::time`, which `turmoil` replaces
//! with a virtual, host-local clock for any task it drives — the exact same
//! `sleep`/`Instant` calls [`ramses_core::env::RealEnv`] makes, just backed
//! by simulated time instead of the OS.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::SeedableRng;
use rand::RngCore;
use rand_chacha::ChaCha8Rng;
use ramses_core::env::Environment;

/// A deterministic environment seeded once per simulation run.
///
/// Cloning shares the same RNG state (via `Arc<Mutex<_>>`) so every host in
/// a `turmoil::Sim` that holds a clone draws from the same reproducible
/// stream, keyed only by the initial `seed`.
#[derive(Clone)]
pub struct SimEnv {
    rng: Arc<Mutex<ChaCha8Rng>>,
}

impl SimEnv {
    /// Build a simulation environment from a fixed seed. Running the same
    /// scenario with the same seed reproduces the same randomness and, under
    /// `turmoil`, the same scheduling.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self { rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))) }
    }
}

impl Environment for SimEnv {
    type Instant = tokio::time::Instant;

    fn now(&self) -> Self::Instant {
        tokio::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        #[allow(clippy::unwrap_used, reason = "test-only harness, a poisoned lock means a prior test panicked")]
        let mut rng = self.rng.lock().unwrap();
        rng.fill_bytes(buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_yields_same_bytes() {
        let a = SimEnv::new(7);
        let b = SimEnv::new(7);
        let mut buf_a = [0u8; 8];
        let mut buf_b = [0u8; 8];
        a.random_bytes(&mut buf_a);
        b.random_bytes(&mut buf_b);
        assert_eq!(buf_a, buf_b);
    }

    #[test]
    fn different_seeds_yield_different_bytes() {
        let a = SimEnv::new(1);
        let b = SimEnv::new(2);
        let mut buf_a = [0u8; 16];
        let mut buf_b = [0u8; 16];
        a.random_bytes(&mut buf_a);
        b.random_bytes(&mut buf_b);
        assert_ne!(buf_a, buf_b);
    }
}
