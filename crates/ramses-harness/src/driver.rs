// SPDX-License-Identifier: Apache-2.0

//! [`SimDriver`]: drives a [`ramses_protocol::Fsm`] against a [`ramses_core::env::Environment`],
//! the way `ramses-transport::Transport` drives one in production, minus
//! the actual wire I/O.

use std::ops::Sub;
use std::time::Duration;

use ramses_core::command::Command;
use ramses_core::env::Environment;
use ramses_proto::frame::Frame;
use ramses_protocol::error::ProtocolFsmError;
use ramses_protocol::fsm::{Fsm, FsmAction, FsmState, GatewayCapability};
use ramses_core::config::QosMode;

/// Poll interval used by [`SimDriver::run_until_settled`]. Finer than
/// [`ramses_protocol::fsm::ECHO_RETRY_STEP`] so no retry window is missed.
const POLL_STEP: Duration = Duration::from_millis(10);

/// Wraps an [`Fsm`] with the [`Environment`] that supplies its clock, and
/// accumulates every action the FSM has emitted so a test can assert on the
/// whole run instead of one `poll`/`on_frame` call at a time.
pub struct SimDriver<E: Environment> {
    env: E,
    fsm: Fsm<E::Instant>,
    history: Vec<FsmAction>,
}

impl<E: Environment> SimDriver<E>
where
    E::Instant: Sub<Output = Duration>,
{
    /// Build a driver around a fresh, empty FSM.
    #[must_use]
    pub fn new(env: E, qos_mode: QosMode) -> Self {
        Self { env, fsm: Fsm::new(qos_mode), history: Vec::new() }
    }

    /// Record the active gateway's real device id, as the transport's
    /// signature handshake would.
    pub fn set_active_hgi(&mut self, id: impl Into<String>) {
        self.fsm.set_active_hgi(id.into());
    }

    /// Record which firmware family is driving the serial port.
    pub fn set_gateway_capability(&mut self, capability: GatewayCapability) {
        self.fsm.set_gateway_capability(capability);
    }

    /// Current observable FSM state.
    #[must_use]
    pub fn state(&self) -> FsmState {
        self.fsm.state()
    }

    /// Every action the FSM has emitted so far, oldest first.
    #[must_use]
    pub fn history(&self) -> &[FsmAction] {
        &self.history
    }

    /// Enqueue a command for transmission, stamped with the environment's
    /// current time as its enqueue instant.
    ///
    /// # Errors
    /// [`ProtocolFsmError::QueueFull`] if the send queue is already full.
    pub fn enqueue(&mut self, command: Command) -> Result<(), ProtocolFsmError> {
        let now = self.env.now();
        self.fsm.enqueue(command, now)
    }

    /// Poll the FSM once at the environment's current time, recording and
    /// returning whatever actions it emits.
    pub fn poll(&mut self) -> Vec<FsmAction> {
        let actions = self.fsm.poll(self.env.now());
        self.history.extend(actions.iter().cloned());
        actions
    }

    /// Feed a received frame to the FSM's echo/reply correlation.
    pub fn on_frame(&mut self, frame: &Frame) -> Vec<FsmAction> {
        let actions = self.fsm.on_frame(frame, self.env.now());
        self.history.extend(actions.iter().cloned());
        actions
    }

    /// Poll repeatedly, sleeping [`POLL_STEP`] between attempts, until the
    /// active job completes or fails, or `deadline` elapses without either.
    /// Returns the terminal action if one was reached.
    ///
    /// Intended to run inside a `turmoil::Sim` host, where `E::sleep`
    /// advances a virtual clock instead of the wall clock: a 30s outer
    /// timeout resolves in a simulation step, not 30 real seconds.
    pub async fn run_until_settled(&mut self, deadline: Duration) -> Option<FsmAction> {
        let start = self.env.now();
        loop {
            for action in self.poll() {
                if matches!(action, FsmAction::JobDone { .. } | FsmAction::JobFailed(_)) {
                    return Some(action);
                }
            }
            if self.env.now() - start > deadline {
                return None;
            }
            self.env.sleep(POLL_STEP).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Instant;

    use ramses_core::command::get_zone_temp;

    use super::*;

    /// A minimal, synchronous-only [`Environment`] for driver-level unit
    /// tests that never call [`SimDriver::run_until_settled`] (so `sleep`
    /// never actually needs to be awaited under a runtime).
    #[derive(Clone)]
    struct StepEnv(Arc<Mutex<Instant>>);

    impl StepEnv {
        fn new() -> Self {
            Self(Arc::new(Mutex::new(Instant::now())))
        }
    }

    impl Environment for StepEnv {
        type Instant = Instant;

        fn now(&self) -> Self::Instant {
            #[allow(clippy::unwrap_used, reason = "test-only environment")]
            { *self.0.lock().unwrap() }
        }

        fn sleep(&self, _duration: Duration) -> impl std::future::Future<Output = ()> + Send {
            std::future::ready(())
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            buffer.fill(0);
        }
    }

    #[test]
    fn enqueue_then_poll_sends_a_frame() {
        let mut driver = SimDriver::new(StepEnv::new(), QosMode::Full);
        driver.enqueue(get_zone_temp("01:145038", 0).expect("valid command")).expect("queue has room");
        let actions = driver.poll();
        assert!(matches!(actions.as_slice(), [FsmAction::SendFrame(_)]));
        assert_eq!(driver.state(), FsmState::WantEcho);
    }
}
