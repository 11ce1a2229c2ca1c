// SPDX-License-Identifier: Apache-2.0

//! QoS send/retry state machine: a priority send queue plus the FSM that
//! correlates our own echo and the addressee's reply against a sent
//! command, retries on timeout, and raises impersonation alerts (spec.md
//! §4.7, §4.8).
//!
//! This crate is pure: no clock reads, no I/O. [`fsm::Fsm`] takes `now: I`
//! and returns [`fsm::FsmAction`]s; `ramses-transport::Transport` (or
//! `ramses-harness`'s simulation driver) is what actually calls `send`/
//! `recv` and owns a clock.

pub mod error;
pub mod fsm;
pub mod queue;

pub use error::{FailureKind, ProtocolFsmError, ProtocolSendFailed};
pub use fsm::{Fsm, FsmAction, FsmState, GatewayCapability};
pub use queue::{QUEUE_CAPACITY, SendQueue};
