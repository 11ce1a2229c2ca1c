// SPDX-License-Identifier: Apache-2.0

//! Deterministic simulation harness for the RAMSES-II transport/protocol
//! stack.
//!
//! [`SimEnv`] is the [`ramses_core::env::Environment`] used here: it hands
//! out `tokio::time::Instant`s, which `turmoil` replaces with a virtual,
//! per-host clock for any task a `turmoil::Sim` drives. Running a test
//! inside `Sim::client`/`Sim::run` makes the protocol FSM's retry/timeout
//! waits (hundreds of milliseconds of real time, spec.md §4.7) resolve
//! instantly and reproducibly instead of actually sleeping.
//!
//! [`SimDriver`] wraps [`ramses_protocol::Fsm`] the way `ramses-transport`
//! does in production: enqueue a [`ramses_core::command::Command`], poll it
//! forward, feed it received frames, collect the actions it emits.

pub mod driver;
pub mod env;

pub use driver::SimDriver;
pub use env::SimEnv;
