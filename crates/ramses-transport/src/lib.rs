// SPDX-License-Identifier: Apache-2.0

//! Transport layer: serial, MQTT, and packet-log-replay backends, plus the
//! write pacing, sync-cycle avoidance, and active-gateway discovery every
//! backend shares (spec.md §4.6, §9).
//!
//! Nothing in `ramses-core` touches a byte of wire I/O; this crate is where
//! that starts, and everything above [`transport::Transport`] talks only in
//! [`ramses_proto::frame::Frame`] and [`ramses_core::packet::Packet`].

pub mod error;
pub mod gateway;
pub mod line;
pub mod mqtt;
pub mod pacing;
pub mod replay;
pub mod serial;
pub mod signature;
pub mod sync_tracker;
pub mod transport;

pub use error::{TransportMqttError, TransportSerialError, TransportSourceInvalid};
pub use transport::{Transport, TransportError, TransportSource};
