// SPDX-License-Identifier: Apache-2.0

//! The domain-model layer built on top of `ramses-proto`'s wire codec:
//! timestamped packets, decoded messages, application-built commands and
//! their QoS attributes, packet lifespans, device-ID filtering, and the
//! plain `serde` configuration structs spec.md §6 documents.
//!
//! Nothing in this crate performs I/O; that starts at `ramses-transport`.

pub mod command;
pub mod config;
pub mod env;
pub mod error;
pub mod filter;
pub mod message;
pub mod packet;

pub use command::{Command, Priority};
pub use message::Message;
pub use packet::{Packet, parse_log_line};
