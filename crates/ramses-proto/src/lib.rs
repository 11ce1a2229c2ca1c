// SPDX-License-Identifier: Apache-2.0

//! Wire-level codec for the RAMSES-II RF protocol: device addresses, frame
//! (packet line) parsing, hex field helpers, per-opcode payload parsers, and
//! the OpenTherm and puzzle-packet sub-protocols carried inside it.
//!
//! This crate has no I/O of its own — it only turns bytes into typed values
//! and back. The `ramses-core` crate builds the `Packet`/`Message`/`Command`
//! layer on top of it.

pub mod address;
pub mod error;
pub mod frame;
pub mod hex;
pub mod opentherm;
pub mod parsers;
pub mod puzzle;
pub mod schema;
