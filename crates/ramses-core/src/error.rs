// SPDX-License-Identifier: Apache-2.0

//! Error types owned by the domain-model layer: command construction and
//! device-ID filtering. Frame/payload decode errors live in `ramses-proto`
//! and are re-exported here for convenience.

use thiserror::Error;

pub use ramses_proto::error::{AddressError, PacketAddrSetInvalid, PacketInvalid, PacketPayloadInvalid};

/// A command factory rejected its own arguments before a `Frame` was ever
/// built (e.g. an out-of-range zone index).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid command: {0}")]
pub struct CommandInvalid(pub String);

/// Device-ID filtering rejected a packet or command.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// `src` or `dst` appears in the block list.
    #[error("device {0} is block-listed")]
    Blocked(String),

    /// `enforce_known_list` is set and a device is not in the known list
    /// (nor a sentinel, nor the active gateway).
    #[error("device {0} is not in the known list (enforce mode)")]
    NotKnown(String),

    /// The same device id appears in both `known_list` and `block_list`.
    #[error("device {0} is in both known_list and block_list")]
    Overlap(String),
}
