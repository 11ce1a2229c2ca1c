// SPDX-License-Identifier: Apache-2.0

//! Protocol-layer error taxonomy: queue admission failures and the terminal
//! reasons a job can fail to complete.

use thiserror::Error;

/// A command was rejected before it ever reached the send queue.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProtocolFsmError {
    /// The queue already holds its cap of 32 pending commands.
    #[error("send queue full (32 pending commands)")]
    QueueFull,
}

/// Why a job's retries were exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// No echo of our own transmission was ever heard.
    EchoFailed,
    /// The echo arrived but no reply followed.
    RplyFailed,
    /// The outer wall-clock timeout elapsed before either echo or reply.
    WaitFailed,
}

/// A job exhausted its retry budget (or outer timeout) without completing.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{tx_header}: send failed after {retries} retries ({kind:?})")]
pub struct ProtocolSendFailed {
    /// The failed command's tx header.
    pub tx_header: String,
    /// How many retries were attempted.
    pub retries: u8,
    /// Which phase the job was in when it gave up.
    pub kind: FailureKind,
}
