// SPDX-License-Identifier: Apache-2.0

//! Transport-layer error taxonomy, mirroring the severity split
//! `ramses_core::error` uses for the protocol layer: a source is either
//! invalid before anything is opened, or a live port/session fails.

use thiserror::Error;

/// A configured transport source could not even be attempted.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportSourceInvalid {
    /// The `serial://` or `mqtt://` URL didn't parse.
    #[error("invalid transport url {0:?}")]
    BadUrl(String),
    /// The scheme wasn't one of the supported backends.
    #[error("unsupported transport scheme {0:?}")]
    UnsupportedScheme(String),
    /// A packet-log replay source named a file that doesn't exist, or is
    /// empty.
    #[error("replay source {0:?} could not be read")]
    ReplayUnreadable(String),
}

/// A serial (or serial-like) port failed during open or operation.
#[derive(Debug, Error)]
pub enum TransportSerialError {
    /// The OS-level port failed to open.
    #[error("failed to open serial port {port:?}: {source}")]
    OpenFailed {
        /// Port path, e.g. `/dev/ttyUSB0`.
        port: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The active-gateway signature handshake exhausted its retry budget.
    #[error("no echo matched our signature after {tries} attempts")]
    SignatureTimeout {
        /// How many signature frames were sent.
        tries: u32,
    },
    /// A read or write on an already-open port failed.
    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// An MQTT broker connection failed during open or operation.
#[derive(Debug, Error)]
pub enum TransportMqttError {
    /// The broker connection could not be established or was lost.
    #[error("mqtt connection error: {0}")]
    Connection(String),
    /// A received message's JSON envelope (`{"ts": ..., "msg": ...}`)
    /// failed to parse.
    #[error("malformed mqtt envelope: {0}")]
    BadEnvelope(#[from] serde_json::Error),
}
