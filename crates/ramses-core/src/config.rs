// SPDX-License-Identifier: Apache-2.0

//! Strongly-typed configuration structs for the keys spec.md §6 documents.
//!
//! These model the original package's voluptuous schema as plain `serde`
//! structs (spec.md §9): a caller builds one from whatever config format
//! they use (YAML, TOML, JSON) via `serde`'s `Deserialize`, and validation
//! beyond basic shape happens explicitly in `TryFrom`.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;

use crate::error::FilterError;
use crate::filter::{DeviceFilter, KnownDeviceInfo};

/// QoS behaviour: see spec.md §4.7 "Selective QoS".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QosMode {
    /// Full QoS on every command.
    #[default]
    Full,
    /// No QoS: write once, resolve immediately.
    Disabled,
    /// QoS only for the codes that must be reliable (`0006`, `0404`, `1FC9`).
    Selective,
}

/// Codes that get QoS treatment in [`QosMode::Selective`] mode.
pub const SELECTIVE_QOS_CODES: [&str; 3] = ["0006", "0404", "1FC9"];

/// `port_config.*`: serial line discipline (spec.md §6).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PortConfig {
    /// Baud rate; 115200 (default) or 57600.
    pub baud: u32,
    /// Use DSR/DTR flow control (default: no, per spec.md §6).
    pub dsr_dtr: bool,
    /// Use RTS/CTS flow control (default: no).
    pub rts_cts: bool,
    /// Use XON/XOFF flow control (default: yes).
    pub xon_xoff: bool,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self { baud: 115_200, dsr_dtr: false, rts_cts: false, xon_xoff: true }
    }
}

/// `packet_log.*`: log sink with optional rotation.
#[derive(Debug, Clone, Deserialize)]
pub struct PacketLogConfig {
    /// Destination file path.
    pub file: String,
    /// Rotate after this many bytes, if set.
    pub rotate_bytes: Option<u64>,
    /// Rotate at local midnight if set (daily rotation).
    pub rotate_daily: bool,
}

/// `use_regex.{inbound,outbound}`: pattern -> replacement maps applied to
/// raw frame text before/after decode.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegexConfig {
    /// Substitutions applied to lines received from the transport.
    #[serde(default)]
    pub inbound: HashMap<String, String>,
    /// Substitutions applied to lines about to be written.
    #[serde(default)]
    pub outbound: HashMap<String, String>,
}

/// The full set of configuration keys spec.md §6 documents.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Read-only: never send (no signature, no writes).
    pub disable_sending: bool,
    /// QoS behaviour.
    pub disable_qos: Option<QosMode>,
    /// Treat `known_list` as an allow-list.
    pub enforce_known_list: bool,
    /// Opaque tag forwarded verbatim to the transport (evofw3 firmware
    /// flag); not interpreted by the engine.
    pub evofw_flag: Option<String>,
    /// Inbound/outbound regex substitutions.
    pub use_regex: RegexConfig,
    /// Packet log sink.
    pub packet_log: Option<PacketLogConfig>,
    /// Serial port options.
    pub port_config: PortConfig,
    /// Known devices, keyed by device id.
    pub known_list: HashMap<String, KnownDeviceEntry>,
    /// Blocked devices, keyed by device id.
    pub block_list: HashMap<String, KnownDeviceEntry>,
}

/// Deserializable form of [`KnownDeviceInfo`] (a struct rather than a unit
/// so an empty `{}` entry, common in the original's YAML, still parses).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct KnownDeviceEntry {
    /// See [`KnownDeviceInfo::alias`].
    pub alias: Option<String>,
    /// See [`KnownDeviceInfo::class`].
    pub class: Option<String>,
    /// See [`KnownDeviceInfo::faked`].
    pub faked: bool,
    /// See [`KnownDeviceInfo::scheme`].
    pub scheme: Option<String>,
}

impl From<KnownDeviceEntry> for KnownDeviceInfo {
    fn from(e: KnownDeviceEntry) -> Self {
        Self { alias: e.alias, class: e.class, faked: e.faked, scheme: e.scheme }
    }
}

impl TryFrom<&EngineConfig> for DeviceFilter {
    type Error = FilterError;

    fn try_from(cfg: &EngineConfig) -> Result<Self, Self::Error> {
        let known: HashMap<String, KnownDeviceInfo> =
            cfg.known_list.iter().map(|(k, v)| (k.clone(), v.clone().into())).collect();
        let blocked: HashSet<String> = cfg.block_list.keys().cloned().collect();
        DeviceFilter::new(known, blocked, cfg.enforce_known_list)
    }
}

impl EngineConfig {
    /// Resolve `disable_qos`/`disable_sending` down to a single [`QosMode`].
    /// `disable_sending` forces QoS off outright (nothing is ever
    /// retransmitted on a read-only port).
    #[must_use]
    pub fn qos_mode(&self) -> QosMode {
        if self.disable_sending {
            return QosMode::Disabled;
        }
        self.disable_qos.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_port_config_matches_spec() {
        let cfg = PortConfig::default();
        assert_eq!(cfg.baud, 115_200);
        assert!(cfg.xon_xoff);
        assert!(!cfg.rts_cts);
    }

    #[test]
    fn json_round_trip_for_engine_config() {
        let json = r#"{
            "enforce_known_list": true,
            "known_list": {"18:013393": {"class": "HGI"}},
            "block_list": {"99:999999": {}}
        }"#;
        let cfg: EngineConfig = serde_json::from_str(json).expect("valid json");
        assert!(cfg.enforce_known_list);
        let filter = DeviceFilter::try_from(&cfg).expect("disjoint");
        assert_eq!(filter.configured_hgi(), Some("18:013393"));
    }

    #[test]
    fn disable_sending_forces_qos_disabled() {
        let mut cfg = EngineConfig::default();
        cfg.disable_sending = true;
        cfg.disable_qos = Some(QosMode::Full);
        assert_eq!(cfg.qos_mode(), QosMode::Disabled);
    }
}
