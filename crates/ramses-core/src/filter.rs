// SPDX-License-Identifier: Apache-2.0

//! Device-ID filtering: known/block lists and active-gateway detection
//! (spec.md §4.8).

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use ramses_proto::address::{ALL_DEVICE_ID, NON_DEVICE_ID};

/// How long a foreign-gateway warning is suppressed for, once raised
/// (spec.md §4.8: "warned at most once per day").
const FOREIGN_GATEWAY_WARNING_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

use crate::error::FilterError;

/// Metadata the application may attach to a known device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownDeviceInfo {
    /// A human-friendly alias, e.g. `"Upstairs TRV"`.
    pub alias: Option<String>,
    /// A device-class override (otherwise inferred from the id prefix).
    pub class: Option<String>,
    /// Whether this is a faked (software-simulated) device.
    pub faked: bool,
    /// Vendor/firmware "scheme" tag, used by the `22F1`/`31D9` family of
    /// parsers to pick a vendor-specific decode.
    pub scheme: Option<String>,
}

/// Device-ID filter: known/block lists plus the active-HGI comparison
/// spec.md §4.8 describes.
#[derive(Debug, Clone, Default)]
pub struct DeviceFilter {
    known_list: HashMap<String, KnownDeviceInfo>,
    block_list: HashSet<String>,
    enforce_known_list: bool,
    active_hgi: Option<String>,
    warned_foreign: HashMap<String, Instant>,
}

impl DeviceFilter {
    /// Build a filter from disjoint known/block lists.
    ///
    /// # Errors
    /// [`FilterError::Overlap`] if any device id appears in both lists.
    pub fn new(
        known_list: HashMap<String, KnownDeviceInfo>,
        block_list: HashSet<String>,
        enforce_known_list: bool,
    ) -> Result<Self, FilterError> {
        if let Some(dup) = known_list.keys().find(|id| block_list.contains(*id)) {
            return Err(FilterError::Overlap(dup.clone()));
        }
        Ok(Self {
            known_list,
            block_list,
            enforce_known_list,
            active_hgi: None,
            warned_foreign: HashMap::new(),
        })
    }

    /// Record the active gateway id discovered by the transport's signature
    /// handshake. Compared against the single `HGI`-classed known_list entry
    /// to detect a mismatch or a foreign gateway.
    pub fn set_active_hgi(&mut self, hgi_id: impl Into<String>) {
        self.active_hgi = Some(hgi_id.into());
    }

    fn is_sentinel(id: &str) -> bool {
        id == NON_DEVICE_ID || id == ALL_DEVICE_ID
    }

    fn is_permitted(&self, id: &str) -> bool {
        Self::is_sentinel(id)
            || self.known_list.contains_key(id)
            || self.active_hgi.as_deref() == Some(id)
    }

    /// Decide whether a packet/command between `src` and `dst` is allowed.
    ///
    /// Rule order (spec.md §4.8): block list wins outright; in *enforce*
    /// mode both ids (barring sentinels and the active HGI) must be known;
    /// otherwise everything not blocked passes.
    ///
    /// # Errors
    /// [`FilterError::Blocked`] or [`FilterError::NotKnown`].
    pub fn check(&self, src: &str, dst: &str) -> Result<(), FilterError> {
        for id in [src, dst] {
            if self.block_list.contains(id) {
                return Err(FilterError::Blocked(id.to_string()));
            }
        }
        if self.enforce_known_list {
            for id in [src, dst] {
                if !self.is_permitted(id) {
                    return Err(FilterError::NotKnown(id.to_string()));
                }
            }
        }
        Ok(())
    }

    /// The device id classed `HGI` in the known list, if exactly one exists.
    #[must_use]
    pub fn configured_hgi(&self) -> Option<&str> {
        self.known_list
            .iter()
            .find(|(_, info)| info.class.as_deref() == Some("HGI"))
            .map(|(id, _)| id.as_str())
    }

    /// True if `id` looks like a second, unrecognised `18:` gateway — the
    /// "foreign gateway" spec.md §4.8 says to warn about at most once per
    /// day.
    ///
    /// Returns `true` (and records the warning) the first time a given
    /// foreign id is observed, and again each time a full day has elapsed
    /// since the last warning for that id; callers should log a warning
    /// when this returns `true` and suppress it otherwise.
    pub fn note_foreign_gateway(&mut self, id: &str) -> bool {
        if !id.starts_with("18:") || self.known_list.contains_key(id) {
            return false;
        }
        if self.configured_hgi() == Some(id) {
            return false;
        }
        let now = Instant::now();
        match self.warned_foreign.get(id) {
            Some(last) if now.duration_since(*last) < FOREIGN_GATEWAY_WARNING_INTERVAL => false,
            _ => {
                self.warned_foreign.insert(id.to_string(), now);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(enforce: bool) -> DeviceFilter {
        let mut known = HashMap::new();
        known.insert(
            "18:013393".to_string(),
            KnownDeviceInfo { class: Some("HGI".to_string()), ..Default::default() },
        );
        known.insert("01:145038".to_string(), KnownDeviceInfo::default());
        let mut blocked = HashSet::new();
        blocked.insert("99:999999".to_string());
        DeviceFilter::new(known, blocked, enforce).expect("disjoint lists")
    }

    #[test]
    fn overlap_between_lists_is_rejected() {
        let mut known = HashMap::new();
        known.insert("01:145038".to_string(), KnownDeviceInfo::default());
        let mut blocked = HashSet::new();
        blocked.insert("01:145038".to_string());
        assert!(DeviceFilter::new(known, blocked, false).is_err());
    }

    #[test]
    fn blocked_device_is_rejected_regardless_of_enforce_mode() {
        let f = filter(false);
        assert!(matches!(f.check("99:999999", "01:145038"), Err(FilterError::Blocked(_))));
    }

    #[test]
    fn enforce_mode_rejects_unknown_devices() {
        let f = filter(true);
        assert!(matches!(f.check("01:145038", "04:999999"), Err(FilterError::NotKnown(_))));
    }

    #[test]
    fn enforce_mode_allows_sentinels_and_known() {
        let f = filter(true);
        assert!(f.check("01:145038", NON_DEVICE_ID).is_ok());
        assert!(f.check("01:145038", ALL_DEVICE_ID).is_ok());
    }

    #[test]
    fn lax_mode_allows_unknown_unblocked_devices() {
        let f = filter(false);
        assert!(f.check("01:145038", "04:999999").is_ok());
    }

    #[test]
    fn foreign_gateway_warns_once() {
        let mut f = filter(false);
        assert!(f.note_foreign_gateway("18:999999"));
        assert!(!f.note_foreign_gateway("18:999999"));
    }

    #[test]
    fn configured_gateway_is_not_foreign() {
        let mut f = filter(false);
        assert!(!f.note_foreign_gateway("18:013393"));
    }
}
