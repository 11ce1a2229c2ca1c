// SPDX-License-Identifier: Apache-2.0

//! Device addresses: the `TT:NNNNNN` identifier and its packed hex form.
//!
//! A [`DeviceId`] is the canonical 9-char textual form. [`Address`] wraps a
//! `DeviceId` behind validation and caches the derived hex and friendly-slug
//! forms, the way the original package's `Address` class memoises
//! `hex_id`/`_friendly`.

use std::fmt;
use std::sync::{LazyLock, Mutex};

use lru::LruCache;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{AddressError, PacketAddrSetInvalid};

/// `--:------`, the "no device" sentinel.
pub const NON_DEVICE_ID: &str = "--:------";
/// `63:262142`, the broadcast / "all devices" sentinel.
pub const ALL_DEVICE_ID: &str = "63:262142";
/// `18:000730`, the generic (not-yet-identified) active-gateway id used in
/// command templates before the real HGI id is substituted.
pub const HGI_DEVICE_ID: &str = "18:000730";

static DEVICE_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{2}:[0-9]{6}$").expect("static regex is valid"));

/// Friendly 2-3 letter slug for a device-type prefix, e.g. `"01"` -> `"CTL"`.
///
/// Not exhaustive (the real fleet of RAMSES-II device classes numbers in the
/// dozens and some are vendor-specific); unknown types pass through as their
/// numeric form. Used for `Display` and by several payload parsers
/// (`000C` role lookup, `3B00`/`3EF0` per-device-type dispatch).
pub const fn friendly_type(device_type: &str) -> Option<&'static str> {
    match device_type.as_bytes() {
        b"01" => Some("CTL"),
        b"02" => Some("UFC"),
        b"03" => Some("STA"),
        b"04" => Some("TRV"),
        b"07" => Some("DHW"),
        b"08" => Some("JIM"),
        b"10" => Some("OTB"),
        b"12" => Some("STA"),
        b"13" => Some("BDR"),
        b"18" => Some("HGI"),
        b"20" => Some("VNT"),
        b"21" => Some("JST"),
        b"22" => Some("VNT"),
        b"23" => Some("PRG"),
        b"29" => Some("VNT"),
        b"30" => Some("RFG"),
        b"32" => Some("VNT"),
        b"34" => Some("STA"),
        b"37" => Some("VNT"),
        b"39" => Some("VNT"),
        b"63" => Some("NUL"),
        _ => None,
    }
}

/// The device Address type: a validated, cached wrapper over a `DeviceId`.
#[derive(Debug, Clone, Eq)]
pub struct Address {
    id: String,
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (ty, serial) = self.id.split_once(':').unwrap_or((self.id.as_str(), ""));
        match friendly_type(ty) {
            Some(slug) => write!(f, "{slug}:{serial}"),
            None => write!(f, "{ty}:{serial}"),
        }
    }
}

impl Address {
    /// Validate and build an `Address` from a textual device id.
    ///
    /// # Errors
    /// Returns [`AddressError::InvalidDeviceId`] if `id` is neither
    /// [`NON_DEVICE_ID`] nor matches `^[0-9]{2}:[0-9]{6}$`.
    pub fn new(id: impl Into<String>) -> Result<Self, AddressError> {
        let id = id.into();
        if Self::is_valid(&id) { Ok(Self { id }) } else { Err(AddressError::InvalidDeviceId(id)) }
    }

    /// True if `value` is `NON_DEVICE_ID` or matches the device-id regex.
    pub fn is_valid(value: &str) -> bool {
        value == NON_DEVICE_ID || DEVICE_ID_RE.is_match(value)
    }

    /// The textual device id, e.g. `"01:145038"`.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The 2-digit device-type prefix.
    #[must_use]
    pub fn device_type(&self) -> &str {
        &self.id[..2]
    }

    /// Packed 6-hex-digit form: `((type << 18) | serial)`, zero-padded.
    ///
    /// `--:------` encodes as 6 spaces, `63:262142` as `"FFFFFE"`.
    #[must_use]
    pub fn to_hex(&self) -> String {
        id_to_hex(&self.id)
    }

    /// Construct an `Address` from its packed hex form.
    ///
    /// # Errors
    /// Propagates [`AddressError`] if the decoded id is malformed (should
    /// not happen for well-formed 6-hex-digit input).
    pub fn from_hex(hex6: &str) -> Result<Self, AddressError> {
        Self::new(hex_to_id(hex6))
    }
}

/// Convert (say) `"01:145038"` to its packed hex form `"06368E"`.
///
/// `--:------` maps to six spaces (the original's "blank" encoding);
/// `63:262142` maps to `"FFFFFE"`.
#[must_use]
pub fn id_to_hex(device_id: &str) -> String {
    if device_id == NON_DEVICE_ID {
        return "      ".to_string();
    }
    if device_id == ALL_DEVICE_ID {
        return "FFFFFE".to_string();
    }
    let (ty, serial) = device_id.split_once(':').unwrap_or((device_id, "0"));
    let ty: u32 = ty.parse().unwrap_or(0);
    let serial: u32 = serial.parse().unwrap_or(0);
    format!("{:06X}", (ty << 18) + serial)
}

/// Convert (say) `"06368E"` back to `"01:145038"`.
///
/// Inverse of [`id_to_hex`]: `"FFFFFE"` decodes to `ALL_DEVICE_ID`, an
/// all-blank/whitespace hex decodes to `NON_DEVICE_ID`.
#[must_use]
pub fn hex_to_id(device_hex: &str) -> String {
    if device_hex == "FFFFFE" {
        return ALL_DEVICE_ID.to_string();
    }
    if device_hex.trim().is_empty() {
        return NON_DEVICE_ID.to_string();
    }
    let Ok(raw) = u32::from_str_radix(device_hex, 16) else {
        return NON_DEVICE_ID.to_string();
    };
    format!("{:02}:{:06}", (raw & 0x00FC_0000) >> 18, raw & 0x0003_FFFF)
}

fn address_cache() -> &'static Mutex<LruCache<String, Address>> {
    static CACHE: LazyLock<Mutex<LruCache<String, Address>>> = LazyLock::new(|| {
        Mutex::new(LruCache::new(std::num::NonZeroUsize::new(256).expect("256 != 0")))
    });
    &CACHE
}

/// Factory that caches and returns a device `Address` from its textual id.
///
/// Mirrors the original's `@lru_cache(maxsize=256)` on `id_to_address`: most
/// traffic is a handful of hot device ids, and re-validating/re-allocating
/// the same id on every frame is pure overhead.
///
/// # Errors
/// Propagates [`AddressError`] from [`Address::new`].
pub fn id_to_address(device_id: &str) -> Result<Address, AddressError> {
    let mut cache = address_cache().lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    if let Some(addr) = cache.get(device_id) {
        return Ok(addr.clone());
    }
    let addr = Address::new(device_id)?;
    cache.put(device_id.to_string(), addr.clone());
    Ok(addr)
}

/// The five addresses decoded from an address-set fragment, plus the
/// derived `src`/`dst` pair.
#[derive(Debug, Clone)]
pub struct AddrSet {
    /// The resolved source address (first non-`NON` address, aliased to
    /// `dst` if they are equal).
    pub src: Address,
    /// The resolved destination address, or `NON_DEVICE_ID` if there is
    /// only one device in the frame.
    pub dst: Address,
    /// Raw `addr0` field.
    pub addr0: Address,
    /// Raw `addr1` field.
    pub addr1: Address,
    /// Raw `addr2` field.
    pub addr2: Address,
}

fn addr_set_cache() -> &'static Mutex<LruCache<String, AddrSetCacheEntry>> {
    static CACHE: LazyLock<Mutex<LruCache<String, AddrSetCacheEntry>>> = LazyLock::new(|| {
        Mutex::new(LruCache::new(std::num::NonZeroUsize::new(256).expect("256 != 0")))
    });
    &CACHE
}

#[derive(Debug, Clone)]
struct AddrSetCacheEntry(AddrSet);

/// Decode and validate a fragment like `"01:078710 --:------ 01:144246"`
/// into `(src, dst, addr0, addr1, addr2)`.
///
/// Exactly one of three address-set patterns must hold:
/// - `addr0` a device, `addr1 == NON`, `addr2` a device (point-to-point), or
/// - `addr0` a device, `addr1` a *different* device, `addr2 == NON`
///   (legacy point-to-point), or
/// - `addr0 == NON`, `addr1 == NON`, `addr2` a device (broadcast).
///
/// # Errors
/// Returns [`PacketAddrSetInvalid`] if none of the three patterns match.
pub fn pkt_addrs(addr_fragment: &str) -> Result<AddrSet, PacketAddrSetInvalid> {
    if let Some(hit) = addr_set_cache()
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .get(addr_fragment)
    {
        return Ok(hit.0.clone());
    }

    let mut fields = Vec::with_capacity(3);
    for chunk in addr_fragment.split_whitespace().take(3) {
        let addr = id_to_address(chunk)
            .map_err(|e| PacketAddrSetInvalid(format!("{addr_fragment}: {e}")))?;
        fields.push(addr);
    }
    if fields.len() != 3 {
        return Err(PacketAddrSetInvalid(format!("expected 3 addresses, got {}", fields.len())));
    }
    let [a0, a1, a2] = [fields[0].clone(), fields[1].clone(), fields[2].clone()];

    let is_dev = |a: &Address| a.id() != NON_DEVICE_ID && a.id() != ALL_DEVICE_ID;

    let point_to_point = is_dev(&a0) && a1.id() == NON_DEVICE_ID && a2.id() != NON_DEVICE_ID;
    let legacy_p2p = is_dev(&a0) && a1.id() != NON_DEVICE_ID && a1.id() != a0.id() && a2.id() == NON_DEVICE_ID;
    let broadcast = a2.id() != NON_DEVICE_ID && a2.id() != ALL_DEVICE_ID && a0.id() == NON_DEVICE_ID && a1.id() == NON_DEVICE_ID;

    if !(point_to_point || legacy_p2p || broadcast) {
        return Err(PacketAddrSetInvalid(format!("invalid address set: {addr_fragment}")));
    }

    let device_addrs: Vec<&Address> =
        [&a0, &a1, &a2].into_iter().filter(|a| a.id() != NON_DEVICE_ID).collect();
    let mut src = device_addrs.first().map(|a| (*a).clone()).unwrap_or_else(|| a0.clone());
    let dst = device_addrs
        .get(1)
        .map(|a| (*a).clone())
        .unwrap_or_else(|| Address::new(NON_DEVICE_ID).expect("sentinel is valid"));

    if src.id() == dst.id() {
        src = dst.clone();
    }

    let set = AddrSet { src, dst, addr0: a0, addr1: a1, addr2: a2 };
    addr_set_cache()
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .put(addr_fragment.to_string(), AddrSetCacheEntry(set.clone()));
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn sentinels_round_trip() {
        assert_eq!(hex_to_id("FFFFFE"), ALL_DEVICE_ID);
        assert_eq!(hex_to_id("      "), NON_DEVICE_ID);
        assert_eq!(id_to_hex(ALL_DEVICE_ID), "FFFFFE");
        assert_eq!(id_to_hex(NON_DEVICE_ID), "      ");
    }

    #[test]
    fn friendly_display() {
        let addr = Address::new("01:145038").expect("valid");
        assert_eq!(addr.to_string(), "CTL:145038");
        let addr = Address::new("18:000730").expect("valid");
        assert_eq!(addr.to_string(), "HGI:000730");
    }

    #[test]
    fn point_to_point_pattern() {
        let set = pkt_addrs("01:145038 --:------ 01:145038").expect("valid");
        assert_eq!(set.src.id(), "01:145038");
        assert_eq!(set.dst.id(), "01:145038");
    }

    #[test]
    fn legacy_point_to_point_pattern() {
        let set = pkt_addrs("32:206250 30:082155 --:------").expect("valid");
        assert_eq!(set.src.id(), "32:206250");
        assert_eq!(set.dst.id(), "30:082155");
    }

    #[test]
    fn broadcast_pattern() {
        let set = pkt_addrs("--:------ --:------ 10:105624").expect("valid");
        assert_eq!(set.src.id(), "10:105624");
        assert_eq!(set.dst.id(), NON_DEVICE_ID);
    }

    #[test]
    fn invalid_address_set_is_rejected() {
        assert!(pkt_addrs("01:145038 02:123456 03:654321").is_err());
    }

    proptest! {
        #[test]
        fn device_id_hex_round_trip(ty in 0u32..64, serial in 0u32..262_143) {
            let id = format!("{ty:02}:{serial:06}");
            let hex = id_to_hex(&id);
            prop_assert_eq!(hex_to_id(&hex), id);
        }
    }
}
