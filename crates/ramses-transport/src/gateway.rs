// SPDX-License-Identifier: Apache-2.0

//! HGI80 vs evofw3 detection (spec.md §4.6 step 4).
//!
//! A heuristic over the port name and, if available, the USB VID/PID: the
//! original package's signature is incomplete (spec.md §9 Open Question 1),
//! so an ambiguous port is treated as evofw3 and a warning is logged by the
//! caller.

/// Which gateway firmware family a serial port most likely carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayKind {
    /// Honeywell's own HGI80 dongle: cannot impersonate other devices.
    Hgi80,
    /// evofw3 (or ramses_esp) firmware: can impersonate.
    Evofw3,
}

/// USB vendor/product id pair, when known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsbIds {
    /// USB vendor id.
    pub vid: u16,
    /// USB product id.
    pub pid: u16,
}

/// FTDI's VID, used by genuine HGI80 dongles.
const FTDI_VID: u16 = 0x0403;
/// The HGI80's FTDI PID.
const HGI80_PID: u16 = 0x6001;

/// Classify a port from its OS-reported name and, if available, USB ids.
///
/// Falls back to [`GatewayKind::Evofw3`] (the more permissive assumption)
/// whenever the evidence is ambiguous, per spec.md §9.
#[must_use]
pub fn classify(port_name: &str, usb_ids: Option<UsbIds>) -> GatewayKind {
    if let Some(ids) = usb_ids {
        if ids.vid == FTDI_VID && ids.pid == HGI80_PID {
            return GatewayKind::Hgi80;
        }
    }
    let lower = port_name.to_ascii_lowercase();
    if lower.contains("hgi80") || lower.contains("honeywell") {
        return GatewayKind::Hgi80;
    }
    GatewayKind::Evofw3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_hgi80_by_usb_ids() {
        let ids = UsbIds { vid: FTDI_VID, pid: HGI80_PID };
        assert_eq!(classify("/dev/ttyUSB0", Some(ids)), GatewayKind::Hgi80);
    }

    #[test]
    fn recognises_hgi80_by_name() {
        assert_eq!(classify("HGI80 (COM5)", None), GatewayKind::Hgi80);
    }

    #[test]
    fn ambiguous_port_assumed_evofw3() {
        assert_eq!(classify("/dev/ttyACM0", None), GatewayKind::Evofw3);
    }
}
