//! USB Vendor/Product ID catalog
//!
//! Two kinds of entries live here: common USB-to-serial bridges (used only to
//! label ports in logs) and fixed-function card readers that enumerate as
//! HID/keyboard devices instead of serial ports. The latter are tracked as
//! connectors in their own right.

/// USB Vendor ID / Product ID pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UsbId {
    pub vid: u16,
    pub pid: u16,
}

impl UsbId {
    pub const fn new(vid: u16, pid: u16) -> Self {
        Self { vid, pid }
    }
}

/// FTDI (Future Technology Devices International)
pub mod ftdi {
    pub const VID: u16 = 0x0403;
}

/// Silicon Labs CP210x
pub mod cp210x {
    pub const VID: u16 = 0x10C4;
}

/// WCH CH340/CH341
pub mod ch340 {
    pub const VID: u16 = 0x1A86;
}

/// Prolific PL2303
pub mod prolific {
    pub const VID: u16 = 0x067B;
}

/// ID TECH card readers
///
/// Each reader ships in two USB personalities: HID (raw reports) and KB
/// (keyboard emulation). Both are tracked.
pub mod idtech {
    use super::UsbId;

    pub const VID: u16 = 0x0ACD;

    pub const SREDKEY2_HID: UsbId = UsbId::new(VID, 0x5100);
    pub const SREDKEY2_KB: UsbId = UsbId::new(VID, 0x5101);
    pub const SECUREKEY_HID: UsbId = UsbId::new(VID, 0x2010);
    pub const SECUREKEY_KB: UsbId = UsbId::new(VID, 0x2030);
    pub const AUGUSTAS_HID: UsbId = UsbId::new(VID, 0x3821);
    pub const AUGUSTAS_KB: UsbId = UsbId::new(VID, 0x3823);
    pub const AUGUSTA_HID: UsbId = UsbId::new(VID, 0x3810);
    pub const AUGUSTA_KB: UsbId = UsbId::new(VID, 0x3820);
    pub const SECUREMAG_HID: UsbId = UsbId::new(VID, 0x2610);
    pub const SECUREMAG_KB: UsbId = UsbId::new(VID, 0x2620);
    pub const SECURED_HID: UsbId = UsbId::new(VID, 0x4410);
    pub const SECURED_KB: UsbId = UsbId::new(VID, 0x4420);

    /// All supported product IDs
    pub const ALL_PIDS: &[u16] = &[
        0x5100, 0x5101, 0x2010, 0x2030, 0x3821, 0x3823, 0x3810, 0x3820, 0x2610, 0x2620, 0x4410,
        0x4420,
    ];
}

/// MagTek readers
///
/// These are reported through the USB hub stream rather than the port diff.
pub mod magtek {
    pub const VID: u16 = 0x0801;
}

/// Check if a VID/PID is a fixed-function device tracked as a connector
pub fn is_fixed_function_device(vid: u16, pid: u16) -> bool {
    vid == idtech::VID && idtech::ALL_PIDS.contains(&pid)
}

/// Get adapter type name from VID
pub fn adapter_name(vid: u16) -> Option<&'static str> {
    match vid {
        ftdi::VID => Some("FTDI"),
        cp210x::VID => Some("CP210x"),
        ch340::VID => Some("CH340"),
        prolific::VID => Some("PL2303"),
        idtech::VID => Some("ID TECH"),
        magtek::VID => Some("MagTek"),
        _ => None,
    }
}

/// Build a Windows-style device instance path (`USB\VID_0801&PID_0011\<instance>`)
///
/// Hub notifications identify devices this way regardless of platform so that
/// the vendor filter works on a single string form.
pub fn device_instance_path(vid: u16, pid: u16, instance: &str) -> String {
    format!("USB\\VID_{:04X}&PID_{:04X}\\{}", vid, pid, instance)
}

/// Check whether a device instance path belongs to the given vendor
pub fn instance_has_vendor(instance_path: &str, vid: u16) -> bool {
    let needle = format!("VID_{:04X}", vid);
    instance_path.to_ascii_uppercase().contains(&needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_function_lookup() {
        assert!(is_fixed_function_device(
            idtech::AUGUSTA_KB.vid,
            idtech::AUGUSTA_KB.pid
        ));
        assert!(is_fixed_function_device(idtech::VID, 0x5100));
        assert!(!is_fixed_function_device(idtech::VID, 0xFFFF));
        assert!(!is_fixed_function_device(ftdi::VID, 0x5100));
    }

    #[test]
    fn test_all_pids_cover_constants() {
        for id in [
            idtech::SREDKEY2_HID,
            idtech::SREDKEY2_KB,
            idtech::SECUREKEY_HID,
            idtech::SECUREKEY_KB,
            idtech::AUGUSTAS_HID,
            idtech::AUGUSTAS_KB,
            idtech::AUGUSTA_HID,
            idtech::AUGUSTA_KB,
            idtech::SECUREMAG_HID,
            idtech::SECUREMAG_KB,
            idtech::SECURED_HID,
            idtech::SECURED_KB,
        ] {
            assert!(idtech::ALL_PIDS.contains(&id.pid), "{:04X}", id.pid);
        }
    }

    #[test]
    fn test_instance_path_vendor_match() {
        let path = device_instance_path(magtek::VID, 0x0011, "B1234");
        assert_eq!(path, "USB\\VID_0801&PID_0011\\B1234");
        assert!(instance_has_vendor(&path, magtek::VID));
        assert!(instance_has_vendor("usb\\vid_0801&pid_0002\\x", magtek::VID));
        assert!(!instance_has_vendor(&path, idtech::VID));
    }

    #[test]
    fn test_adapter_names() {
        assert_eq!(adapter_name(0x0403), Some("FTDI"));
        assert_eq!(adapter_name(0x1A86), Some("CH340"));
        assert_eq!(adapter_name(0xDEAD), None);
    }
}
