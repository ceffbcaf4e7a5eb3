//! Connector identifiers and the enumeration seam
//!
//! Everything downstream (diffing, queueing, blacklisting) works on
//! [`ConnectorId`] values, never on OS handles.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Identifies a physical or logical attachment point
///
/// - Serial ports: the OS port name (`COM5`, `/dev/ttyACM0`)
/// - Fixed-function USB devices: `"<VVVV>_<PPPP>"` in uppercase hex
/// - Hub notifications: the USB device instance path
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectorId(String);

impl ConnectorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Synthesize the identifier of a fixed-function USB device
    pub fn fixed_device(vid: u16, pid: u16) -> Self {
        Self(format!("{:04X}_{:04X}", vid, pid))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive comparison against a raw identifier
    pub fn eq_ignore_case(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other)
    }
}

impl fmt::Display for ConnectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnectorId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ConnectorId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for ConnectorId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ConnectorId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Source of the live connector inventory
///
/// Called on every device-change notification, so implementations must be
/// cheap. Failures are reported as an empty (or partial) list, never as an
/// error or a panic.
pub trait EnumerationProvider: Send + Sync {
    /// List currently attached connectors, ordered and without duplicates
    fn list_connectors(&self) -> Vec<ConnectorId>;
}

impl<T: EnumerationProvider + ?Sized> EnumerationProvider for Arc<T> {
    fn list_connectors(&self) -> Vec<ConnectorId> {
        (**self).list_connectors()
    }
}

impl<T: EnumerationProvider + ?Sized> EnumerationProvider for Box<T> {
    fn list_connectors(&self) -> Vec<ConnectorId> {
        (**self).list_connectors()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_device_id_format() {
        let id = ConnectorId::fixed_device(0x0ACD, 0x3810);
        assert_eq!(id.as_str(), "0ACD_3810");

        let padded = ConnectorId::fixed_device(0x1, 0xAB);
        assert_eq!(padded.as_str(), "0001_00AB");
    }

    #[test]
    fn test_case_insensitive_compare() {
        let id = ConnectorId::from("COM5");
        assert!(id.eq_ignore_case("com5"));
        assert!(!id.eq_ignore_case("COM50"));
        assert_ne!(id, ConnectorId::from("com5"));
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let id = ConnectorId::from("/dev/ttyUSB0");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"/dev/ttyUSB0\"");
    }
}
