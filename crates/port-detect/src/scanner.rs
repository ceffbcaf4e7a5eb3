//! Connector scanner
//!
//! This module provides serial port and fixed-function device enumeration.

use std::collections::HashSet;

use nusb::MaybeFuture;
use serde::{Deserialize, Serialize};
use serialport::{available_ports, SerialPortType};
use tracing::{debug, warn};

use crate::connector::{ConnectorId, EnumerationProvider};
use crate::error::DetectError;
use crate::usb_ids;

/// Information about a serial port
#[derive(Debug, Clone)]
pub struct SerialPortInfo {
    /// Port name (e.g., /dev/ttyUSB0, COM3)
    pub port: String,
    /// USB Vendor ID (if USB)
    pub vid: Option<u16>,
    /// USB Product ID (if USB)
    pub pid: Option<u16>,
    /// USB product string
    pub product: Option<String>,
}

impl SerialPortInfo {
    /// Create from serialport crate's port info
    fn from_serialport(name: String, port_type: &SerialPortType) -> Self {
        match port_type {
            SerialPortType::UsbPort(usb) => Self {
                port: name,
                vid: Some(usb.vid),
                pid: Some(usb.pid),
                product: usb.product.clone(),
            },
            _ => Self {
                port: name,
                vid: None,
                pid: None,
                product: None,
            },
        }
    }

    /// Short description for log lines
    pub fn describe(&self) -> &str {
        self.product
            .as_deref()
            .or_else(|| self.vid.and_then(usb_ids::adapter_name))
            .unwrap_or("Unknown")
    }
}

/// Scanner configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Skip ports whose name contains any of these patterns
    pub skip_patterns: Vec<String>,
    /// Also report fixed-function USB devices as connectors
    pub include_fixed_devices: bool,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            skip_patterns: vec![
                // Bluetooth ports on macOS
                "Bluetooth".to_string(),
                // Debug/logging ports
                "debug".to_string(),
            ],
            include_fixed_devices: true,
        }
    }
}

/// Enumerates serial ports and fixed-function USB devices
#[derive(Debug, Clone, Default)]
pub struct ConnectorScanner {
    config: ScannerConfig,
}

impl ConnectorScanner {
    /// Create a new scanner with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a scanner with custom configuration
    pub fn with_config(config: ScannerConfig) -> Self {
        Self { config }
    }

    /// Enumerate all available serial ports
    pub fn enumerate_ports(&self) -> Result<Vec<SerialPortInfo>, DetectError> {
        let ports = available_ports()?;

        let result: Vec<_> = ports
            .into_iter()
            .map(|p| SerialPortInfo::from_serialport(p.port_name, &p.port_type))
            .filter(|p| !self.should_skip_port(&p.port))
            .collect();

        debug!("Found {} serial port(s)", result.len());
        for port in &result {
            debug!("  {} - {}", port.port, port.describe());
        }

        Ok(result)
    }

    /// Enumerate supported fixed-function USB devices
    pub fn enumerate_fixed_devices(&self) -> Result<Vec<ConnectorId>, DetectError> {
        let devices = nusb::list_devices()
            .wait()
            .map_err(|e| DetectError::UsbListFailed(e.to_string()))?;

        Ok(devices
            .filter(|dev| usb_ids::is_fixed_function_device(dev.vendor_id(), dev.product_id()))
            .map(|dev| ConnectorId::fixed_device(dev.vendor_id(), dev.product_id()))
            .collect())
    }

    /// List connectors, failing if either source fails
    pub fn try_list_connectors(&self) -> Result<Vec<ConnectorId>, DetectError> {
        let ports = self.enumerate_ports()?;
        let fixed = if self.config.include_fixed_devices {
            self.enumerate_fixed_devices()?
        } else {
            Vec::new()
        };

        Ok(merge_connectors(
            ports.into_iter().map(|p| ConnectorId::from(p.port)),
            fixed,
        ))
    }

    /// Check if a port should be skipped
    fn should_skip_port(&self, port: &str) -> bool {
        self.config
            .skip_patterns
            .iter()
            .any(|pattern| port.contains(pattern.as_str()))
    }
}

impl EnumerationProvider for ConnectorScanner {
    fn list_connectors(&self) -> Vec<ConnectorId> {
        let ports = self.enumerate_ports().unwrap_or_else(|e| {
            warn!("Port enumeration failed: {}", e);
            Vec::new()
        });

        let fixed = if self.config.include_fixed_devices {
            self.enumerate_fixed_devices().unwrap_or_else(|e| {
                warn!("Fixed device enumeration failed: {}", e);
                Vec::new()
            })
        } else {
            Vec::new()
        };

        merge_connectors(ports.into_iter().map(|p| ConnectorId::from(p.port)), fixed)
    }
}

/// Ports first in OS order, then fixed devices, with duplicates removed
fn merge_connectors(
    ports: impl IntoIterator<Item = ConnectorId>,
    fixed: impl IntoIterator<Item = ConnectorId>,
) -> Vec<ConnectorId> {
    let mut seen = HashSet::new();
    ports
        .into_iter()
        .chain(fixed)
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serialport::UsbPortInfo;

    #[test]
    fn test_serial_port_info_from_usb() {
        let usb_info = SerialPortType::UsbPort(UsbPortInfo {
            vid: 0x0403,
            pid: 0x6001,
            serial_number: Some("12345".to_string()),
            manufacturer: Some("FTDI".to_string()),
            product: None,
        });

        let info = SerialPortInfo::from_serialport("/dev/ttyUSB0".to_string(), &usb_info);

        assert_eq!(info.vid, Some(0x0403));
        assert_eq!(info.pid, Some(0x6001));
        assert_eq!(info.describe(), "FTDI");
    }

    #[test]
    fn test_skip_patterns() {
        let scanner = ConnectorScanner::new();
        assert!(scanner.should_skip_port("/dev/cu.Bluetooth-Incoming-Port"));
        assert!(!scanner.should_skip_port("/dev/ttyUSB0"));

        let scanner = ConnectorScanner::with_config(ScannerConfig {
            skip_patterns: vec!["ttyS".to_string()],
            include_fixed_devices: false,
        });
        assert!(scanner.should_skip_port("/dev/ttyS0"));
    }

    #[test]
    fn test_merge_keeps_order_and_dedups() {
        let merged = merge_connectors(
            ["COM3", "COM1", "COM3"].map(ConnectorId::from),
            [ConnectorId::fixed_device(0x0ACD, 0x3810)],
        );

        assert_eq!(
            merged,
            vec![
                ConnectorId::from("COM3"),
                ConnectorId::from("COM1"),
                ConnectorId::from("0ACD_3810"),
            ]
        );
    }

    #[test]
    fn test_scanner_config_defaults_from_empty_json() {
        let config: ScannerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ScannerConfig::default());
        assert_eq!(config.skip_patterns, ["Bluetooth", "debug"]);

        let config: ScannerConfig =
            serde_json::from_str(r#"{"include_fixed_devices": false}"#).unwrap();
        assert_eq!(config.skip_patterns, ScannerConfig::default().skip_patterns);
        assert!(!config.include_fixed_devices);
    }
}
