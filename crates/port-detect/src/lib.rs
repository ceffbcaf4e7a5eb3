//! Connector Enumeration Library
//!
//! This crate answers one question: which connectors are attached right now?
//! A connector is either an OS serial port (`/dev/ttyUSB0`, `COM3`) or a
//! fixed-function USB device that never shows up as a port, identified by a
//! synthesized `"<vendor>_<product>"` string.
//!
//! # Example
//!
//! ```rust,no_run
//! use port_detect::{ConnectorScanner, EnumerationProvider};
//!
//! let scanner = ConnectorScanner::new();
//!
//! for connector in scanner.list_connectors() {
//!     println!("Found connector: {}", connector);
//! }
//! ```

pub mod connector;
pub mod error;
pub mod scanner;
pub mod usb_ids;

pub use connector::{ConnectorId, EnumerationProvider};
pub use error::DetectError;
pub use scanner::{ConnectorScanner, ScannerConfig, SerialPortInfo};
