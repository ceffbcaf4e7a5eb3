//! Error types for connector enumeration

use thiserror::Error;

/// Errors that can occur during enumeration
#[derive(Debug, Error)]
pub enum DetectError {
    /// Failed to enumerate serial ports
    #[error("failed to enumerate ports: {0}")]
    SerialPort(#[from] serialport::Error),

    /// Failed to list USB devices
    #[error("failed to list USB devices: {0}")]
    UsbListFailed(String),
}
