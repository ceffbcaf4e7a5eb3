//! Event types flowing through the hot-plug pipeline
//!
//! Raw OS signals come in as [`RawNotification`]s, the monitor reconciles
//! them into [`ConnectorEvent`]s, and the dispatcher queues those per
//! connector.

use std::fmt;

use port_detect::ConnectorId;
use serde::{Deserialize, Serialize};

/// Raw event code for a device arrival
pub const DEVICE_ARRIVAL_CODE: &str = "2";
/// Raw event code for a device removal
pub const DEVICE_REMOVAL_CODE: &str = "3";

/// Classification of a connector change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EventKind {
    /// A device was plugged in
    Insertion,
    /// A device was unplugged
    Removal,
    /// The OS signal could not be classified
    #[default]
    Unknown,
}

impl EventKind {
    /// Classify a generic device-change event code
    pub fn from_event_code(code: &str) -> Self {
        match code.trim() {
            DEVICE_ARRIVAL_CODE => EventKind::Insertion,
            DEVICE_REMOVAL_CODE => EventKind::Removal,
            _ => EventKind::Unknown,
        }
    }

    /// Verb used in operator-facing log lines
    pub fn verb(&self) -> &'static str {
        match self {
            EventKind::Insertion => "plugged",
            EventKind::Removal => "unplugged",
            EventKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Insertion => write!(f, "Insertion"),
            EventKind::Removal => write!(f, "Removal"),
            EventKind::Unknown => write!(f, "Unknown"),
        }
    }
}

/// A signal delivered by a notification source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawNotification {
    /// Generic device change; the code is classified with [`EventKind::from_event_code`]
    DeviceChange {
        /// OS event code ("2" arrival, "3" removal)
        event_code: String,
    },
    /// USB hub instance creation/deletion
    Hub {
        /// Arrival or removal, known from which subscription fired
        kind: EventKind,
        /// Device instance path (`USB\VID_vvvv&PID_pppp\<instance>`)
        instance_path: String,
    },
}

impl RawNotification {
    /// Generic arrival notification
    pub fn arrival() -> Self {
        RawNotification::DeviceChange {
            event_code: DEVICE_ARRIVAL_CODE.to_string(),
        }
    }

    /// Generic removal notification
    pub fn removal() -> Self {
        RawNotification::DeviceChange {
            event_code: DEVICE_REMOVAL_CODE.to_string(),
        }
    }

    /// Classify this notification
    pub fn kind(&self) -> EventKind {
        match self {
            RawNotification::DeviceChange { event_code } => EventKind::from_event_code(event_code),
            RawNotification::Hub { kind, .. } => *kind,
        }
    }
}

/// A reconciled change on one connector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorEvent {
    pub kind: EventKind,
    pub connector: ConnectorId,
}

impl ConnectorEvent {
    pub fn new(kind: EventKind, connector: impl Into<ConnectorId>) -> Self {
        Self {
            kind,
            connector: connector.into(),
        }
    }
}

impl fmt::Display for ConnectorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on '{}'", self.kind, self.connector)
    }
}
