//! Pipeline configuration

use std::time::Duration;

use port_detect::usb_ids;
use serde::{Deserialize, Serialize};

use crate::blacklist::Blacklist;

/// Hot-plug pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Debounce before discovery on insertion; scaled by 1024/1000
    pub debounce_ms: u64,
    /// Connectors that never trigger discovery
    pub blacklist: Blacklist,
    /// Subscribe to generic USB device arrival/removal
    pub usb_watch: bool,
    /// Subscribe to USB hub instance creation/deletion
    pub hub_watch: bool,
    /// Also re-list connectors on a timer
    pub polling_fallback: bool,
    /// Polling period for the fallback watcher (ms)
    pub poll_interval_ms: u64,
    /// Vendor accepted from the hub stream
    pub hub_vendor: u16,
    /// Emit every added/removed connector instead of only the first
    pub emit_all_changes: bool,
    /// Optional bound on a single discovery/teardown call (ms)
    pub discovery_timeout_ms: Option<u64>,
    /// Re-run device-change notifications after this long (ms); 0 disables
    pub recheck_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 1000,
            blacklist: Blacklist::default(),
            usb_watch: true,
            hub_watch: true,
            polling_fallback: false,
            poll_interval_ms: 1000,
            hub_vendor: usb_ids::magtek::VID,
            emit_all_changes: false,
            discovery_timeout_ms: None,
            recheck_ms: 1000,
        }
    }
}

impl PipelineConfig {
    /// Effective debounce delay
    ///
    /// The configured value counts 1/1024 s units, so the default of 1000
    /// waits 1024 ms.
    pub fn debounce_delay(&self) -> Duration {
        Duration::from_millis(self.debounce_ms.saturating_mul(1024) / 1000)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn discovery_timeout(&self) -> Option<Duration> {
        self.discovery_timeout_ms.map(Duration::from_millis)
    }

    /// Delay before a device-change notification is re-run, if enabled
    pub fn recheck_delay(&self) -> Option<Duration> {
        (self.recheck_ms > 0).then(|| Duration::from_millis(self.recheck_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_debounce_is_scaled() {
        let config = PipelineConfig::default();
        assert_eq!(config.debounce_delay(), Duration::from_millis(1024));

        let config = PipelineConfig {
            debounce_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.debounce_delay(), Duration::ZERO);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"debounce_ms": 250, "blacklist": ["COM1"]}"#).unwrap();

        assert_eq!(config.debounce_ms, 250);
        assert_eq!(config.blacklist.entries(), ["COM1"]);
        assert!(config.usb_watch);
        assert!(!config.emit_all_changes);
        assert_eq!(config.hub_vendor, 0x0801);
        assert_eq!(config.discovery_timeout(), None);
        assert_eq!(config.recheck_delay(), Some(Duration::from_millis(1000)));
    }

    #[test]
    fn test_zero_recheck_disables_it() {
        let config = PipelineConfig {
            recheck_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.recheck_delay(), None);
    }

    #[test]
    fn test_poll_interval_never_zero() {
        let config = PipelineConfig {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.poll_interval(), Duration::from_millis(1));
    }
}
