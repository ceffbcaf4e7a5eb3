//! OS notification sources
//!
//! A [`NotificationSource`] pushes [`RawNotification`]s into a channel owned
//! by the monitor. Sources know nothing about the connector inventory; they
//! only report that *something* changed.
//!
//! - [`UsbWatcher`]: OS USB hot-plug subscription, either as a generic
//!   device-change stream or as the hub stream carrying instance paths
//! - [`PollingWatcher`]: re-lists connectors on a timer, for platforms or
//!   adapters where hot-plug delivery is unreliable

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use nusb::hotplug::HotplugEvent;
use nusb::{DeviceId, DeviceInfo, MaybeFuture};
use port_detect::{usb_ids, EnumerationProvider};
use tokio::sync::mpsc;
use tokio::task::{self, JoinHandle};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::WatchError;
use crate::events::{EventKind, RawNotification};

/// A subscription to OS device-change signals
pub trait NotificationSource: Send {
    /// Name used in log lines
    fn name(&self) -> &str;

    /// Begin delivering notifications to `sender`
    ///
    /// Must be called from within a tokio runtime.
    fn start(&mut self, sender: mpsc::UnboundedSender<RawNotification>) -> Result<(), WatchError>;

    /// Stop delivering notifications. Safe to call repeatedly.
    fn stop(&mut self);

    fn is_running(&self) -> bool;
}

/// Which view of USB hot-plug a [`UsbWatcher`] reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsbStream {
    /// Arrival/removal of any device as event codes "2"/"3"
    DeviceChange,
    /// Instance creation/deletion with the device instance path
    Hub,
}

/// USB hot-plug subscription
pub struct UsbWatcher {
    stream: UsbStream,
    task: Option<JoinHandle<()>>,
}

impl UsbWatcher {
    /// Generic device arrival/removal stream
    pub fn device_change() -> Self {
        Self {
            stream: UsbStream::DeviceChange,
            task: None,
        }
    }

    /// Hub instance creation/deletion stream
    pub fn hub() -> Self {
        Self {
            stream: UsbStream::Hub,
            task: None,
        }
    }

    fn source_name(stream: UsbStream) -> &'static str {
        match stream {
            UsbStream::DeviceChange => "usb-device-change",
            UsbStream::Hub => "usb-hub",
        }
    }
}

fn instance_path(info: &DeviceInfo) -> String {
    let instance = match info.serial_number() {
        Some(serial) => serial.to_string(),
        None => format!("{}-{}", info.bus_id(), info.device_address()),
    };
    usb_ids::device_instance_path(info.vendor_id(), info.product_id(), &instance)
}

fn attached_devices() -> HashMap<DeviceId, String> {
    nusb::list_devices()
        .wait()
        .map(|devices| devices.map(|d| (d.id(), instance_path(&d))).collect())
        .unwrap_or_default()
}

/// Translate one OS event, tracking attached devices so removals can be named
fn translate(
    stream: UsbStream,
    attached: &mut HashMap<DeviceId, String>,
    event: HotplugEvent,
) -> Option<RawNotification> {
    match event {
        HotplugEvent::Connected(info) => {
            let path = instance_path(&info);
            attached.insert(info.id(), path.clone());
            Some(match stream {
                UsbStream::DeviceChange => RawNotification::arrival(),
                UsbStream::Hub => RawNotification::Hub {
                    kind: EventKind::Insertion,
                    instance_path: path,
                },
            })
        }
        HotplugEvent::Disconnected(id) => {
            let path = attached.remove(&id);
            match stream {
                UsbStream::DeviceChange => Some(RawNotification::removal()),
                UsbStream::Hub => path.map(|instance_path| RawNotification::Hub {
                    kind: EventKind::Removal,
                    instance_path,
                }),
            }
        }
    }
}

impl NotificationSource for UsbWatcher {
    fn name(&self) -> &str {
        Self::source_name(self.stream)
    }

    fn start(&mut self, sender: mpsc::UnboundedSender<RawNotification>) -> Result<(), WatchError> {
        let name = Self::source_name(self.stream);
        if self.task.is_some() {
            return Err(WatchError::AlreadyRunning(name.to_string()));
        }

        let watch = nusb::watch_devices().map_err(|e| WatchError::Subscribe {
            source_name: name.to_string(),
            reason: e.to_string(),
        })?;

        let stream = self.stream;
        self.task = Some(tokio::spawn(async move {
            // Devices attached before the subscription still need a name on removal
            let mut attached = task::spawn_blocking(attached_devices)
                .await
                .unwrap_or_default();

            let mut watch = Box::pin(watch);
            while let Some(event) = watch.next().await {
                if let Some(raw) = translate(stream, &mut attached, event) {
                    debug!("{}: {:?}", name, raw);
                    if sender.send(raw).is_err() {
                        break;
                    }
                }
            }
            debug!("{} watcher ended", name);
        }));

        info!("Subscribed to {}", name);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            info!("Unsubscribed from {}", self.name());
        }
    }

    fn is_running(&self) -> bool {
        self.task.is_some()
    }
}

impl Drop for UsbWatcher {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Timer-driven fallback that diffs connector listings itself
///
/// Emits a generic arrival when the listing gained entries and a generic
/// removal when it lost entries; the monitor does the actual reconciliation.
pub struct PollingWatcher {
    provider: Arc<dyn EnumerationProvider>,
    period: Duration,
    task: Option<JoinHandle<()>>,
}

impl PollingWatcher {
    pub fn new(provider: Arc<dyn EnumerationProvider>, period: Duration) -> Self {
        Self {
            provider,
            period,
            task: None,
        }
    }
}

impl NotificationSource for PollingWatcher {
    fn name(&self) -> &str {
        "polling"
    }

    fn start(&mut self, sender: mpsc::UnboundedSender<RawNotification>) -> Result<(), WatchError> {
        if self.task.is_some() {
            return Err(WatchError::AlreadyRunning(self.name().to_string()));
        }

        let provider = Arc::clone(&self.provider);
        let period = self.period;
        let mut last: HashSet<_> = provider.list_connectors().into_iter().collect();
        self.task = Some(tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // First tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let listing = Arc::clone(&provider);
                let live: HashSet<_> =
                    match task::spawn_blocking(move || listing.list_connectors()).await {
                        Ok(live) => live.into_iter().collect(),
                        Err(e) => {
                            warn!("Connector poll aborted: {}", e);
                            continue;
                        }
                    };

                if live.difference(&last).next().is_some()
                    && sender.send(RawNotification::arrival()).is_err()
                {
                    break;
                }
                if last.difference(&live).next().is_some()
                    && sender.send(RawNotification::removal()).is_err()
                {
                    break;
                }
                last = live;
            }
        }));

        info!("Polling connectors every {}ms", self.period.as_millis());
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            info!("Stopped connector polling");
        }
    }

    fn is_running(&self) -> bool {
        self.task.is_some()
    }
}

impl Drop for PollingWatcher {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use port_detect::ConnectorId;

    struct ScriptedProvider(Mutex<Vec<ConnectorId>>);

    impl EnumerationProvider for ScriptedProvider {
        fn list_connectors(&self) -> Vec<ConnectorId> {
            self.0.lock().clone()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_reports_growth_and_shrink() {
        let provider = Arc::new(ScriptedProvider(Mutex::new(vec!["COM1".into()])));
        let mut watcher = PollingWatcher::new(provider.clone(), Duration::from_millis(100));
        let (tx, mut rx) = mpsc::unbounded_channel();

        watcher.start(tx).unwrap();
        assert!(watcher.is_running());
        tokio::task::yield_now().await;

        provider.0.lock().push("COM2".into());
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(rx.recv().await, Some(RawNotification::arrival()));

        provider.0.lock().clear();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(rx.recv().await, Some(RawNotification::removal()));

        watcher.stop();
        watcher.stop();
        assert!(!watcher.is_running());
    }

    #[tokio::test]
    async fn test_polling_rejects_double_start() {
        let provider = Arc::new(ScriptedProvider(Mutex::new(Vec::new())));
        let mut watcher = PollingWatcher::new(provider, Duration::from_secs(1));
        let (tx, _rx) = mpsc::unbounded_channel();

        watcher.start(tx.clone()).unwrap();
        assert!(matches!(
            watcher.start(tx),
            Err(WatchError::AlreadyRunning(_))
        ));
    }

    #[test]
    fn test_usb_watcher_names() {
        assert_eq!(UsbWatcher::device_change().name(), "usb-device-change");
        assert_eq!(UsbWatcher::hub().name(), "usb-hub");
        assert!(!UsbWatcher::hub().is_running());
    }
}
