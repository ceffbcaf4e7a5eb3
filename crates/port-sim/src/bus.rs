//! Simulated connector bus
//!
//! Holds a scripted list of attached connectors and fans raw notifications
//! out to subscribed [`SimulatedSource`]s, the way the OS would after a
//! device is plugged or unplugged.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use port_detect::{ConnectorId, EnumerationProvider};
use port_events::{EventKind, NotificationSource, RawNotification, UsbStream, WatchError};
use tokio::sync::mpsc;
use tracing::debug;

struct Subscriber {
    id: u64,
    stream: UsbStream,
    sender: mpsc::UnboundedSender<RawNotification>,
}

#[derive(Default)]
struct BusInner {
    connectors: Mutex<Vec<ConnectorId>>,
    subscribers: Mutex<Vec<Subscriber>>,
    next_subscriber: AtomicU64,
    unsubscribes: AtomicUsize,
    listings: AtomicUsize,
}

/// Scripted set of attached connectors
#[derive(Clone, Default)]
pub struct SimulatedBus {
    inner: Arc<BusInner>,
}

impl SimulatedBus {
    pub fn new<I, S>(initial: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ConnectorId>,
    {
        let bus = Self::default();
        *bus.inner.connectors.lock() = initial.into_iter().map(Into::into).collect();
        bus
    }

    /// Attach a connector and raise a device arrival
    ///
    /// Returns false (and raises nothing) if it was already attached.
    pub fn plug(&self, connector: impl Into<ConnectorId>) -> bool {
        let changed = self.plug_quiet(connector);
        if changed {
            self.notify(RawNotification::arrival());
        }
        changed
    }

    /// Detach a connector and raise a device removal
    pub fn unplug(&self, connector: impl Into<ConnectorId>) -> bool {
        let changed = self.unplug_quiet(connector);
        if changed {
            self.notify(RawNotification::removal());
        }
        changed
    }

    /// Attach a connector without any notification
    pub fn plug_quiet(&self, connector: impl Into<ConnectorId>) -> bool {
        let connector = connector.into();
        let mut connectors = self.inner.connectors.lock();
        if connectors.contains(&connector) {
            return false;
        }
        connectors.push(connector);
        true
    }

    /// Detach a connector without any notification
    pub fn unplug_quiet(&self, connector: impl Into<ConnectorId>) -> bool {
        let connector = connector.into();
        let mut connectors = self.inner.connectors.lock();
        let before = connectors.len();
        connectors.retain(|c| c != &connector);
        connectors.len() != before
    }

    /// Raise a hub arrival for a device instance path
    pub fn hub_arrival(&self, instance_path: impl Into<String>) {
        self.notify(RawNotification::Hub {
            kind: EventKind::Insertion,
            instance_path: instance_path.into(),
        });
    }

    /// Raise a hub removal for a device instance path
    pub fn hub_removal(&self, instance_path: impl Into<String>) {
        self.notify(RawNotification::Hub {
            kind: EventKind::Removal,
            instance_path: instance_path.into(),
        });
    }

    /// Deliver a notification to every subscriber of the matching stream
    ///
    /// Returns the number of subscribers reached.
    pub fn notify(&self, raw: RawNotification) -> usize {
        let stream = match raw {
            RawNotification::DeviceChange { .. } => UsbStream::DeviceChange,
            RawNotification::Hub { .. } => UsbStream::Hub,
        };

        let mut subscribers = self.inner.subscribers.lock();
        subscribers.retain(|s| !s.sender.is_closed());

        let mut delivered = 0;
        for subscriber in subscribers.iter().filter(|s| s.stream == stream) {
            if subscriber.sender.send(raw.clone()).is_ok() {
                delivered += 1;
            }
        }
        debug!("Simulated {:?} delivered to {} subscriber(s)", raw, delivered);
        delivered
    }

    /// A notification source attached to this bus
    pub fn source(&self, stream: UsbStream) -> SimulatedSource {
        SimulatedSource {
            bus: Arc::clone(&self.inner),
            stream,
            subscription: None,
            refuse: false,
        }
    }

    /// A source whose subscription is always refused
    pub fn refusing_source(&self, stream: UsbStream) -> SimulatedSource {
        SimulatedSource {
            refuse: true,
            ..self.source(stream)
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }

    /// Number of subscriptions actually torn down
    pub fn unsubscribe_count(&self) -> usize {
        self.inner.unsubscribes.load(Ordering::SeqCst)
    }

    /// Number of times the inventory was listed
    pub fn listing_count(&self) -> usize {
        self.inner.listings.load(Ordering::SeqCst)
    }
}

impl EnumerationProvider for SimulatedBus {
    fn list_connectors(&self) -> Vec<ConnectorId> {
        self.inner.listings.fetch_add(1, Ordering::SeqCst);
        self.inner.connectors.lock().clone()
    }
}

/// Notification source fed by a [`SimulatedBus`]
pub struct SimulatedSource {
    bus: Arc<BusInner>,
    stream: UsbStream,
    subscription: Option<u64>,
    refuse: bool,
}

impl NotificationSource for SimulatedSource {
    fn name(&self) -> &str {
        match self.stream {
            UsbStream::DeviceChange => "sim-device-change",
            UsbStream::Hub => "sim-hub",
        }
    }

    fn start(&mut self, sender: mpsc::UnboundedSender<RawNotification>) -> Result<(), WatchError> {
        if self.refuse {
            return Err(WatchError::Subscribe {
                source_name: self.name().to_string(),
                reason: "access denied".to_string(),
            });
        }
        if self.subscription.is_some() {
            return Err(WatchError::AlreadyRunning(self.name().to_string()));
        }

        let id = self.bus.next_subscriber.fetch_add(1, Ordering::SeqCst);
        self.bus.subscribers.lock().push(Subscriber {
            id,
            stream: self.stream,
            sender,
        });
        self.subscription = Some(id);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(id) = self.subscription.take() {
            self.bus.subscribers.lock().retain(|s| s.id != id);
            self.bus.unsubscribes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_running(&self) -> bool {
        self.subscription.is_some()
    }
}
