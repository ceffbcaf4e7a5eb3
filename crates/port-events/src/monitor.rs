//! Device change monitor
//!
//! Turns raw OS notifications into per-connector events. Each notification
//! triggers a fresh listing from the [`EnumerationProvider`], which is diffed
//! against the last-known inventory. Only genuinely new or genuinely missing
//! connectors produce an event, so duplicate OS deliveries are harmless.
//!
//! # Flow
//!
//! ```text
//! sources ──RawNotification──► reconcile task ──ConnectorEvent──► dispatcher
//!                                  │
//!                          inventory lock + re-list
//! ```
//!
//! All notification streams funnel into a single task, and [`reconcile`]
//! holds the inventory lock for the whole re-list/diff/replace step. The
//! task runs each reconcile on the blocking pool since listing touches the
//! OS device tree.
//!
//! A USB arrival is reported when the USB device appears, which can be
//! before its serial node exists. Every device-change notification is
//! therefore re-run once after [`MonitorOptions::recheck_after`]; the diff
//! makes the repeat harmless when nothing lagged.
//!
//! [`reconcile`]: DeviceChangeMonitor::reconcile

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use port_detect::{usb_ids, ConnectorId, EnumerationProvider};
use tokio::sync::mpsc;
use tokio::task::{self, JoinHandle};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::PipelineError;
use crate::events::{ConnectorEvent, EventKind, RawNotification};
use crate::inventory::ConnectorInventory;
use crate::watcher::NotificationSource;

/// Default delay before a device-change notification is re-run
pub const DEFAULT_RECHECK: Duration = Duration::from_millis(1000);

/// Reconciliation options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorOptions {
    /// Vendor accepted from the hub stream
    pub hub_vendor: u16,
    /// Emit every added/removed connector instead of only the first
    pub emit_all_changes: bool,
    /// Re-run each device-change notification once after this delay, for
    /// connectors whose node appears after the USB notification
    pub recheck_after: Option<Duration>,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            hub_vendor: usb_ids::magtek::VID,
            emit_all_changes: false,
            recheck_after: Some(DEFAULT_RECHECK),
        }
    }
}

/// Snapshot of monitor counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorStats {
    /// Raw notifications received
    pub notifications: u64,
    /// Connector events emitted
    pub events_emitted: u64,
    /// Notifications that changed nothing
    pub suppressed: u64,
    /// Notifications that could not be classified
    pub unknown: u64,
    /// Delayed re-runs of device-change notifications
    pub rechecks: u64,
    /// Sources that failed to subscribe
    pub subscription_failures: u64,
}

#[derive(Default)]
struct Counters {
    notifications: AtomicU64,
    events_emitted: AtomicU64,
    suppressed: AtomicU64,
    unknown: AtomicU64,
    rechecks: AtomicU64,
    subscription_failures: AtomicU64,
}

struct Lifecycle {
    sources: Vec<Box<dyn NotificationSource>>,
    task: Option<JoinHandle<()>>,
}

/// Watches OS notification streams and emits reconciled connector events
pub struct DeviceChangeMonitor {
    provider: Arc<dyn EnumerationProvider>,
    options: MonitorOptions,
    inventory: Mutex<ConnectorInventory>,
    lifecycle: Mutex<Lifecycle>,
    counters: Counters,
}

impl DeviceChangeMonitor {
    pub fn new(provider: Arc<dyn EnumerationProvider>, options: MonitorOptions) -> Self {
        Self {
            provider,
            options,
            inventory: Mutex::new(ConnectorInventory::default()),
            lifecycle: Mutex::new(Lifecycle {
                sources: Vec::new(),
                task: None,
            }),
            counters: Counters::default(),
        }
    }

    /// Register a notification source; it is subscribed on the next `start`
    pub fn add_source(&self, source: Box<dyn NotificationSource>) {
        self.lifecycle.lock().sources.push(source);
    }

    /// Capture the inventory and subscribe every source
    ///
    /// A source that fails to subscribe is logged and left inert; the others
    /// keep running. Must be called from within a tokio runtime.
    pub fn start(
        self: &Arc<Self>,
        events: mpsc::UnboundedSender<ConnectorEvent>,
    ) -> Result<(), PipelineError> {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.task.is_some() {
            return Err(PipelineError::AlreadyRunning);
        }
        if lifecycle.sources.is_empty() {
            return Err(PipelineError::NoSources);
        }

        self.refresh_inventory();

        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let mut subscribed = 0;
        for source in lifecycle.sources.iter_mut() {
            match source.start(raw_tx.clone()) {
                Ok(()) => subscribed += 1,
                Err(e) => {
                    self.counters
                        .subscription_failures
                        .fetch_add(1, Ordering::Relaxed);
                    warn!("Notification source {} unavailable: {}", source.name(), e);
                }
            }
        }
        drop(raw_tx);

        if subscribed == 0 {
            warn!("No notification source subscribed; connector changes will not be detected");
        }

        let monitor = Arc::clone(self);
        lifecycle.task = Some(tokio::spawn(monitor.run(raw_rx, events)));

        info!(
            "Monitoring {} connector(s) via {} source(s)",
            self.inventory.lock().len(),
            subscribed
        );
        Ok(())
    }

    /// Reconcile task: one notification at a time, listing off the runtime
    async fn run(
        self: Arc<Self>,
        mut raw_rx: mpsc::UnboundedReceiver<RawNotification>,
        events: mpsc::UnboundedSender<ConnectorEvent>,
    ) {
        let (recheck_tx, mut recheck_rx) = mpsc::unbounded_channel();

        loop {
            let (raw, is_recheck) = tokio::select! {
                raw = raw_rx.recv() => match raw {
                    Some(raw) => (raw, false),
                    None => break,
                },
                Some(raw) = recheck_rx.recv() => (raw, true),
            };

            if is_recheck {
                self.counters.rechecks.fetch_add(1, Ordering::Relaxed);
            } else if let Some(delay) = self.recheck_delay(&raw) {
                let recheck_tx = recheck_tx.clone();
                let raw = raw.clone();
                tokio::spawn(async move {
                    sleep(delay).await;
                    let _ = recheck_tx.send(raw);
                });
            }

            let monitor = Arc::clone(&self);
            let reconciled = match task::spawn_blocking(move || monitor.reconcile(raw)).await {
                Ok(reconciled) => reconciled,
                Err(e) => {
                    warn!("Reconciliation aborted: {}", e);
                    continue;
                }
            };

            for event in reconciled {
                if events.send(event).is_err() {
                    debug!("Event receiver dropped, stopping reconciliation");
                    return;
                }
            }
        }
    }

    fn recheck_delay(&self, raw: &RawNotification) -> Option<Duration> {
        match raw {
            RawNotification::DeviceChange { .. } if raw.kind() != EventKind::Unknown => {
                self.options.recheck_after
            }
            _ => None,
        }
    }

    /// Unsubscribe every source and stop reconciling
    ///
    /// Safe to call when never started, and idempotent. Events already handed
    /// to the dispatcher are not affected.
    pub fn stop(&self) {
        let mut lifecycle = self.lifecycle.lock();
        for source in lifecycle.sources.iter_mut() {
            source.stop();
        }
        if let Some(task) = lifecycle.task.take() {
            task.abort();
            info!("Stopped monitoring connectors");
        }
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle.lock().task.is_some()
    }

    /// Replace the inventory with a fresh listing
    pub fn refresh_inventory(&self) {
        let live = self.provider.list_connectors();
        *self.inventory.lock() = ConnectorInventory::new(live);
    }

    /// Copy of the last-known inventory
    pub fn inventory(&self) -> Vec<ConnectorId> {
        self.inventory.lock().as_slice().to_vec()
    }

    pub fn stats(&self) -> MonitorStats {
        MonitorStats {
            notifications: self.counters.notifications.load(Ordering::Relaxed),
            events_emitted: self.counters.events_emitted.load(Ordering::Relaxed),
            suppressed: self.counters.suppressed.load(Ordering::Relaxed),
            unknown: self.counters.unknown.load(Ordering::Relaxed),
            rechecks: self.counters.rechecks.load(Ordering::Relaxed),
            subscription_failures: self.counters.subscription_failures.load(Ordering::Relaxed),
        }
    }

    /// Reconcile one raw notification against the inventory
    ///
    /// Returns at most one event unless `emit_all_changes` is set.
    pub fn reconcile(&self, raw: RawNotification) -> Vec<ConnectorEvent> {
        self.counters.notifications.fetch_add(1, Ordering::Relaxed);
        let kind = raw.kind();

        let events = match raw {
            RawNotification::Hub { instance_path, .. } => {
                if !usb_ids::instance_has_vendor(&instance_path, self.options.hub_vendor) {
                    return Vec::new();
                }
                let _inventory = self.inventory.lock();
                vec![ConnectorEvent::new(kind, instance_path)]
            }
            RawNotification::DeviceChange { .. } => match kind {
                EventKind::Unknown => {
                    self.counters.unknown.fetch_add(1, Ordering::Relaxed);
                    debug!("Ignoring unclassified device change");
                    return Vec::new();
                }
                _ => self.diff(kind),
            },
        };

        if events.is_empty() {
            self.counters.suppressed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.counters
                .events_emitted
                .fetch_add(events.len() as u64, Ordering::Relaxed);
            for event in &events {
                info!("Connector {} ({})", event.kind.verb(), event.connector);
            }
        }
        events
    }

    fn diff(&self, kind: EventKind) -> Vec<ConnectorEvent> {
        let mut inventory = self.inventory.lock();
        let live = self.provider.list_connectors();

        let changed = match kind {
            EventKind::Insertion => inventory.added_in(&live),
            EventKind::Removal => inventory.removed_in(&live),
            EventKind::Unknown => return Vec::new(),
        };
        if changed.is_empty() {
            return Vec::new();
        }

        *inventory = ConnectorInventory::new(live);

        let take = if self.options.emit_all_changes {
            changed.len()
        } else {
            if changed.len() > 1 {
                debug!(
                    "{} connectors changed at once, reporting only {}",
                    changed.len(),
                    changed[0]
                );
            }
            1
        };

        changed
            .into_iter()
            .take(take)
            .map(|connector| ConnectorEvent::new(kind, connector))
            .collect()
    }
}
