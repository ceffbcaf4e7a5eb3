//! Event handling: debounce and discovery triggering
//!
//! The dispatcher runs one [`EventHandler`] call per connector at a time.
//! [`DiscoveryHandler`] is the production handler: it waits out the OS
//! re-enumeration burst on insertion, then asks the external
//! [`DiscoveryCoordinator`] to scan the connector. Removals are forwarded
//! immediately.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use port_detect::ConnectorId;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::error::DiscoveryError;
use crate::events::EventKind;

/// External subsystem that discovers and tears down devices
#[async_trait]
pub trait DiscoveryCoordinator: Send + Sync {
    /// Look for a device on the connector
    async fn request_discovery(&self, connector: &ConnectorId) -> Result<(), DiscoveryError>;

    /// Drop any state held for the connector
    async fn request_teardown(&self, connector: &ConnectorId) -> Result<(), DiscoveryError>;
}

/// Consumer of dequeued connector events
///
/// Implementations must not propagate failures; the dispatcher treats every
/// call as complete once it returns.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, kind: EventKind, connector: &ConnectorId);
}

#[derive(Debug, Clone, Copy)]
enum Action {
    Discovery,
    Teardown,
}

impl Action {
    fn label(self) -> &'static str {
        match self {
            Action::Discovery => "Device discovery",
            Action::Teardown => "Device teardown",
        }
    }
}

/// Debounces insertions and signals the discovery coordinator
pub struct DiscoveryHandler {
    coordinator: Arc<dyn DiscoveryCoordinator>,
    debounce: Duration,
    call_timeout: Option<Duration>,
    last_event: Mutex<EventKind>,
    sequence: AtomicU32,
}

impl DiscoveryHandler {
    pub fn new(coordinator: Arc<dyn DiscoveryCoordinator>, debounce: Duration) -> Self {
        Self {
            coordinator,
            debounce,
            call_timeout: None,
            last_event: Mutex::new(EventKind::Unknown),
            sequence: AtomicU32::new(0),
        }
    }

    pub fn from_config(coordinator: Arc<dyn DiscoveryCoordinator>, config: &PipelineConfig) -> Self {
        Self::new(coordinator, config.debounce_delay()).with_timeout(config.discovery_timeout())
    }

    /// Bound each coordinator call; `None` waits indefinitely
    pub fn with_timeout(mut self, call_timeout: Option<Duration>) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Most recent event kind observed
    pub fn last_event(&self) -> EventKind {
        *self.last_event.lock()
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    async fn signal(&self, action: Action, connector: &ConnectorId) {
        let number = self.sequence.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        let started = Instant::now();
        info!("{} #{} started on '{}'", action.label(), number, connector);

        let call = async {
            match action {
                Action::Discovery => self.coordinator.request_discovery(connector).await,
                Action::Teardown => self.coordinator.request_teardown(connector).await,
            }
        };
        let result = match self.call_timeout {
            Some(limit) => timeout(limit, call)
                .await
                .unwrap_or(Err(DiscoveryError::Timeout(limit))),
            None => call.await,
        };

        let elapsed = started.elapsed().as_secs_f64();
        match result {
            Ok(()) => info!(
                "{} #{} took {:.3}s on '{}'",
                action.label(),
                number,
                elapsed,
                connector
            ),
            Err(e) => warn!(
                "{} #{} failed after {:.3}s on '{}': {}",
                action.label(),
                number,
                elapsed,
                connector,
                e
            ),
        }
    }
}

#[async_trait]
impl EventHandler for DiscoveryHandler {
    async fn handle(&self, kind: EventKind, connector: &ConnectorId) {
        debug!("Processing {} event on '{}'", kind, connector);
        *self.last_event.lock() = kind;

        match kind {
            EventKind::Insertion => {
                info!(
                    "Connector plugged in on '{}', waiting {}ms before discovery",
                    connector,
                    self.debounce.as_millis()
                );
                // Let the OS settle the final port name after a power cycle
                sleep(self.debounce).await;
                self.signal(Action::Discovery, connector).await;
            }
            EventKind::Removal => {
                info!("Connector unplugged on '{}'", connector);
                self.signal(Action::Teardown, connector).await;
            }
            EventKind::Unknown => {
                info!(
                    "Unknown event on '{}', no discovery performed",
                    connector
                );
            }
        }
    }
}
