//! Recording discovery coordinator
//!
//! Stands in for the device-discovery subsystem. Every request is recorded
//! with its start and end time on the tokio clock, so tests running with a
//! paused clock can assert exact debounce timing.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use port_detect::ConnectorId;
use port_events::{DiscoveryCoordinator, DiscoveryError};
use tokio::sync::Notify;
use tokio::time::{sleep, Instant};
use tracing::info;

/// Kind of request received
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    Discovery,
    Teardown,
}

/// One completed request
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub request: Request,
    pub connector: ConnectorId,
    /// When the request arrived
    pub started: Instant,
    /// When the request returned
    pub finished: Instant,
    pub succeeded: bool,
}

/// Discovery coordinator that records what it was asked to do
#[derive(Default)]
pub struct RecordingCoordinator {
    calls: Mutex<Vec<RecordedCall>>,
    latency: Duration,
    failing: Mutex<HashSet<ConnectorId>>,
    active: Mutex<HashMap<ConnectorId, usize>>,
    overlap: AtomicBool,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    recorded: Notify,
}

impl RecordingCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every request take `latency` before returning
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    /// Make requests for `connector` fail
    pub fn fail_on(&self, connector: impl Into<ConnectorId>) {
        self.failing.lock().insert(connector.into());
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Connectors discovered, in completion order
    pub fn discoveries(&self) -> Vec<ConnectorId> {
        self.connectors_for(Request::Discovery)
    }

    /// Connectors torn down, in completion order
    pub fn teardowns(&self) -> Vec<ConnectorId> {
        self.connectors_for(Request::Teardown)
    }

    fn connectors_for(&self, request: Request) -> Vec<ConnectorId> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.request == request)
            .map(|c| c.connector.clone())
            .collect()
    }

    /// True if two requests for the same connector ever overlapped
    pub fn overlap_detected(&self) -> bool {
        self.overlap.load(Ordering::SeqCst)
    }

    /// Highest number of requests in flight at once, across connectors
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Wait until at least `count` requests have completed
    pub async fn wait_for_calls(&self, count: usize) {
        loop {
            let notified = self.recorded.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.calls.lock().len() >= count {
                return;
            }
            notified.await;
        }
    }

    async fn record(
        &self,
        request: Request,
        connector: &ConnectorId,
    ) -> Result<(), DiscoveryError> {
        let started = Instant::now();
        {
            let mut active = self.active.lock();
            let count = active.entry(connector.clone()).or_insert(0);
            *count += 1;
            if *count > 1 {
                self.overlap.store(true, Ordering::SeqCst);
            }
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.latency.is_zero() {
            sleep(self.latency).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if let Some(count) = self.active.lock().get_mut(connector) {
            *count -= 1;
        }

        let succeeded = !self.failing.lock().contains(connector);
        info!("Simulated {:?} on '{}' (ok: {})", request, connector, succeeded);
        self.calls.lock().push(RecordedCall {
            request,
            connector: connector.clone(),
            started,
            finished: Instant::now(),
            succeeded,
        });
        self.recorded.notify_waiters();

        if succeeded {
            Ok(())
        } else {
            Err(DiscoveryError::Failed {
                connector: connector.clone(),
                reason: "simulated failure".to_string(),
            })
        }
    }
}

#[async_trait]
impl DiscoveryCoordinator for RecordingCoordinator {
    async fn request_discovery(&self, connector: &ConnectorId) -> Result<(), DiscoveryError> {
        self.record(Request::Discovery, connector).await
    }

    async fn request_teardown(&self, connector: &ConnectorId) -> Result<(), DiscoveryError> {
        self.record(Request::Teardown, connector).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_requests_in_order() {
        let coordinator = RecordingCoordinator::new();

        coordinator.request_discovery(&"COM1".into()).await.unwrap();
        coordinator.request_teardown(&"COM1".into()).await.unwrap();

        assert_eq!(coordinator.discoveries(), vec![ConnectorId::from("COM1")]);
        assert_eq!(coordinator.teardowns(), vec![ConnectorId::from("COM1")]);
        assert!(!coordinator.overlap_detected());
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let coordinator = RecordingCoordinator::new();
        coordinator.fail_on("COM4");

        let result = coordinator.request_discovery(&"COM4".into()).await;
        assert!(matches!(result, Err(DiscoveryError::Failed { .. })));
        assert!(!coordinator.calls()[0].succeeded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_same_connector_is_flagged() {
        let coordinator = RecordingCoordinator::with_latency(Duration::from_millis(50));
        let id = ConnectorId::from("COM1");

        let (a, b) = tokio::join!(
            coordinator.request_discovery(&id),
            coordinator.request_discovery(&id)
        );
        assert!(a.is_ok() && b.is_ok());
        assert!(coordinator.overlap_detected());
        assert_eq!(coordinator.max_in_flight(), 2);
    }
}
