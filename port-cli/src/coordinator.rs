//! Discovery coordinator that reports to the log

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use port_detect::{ConnectorId, ConnectorScanner};
use port_events::{DiscoveryCoordinator, DiscoveryError};
use tokio::task;
use tracing::info;

/// Logs every discovery and teardown request
///
/// With a scanner attached, discovery requests are annotated with the
/// adapter description of the matching serial port.
#[derive(Default)]
pub struct ConsoleCoordinator {
    scanner: Option<ConnectorScanner>,
    discoveries: AtomicU64,
    teardowns: AtomicU64,
}

impl ConsoleCoordinator {
    pub fn new(scanner: Option<ConnectorScanner>) -> Self {
        Self {
            scanner,
            ..Self::default()
        }
    }

    async fn describe(&self, connector: &ConnectorId) -> Option<String> {
        let scanner = self.scanner.clone()?;
        let ports = task::spawn_blocking(move || scanner.enumerate_ports())
            .await
            .ok()?
            .ok()?;
        ports
            .into_iter()
            .find(|p| connector.eq_ignore_case(&p.port))
            .map(|p| p.describe().to_string())
    }

    /// (discoveries, teardowns) requested so far
    pub fn totals(&self) -> (u64, u64) {
        (
            self.discoveries.load(Ordering::Relaxed),
            self.teardowns.load(Ordering::Relaxed),
        )
    }
}

#[async_trait]
impl DiscoveryCoordinator for ConsoleCoordinator {
    async fn request_discovery(&self, connector: &ConnectorId) -> Result<(), DiscoveryError> {
        self.discoveries.fetch_add(1, Ordering::Relaxed);
        match self.describe(connector).await {
            Some(adapter) => info!("Discover devices on '{}' ({})", connector, adapter),
            None => info!("Discover devices on '{}'", connector),
        }
        Ok(())
    }

    async fn request_teardown(&self, connector: &ConnectorId) -> Result<(), DiscoveryError> {
        self.teardowns.fetch_add(1, Ordering::Relaxed);
        info!("Tear down devices on '{}'", connector);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counts_requests() {
        let coordinator = ConsoleCoordinator::new(None);

        coordinator.request_discovery(&"COM1".into()).await.unwrap();
        coordinator.request_discovery(&"COM2".into()).await.unwrap();
        coordinator.request_teardown(&"COM1".into()).await.unwrap();

        assert_eq!(coordinator.totals(), (2, 1));
    }
}
