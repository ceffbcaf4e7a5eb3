//! Error types for the hot-plug pipeline

use std::time::Duration;

use port_detect::ConnectorId;
use thiserror::Error;

/// Errors raised while subscribing to OS notifications
#[derive(Debug, Error)]
pub enum WatchError {
    /// The OS refused the subscription
    #[error("failed to subscribe {source_name}: {reason}")]
    Subscribe { source_name: String, reason: String },

    /// The source is already delivering notifications
    #[error("notification source {0} is already running")]
    AlreadyRunning(String),
}

/// Errors reported by a discovery coordinator
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Discovery or teardown failed
    #[error("discovery failed on {connector}: {reason}")]
    Failed {
        connector: ConnectorId,
        reason: String,
    },

    /// The coordinator did not answer in time
    #[error("discovery timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

/// Errors that can occur when starting the pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Monitoring was started twice
    #[error("monitoring is already running")]
    AlreadyRunning,

    /// No notification source was configured
    #[error("no notification sources configured")]
    NoSources,
}
