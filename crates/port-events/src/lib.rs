//! Hot-plug Event Pipeline
//!
//! This crate detects connectors being plugged and unplugged and drives the
//! resulting events through per-connector serialized queues.
//!
//! # Architecture
//!
//! - **Notification sources** ([`watcher`]) report raw OS device-change signals
//! - **[`DeviceChangeMonitor`]** re-lists connectors on each signal and diffs
//!   against the last-known inventory, emitting one [`ConnectorEvent`] per
//!   genuine change
//! - **[`Dispatcher`]** queues events per connector and guarantees at most one
//!   handler call in flight per connector, while different connectors run
//!   concurrently
//! - **[`DiscoveryHandler`]** debounces insertions and signals the external
//!   [`DiscoveryCoordinator`]
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use port_detect::{ConnectorId, ConnectorScanner};
//! use port_events::{DiscoveryCoordinator, DiscoveryError, HotplugPipeline, PipelineConfig};
//!
//! struct Logger;
//!
//! #[async_trait]
//! impl DiscoveryCoordinator for Logger {
//!     async fn request_discovery(&self, connector: &ConnectorId) -> Result<(), DiscoveryError> {
//!         println!("discover {}", connector);
//!         Ok(())
//!     }
//!
//!     async fn request_teardown(&self, connector: &ConnectorId) -> Result<(), DiscoveryError> {
//!         println!("drop {}", connector);
//!         Ok(())
//!     }
//! }
//!
//! # async fn run() -> Result<(), port_events::PipelineError> {
//! let config = PipelineConfig::default();
//! let mut pipeline = HotplugPipeline::with_default_sources(
//!     &config,
//!     Arc::new(ConnectorScanner::new()),
//!     Arc::new(Logger),
//! );
//! pipeline.start()?;
//! # Ok(())
//! # }
//! ```

pub mod blacklist;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod handler;
pub mod inventory;
pub mod monitor;
pub mod pipeline;
pub mod watcher;

pub use blacklist::Blacklist;
pub use config::PipelineConfig;
pub use dispatcher::{Dispatcher, SubmitOutcome};
pub use error::{DiscoveryError, PipelineError, WatchError};
pub use events::{ConnectorEvent, EventKind, RawNotification};
pub use handler::{DiscoveryCoordinator, DiscoveryHandler, EventHandler};
pub use inventory::ConnectorInventory;
pub use monitor::{DeviceChangeMonitor, MonitorOptions, MonitorStats};
pub use pipeline::{default_sources, run_dispatch_loop, HotplugPipeline};
pub use watcher::{NotificationSource, PollingWatcher, UsbStream, UsbWatcher};

pub use port_detect::ConnectorId;
