//! Pipeline wiring
//!
//! ```text
//! NotificationSource(s) → DeviceChangeMonitor ──mpsc──► run_dispatch_loop → Dispatcher → EventHandler
//! ```
//!
//! The monitor and dispatcher only share a channel, so ordering between them
//! is the channel's FIFO order.

use std::sync::Arc;

use port_detect::EnumerationProvider;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::dispatcher::Dispatcher;
use crate::error::PipelineError;
use crate::events::ConnectorEvent;
use crate::handler::{DiscoveryCoordinator, DiscoveryHandler, EventHandler};
use crate::monitor::{DeviceChangeMonitor, MonitorOptions};
use crate::watcher::{NotificationSource, PollingWatcher, UsbWatcher};

/// Forward reconciled events to the dispatcher until the channel closes
pub async fn run_dispatch_loop(
    mut events: mpsc::UnboundedReceiver<ConnectorEvent>,
    dispatcher: Dispatcher,
) {
    while let Some(event) = events.recv().await {
        debug!("Dispatching {}", event);
        dispatcher.submit_event(event);
    }
    debug!("Event channel closed, dispatch loop exiting");
}

/// Notification sources selected by the configuration
pub fn default_sources(
    config: &PipelineConfig,
    provider: Arc<dyn EnumerationProvider>,
) -> Vec<Box<dyn NotificationSource>> {
    let mut sources: Vec<Box<dyn NotificationSource>> = Vec::new();
    if config.usb_watch {
        sources.push(Box::new(UsbWatcher::device_change()));
    }
    if config.hub_watch {
        sources.push(Box::new(UsbWatcher::hub()));
    }
    if config.polling_fallback {
        sources.push(Box::new(PollingWatcher::new(
            provider,
            config.poll_interval(),
        )));
    }
    sources
}

/// Monitor, dispatcher and handler wired together
pub struct HotplugPipeline {
    monitor: Arc<DeviceChangeMonitor>,
    dispatcher: Dispatcher,
    handler: Arc<DiscoveryHandler>,
    router: Option<JoinHandle<()>>,
}

impl HotplugPipeline {
    /// Build a pipeline with no notification sources
    pub fn new(
        config: &PipelineConfig,
        provider: Arc<dyn EnumerationProvider>,
        coordinator: Arc<dyn DiscoveryCoordinator>,
    ) -> Self {
        let options = MonitorOptions {
            hub_vendor: config.hub_vendor,
            emit_all_changes: config.emit_all_changes,
            recheck_after: config.recheck_delay(),
        };
        let monitor = Arc::new(DeviceChangeMonitor::new(provider, options));
        let handler = Arc::new(DiscoveryHandler::from_config(coordinator, config));
        let dispatcher = Dispatcher::new(
            Arc::clone(&handler) as Arc<dyn EventHandler>,
            config.blacklist.clone(),
        );

        Self {
            monitor,
            dispatcher,
            handler,
            router: None,
        }
    }

    /// Build a pipeline subscribed to the OS sources named in `config`
    pub fn with_default_sources(
        config: &PipelineConfig,
        provider: Arc<dyn EnumerationProvider>,
        coordinator: Arc<dyn DiscoveryCoordinator>,
    ) -> Self {
        let pipeline = Self::new(config, Arc::clone(&provider), coordinator);
        for source in default_sources(config, provider) {
            pipeline.add_source(source);
        }
        pipeline
    }

    pub fn add_source(&self, source: Box<dyn NotificationSource>) {
        self.monitor.add_source(source);
    }

    /// Start monitoring; must be called from within a tokio runtime
    pub fn start(&mut self) -> Result<(), PipelineError> {
        if self.router.is_some() {
            return Err(PipelineError::AlreadyRunning);
        }

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        self.monitor.start(event_tx)?;
        self.router = Some(tokio::spawn(run_dispatch_loop(
            event_rx,
            self.dispatcher.clone(),
        )));

        info!("Hot-plug pipeline started");
        Ok(())
    }

    /// Stop accepting notifications
    ///
    /// Idempotent. Events already queued keep draining; use
    /// [`Dispatcher::wait_idle`] to wait for them.
    pub fn stop(&mut self) {
        self.monitor.stop();
        // The router exits by itself once the monitor drops its sender
        if self.router.take().is_some() {
            info!("Hot-plug pipeline stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.router.is_some()
    }

    pub fn monitor(&self) -> &Arc<DeviceChangeMonitor> {
        &self.monitor
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn handler(&self) -> &Arc<DiscoveryHandler> {
        &self.handler
    }
}

impl Drop for HotplugPipeline {
    fn drop(&mut self) {
        self.monitor.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use port_detect::ConnectorId;

    struct EmptyProvider;

    impl EnumerationProvider for EmptyProvider {
        fn list_connectors(&self) -> Vec<ConnectorId> {
            Vec::new()
        }
    }

    #[test]
    fn test_default_sources_follow_config() {
        let provider: Arc<dyn EnumerationProvider> = Arc::new(EmptyProvider);

        let names: Vec<String> = default_sources(&PipelineConfig::default(), provider.clone())
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        assert_eq!(names, ["usb-device-change", "usb-hub"]);

        let config = PipelineConfig {
            usb_watch: false,
            hub_watch: false,
            polling_fallback: true,
            ..Default::default()
        };
        let names: Vec<String> = default_sources(&config, provider)
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        assert_eq!(names, ["polling"]);
    }
}
