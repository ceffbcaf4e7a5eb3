//! Portwatch
//!
//! Watches for connectors being plugged in and unplugged, and asks for
//! device discovery (or teardown) on each one, one request per connector at
//! a time.

mod coordinator;
mod settings;
mod simulate;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use coordinator::ConsoleCoordinator;
use port_detect::ConnectorScanner;
use port_events::{Blacklist, HotplugPipeline};
use port_sim::SimulatedBus;
use settings::Settings;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// How long shutdown waits for queued events to finish
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Hot-plug watcher for serial connectors
#[derive(Parser, Debug)]
#[command(name = "portwatch")]
#[command(version)]
#[command(about = "Trigger device discovery when connectors are plugged or unplugged")]
struct Args {
    /// Settings file (default: $XDG_CONFIG_HOME/portwatch/settings.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Debounce before discovery on insertion (scaled by 1024/1000)
    #[arg(long)]
    debounce_ms: Option<u64>,

    /// Connectors that never trigger discovery (comma-separated)
    #[arg(long)]
    blacklist: Option<String>,

    /// Drive a simulated bus from stdin instead of real hardware
    #[arg(long)]
    simulate: bool,

    /// Connectors attached to the simulated bus at start (comma-separated)
    #[arg(long, default_value = "")]
    sim_ports: String,

    /// Also re-list connectors on a timer
    #[arg(long)]
    poll: bool,

    /// Report every connector that changed at once, not only the first
    #[arg(long)]
    emit_all: bool,

    /// Print attached connectors and exit
    #[arg(short, long)]
    list: bool,

    /// Write the effective settings back to the settings file
    #[arg(long)]
    save: bool,
}

impl Args {
    /// Layer command-line overrides on top of saved settings
    fn apply(&self, settings: &mut Settings) {
        if let Some(debounce_ms) = self.debounce_ms {
            settings.pipeline.debounce_ms = debounce_ms;
        }
        if let Some(list) = &self.blacklist {
            settings.pipeline.blacklist = Blacklist::parse(list);
        }
        if self.poll {
            settings.pipeline.polling_fallback = true;
        }
        if self.emit_all {
            settings.pipeline.emit_all_changes = true;
        }
    }

    fn sim_ports(&self) -> Vec<String> {
        self.sim_ports
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "portwatch=info,port_detect=info,port_events=info,port_sim=info".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let mut settings = Settings::load(args.config.as_deref());
    args.apply(&mut settings);

    if args.save {
        let path = settings.save(args.config.as_deref())?;
        info!("Saved settings to {}", path.display());
    }

    if !settings.pipeline.blacklist.is_empty() {
        info!("Blacklisted connectors: {:?}", settings.pipeline.blacklist.entries());
    }

    if args.simulate {
        run_simulated(&args, &settings).await
    } else {
        run_hardware(&args, &settings).await
    }
}

async fn run_hardware(args: &Args, settings: &Settings) -> anyhow::Result<()> {
    let scanner = ConnectorScanner::with_config(settings.scanner.clone());

    if args.list {
        for connector in scanner.try_list_connectors()? {
            println!("{}", connector);
        }
        return Ok(());
    }

    info!("Starting portwatch");
    let coordinator = Arc::new(ConsoleCoordinator::new(Some(scanner.clone())));
    let mut pipeline = HotplugPipeline::with_default_sources(
        &settings.pipeline,
        Arc::new(scanner),
        coordinator.clone(),
    );
    pipeline.start()?;

    tokio::signal::ctrl_c().await?;
    info!("Interrupted");

    shutdown(&mut pipeline, &coordinator).await;
    Ok(())
}

async fn run_simulated(args: &Args, settings: &Settings) -> anyhow::Result<()> {
    let bus = SimulatedBus::new(args.sim_ports());

    if args.list {
        println!("{}", port_sim::BusCommand::List.apply(&bus));
        return Ok(());
    }

    info!("Starting portwatch on a simulated bus");
    let coordinator = Arc::new(ConsoleCoordinator::new(None));
    let mut pipeline = simulate::pipeline(&settings.pipeline, &bus, coordinator.clone());
    pipeline.start()?;

    let result = simulate::drive(&bus).await;
    shutdown(&mut pipeline, &coordinator).await;
    result
}

async fn shutdown(pipeline: &mut HotplugPipeline, coordinator: &ConsoleCoordinator) {
    pipeline.stop();

    if tokio::time::timeout(SHUTDOWN_GRACE, pipeline.dispatcher().wait_idle())
        .await
        .is_err()
    {
        warn!(
            "Gave up waiting for {} busy connector(s)",
            pipeline
                .dispatcher()
                .tracked_connectors()
                .iter()
                .filter(|c| pipeline.dispatcher().is_processing(c))
                .count()
        );
    }

    let stats = pipeline.monitor().stats();
    let (discoveries, teardowns) = coordinator.totals();
    info!(
        "Shut down after {} notification(s): {} discovery and {} teardown request(s)",
        stats.notifications, discoveries, teardowns
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_settings() {
        let args = Args::parse_from([
            "portwatch",
            "--debounce-ms",
            "250",
            "--blacklist",
            "COM1, com2",
            "--emit-all",
        ]);
        let mut settings = Settings::default();
        args.apply(&mut settings);

        assert_eq!(settings.pipeline.debounce_ms, 250);
        assert_eq!(settings.pipeline.blacklist.entries(), ["COM1", "com2"]);
        assert!(settings.pipeline.emit_all_changes);
        assert!(!settings.pipeline.polling_fallback);
    }

    #[test]
    fn test_sim_ports_parsing() {
        let args = Args::parse_from(["portwatch", "--simulate", "--sim-ports", "COM1, ,COM3"]);
        assert!(args.simulate);
        assert_eq!(args.sim_ports(), ["COM1", "COM3"]);
    }
}
