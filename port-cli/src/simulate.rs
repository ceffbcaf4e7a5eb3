//! Simulated bus driven from stdin

use std::sync::Arc;

use port_events::{HotplugPipeline, PipelineConfig, UsbStream};
use port_sim::{BusCommand, SimulatedBus};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::coordinator::ConsoleCoordinator;

/// Build a pipeline over a simulated bus with both notification streams
pub fn pipeline(
    config: &PipelineConfig,
    bus: &SimulatedBus,
    coordinator: Arc<ConsoleCoordinator>,
) -> HotplugPipeline {
    let pipeline = HotplugPipeline::new(config, Arc::new(bus.clone()), coordinator);
    pipeline.add_source(Box::new(bus.source(UsbStream::DeviceChange)));
    pipeline.add_source(Box::new(bus.source(UsbStream::Hub)));
    pipeline
}

/// Apply bus commands read from stdin until EOF or Ctrl-C
pub async fn drive(bus: &SimulatedBus) -> anyhow::Result<()> {
    info!("Simulation ready: plug <id>, unplug <id>, hub-plug <path>, hub-unplug <path>, notify <code>, list");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("End of input");
                    return Ok(());
                };
                if line.trim().is_empty() || line.trim_start().starts_with('#') {
                    continue;
                }
                match line.parse::<BusCommand>() {
                    Ok(command) => println!("{}", command.apply(bus)),
                    Err(e) => warn!("{}", e),
                }
            }
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("Interrupted");
                return Ok(());
            }
        }
    }
}
