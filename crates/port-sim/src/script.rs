//! Line-oriented commands for driving a [`SimulatedBus`]
//!
//! ```text
//! plug COM7
//! unplug COM7
//! hub-plug USB\VID_0801&PID_0011\B1234
//! hub-unplug USB\VID_0801&PID_0011\B1234
//! notify 2
//! list
//! ```

use std::str::FromStr;

use port_detect::ConnectorId;
use port_events::RawNotification;
use thiserror::Error;

use crate::bus::SimulatedBus;

/// Errors parsing a bus command
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseCommandError {
    #[error("empty command")]
    Empty,

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("{0} needs an argument")]
    MissingArgument(&'static str),
}

/// One scripted action on the bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusCommand {
    Plug(ConnectorId),
    Unplug(ConnectorId),
    HubPlug(String),
    HubUnplug(String),
    /// Raw device-change notification with an arbitrary event code
    Notify(String),
    List,
}

impl FromStr for BusCommand {
    type Err = ParseCommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (verb, arg) = match line.split_once(char::is_whitespace) {
            Some((verb, arg)) => (verb, arg.trim()),
            None => (line, ""),
        };

        let require = |name: &'static str| {
            if arg.is_empty() {
                Err(ParseCommandError::MissingArgument(name))
            } else {
                Ok(arg.to_string())
            }
        };

        match verb.to_ascii_lowercase().as_str() {
            "" => Err(ParseCommandError::Empty),
            "plug" => Ok(BusCommand::Plug(require("plug")?.into())),
            "unplug" => Ok(BusCommand::Unplug(require("unplug")?.into())),
            "hub-plug" => Ok(BusCommand::HubPlug(require("hub-plug")?)),
            "hub-unplug" => Ok(BusCommand::HubUnplug(require("hub-unplug")?)),
            "notify" => Ok(BusCommand::Notify(require("notify")?)),
            "list" => Ok(BusCommand::List),
            other => Err(ParseCommandError::UnknownCommand(other.to_string())),
        }
    }
}

impl BusCommand {
    /// Apply the command; returns a line describing the result
    pub fn apply(&self, bus: &SimulatedBus) -> String {
        use port_detect::EnumerationProvider;

        match self {
            BusCommand::Plug(id) => {
                if bus.plug(id.clone()) {
                    format!("plugged {}", id)
                } else {
                    format!("{} already attached", id)
                }
            }
            BusCommand::Unplug(id) => {
                if bus.unplug(id.clone()) {
                    format!("unplugged {}", id)
                } else {
                    format!("{} not attached", id)
                }
            }
            BusCommand::HubPlug(path) => {
                bus.hub_arrival(path.clone());
                format!("hub arrival {}", path)
            }
            BusCommand::HubUnplug(path) => {
                bus.hub_removal(path.clone());
                format!("hub removal {}", path)
            }
            BusCommand::Notify(code) => {
                let reached = bus.notify(RawNotification::DeviceChange {
                    event_code: code.clone(),
                });
                format!("event {} delivered to {} source(s)", code, reached)
            }
            BusCommand::List => {
                let connectors: Vec<String> = bus
                    .list_connectors()
                    .iter()
                    .map(ToString::to_string)
                    .collect();
                format!("attached: [{}]", connectors.join(", "))
            }
        }
    }
}
