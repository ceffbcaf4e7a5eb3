//! Hot-plug Simulation Library
//!
//! This crate provides a simulation layer for exercising the hot-plug
//! pipeline without physical devices. It includes:
//!
//! - **SimulatedBus**: a scripted connector inventory that doubles as an
//!   enumeration provider and a source of OS notifications
//! - **RecordingCoordinator**: a discovery coordinator that records every
//!   request with its timestamp and can inject failures or latency
//! - **BusCommand**: a line-oriented command language for driving the bus
//!   interactively
//!
//! # Example
//!
//! ```rust
//! use port_detect::EnumerationProvider;
//! use port_sim::SimulatedBus;
//!
//! let bus = SimulatedBus::new(["COM1"]);
//! bus.plug("COM7");
//!
//! assert_eq!(bus.list_connectors().len(), 2);
//! ```

pub mod bus;
pub mod coordinator;
pub mod script;

pub use bus::{SimulatedBus, SimulatedSource};
pub use coordinator::{RecordedCall, RecordingCoordinator, Request};
pub use script::{BusCommand, ParseCommandError};
