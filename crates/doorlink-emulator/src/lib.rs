//! In-memory test bench for doorlink nodes and masters.
//!
//! [`SimulatedBus`] stands in for the addressed bus, [`SimulatedNode`] for a
//! binary node on mock hardware, and [`link::connect`] for a serial link to a
//! text node. [`Simulation`] wires a whole site together from a master
//! configuration.

pub mod bus;
pub mod link;
pub mod node;
pub mod simulation;

pub use bus::SimulatedBus;
pub use node::{NodeControls, SimulatedNode};
pub use simulation::Simulation;
