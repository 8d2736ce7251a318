//! sf-control: Command layer and orchestration for SpatialForge
//!
//! Undoable commands over the shared [`sf_graph::SpatialMixer`], the
//! [`AudioOrchestrator`] that runs them, and immutable system snapshots.

mod command;
mod commands;
mod error;
mod orchestrator;
mod state;

pub use command::*;
pub use commands::*;
pub use error::*;
pub use orchestrator::*;
pub use state::*;
