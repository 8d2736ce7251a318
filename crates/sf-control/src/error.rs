//! Error types for the control layer

use sf_core::CoreError;
use sf_graph::GraphError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ControlError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Command queue is already being processed")]
    QueueBusy,

    #[error("Orchestrator is shut down")]
    ShutDown,
}

pub type SfResult<T> = Result<T, ControlError>;
