//! Error types for graph control

use thiserror::Error;

use crate::backend::NodeId;

/// Errors reported by an audio engine backend
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Parameter '{param}' is not settable on node {node}")]
    Unsupported { node: NodeId, param: String },

    #[error("Node creation failed: {0}")]
    CreationFailed(String),

    #[error("Audio context unavailable: {0}")]
    ContextUnavailable(String),

    #[error("Engine rejected operation: {0}")]
    Rejected(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Graph-level error type
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Sound source already exists: {0}")]
    DuplicateSource(String),

    #[error("Sound source not found: {0}")]
    SourceNotFound(String),

    #[error("Global effect already exists: {0}")]
    DuplicateEffect(String),

    #[error("Global effect not found: {0}")]
    EffectNotFound(String),

    #[error("Invalid parameter: {0}")]
    InvalidParam(String),

    #[error(transparent)]
    Core(#[from] sf_core::CoreError),
}

pub type GraphResult<T> = Result<T, GraphError>;
