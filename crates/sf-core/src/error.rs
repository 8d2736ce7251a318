//! Error types for SpatialForge core values

use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid parameter: {0}")]
    InvalidParam(String),

    #[error("Invalid position: {0}")]
    InvalidPosition(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

/// Result type alias
pub type CoreResult<T> = Result<T, CoreError>;
