//! Engine error types

use flotilla_core::CoreError;
use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors raised by the orchestration engine and its ports
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    /// Platform model error (catalog, namespaces, configuration)
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Unknown strategy name
    #[error("unknown deployment strategy '{name}': expected development, staging, production or disaster-recovery")]
    UnknownStrategy { name: String },

    /// A strategy layer references a chart missing from the catalog
    #[error("layer '{layer}' references unknown chart '{chart}'")]
    UnknownLayerChart { layer: String, chart: String },

    /// A port operation failed; the message is the raw failure text
    #[error("{message}")]
    Operation { message: String },
}

impl EngineError {
    /// Create an operation error from raw failure text
    pub fn operation(message: impl Into<String>) -> Self {
        Self::Operation {
            message: message.into(),
        }
    }
}
