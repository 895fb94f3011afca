//! Error types for flotilla-kube

use flotilla_engine::EngineError;
use thiserror::Error;

/// Result type for flotilla-kube operations
pub type Result<T> = std::result::Result<T, KubeError>;

/// Errors that can occur talking to the cluster or to helm
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KubeError {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    /// Kubeconfig could not be loaded
    #[error("invalid kubeconfig: {0}")]
    Config(String),

    /// helm exited with an error; the message is its stderr
    #[error("{message}")]
    Helm { command: String, message: String },

    /// helm binary is missing
    #[error("helm binary '{binary}' not found\nHint: install helm or set helmBinary in the configuration file")]
    HelmNotFound { binary: String },

    /// No default storage class in the cluster
    #[error("no default storage class found (expected an annotated default or 'standard')")]
    NoDefaultStorageClass,

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for KubeError {
    fn from(e: serde_json::Error) -> Self {
        KubeError::Serialization(e.to_string())
    }
}

impl KubeError {
    /// Check if this is a conflict error (409), e.g. the object already exists
    pub fn is_conflict(&self) -> bool {
        matches!(self, KubeError::Api(kube::Error::Api(resp)) if resp.code == 409)
    }
}

/// Port errors carry the raw failure text so the engine can classify it
impl From<KubeError> for EngineError {
    fn from(e: KubeError) -> Self {
        EngineError::operation(e.to_string())
    }
}
