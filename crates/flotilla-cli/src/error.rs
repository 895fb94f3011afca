//! CLI error types with exit code handling
//!
//! Every failure a command can report is mapped onto one `CliError`, which
//! carries the help text shown by miette and the process exit code.

use flotilla_core::CoreError;
use flotilla_engine::EngineError;
use flotilla_kube::KubeError;
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Configuration file could not be read or is invalid
    #[error("Configuration error: {message}")]
    #[diagnostic(code(flotilla::cli::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Invalid argument value (environment, strategy, ...)
    #[error("{message}")]
    #[diagnostic(code(flotilla::cli::usage))]
    Usage {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Cluster or release manager unreachable
    #[error("Cluster error: {message}")]
    #[diagnostic(
        code(flotilla::cli::cluster),
        help("Check your kubeconfig context and that the helm binary is on PATH")
    )]
    Cluster { message: String },

    /// A critical layer failed or the global timeout expired
    #[error("Deployment failed: {message}")]
    #[diagnostic(code(flotilla::cli::deployment_failed))]
    DeploymentFailed {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Only non-critical layers failed
    #[error("Deployment degraded: {layers} non-critical layer(s) failed")]
    #[diagnostic(
        code(flotilla::cli::degraded),
        help("Critical layers are up; redeploy once the failing charts are fixed")
    )]
    PartialFailure { layers: usize },

    /// Run interrupted before completion
    #[error("Deployment aborted: {message}")]
    #[diagnostic(code(flotilla::cli::aborted))]
    Aborted { message: String },

    /// Some errors could not be recovered automatically
    #[error("{failed} of {total} error(s) need manual intervention")]
    #[diagnostic(code(flotilla::cli::recovery))]
    RecoveryIncomplete { failed: usize, total: usize },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(flotilla::cli::io))]
    Io { message: String },

    /// Internal error (runtime, unexpected failure)
    #[error("Internal error: {message}")]
    #[diagnostic(code(flotilla::cli::internal))]
    Internal { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config { .. } => exit_codes::CONFIG_ERROR,
            CliError::Usage { .. } => exit_codes::USAGE_ERROR,
            CliError::Cluster { .. } => exit_codes::CLUSTER_ERROR,
            CliError::DeploymentFailed { .. } => exit_codes::DEPLOYMENT_FAILED,
            CliError::PartialFailure { .. } => exit_codes::PARTIAL_FAILURE,
            CliError::Aborted { .. } => exit_codes::ABORTED,
            CliError::RecoveryIncomplete { .. } => exit_codes::ERROR,
            CliError::Io { .. } => exit_codes::ERROR,
            CliError::Internal { .. } => exit_codes::ERROR,
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create a cluster error
    pub fn cluster(message: impl Into<String>) -> Self {
        Self::Cluster {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::internal(format!("JSON serialization failed: {err}"))
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidEnvironment { .. } => CliError::Usage {
                message: err.to_string(),
                help: Some("Use one of: development, staging, production".to_string()),
            },
            CoreError::InvalidConfig { .. }
            | CoreError::YamlParse(_)
            | CoreError::ManifestParse { .. } => CliError::Config {
                message: err.to_string(),
                help: Some("See `flotilla --help` for the configuration file location".to_string()),
            },
            CoreError::Io(_) => CliError::Io {
                message: err.to_string(),
            },
            other => CliError::internal(other.to_string()),
        }
    }
}

impl From<EngineError> for CliError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Core(core) => core.into(),
            EngineError::UnknownStrategy { .. } => CliError::Usage {
                message: err.to_string(),
                help: Some(
                    "Use one of: development, staging, production, disaster-recovery".to_string(),
                ),
            },
            other => CliError::internal(other.to_string()),
        }
    }
}

impl From<KubeError> for CliError {
    fn from(err: KubeError) -> Self {
        CliError::cluster(err.to_string())
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_environment_is_usage_error() {
        let err: CliError = "qa".parse::<flotilla_core::Environment>().unwrap_err().into();
        assert!(matches!(err, CliError::Usage { help: Some(_), .. }));
        assert_eq!(err.exit_code(), exit_codes::USAGE_ERROR);
    }

    #[test]
    fn test_unknown_strategy_is_usage_error() {
        let err: CliError = "blue-green"
            .parse::<flotilla_engine::DeploymentStrategy>()
            .unwrap_err()
            .into();
        assert_eq!(err.exit_code(), exit_codes::USAGE_ERROR);
    }

    #[test]
    fn test_config_error_exit_code() {
        let err: CliError = CoreError::InvalidConfig {
            message: "namespacePrefix must not be empty".to_string(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_codes::CONFIG_ERROR);
        assert!(err.to_string().contains("namespacePrefix"));
    }

    #[test]
    fn test_run_outcome_exit_codes() {
        assert_eq!(CliError::PartialFailure { layers: 1 }.exit_code(), 6);
        assert_eq!(
            CliError::Aborted {
                message: "interrupted".to_string()
            }
            .exit_code(),
            130
        );
        assert_eq!(
            CliError::DeploymentFailed {
                message: "x".to_string(),
                help: None
            }
            .exit_code(),
            exit_codes::DEPLOYMENT_FAILED
        );
    }

    #[test]
    fn test_kube_error_is_cluster_error() {
        let err: CliError = KubeError::HelmNotFound {
            binary: "helm".to_string(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_codes::CLUSTER_ERROR);
    }
}
