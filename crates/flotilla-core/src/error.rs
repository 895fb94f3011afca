//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid environment '{value}': expected one of development, staging, production")]
    InvalidEnvironment { value: String },

    #[error("Invalid namespace role '{value}'")]
    InvalidNamespaceRole { value: String },

    #[error("Chart not found in catalog: {name}")]
    ChartNotFound { name: String },

    #[error("Duplicate chart name in catalog: {name}")]
    DuplicateChart { name: String },

    #[error("Invalid chart '{name}': {message}")]
    InvalidChart { name: String, message: String },

    #[error("Failed to parse {path}: {source}")]
    ManifestParse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

pub type Result<T> = std::result::Result<T, CoreError>;
