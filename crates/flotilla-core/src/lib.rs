//! Flotilla Core - platform model for the Flotilla deployment orchestrator
//!
//! This crate provides the static description of the platform being rolled out:
//! - `Environment`: Target environment (development, staging, production)
//! - `Chart`: A deployable release unit and its catalog
//! - `NamespaceLayout`: Environment-specific namespace topology
//! - `DependencyGraph`: Runtime dependencies between services
//! - `OrchestratorConfig`: On-disk orchestrator configuration

pub mod catalog;
pub mod chart;
pub mod config;
pub mod dependency;
pub mod environment;
pub mod error;
pub mod namespace;

pub use catalog::ChartCatalog;
pub use chart::{CategoryGroup, Chart, ChartCategory};
pub use config::{OrchestratorConfig, RetryConfig};
pub use dependency::{DependencyGraph, ServiceDependency};
pub use environment::Environment;
pub use error::{CoreError, Result};
pub use namespace::{DEFAULT_NAMESPACE_PREFIX, NamespaceLayout, NamespaceRole};
