//! Flotilla Engine - layered deployment orchestration
//!
//! This crate turns the platform model from `flotilla-core` into a rollout:
//! - Environment strategies producing ordered layers with timing and parallelism policy
//! - A layer execution controller with health gates and criticality semantics
//! - Failure classification and retry with exponential backoff
//! - Auto-recovery for missing namespaces and storage classes
//! - Progress tracking for every layer and chart of a run
//!
//! Cluster access goes through the traits in [`ports`]; [`mock::MockCluster`]
//! implements them in memory.

pub mod classifier;
pub mod controller;
pub mod error;
pub mod layer;
pub mod mock;
pub mod options;
pub mod ports;
pub mod progress;
pub mod recovery;
pub mod retry;
pub mod strategy;

pub use classifier::{ErrorClassification, ErrorType, classify};
pub use controller::Orchestrator;
pub use error::{EngineError, Result};
pub use layer::LayerConfiguration;
pub use options::{CancellationSignal, RunOptions};
pub use ports::{
    ClusterAdmin, Ports, ReadinessProbe, ReleaseManager, ReleaseOptions, ReleaseOutcome,
    ReleaseRequest, ReleaseStatus, ResourceRef,
};
pub use progress::{
    ChartProgress, ChartStatus, DeploymentProgress, LayerProgress, LayerStatus, ProgressSummary,
    ProgressTracker, RunStatus,
};
pub use recovery::{
    BatchRecoveryReport, RecoverableError, RecoveryAction, RecoveryEngine, RecoveryResult,
    analyze_error,
};
pub use retry::{DeploymentError, backoff_for_attempt};
pub use strategy::DeploymentStrategy;
