//! Flotilla Kube - cluster adapters for the Flotilla orchestrator
//!
//! This crate implements the engine's ports against a real cluster:
//! - [`KubeCluster`]: namespace creation, storage-class checks and workload
//!   readiness through the Kubernetes API
//! - [`HelmCli`]: install, upgrade, rollback and status through the `helm` binary

pub mod client;
pub mod error;
pub mod health;
pub mod helm;

pub use client::KubeCluster;
pub use error::{KubeError, Result};
pub use health::WorkloadHealth;
pub use helm::HelmCli;
