//! Ports to the outside world
//!
//! The engine never talks to a cluster directly. Releases go through a
//! [`ReleaseManager`], readiness through a [`ReadinessProbe`] and namespace or
//! storage-class fixes through a [`ClusterAdmin`]. Implementations must be
//! `Send + Sync` so charts of a parallel layer can share them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;

/// Release state as reported by the release manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReleaseStatus {
    /// No release with that name in the namespace
    NotFound,
    Deployed,
    Failed,
    Superseded,
    Uninstalled,
    Uninstalling,
    PendingInstall,
    PendingUpgrade,
    PendingRollback,
    Unknown(String),
}

impl ReleaseStatus {
    /// Parse a status name (`deployed`, `pending-upgrade`, ...)
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "deployed" => Self::Deployed,
            "failed" => Self::Failed,
            "superseded" => Self::Superseded,
            "uninstalled" => Self::Uninstalled,
            "uninstalling" => Self::Uninstalling,
            "pending-install" => Self::PendingInstall,
            "pending-upgrade" => Self::PendingUpgrade,
            "pending-rollback" => Self::PendingRollback,
            "not-found" | "" => Self::NotFound,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Whether a release exists, so the next operation is an upgrade
    pub fn exists(&self) -> bool {
        !matches!(self, Self::NotFound | Self::Uninstalled)
    }

    /// Whether an operation holds the release lock
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            Self::PendingInstall | Self::PendingUpgrade | Self::PendingRollback
        )
    }
}

impl fmt::Display for ReleaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not-found"),
            Self::Deployed => write!(f, "deployed"),
            Self::Failed => write!(f, "failed"),
            Self::Superseded => write!(f, "superseded"),
            Self::Uninstalled => write!(f, "uninstalled"),
            Self::Uninstalling => write!(f, "uninstalling"),
            Self::PendingInstall => write!(f, "pending-install"),
            Self::PendingUpgrade => write!(f, "pending-upgrade"),
            Self::PendingRollback => write!(f, "pending-rollback"),
            Self::Unknown(s) => write!(f, "{}", s),
        }
    }
}

/// Options forwarded to an install or upgrade
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReleaseOptions {
    /// Block until resources are ready
    pub wait: bool,
    /// Timeout for the operation (and the wait)
    pub timeout: Option<Duration>,
    /// Render and validate without applying
    pub dry_run: bool,
    /// Force resource updates through replacement
    pub force: bool,
    /// Disallow in-place pod recreation
    pub zero_downtime: bool,
}

/// A single install or upgrade request
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseRequest {
    /// Release name (the chart name)
    pub release: String,
    /// Chart directory
    pub chart_path: PathBuf,
    /// Target namespace
    pub namespace: String,
    /// Values files layered on top of the chart defaults
    pub values_files: Vec<PathBuf>,
    /// Individual value overrides
    pub values: BTreeMap<String, String>,
    pub options: ReleaseOptions,
}

impl ReleaseRequest {
    pub fn new(
        release: impl Into<String>,
        chart_path: impl Into<PathBuf>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            release: release.into(),
            chart_path: chart_path.into(),
            namespace: namespace.into(),
            values_files: Vec::new(),
            values: BTreeMap::new(),
            options: ReleaseOptions::default(),
        }
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn with_options(mut self, options: ReleaseOptions) -> Self {
        self.options = options;
        self
    }
}

/// What the release manager reports after a successful operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseOutcome {
    pub release: String,
    pub namespace: String,
    pub revision: u32,
    pub status: ReleaseStatus,
}

/// Something whose readiness can be polled
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub release: String,
    pub namespace: String,
}

impl ResourceRef {
    pub fn new(release: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            release: release.into(),
            namespace: namespace.into(),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.release)
    }
}

/// Applies charts to the cluster
#[async_trait]
pub trait ReleaseManager: Send + Sync {
    /// Install a new release
    async fn install(&self, request: &ReleaseRequest) -> Result<ReleaseOutcome>;

    /// Upgrade an existing release
    async fn upgrade(&self, request: &ReleaseRequest) -> Result<ReleaseOutcome>;

    /// Roll a release back; revision 0 means the previous one
    async fn rollback(&self, release: &str, namespace: &str, revision: u32) -> Result<()>;

    /// Remove a release and its history
    async fn uninstall(&self, release: &str, namespace: &str) -> Result<()>;

    /// Current status of a release
    async fn status(&self, release: &str, namespace: &str) -> Result<ReleaseStatus>;
}

/// Polls workload readiness
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    async fn is_ready(&self, resource: &ResourceRef) -> Result<bool>;
}

/// Environment fixes used by auto-recovery
#[async_trait]
pub trait ClusterAdmin: Send + Sync {
    /// Create a namespace; succeeds if it already exists
    async fn ensure_namespace(&self, name: &str) -> Result<()>;

    /// Make sure a default storage class is available
    async fn ensure_default_storage_class(&self) -> Result<()>;
}

/// The set of ports an orchestrator runs against
#[derive(Clone)]
pub struct Ports {
    pub release_manager: Arc<dyn ReleaseManager>,
    pub readiness: Arc<dyn ReadinessProbe>,
    pub cluster_admin: Arc<dyn ClusterAdmin>,
}

impl Ports {
    pub fn new(
        release_manager: Arc<dyn ReleaseManager>,
        readiness: Arc<dyn ReadinessProbe>,
        cluster_admin: Arc<dyn ClusterAdmin>,
    ) -> Self {
        Self {
            release_manager,
            readiness,
            cluster_admin,
        }
    }

    /// Use one backend for all three ports
    pub fn unified<T>(backend: Arc<T>) -> Self
    where
        T: ReleaseManager + ReadinessProbe + ClusterAdmin + 'static,
    {
        Self {
            release_manager: backend.clone(),
            readiness: backend.clone(),
            cluster_admin: backend,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_status_parse() {
        assert_eq!(ReleaseStatus::parse("deployed"), ReleaseStatus::Deployed);
        assert_eq!(
            ReleaseStatus::parse("PENDING-UPGRADE"),
            ReleaseStatus::PendingUpgrade
        );
        assert_eq!(ReleaseStatus::parse(""), ReleaseStatus::NotFound);
        assert_eq!(
            ReleaseStatus::parse("weird"),
            ReleaseStatus::Unknown("weird".to_string())
        );
    }

    #[test]
    fn test_release_status_flags() {
        assert!(!ReleaseStatus::NotFound.exists());
        assert!(!ReleaseStatus::Uninstalled.exists());
        assert!(ReleaseStatus::Failed.exists());
        assert!(ReleaseStatus::PendingRollback.is_pending());
        assert!(!ReleaseStatus::Deployed.is_pending());
    }

    #[test]
    fn test_status_display_roundtrip() {
        for status in [
            ReleaseStatus::Deployed,
            ReleaseStatus::PendingInstall,
            ReleaseStatus::Superseded,
        ] {
            assert_eq!(ReleaseStatus::parse(&status.to_string()), status);
        }
    }

    #[test]
    fn test_resource_ref_display() {
        assert_eq!(
            ResourceRef::new("keycloak", "alt-auth").to_string(),
            "alt-auth/keycloak"
        );
    }
}
