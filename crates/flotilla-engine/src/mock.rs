//! In-memory cluster for testing
//!
//! Implements every port against shared in-memory state, with knobs for
//! scripted failures, slow installs and readiness delays, and records each
//! call so tests can assert on dispatch order.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use crate::error::{EngineError, Result};
use crate::ports::{
    ClusterAdmin, ReadinessProbe, ReleaseManager, ReleaseOutcome, ReleaseRequest, ReleaseStatus,
    ResourceRef,
};

/// A call received by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Install { release: String, namespace: String },
    Upgrade { release: String, namespace: String },
    Rollback { release: String, namespace: String, revision: u32 },
    Uninstall { release: String, namespace: String },
    Status { release: String, namespace: String },
    IsReady { release: String, namespace: String },
    EnsureNamespace { name: String },
    EnsureStorageClass,
}

#[derive(Debug, Clone)]
struct MockRelease {
    revision: u32,
    status: ReleaseStatus,
}

#[derive(Debug)]
struct MockState {
    namespaces: BTreeSet<String>,
    require_namespaces: bool,
    /// (namespace, release) -> release
    releases: HashMap<(String, String), MockRelease>,
    /// release -> failure messages, consumed one per install/upgrade
    failures: HashMap<String, VecDeque<String>>,
    never_ready: HashSet<String>,
    /// release -> readiness polls answering "not ready" before it is
    ready_after: HashMap<String, u32>,
    readiness_errors: HashMap<String, VecDeque<String>>,
    storage_class_available: bool,
    namespace_error: Option<String>,
    rollback_error: Option<String>,
    install_delay: Option<Duration>,
    calls: Vec<MockCall>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            namespaces: BTreeSet::new(),
            require_namespaces: false,
            releases: HashMap::new(),
            failures: HashMap::new(),
            never_ready: HashSet::new(),
            ready_after: HashMap::new(),
            readiness_errors: HashMap::new(),
            storage_class_available: true,
            namespace_error: None,
            rollback_error: None,
            install_delay: None,
            calls: Vec::new(),
        }
    }
}

/// In-memory implementation of the release manager, readiness probe and
/// cluster admin ports
#[derive(Clone, Default)]
pub struct MockCluster {
    state: Arc<RwLock<MockState>>,
}

impl MockCluster {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, MockState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, MockState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reject releases into namespaces that don't exist yet
    pub fn require_existing_namespaces(self) -> Self {
        self.write().require_namespaces = true;
        self
    }

    pub fn with_namespace(self, name: impl Into<String>) -> Self {
        self.write().namespaces.insert(name.into());
        self
    }

    /// Seed an existing release
    pub fn with_release(
        self,
        namespace: impl Into<String>,
        release: impl Into<String>,
        status: ReleaseStatus,
    ) -> Self {
        self.write().releases.insert(
            (namespace.into(), release.into()),
            MockRelease {
                revision: 1,
                status,
            },
        );
        self
    }

    /// Fail the next `times` installs or upgrades of a release with `message`
    pub fn fail_release_times(
        self,
        release: impl Into<String>,
        message: impl Into<String>,
        times: usize,
    ) -> Self {
        let message = message.into();
        self.write()
            .failures
            .entry(release.into())
            .or_default()
            .extend(std::iter::repeat_n(message, times));
        self
    }

    /// Fail every install or upgrade of a release
    pub fn fail_release(self, release: impl Into<String>, message: impl Into<String>) -> Self {
        self.fail_release_times(release, message, 1000)
    }

    pub fn never_ready(self, release: impl Into<String>) -> Self {
        self.write().never_ready.insert(release.into());
        self
    }

    /// Report a release as not ready for the first `polls` readiness checks
    pub fn ready_after(self, release: impl Into<String>, polls: u32) -> Self {
        self.write().ready_after.insert(release.into(), polls);
        self
    }

    /// Make the next `times` readiness probes of a release fail
    pub fn fail_readiness_times(
        self,
        release: impl Into<String>,
        message: impl Into<String>,
        times: usize,
    ) -> Self {
        let message = message.into();
        self.write()
            .readiness_errors
            .entry(release.into())
            .or_default()
            .extend(std::iter::repeat_n(message, times));
        self
    }

    pub fn without_storage_class(self) -> Self {
        self.write().storage_class_available = false;
        self
    }

    pub fn fail_namespace_creation(self, message: impl Into<String>) -> Self {
        self.write().namespace_error = Some(message.into());
        self
    }

    pub fn fail_rollbacks(self, message: impl Into<String>) -> Self {
        self.write().rollback_error = Some(message.into());
        self
    }

    /// Delay every install and upgrade
    pub fn with_install_delay(self, delay: Duration) -> Self {
        self.write().install_delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.read().calls.clone()
    }

    /// Releases in the order installs and upgrades were received
    pub fn dispatched_releases(&self) -> Vec<String> {
        self.read()
            .calls
            .iter()
            .filter_map(|call| match call {
                MockCall::Install { release, .. } | MockCall::Upgrade { release, .. } => {
                    Some(release.clone())
                }
                _ => None,
            })
            .collect()
    }

    /// Installs and upgrades received for a release
    pub fn install_count(&self, release: &str) -> usize {
        self.dispatched_releases()
            .iter()
            .filter(|r| r.as_str() == release)
            .count()
    }

    pub fn has_namespace(&self, name: &str) -> bool {
        self.read().namespaces.contains(name)
    }

    pub fn release_status(&self, namespace: &str, release: &str) -> ReleaseStatus {
        self.read()
            .releases
            .get(&(namespace.to_string(), release.to_string()))
            .map(|r| r.status.clone())
            .unwrap_or(ReleaseStatus::NotFound)
    }

    fn record(&self, call: MockCall) {
        self.write().calls.push(call);
    }

    async fn apply(&self, request: &ReleaseRequest, call: MockCall) -> Result<ReleaseOutcome> {
        self.record(call);

        let delay = self.read().install_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.write();
        if state.require_namespaces && !state.namespaces.contains(&request.namespace) {
            return Err(EngineError::operation(format!(
                "namespaces \"{}\" not found",
                request.namespace
            )));
        }
        if let Some(message) = state
            .failures
            .get_mut(&request.release)
            .and_then(VecDeque::pop_front)
        {
            return Err(EngineError::operation(message));
        }

        let key = (request.namespace.clone(), request.release.clone());
        let revision = state.releases.get(&key).map_or(0, |r| r.revision) + 1;
        if !request.options.dry_run {
            state.releases.insert(
                key,
                MockRelease {
                    revision,
                    status: ReleaseStatus::Deployed,
                },
            );
        }

        Ok(ReleaseOutcome {
            release: request.release.clone(),
            namespace: request.namespace.clone(),
            revision,
            status: ReleaseStatus::Deployed,
        })
    }
}

#[async_trait]
impl ReleaseManager for MockCluster {
    async fn install(&self, request: &ReleaseRequest) -> Result<ReleaseOutcome> {
        let call = MockCall::Install {
            release: request.release.clone(),
            namespace: request.namespace.clone(),
        };
        self.apply(request, call).await
    }

    async fn upgrade(&self, request: &ReleaseRequest) -> Result<ReleaseOutcome> {
        let call = MockCall::Upgrade {
            release: request.release.clone(),
            namespace: request.namespace.clone(),
        };
        self.apply(request, call).await
    }

    async fn rollback(&self, release: &str, namespace: &str, revision: u32) -> Result<()> {
        self.record(MockCall::Rollback {
            release: release.to_string(),
            namespace: namespace.to_string(),
            revision,
        });

        let mut state = self.write();
        if let Some(message) = state.rollback_error.clone() {
            return Err(EngineError::operation(message));
        }
        match state
            .releases
            .get_mut(&(namespace.to_string(), release.to_string()))
        {
            Some(existing) => {
                existing.revision += 1;
                existing.status = ReleaseStatus::Deployed;
                Ok(())
            }
            None => Err(EngineError::operation(format!(
                "release: not found: {}",
                release
            ))),
        }
    }

    async fn uninstall(&self, release: &str, namespace: &str) -> Result<()> {
        self.record(MockCall::Uninstall {
            release: release.to_string(),
            namespace: namespace.to_string(),
        });

        match self
            .write()
            .releases
            .remove(&(namespace.to_string(), release.to_string()))
        {
            Some(_) => Ok(()),
            None => Err(EngineError::operation(format!(
                "uninstall: Release not loaded: {}: release: not found",
                release
            ))),
        }
    }

    async fn status(&self, release: &str, namespace: &str) -> Result<ReleaseStatus> {
        self.record(MockCall::Status {
            release: release.to_string(),
            namespace: namespace.to_string(),
        });
        Ok(self.release_status(namespace, release))
    }
}

#[async_trait]
impl ReadinessProbe for MockCluster {
    async fn is_ready(&self, resource: &ResourceRef) -> Result<bool> {
        self.record(MockCall::IsReady {
            release: resource.release.clone(),
            namespace: resource.namespace.clone(),
        });

        let mut state = self.write();
        if let Some(message) = state
            .readiness_errors
            .get_mut(&resource.release)
            .and_then(VecDeque::pop_front)
        {
            return Err(EngineError::operation(message));
        }
        if state.never_ready.contains(&resource.release) {
            return Ok(false);
        }
        if let Some(remaining) = state.ready_after.get_mut(&resource.release) {
            if *remaining > 0 {
                *remaining -= 1;
                return Ok(false);
            }
        }

        Ok(state
            .releases
            .get(&(resource.namespace.clone(), resource.release.clone()))
            .is_some_and(|r| r.status == ReleaseStatus::Deployed))
    }
}

#[async_trait]
impl ClusterAdmin for MockCluster {
    async fn ensure_namespace(&self, name: &str) -> Result<()> {
        self.record(MockCall::EnsureNamespace {
            name: name.to_string(),
        });

        let mut state = self.write();
        if let Some(message) = state.namespace_error.clone() {
            return Err(EngineError::operation(message));
        }
        state.namespaces.insert(name.to_string());
        Ok(())
    }

    async fn ensure_default_storage_class(&self) -> Result<()> {
        self.record(MockCall::EnsureStorageClass);
        if self.read().storage_class_available {
            Ok(())
        } else {
            Err(EngineError::operation("no default storage class found"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_install_then_upgrade() {
        let mock = MockCluster::new();
        let request = ReleaseRequest::new("redis-cache", "charts/redis-cache", "alt-development");

        let first = mock.install(&request).await.unwrap();
        assert_eq!(first.revision, 1);
        assert_eq!(
            mock.status("redis-cache", "alt-development").await.unwrap(),
            ReleaseStatus::Deployed
        );

        let second = mock.upgrade(&request).await.unwrap();
        assert_eq!(second.revision, 2);
        assert_eq!(mock.install_count("redis-cache"), 2);
    }

    #[tokio::test]
    async fn test_scripted_failures_are_consumed() {
        let mock = MockCluster::new().fail_release_times("keycloak", "connection refused", 1);
        let request = ReleaseRequest::new("keycloak", "charts/keycloak", "alt-auth");

        let err = mock.install(&request).await.unwrap_err();
        assert_eq!(err.to_string(), "connection refused");
        assert!(mock.install(&request).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_namespace() {
        let mock = MockCluster::new().require_existing_namespaces();
        let request = ReleaseRequest::new("grafana", "charts/grafana", "alt-observability");
        let err = mock.install(&request).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "namespaces \"alt-observability\" not found"
        );

        mock.ensure_namespace("alt-observability").await.unwrap();
        mock.ensure_namespace("alt-observability").await.unwrap();
        assert!(mock.install(&request).await.is_ok());
    }

    #[tokio::test]
    async fn test_readiness() {
        let mock = MockCluster::new()
            .with_release("alt-apps", "api-gateway", ReleaseStatus::Deployed)
            .ready_after("api-gateway", 1);
        let resource = ResourceRef::new("api-gateway", "alt-apps");

        assert!(!mock.is_ready(&resource).await.unwrap());
        assert!(mock.is_ready(&resource).await.unwrap());
        assert!(
            !mock
                .is_ready(&ResourceRef::new("api-gateway", "alt-auth"))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_rollback_clears_pending() {
        let mock = MockCluster::new().with_release("alt-auth", "keycloak", ReleaseStatus::PendingUpgrade);
        mock.rollback("keycloak", "alt-auth", 0).await.unwrap();
        assert_eq!(mock.release_status("alt-auth", "keycloak"), ReleaseStatus::Deployed);
    }

    #[tokio::test]
    async fn test_uninstall_removes_release() {
        let mock = MockCluster::new().with_release("alt-auth", "keycloak", ReleaseStatus::PendingInstall);
        mock.uninstall("keycloak", "alt-auth").await.unwrap();
        assert_eq!(mock.release_status("alt-auth", "keycloak"), ReleaseStatus::NotFound);
        assert!(mock.uninstall("keycloak", "alt-auth").await.is_err());
    }
}
