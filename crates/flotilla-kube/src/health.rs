//! Workload readiness for releases
//!
//! A release is ready when every Deployment and StatefulSet it owns is fully
//! rolled out:
//! - Deployments: all replicas updated, ready and available
//! - StatefulSets: all replicas ready and current, and the current revision
//!   matches the update revision
//!
//! Releases without workloads (configuration, secrets, ingress rules) are
//! ready as soon as helm records them as deployed.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, ListParams};

use flotilla_engine::{ReadinessProbe, ResourceRef};

use crate::client::KubeCluster;
use crate::error::Result;

/// Label helm charts put on every resource of a release
pub const INSTANCE_LABEL: &str = "app.kubernetes.io/instance";

/// Readiness of one workload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadHealth {
    pub kind: &'static str,
    pub name: String,
    pub ready: bool,
    pub message: Option<String>,
}

/// Label selector for the workloads of a release
pub fn release_selector(release: &str) -> String {
    format!("{}={}", INSTANCE_LABEL, release)
}

/// Label selector for helm's storage secret of a deployed release
pub fn helm_release_selector(release: &str) -> String {
    format!("owner=helm,name={},status=deployed", release)
}

/// Check Deployment readiness
pub fn deployment_health(deployment: &Deployment) -> WorkloadHealth {
    let spec = deployment.spec.as_ref();
    let status = deployment.status.as_ref();

    let desired = spec.and_then(|s| s.replicas).unwrap_or(1);
    let ready = status.and_then(|s| s.ready_replicas).unwrap_or(0);
    let updated = status.and_then(|s| s.updated_replicas).unwrap_or(0);
    let available = status.and_then(|s| s.available_replicas).unwrap_or(0);

    let healthy = ready == desired && updated == desired && available == desired;

    let message = (!healthy).then(|| {
        status
            .and_then(|s| s.conditions.as_ref())
            .map(|conditions| {
                conditions
                    .iter()
                    .filter(|cond| cond.status == "False")
                    .filter_map(|cond| {
                        cond.message
                            .as_ref()
                            .map(|m| format!("{}: {}", cond.type_, m))
                    })
                    .collect::<Vec<_>>()
                    .join("; ")
            })
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| {
                format!(
                    "{}/{} ready, {}/{} updated, {}/{} available",
                    ready, desired, updated, desired, available, desired
                )
            })
    });

    WorkloadHealth {
        kind: "Deployment",
        name: deployment.metadata.name.clone().unwrap_or_default(),
        ready: healthy,
        message,
    }
}

/// Check StatefulSet readiness
pub fn statefulset_health(sts: &StatefulSet) -> WorkloadHealth {
    let spec = sts.spec.as_ref();
    let status = sts.status.as_ref();

    let desired = spec.and_then(|s| s.replicas).unwrap_or(1);
    let ready = status.and_then(|s| s.ready_replicas).unwrap_or(0);
    let current = status.and_then(|s| s.current_replicas).unwrap_or(0);

    let current_rev = status.and_then(|s| s.current_revision.as_ref());
    let update_rev = status.and_then(|s| s.update_revision.as_ref());
    let revision_match = current_rev == update_rev;

    let healthy = ready == desired && current == desired && revision_match;

    WorkloadHealth {
        kind: "StatefulSet",
        name: sts.metadata.name.clone().unwrap_or_default(),
        ready: healthy,
        message: (!healthy).then(|| {
            format!(
                "{}/{} ready, {}/{} current, revision match: {}",
                ready, desired, current, desired, revision_match
            )
        }),
    }
}

impl KubeCluster {
    /// Readiness of every workload of a release
    pub async fn release_workloads(&self, release: &str, namespace: &str) -> Result<Vec<WorkloadHealth>> {
        let params = ListParams::default().labels(&release_selector(release));

        let deployments: Api<Deployment> = Api::namespaced(self.kube_client().clone(), namespace);
        let statefulsets: Api<StatefulSet> = Api::namespaced(self.kube_client().clone(), namespace);

        let mut workloads: Vec<WorkloadHealth> = deployments
            .list(&params)
            .await?
            .items
            .iter()
            .map(deployment_health)
            .collect();
        workloads.extend(statefulsets.list(&params).await?.items.iter().map(statefulset_health));
        Ok(workloads)
    }

    /// Whether helm recorded the release as deployed
    pub async fn release_recorded(&self, release: &str, namespace: &str) -> Result<bool> {
        let secrets: Api<Secret> = Api::namespaced(self.kube_client().clone(), namespace);
        let params = ListParams::default().labels(&helm_release_selector(release));
        Ok(!secrets.list(&params).await?.items.is_empty())
    }
}

#[async_trait]
impl ReadinessProbe for KubeCluster {
    async fn is_ready(&self, resource: &ResourceRef) -> flotilla_engine::Result<bool> {
        let workloads = self
            .release_workloads(&resource.release, &resource.namespace)
            .await?;

        if workloads.is_empty() {
            return Ok(self
                .release_recorded(&resource.release, &resource.namespace)
                .await?);
        }

        for workload in workloads.iter().filter(|w| !w.ready) {
            tracing::debug!(
                resource = %resource,
                kind = workload.kind,
                name = %workload.name,
                "{}",
                workload.message.as_deref().unwrap_or("not ready")
            );
        }
        Ok(workloads.iter().all(|w| w.ready))
    }
}
