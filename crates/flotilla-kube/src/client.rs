//! Cluster access through the Kubernetes API
//!
//! [`KubeCluster`] creates namespaces and checks storage classes for
//! auto-recovery, and answers readiness probes (see [`crate::health`]).

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::api::storage::v1::StorageClass;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, ListParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use std::collections::BTreeMap;

use flotilla_engine::ClusterAdmin;

use crate::error::{KubeError, Result};

/// Annotation marking the cluster's default storage class
pub const DEFAULT_CLASS_ANNOTATION: &str = "storageclass.kubernetes.io/is-default-class";

/// Storage class accepted when nothing is annotated as default
pub const FALLBACK_STORAGE_CLASS: &str = "standard";

/// Label set on namespaces created by the orchestrator
pub const MANAGED_BY_LABEL: (&str, &str) = ("app.kubernetes.io/managed-by", "flotilla");

/// Kubernetes API client implementing the cluster-side ports
#[derive(Clone)]
pub struct KubeCluster {
    client: kube::Client,
}

impl KubeCluster {
    /// Connect using the default kubeconfig, optionally selecting a context
    pub async fn connect(context: Option<&str>) -> Result<Self> {
        let client = match context {
            None => kube::Client::try_default().await?,
            Some(context) => {
                let kubeconfig = Kubeconfig::read().map_err(|e| KubeError::Config(e.to_string()))?;
                let options = KubeConfigOptions {
                    context: Some(context.to_string()),
                    ..Default::default()
                };
                let config = kube::Config::from_custom_kubeconfig(kubeconfig, &options)
                    .await
                    .map_err(|e| KubeError::Config(e.to_string()))?;
                kube::Client::try_from(config)?
            }
        };
        Ok(Self { client })
    }

    /// Create with an existing Kubernetes client
    pub fn with_client(client: kube::Client) -> Self {
        Self { client }
    }

    /// Get the underlying Kubernetes client
    pub fn kube_client(&self) -> &kube::Client {
        &self.client
    }

    /// Create a namespace unless it already exists
    pub async fn create_namespace(&self, name: &str) -> Result<()> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        match api
            .create(&PostParams::default(), &managed_namespace(name))
            .await
            .map_err(KubeError::from)
        {
            Ok(_) => {
                tracing::info!(namespace = name, "namespace created");
                Ok(())
            }
            Err(e) if e.is_conflict() => {
                tracing::debug!(namespace = name, "namespace already exists");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Check that the cluster has a usable default storage class
    pub async fn check_default_storage_class(&self) -> Result<String> {
        let api: Api<StorageClass> = Api::all(self.client.clone());
        let classes = api.list(&ListParams::default()).await?;
        default_storage_class(&classes.items).ok_or(KubeError::NoDefaultStorageClass)
    }
}

/// Namespace object labelled as managed by the orchestrator
pub fn managed_namespace(name: &str) -> Namespace {
    Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(BTreeMap::from([(
                MANAGED_BY_LABEL.0.to_string(),
                MANAGED_BY_LABEL.1.to_string(),
            )])),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Name of the default storage class: the annotated one, else `standard`
pub fn default_storage_class(classes: &[StorageClass]) -> Option<String> {
    let annotated = classes.iter().find(|class| {
        class
            .metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(DEFAULT_CLASS_ANNOTATION))
            .is_some_and(|v| v == "true")
    });

    annotated
        .or_else(|| {
            classes
                .iter()
                .find(|class| class.metadata.name.as_deref() == Some(FALLBACK_STORAGE_CLASS))
        })
        .and_then(|class| class.metadata.name.clone())
}

#[async_trait]
impl ClusterAdmin for KubeCluster {
    async fn ensure_namespace(&self, name: &str) -> flotilla_engine::Result<()> {
        Ok(self.create_namespace(name).await?)
    }

    async fn ensure_default_storage_class(&self) -> flotilla_engine::Result<()> {
        let class = self.check_default_storage_class().await?;
        tracing::debug!(storage_class = %class, "default storage class available");
        Ok(())
    }
}
