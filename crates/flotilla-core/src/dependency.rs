//! Runtime service dependencies
//!
//! This is not packaging-level dependency data: it records which services
//! must be reachable before another one can start serving, and how long to
//! wait for them. The rollout order itself is fixed by the strategy layers.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::catalog::ChartCatalog;
use crate::environment::Environment;
use crate::error::Result;
use crate::namespace::NamespaceLayout;

/// A dependency of one service on another
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDependency {
    /// Release name of the dependency
    pub service_name: String,
    /// Kind of service (postgresql, redis, http, ...)
    pub service_type: String,
    /// Namespace the dependency runs in
    pub namespace: String,
    /// Whether the dependent cannot start without it
    pub required: bool,
    /// How long to wait for the dependency to become ready
    pub timeout_seconds: u64,
}

struct DependencyEntry {
    service: &'static str,
    service_type: &'static str,
    required: bool,
    timeout_seconds: u64,
}

const fn requires(service: &'static str, service_type: &'static str, timeout_seconds: u64) -> DependencyEntry {
    DependencyEntry {
        service,
        service_type,
        required: true,
        timeout_seconds,
    }
}

const fn prefers(service: &'static str, service_type: &'static str, timeout_seconds: u64) -> DependencyEntry {
    DependencyEntry {
        service,
        service_type,
        required: false,
        timeout_seconds,
    }
}

/// Dependent service -> its dependencies. Absent services are leaves.
const DEPENDENCY_TABLE: &[(&str, &[DependencyEntry])] = &[
    ("db-migration", &[requires("postgres-core", "postgresql", 300)]),
    ("db-backup", &[requires("postgres-core", "postgresql", 300)]),
    ("keycloak", &[requires("postgres-auth", "postgresql", 300)]),
    (
        "oauth2-proxy",
        &[
            requires("keycloak", "keycloak", 180),
            prefers("redis-cache", "redis", 60),
        ],
    ),
    (
        "api-gateway",
        &[
            requires("keycloak", "keycloak", 180),
            prefers("redis-cache", "redis", 60),
        ],
    ),
    (
        "user-service",
        &[
            requires("postgres-core", "postgresql", 300),
            requires("keycloak", "keycloak", 180),
            prefers("redis-cache", "redis", 60),
        ],
    ),
    (
        "order-service",
        &[
            requires("postgres-core", "postgresql", 300),
            requires("redis-cache", "redis", 120),
        ],
    ),
    (
        "notification-service",
        &[
            requires("redis-cache", "redis", 120),
            prefers("user-service", "http", 120),
        ],
    ),
    ("search-service", &[requires("elasticsearch", "elasticsearch", 600)]),
    (
        "analytics-service",
        &[
            requires("clickhouse-analytics", "clickhouse", 600),
            prefers("elasticsearch", "elasticsearch", 300),
        ],
    ),
    (
        "background-worker",
        &[
            requires("redis-cache", "redis", 120),
            requires("postgres-core", "postgresql", 300),
        ],
    ),
    ("web-frontend", &[requires("api-gateway", "http", 120)]),
    (
        "admin-portal",
        &[
            requires("api-gateway", "http", 120),
            requires("keycloak", "keycloak", 180),
        ],
    ),
    ("platform-ingress", &[requires("ingress-controller", "ingress", 180)]),
    (
        "grafana",
        &[
            requires("prometheus", "prometheus", 180),
            prefers("loki", "loki", 120),
        ],
    ),
    ("alertmanager", &[prefers("prometheus", "prometheus", 120)]),
];

/// Dependency lookup resolved for one environment
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    dependencies: HashMap<String, Vec<ServiceDependency>>,
}

impl DependencyGraph {
    /// Resolve the platform dependency table for an environment
    ///
    /// Fails if a dependency names a chart the catalog doesn't know.
    pub fn for_environment(
        environment: Environment,
        layout: &NamespaceLayout,
        catalog: &ChartCatalog,
    ) -> Result<Self> {
        let mut dependencies = HashMap::with_capacity(DEPENDENCY_TABLE.len());
        for (dependent, entries) in DEPENDENCY_TABLE {
            catalog.get(dependent)?;
            let resolved = entries
                .iter()
                .map(|entry| {
                    let chart = catalog.get(entry.service)?;
                    Ok(ServiceDependency {
                        service_name: entry.service.to_string(),
                        service_type: entry.service_type.to_string(),
                        namespace: layout.namespace_for(chart, environment),
                        required: entry.required,
                        timeout_seconds: entry.timeout_seconds,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            dependencies.insert(dependent.to_string(), resolved);
        }
        Ok(Self { dependencies })
    }

    /// Build a graph from explicit entries
    pub fn from_entries(entries: impl IntoIterator<Item = (String, Vec<ServiceDependency>)>) -> Self {
        Self {
            dependencies: entries.into_iter().collect(),
        }
    }

    /// Dependencies of a service; empty for leaf services
    pub fn dependencies_of(&self, service: &str) -> &[ServiceDependency] {
        self.dependencies
            .get(service)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn required_dependencies_of(&self, service: &str) -> Vec<&ServiceDependency> {
        self.dependencies_of(service)
            .iter()
            .filter(|d| d.required)
            .collect()
    }

    /// Longest readiness wait among a service's required dependencies
    pub fn readiness_timeout(&self, service: &str) -> Option<u64> {
        self.required_dependencies_of(service)
            .iter()
            .map(|d| d.timeout_seconds)
            .max()
    }

    /// Services that depend on `service`, sorted by name
    pub fn dependents_of(&self, service: &str) -> Vec<&str> {
        let mut dependents: Vec<&str> = self
            .dependencies
            .iter()
            .filter(|(_, deps)| deps.iter().any(|d| d.service_name == service))
            .map(|(name, _)| name.as_str())
            .collect();
        dependents.sort_unstable();
        dependents
    }

    pub fn is_leaf(&self, service: &str) -> bool {
        self.dependencies_of(service).is_empty()
    }
}
