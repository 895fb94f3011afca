//! Environment deployment strategies
//!
//! A strategy is immutable policy data: the ordered layer list for an
//! environment plus global timing, retry and zero-downtime settings. Layer
//! lists are rebuilt from static blueprints on every call, so a run can never
//! observe another run's changes.

use flotilla_core::{ChartCatalog, Environment};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{EngineError, Result};
use crate::layer::LayerConfiguration;

/// Deployment policy for an environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeploymentStrategy {
    /// Fast feedback: merged storage layer, short health checks
    Development,
    /// Exhaustive validation: every layer sequential and health-checked
    Staging,
    /// Conservative, with parallelism only for independent database layers
    Production,
    /// Critical path only, parallel everywhere
    DisasterRecovery,
}

/// Static description of a layer, resolved against the catalog on demand
struct LayerBlueprint {
    name: &'static str,
    charts: &'static [&'static str],
    health_check: bool,
    parallel: bool,
    critical: bool,
}

const fn layer(
    name: &'static str,
    charts: &'static [&'static str],
    parallel: bool,
    critical: bool,
) -> LayerBlueprint {
    LayerBlueprint {
        name,
        charts,
        health_check: true,
        parallel,
        critical,
    }
}

const FOUNDATION: &[&str] = &["platform-config", "platform-secrets", "ssl-certificates"];
const DATABASE_OPERATIONS: &[&str] = &["db-migration", "db-backup"];
const AUTHENTICATION: &[&str] = &["keycloak", "oauth2-proxy"];
const CORE_SERVICES: &[&str] = &[
    "api-gateway",
    "user-service",
    "order-service",
    "notification-service",
    "search-service",
    "analytics-service",
    "background-worker",
];
const FRONTEND: &[&str] = &["web-frontend", "admin-portal"];
const INGRESS: &[&str] = &["ingress-controller", "platform-ingress"];
const OBSERVABILITY: &[&str] = &["prometheus", "loki", "grafana", "alertmanager"];

const DEVELOPMENT_LAYERS: &[LayerBlueprint] = &[
    LayerBlueprint {
        name: "Foundation Layer",
        charts: FOUNDATION,
        health_check: false,
        parallel: true,
        critical: true,
    },
    layer(
        "Storage & Search Layer",
        &[
            "postgres-core",
            "redis-cache",
            "postgres-auth",
            "clickhouse-analytics",
            "elasticsearch",
        ],
        true,
        true,
    ),
    layer("Database Operations Layer", DATABASE_OPERATIONS, false, true),
    layer("Authentication Layer", AUTHENTICATION, false, true),
    layer("Core Services Layer", CORE_SERVICES, true, true),
    layer("Frontend Layer", FRONTEND, true, false),
    layer("Ingress Layer", INGRESS, false, true),
    layer("Observability Layer", OBSERVABILITY, false, false),
];

const STAGING_LAYERS: &[LayerBlueprint] = &[
    layer("Foundation Layer", FOUNDATION, false, true),
    layer("Core Database Layer", &["postgres-core", "redis-cache"], false, true),
    layer("Auth Database Layer", &["postgres-auth"], false, true),
    layer(
        "Analytics & Search Database Layer",
        &["clickhouse-analytics", "elasticsearch"],
        false,
        true,
    ),
    layer("Database Operations Layer", DATABASE_OPERATIONS, false, true),
    layer("Authentication Layer", AUTHENTICATION, false, true),
    layer("Core Services Layer", CORE_SERVICES, false, true),
    layer("Frontend Layer", FRONTEND, false, true),
    layer("Ingress Layer", INGRESS, false, true),
    layer("Observability Layer", OBSERVABILITY, false, false),
];

const PRODUCTION_LAYERS: &[LayerBlueprint] = &[
    layer("Foundation Layer", FOUNDATION, false, true),
    layer("Core Database Layer", &["postgres-core", "redis-cache"], false, true),
    layer("Auth Database Layer", &["postgres-auth"], true, true),
    layer(
        "Analytics & Search Database Layer",
        &["clickhouse-analytics", "elasticsearch"],
        true,
        true,
    ),
    layer("Database Operations Layer", DATABASE_OPERATIONS, false, true),
    layer("Authentication Layer", AUTHENTICATION, false, true),
    layer("Core Services Layer", CORE_SERVICES, false, true),
    layer("Frontend Layer", FRONTEND, false, false),
    layer("Ingress Layer", INGRESS, false, true),
    layer("Observability Layer", OBSERVABILITY, false, false),
];

const DISASTER_RECOVERY_LAYERS: &[LayerBlueprint] = &[
    layer(
        "Critical Storage Layer",
        &[
            "platform-config",
            "platform-secrets",
            "ssl-certificates",
            "postgres-core",
            "postgres-auth",
            "redis-cache",
        ],
        true,
        true,
    ),
    layer(
        "Essential Services Layer",
        &["keycloak", "api-gateway", "user-service", "order-service"],
        true,
        true,
    ),
    layer(
        "Basic Frontend Layer",
        &["ingress-controller", "web-frontend", "platform-ingress"],
        true,
        true,
    ),
];

const fn minutes(m: u64) -> Duration {
    Duration::from_secs(m * 60)
}

impl DeploymentStrategy {
    pub const ALL: [DeploymentStrategy; 4] = [
        DeploymentStrategy::Development,
        DeploymentStrategy::Staging,
        DeploymentStrategy::Production,
        DeploymentStrategy::DisasterRecovery,
    ];

    /// Default strategy for an environment
    pub fn for_environment(environment: Environment) -> Self {
        match environment {
            Environment::Development => Self::Development,
            Environment::Staging => Self::Staging,
            Environment::Production => Self::Production,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
            Self::DisasterRecovery => "disaster-recovery",
        }
    }

    /// Time budget for a whole run
    pub fn global_timeout(&self) -> Duration {
        match self {
            Self::Development => minutes(30),
            Self::Staging => minutes(60),
            Self::Production => minutes(90),
            Self::DisasterRecovery => minutes(25),
        }
    }

    /// Whether the strategy favours concurrent deployment
    pub fn allows_parallel_deployment(&self) -> bool {
        matches!(self, Self::Development | Self::DisasterRecovery)
    }

    /// Probe failures tolerated while polling a layer's readiness
    pub fn health_check_retries(&self) -> u32 {
        match self {
            Self::Development => 3,
            Self::Staging | Self::Production => 5,
            Self::DisasterRecovery => 2,
        }
    }

    pub fn requires_zero_downtime(&self) -> bool {
        matches!(self, Self::Production)
    }

    /// Attempt budget for transient chart failures
    pub fn operation_retries(&self) -> u32 {
        match self {
            Self::Development | Self::DisasterRecovery => 2,
            Self::Staging | Self::Production => 3,
        }
    }

    pub fn health_check_timeout(&self) -> Duration {
        match self {
            Self::Development => minutes(5),
            Self::Staging => minutes(12),
            Self::Production => minutes(10),
            Self::DisasterRecovery => minutes(4),
        }
    }

    fn wait_between_charts(&self) -> Duration {
        match self {
            Self::Development => Duration::from_secs(2),
            Self::Staging => Duration::from_secs(10),
            Self::Production => Duration::from_secs(15),
            Self::DisasterRecovery => Duration::ZERO,
        }
    }

    fn layer_completion_timeout(&self) -> Duration {
        match self {
            Self::Development => minutes(15),
            Self::Staging | Self::Production => minutes(30),
            Self::DisasterRecovery => minutes(10),
        }
    }

    fn blueprints(&self) -> &'static [LayerBlueprint] {
        match self {
            Self::Development => DEVELOPMENT_LAYERS,
            Self::Staging => STAGING_LAYERS,
            Self::Production => PRODUCTION_LAYERS,
            Self::DisasterRecovery => DISASTER_RECOVERY_LAYERS,
        }
    }

    /// Ordered layers with charts resolved against the catalog
    ///
    /// Returns a fresh list on every call.
    pub fn layer_configurations(&self, catalog: &ChartCatalog) -> Result<Vec<LayerConfiguration>> {
        self.blueprints()
            .iter()
            .map(|blueprint| {
                let charts = blueprint
                    .charts
                    .iter()
                    .map(|name| {
                        catalog
                            .find(name)
                            .cloned()
                            .ok_or_else(|| EngineError::UnknownLayerChart {
                                layer: blueprint.name.to_string(),
                                chart: name.to_string(),
                            })
                    })
                    .collect::<Result<Vec<_>>>()?;

                Ok(LayerConfiguration {
                    name: blueprint.name.to_string(),
                    charts,
                    requires_health_check: blueprint.health_check,
                    health_check_timeout: self.health_check_timeout(),
                    wait_between_charts: self.wait_between_charts(),
                    layer_completion_timeout: self.layer_completion_timeout(),
                    allow_parallel_deployment: blueprint.parallel,
                    critical_layer: blueprint.critical,
                })
            })
            .collect()
    }
}

impl fmt::Display for DeploymentStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for DeploymentStrategy {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "staging" => Ok(Self::Staging),
            "production" | "prod" => Ok(Self::Production),
            "disaster-recovery" | "disasterrecovery" | "dr" => Ok(Self::DisasterRecovery),
            _ => Err(EngineError::UnknownStrategy {
                name: s.to_string(),
            }),
        }
    }
}
