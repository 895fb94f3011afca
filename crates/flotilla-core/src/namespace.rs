//! Namespace topology
//!
//! Namespaces are never stored: they are derived from the chart and the
//! environment. Development and staging put everything into one namespace,
//! production splits charts by role.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::chart::{Chart, ChartCategory};
use crate::environment::Environment;
use crate::error::CoreError;

/// Default prefix for every platform namespace
pub const DEFAULT_NAMESPACE_PREFIX: &str = "alt";

/// Production namespace roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamespaceRole {
    Apps,
    Database,
    Search,
    Auth,
    Ingress,
    Observability,
}

impl NamespaceRole {
    pub const ALL: [NamespaceRole; 6] = [
        NamespaceRole::Apps,
        NamespaceRole::Database,
        NamespaceRole::Search,
        NamespaceRole::Auth,
        NamespaceRole::Ingress,
        NamespaceRole::Observability,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Apps => "apps",
            Self::Database => "database",
            Self::Search => "search",
            Self::Auth => "auth",
            Self::Ingress => "ingress",
            Self::Observability => "observability",
        }
    }

    /// Role a chart category lands in
    pub fn for_category(category: ChartCategory) -> Self {
        match category {
            ChartCategory::Infrastructure
            | ChartCategory::Application
            | ChartCategory::Frontend => Self::Apps,
            ChartCategory::Database | ChartCategory::Operational => Self::Database,
            ChartCategory::Search => Self::Search,
            ChartCategory::Auth => Self::Auth,
            ChartCategory::Ingress => Self::Ingress,
            ChartCategory::Observability => Self::Observability,
        }
    }
}

impl fmt::Display for NamespaceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NamespaceRole {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CoreError::InvalidNamespaceRole {
                value: s.to_string(),
            })
    }
}

/// Maps charts to namespaces for an environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceLayout {
    prefix: String,
}

impl Default for NamespaceLayout {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE_PREFIX)
    }
}

impl NamespaceLayout {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The single namespace used by non-split environments
    pub fn environment_namespace(&self, environment: Environment) -> String {
        format!("{}-{}", self.prefix, environment.as_str())
    }

    /// The production namespace for a role
    pub fn role_namespace(&self, role: NamespaceRole) -> String {
        self.qualify(role.as_str())
    }

    /// Production role for a chart, with overrides for shared charts
    pub fn production_role(&self, chart: &Chart) -> NamespaceRole {
        let name = chart.name.as_str();
        if name.ends_with("-config") {
            return NamespaceRole::Apps;
        }
        if name.contains("migration") || name.contains("backup") {
            return NamespaceRole::Database;
        }
        if chart.multi_namespace {
            if let Some(role) = chart
                .target_namespaces
                .first()
                .and_then(|t| t.parse::<NamespaceRole>().ok())
            {
                return role;
            }
        }
        NamespaceRole::for_category(chart.category)
    }

    /// Primary namespace of a chart
    pub fn namespace_for(&self, chart: &Chart, environment: Environment) -> String {
        if environment.splits_namespaces() {
            self.role_namespace(self.production_role(chart))
        } else {
            self.environment_namespace(environment)
        }
    }

    /// Every namespace a chart is installed into, in install order
    pub fn target_namespaces_for(&self, chart: &Chart, environment: Environment) -> Vec<String> {
        if !environment.splits_namespaces() || !chart.multi_namespace {
            return vec![self.namespace_for(chart, environment)];
        }

        let mut namespaces: Vec<String> = Vec::with_capacity(chart.target_namespaces.len());
        for target in &chart.target_namespaces {
            let namespace = self.qualify(target);
            if !namespaces.contains(&namespace) {
                namespaces.push(namespace);
            }
        }
        namespaces
    }

    /// All namespaces an environment uses
    pub fn all_namespaces(&self, environment: Environment) -> Vec<String> {
        if environment.splits_namespaces() {
            NamespaceRole::ALL
                .iter()
                .map(|role| self.role_namespace(*role))
                .collect()
        } else {
            vec![self.environment_namespace(environment)]
        }
    }

    fn qualify(&self, suffix: &str) -> String {
        format!("{}-{}", self.prefix, suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ChartCatalog;
    use std::path::Path;

    fn catalog() -> ChartCatalog {
        ChartCatalog::platform(Path::new("charts")).unwrap()
    }

    #[test]
    fn test_non_production_collapses() {
        let layout = NamespaceLayout::default();
        let catalog = catalog();
        for chart in catalog.iter() {
            assert_eq!(
                layout.namespace_for(chart, Environment::Staging),
                "alt-staging"
            );
            assert_eq!(
                layout.target_namespaces_for(chart, Environment::Development),
                vec!["alt-development".to_string()]
            );
        }
    }

    #[test]
    fn test_production_split() {
        let layout = NamespaceLayout::default();
        let catalog = catalog();
        let ns = |name: &str| layout.namespace_for(catalog.get(name).unwrap(), Environment::Production);

        assert_eq!(ns("postgres-core"), "alt-database");
        assert_eq!(ns("elasticsearch"), "alt-search");
        assert_eq!(ns("keycloak"), "alt-auth");
        assert_eq!(ns("api-gateway"), "alt-apps");
        assert_eq!(ns("web-frontend"), "alt-apps");
        assert_eq!(ns("ingress-controller"), "alt-ingress");
        assert_eq!(ns("grafana"), "alt-observability");
    }

    #[test]
    fn test_production_overrides() {
        let layout = NamespaceLayout::default();
        let catalog = catalog();
        let ns = |name: &str| layout.namespace_for(catalog.get(name).unwrap(), Environment::Production);

        assert_eq!(ns("platform-config"), "alt-apps");
        assert_eq!(ns("db-migration"), "alt-database");
        assert_eq!(ns("db-backup"), "alt-database");
        assert_eq!(ns("platform-secrets"), "alt-apps");
    }

    #[test]
    fn test_multi_namespace_fan_out() {
        let layout = NamespaceLayout::new("acme");
        let catalog = catalog();
        let ssl = catalog.get("ssl-certificates").unwrap();

        assert_eq!(
            layout.target_namespaces_for(ssl, Environment::Production),
            vec!["acme-apps", "acme-auth", "acme-ingress"]
        );
        assert_eq!(
            layout.target_namespaces_for(ssl, Environment::Staging),
            vec!["acme-staging"]
        );
    }

    #[test]
    fn test_namespace_is_pure() {
        let layout = NamespaceLayout::default();
        let catalog = catalog();
        for env in Environment::ALL {
            for chart in catalog.iter() {
                assert_eq!(
                    layout.namespace_for(chart, env),
                    layout.namespace_for(chart, env)
                );
            }
        }
    }

    #[test]
    fn test_all_namespaces() {
        let layout = NamespaceLayout::default();
        assert_eq!(
            layout.all_namespaces(Environment::Development),
            vec!["alt-development"]
        );
        let production = layout.all_namespaces(Environment::Production);
        assert_eq!(production.len(), 6);
        assert!(production.contains(&"alt-observability".to_string()));

        // Every chart's namespaces are part of the environment's set
        let catalog = catalog();
        for chart in catalog.iter() {
            for ns in layout.target_namespaces_for(chart, Environment::Production) {
                assert!(production.contains(&ns), "{} not in production set", ns);
            }
        }
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("Auth".parse::<NamespaceRole>().unwrap(), NamespaceRole::Auth);
        assert!("cache".parse::<NamespaceRole>().is_err());
    }
}
