//! The chart catalog
//!
//! The catalog is built once at startup from the static platform definition
//! and shared read-only with everything that needs to resolve chart names.

use indexmap::IndexMap;
use std::path::Path;

use crate::chart::{Chart, ChartCategory};
use crate::error::{CoreError, Result};

/// Static description of one platform chart
struct PlatformChart {
    name: &'static str,
    category: ChartCategory,
    wait: bool,
    targets: &'static [&'static str],
}

const fn unit(name: &'static str, category: ChartCategory) -> PlatformChart {
    PlatformChart {
        name,
        category,
        wait: true,
        targets: &[],
    }
}

const fn no_wait(name: &'static str, category: ChartCategory) -> PlatformChart {
    PlatformChart {
        name,
        category,
        wait: false,
        targets: &[],
    }
}

const fn shared(name: &'static str, targets: &'static [&'static str]) -> PlatformChart {
    PlatformChart {
        name,
        category: ChartCategory::Infrastructure,
        wait: false,
        targets,
    }
}

/// Every release unit of the platform
const PLATFORM_CHARTS: &[PlatformChart] = &[
    // Shared configuration
    no_wait("platform-config", ChartCategory::Infrastructure),
    shared(
        "platform-secrets",
        &["apps", "database", "search", "auth", "observability"],
    ),
    shared("ssl-certificates", &["apps", "auth", "ingress"]),
    // Storage
    unit("postgres-core", ChartCategory::Database),
    unit("redis-cache", ChartCategory::Database),
    unit("postgres-auth", ChartCategory::Database),
    unit("clickhouse-analytics", ChartCategory::Database),
    unit("elasticsearch", ChartCategory::Search),
    // Database operations
    unit("db-migration", ChartCategory::Operational),
    no_wait("db-backup", ChartCategory::Operational),
    // Identity
    unit("keycloak", ChartCategory::Auth),
    unit("oauth2-proxy", ChartCategory::Auth),
    // Services
    unit("api-gateway", ChartCategory::Application),
    unit("user-service", ChartCategory::Application),
    unit("order-service", ChartCategory::Application),
    unit("notification-service", ChartCategory::Application),
    unit("search-service", ChartCategory::Application),
    unit("analytics-service", ChartCategory::Application),
    unit("background-worker", ChartCategory::Application),
    // Frontends
    unit("web-frontend", ChartCategory::Frontend),
    unit("admin-portal", ChartCategory::Frontend),
    // Edge
    unit("ingress-controller", ChartCategory::Ingress),
    no_wait("platform-ingress", ChartCategory::Ingress),
    // Monitoring
    unit("prometheus", ChartCategory::Observability),
    unit("loki", ChartCategory::Observability),
    unit("grafana", ChartCategory::Observability),
    unit("alertmanager", ChartCategory::Observability),
];

/// Ordered, immutable set of charts keyed by name
#[derive(Debug, Clone, Default)]
pub struct ChartCatalog {
    charts: IndexMap<String, Chart>,
}

impl ChartCatalog {
    /// Build a catalog, rejecting duplicate names and invalid charts
    pub fn from_charts(charts: impl IntoIterator<Item = Chart>) -> Result<Self> {
        let mut map = IndexMap::new();
        for chart in charts {
            chart.validate()?;
            if map.contains_key(&chart.name) {
                return Err(CoreError::DuplicateChart { name: chart.name });
            }
            map.insert(chart.name.clone(), chart);
        }
        Ok(Self { charts: map })
    }

    /// The full platform catalog with charts under `charts_root`
    pub fn platform(charts_root: &Path) -> Result<Self> {
        Self::from_charts(PLATFORM_CHARTS.iter().map(|spec| {
            let mut chart = Chart::new(spec.name, spec.category, charts_root);
            if !spec.wait {
                chart = chart.without_readiness_wait();
            }
            if !spec.targets.is_empty() {
                chart = chart.with_target_namespaces(spec.targets.iter().copied());
            }
            chart
        }))
    }

    /// Load every chart's manifest annotations
    pub fn with_annotations(mut self) -> Result<Self> {
        for chart in self.charts.values_mut() {
            chart.load_annotations()?;
        }
        Ok(self)
    }

    /// Look up a chart, failing if it is unknown
    pub fn get(&self, name: &str) -> Result<&Chart> {
        self.charts.get(name).ok_or_else(|| CoreError::ChartNotFound {
            name: name.to_string(),
        })
    }

    /// Look up a chart
    pub fn find(&self, name: &str) -> Option<&Chart> {
        self.charts.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.charts.contains_key(name)
    }

    /// Charts in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &Chart> {
        self.charts.values()
    }

    pub fn names(&self) -> Vec<&str> {
        self.charts.keys().map(String::as_str).collect()
    }

    /// Charts belonging to a category
    pub fn by_category(&self, category: ChartCategory) -> Vec<&Chart> {
        self.charts
            .values()
            .filter(|c| c.category == category)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.charts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.charts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::TempDir;

    #[test]
    fn test_platform_catalog_is_valid() {
        let catalog = ChartCatalog::platform(Path::new("charts")).unwrap();
        assert_eq!(catalog.len(), PLATFORM_CHARTS.len());

        let names: HashSet<&str> = catalog.names().into_iter().collect();
        assert_eq!(names.len(), catalog.len());

        for chart in catalog.iter() {
            assert!(chart.validate().is_ok(), "{} is invalid", chart.name);
            assert!(chart.source_path.starts_with("charts"));
        }
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let root = Path::new(".");
        let result = ChartCatalog::from_charts(vec![
            Chart::new("redis-cache", ChartCategory::Database, root),
            Chart::new("redis-cache", ChartCategory::Application, root),
        ]);
        assert!(matches!(
            result,
            Err(CoreError::DuplicateChart { ref name }) if name == "redis-cache"
        ));
    }

    #[test]
    fn test_invalid_chart_rejected() {
        let mut chart = Chart::new("platform-secrets", ChartCategory::Infrastructure, Path::new("."));
        chart.multi_namespace = true;
        assert!(ChartCatalog::from_charts(vec![chart]).is_err());
    }

    #[test]
    fn test_lookup() {
        let catalog = ChartCatalog::platform(Path::new("charts")).unwrap();
        assert_eq!(catalog.get("keycloak").unwrap().category, ChartCategory::Auth);
        assert!(catalog.find("does-not-exist").is_none());
        assert!(matches!(
            catalog.get("does-not-exist"),
            Err(CoreError::ChartNotFound { .. })
        ));
    }

    #[test]
    fn test_shared_charts_are_multi_namespace() {
        let catalog = ChartCatalog::platform(Path::new("charts")).unwrap();
        let secrets = catalog.get("platform-secrets").unwrap();
        assert!(secrets.multi_namespace);
        assert!(!secrets.wait_for_readiness);
        assert_eq!(secrets.target_namespaces.first().map(String::as_str), Some("apps"));

        let config = catalog.get("platform-config").unwrap();
        assert!(!config.multi_namespace);
    }

    #[test]
    fn test_by_category() {
        let catalog = ChartCatalog::platform(Path::new("charts")).unwrap();
        let databases: Vec<&str> = catalog
            .by_category(ChartCategory::Database)
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(
            databases,
            vec!["postgres-core", "redis-cache", "postgres-auth", "clickhouse-analytics"]
        );
    }

    #[test]
    fn test_with_annotations() {
        let dir = TempDir::new().unwrap();
        let chart_dir = dir.path().join("prometheus");
        std::fs::create_dir_all(&chart_dir).unwrap();
        std::fs::write(
            chart_dir.join("Chart.yaml"),
            "name: prometheus\nannotations:\n  platform.io/scrape: \"true\"\n",
        )
        .unwrap();

        let catalog = ChartCatalog::platform(dir.path())
            .unwrap()
            .with_annotations()
            .unwrap();
        let prometheus = catalog.get("prometheus").unwrap();
        assert_eq!(
            prometheus.annotations.get("platform.io/scrape").map(String::as_str),
            Some("true")
        );
        assert!(catalog.get("grafana").unwrap().annotations.is_empty());
    }
}
