//! Chart definition and manifest loading

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};

/// Name of the manifest file inside every chart directory
pub const CHART_MANIFEST: &str = "Chart.yaml";

/// What kind of workload a chart deploys
///
/// The fine-grained kinds drive namespace placement in production and
/// dependency resolution; [`ChartCategory::group`] collapses them into the
/// three coarse groups used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartCategory {
    Infrastructure,
    Database,
    Search,
    Auth,
    Application,
    Frontend,
    Ingress,
    Observability,
    Operational,
}

/// Coarse chart grouping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryGroup {
    Infrastructure,
    Application,
    Operational,
}

impl ChartCategory {
    pub fn group(&self) -> CategoryGroup {
        match self {
            Self::Infrastructure
            | Self::Database
            | Self::Search
            | Self::Auth
            | Self::Ingress => CategoryGroup::Infrastructure,
            Self::Application | Self::Frontend => CategoryGroup::Application,
            Self::Observability | Self::Operational => CategoryGroup::Operational,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Infrastructure => "infrastructure",
            Self::Database => "database",
            Self::Search => "search",
            Self::Auth => "auth",
            Self::Application => "application",
            Self::Frontend => "frontend",
            Self::Ingress => "ingress",
            Self::Observability => "observability",
            Self::Operational => "operational",
        }
    }
}

impl fmt::Display for ChartCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A deployable release unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chart {
    /// Unique chart name, also used as the release name
    pub name: String,

    /// Workload category
    pub category: ChartCategory,

    /// Chart directory
    pub source_path: PathBuf,

    /// Whether the rollout blocks on this chart's readiness
    pub wait_for_readiness: bool,

    /// Whether the chart is installed into several namespaces
    #[serde(default)]
    pub multi_namespace: bool,

    /// Namespace roles targeted when `multi_namespace` is set
    #[serde(default)]
    pub target_namespaces: IndexSet<String>,

    /// Annotations from the chart's own `Chart.yaml`
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

/// The subset of `Chart.yaml` the orchestrator reads
#[derive(Debug, Default, Deserialize)]
struct ChartManifest {
    #[serde(default)]
    annotations: BTreeMap<String, String>,
}

impl Chart {
    /// Create a chart living at `<charts_root>/<name>`
    pub fn new(name: impl Into<String>, category: ChartCategory, charts_root: &Path) -> Self {
        let name = name.into();
        Self {
            source_path: charts_root.join(&name),
            name,
            category,
            wait_for_readiness: true,
            multi_namespace: false,
            target_namespaces: IndexSet::new(),
            annotations: BTreeMap::new(),
        }
    }

    /// Don't block the rollout on this chart's readiness
    pub fn without_readiness_wait(mut self) -> Self {
        self.wait_for_readiness = false;
        self
    }

    /// Install the chart into each of the given namespace roles
    pub fn with_target_namespaces<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target_namespaces = targets.into_iter().map(Into::into).collect();
        self.multi_namespace = true;
        self
    }

    /// Check chart invariants
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CoreError::InvalidChart {
                name: self.name.clone(),
                message: "chart name must not be empty".to_string(),
            });
        }
        if self.multi_namespace && self.target_namespaces.is_empty() {
            return Err(CoreError::InvalidChart {
                name: self.name.clone(),
                message: "multi-namespace chart must declare at least one target namespace"
                    .to_string(),
            });
        }
        Ok(())
    }

    /// Whether the rollout should block on readiness for this chart
    ///
    /// Dry runs apply nothing, and a forced update means the operator opted
    /// out of blocking, so both disable waiting regardless of the chart.
    pub fn should_wait_for_readiness_with_options(&self, dry_run: bool, force_update: bool) -> bool {
        self.wait_for_readiness && !dry_run && !force_update
    }

    /// Path to the chart manifest
    pub fn manifest_path(&self) -> PathBuf {
        self.source_path.join(CHART_MANIFEST)
    }

    /// Path to the values overlay for an environment, if the chart ships one
    pub fn values_overlay(&self, environment: &str) -> Option<PathBuf> {
        let path = self.source_path.join(format!("values-{}.yaml", environment));
        path.exists().then_some(path)
    }

    /// Load annotations from the chart's `Chart.yaml`
    ///
    /// A chart without a manifest keeps empty annotations.
    pub fn load_annotations(&mut self) -> Result<()> {
        let path = self.manifest_path();
        if !path.exists() {
            tracing::debug!(chart = %self.name, path = %path.display(), "no chart manifest, skipping annotations");
            return Ok(());
        }

        let content = std::fs::read_to_string(&path)?;
        let manifest: ChartManifest =
            serde_yaml::from_str(&content).map_err(|source| CoreError::ManifestParse {
                path: path.display().to_string(),
                source,
            })?;
        self.annotations = manifest.annotations;
        Ok(())
    }
}
