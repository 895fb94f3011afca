//! Deployment progress tracking
//!
//! [`DeploymentProgress`] is the append-only record of one run: every layer
//! and every chart ends in a terminal state, so a partially successful run can
//! be told apart from a total failure. [`ProgressTracker`] guards it for the
//! concurrent chart tasks of a parallel layer.

use chrono::{DateTime, Utc};
use flotilla_core::Environment;
use serde::Serialize;
use std::fmt;
use std::sync::{Mutex, PoisonError};

use crate::classifier::{ErrorClassification, ErrorType};
use crate::layer::LayerConfiguration;
use crate::recovery::RecoveryResult;
use crate::strategy::DeploymentStrategy;

/// Final (or current) state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    /// Every layer completed
    Succeeded,
    /// Only non-critical layers failed
    Degraded,
    Failed,
    /// Cancelled before completion
    Aborted,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Degraded => "degraded",
            Self::Failed => "failed",
            Self::Aborted => "aborted",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LayerStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

impl LayerStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ChartStatus {
    Pending,
    InProgress,
    Success,
    Failed,
    Skipped,
}

impl ChartStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Skipped)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerProgress {
    pub name: String,
    pub status: LayerStatus,
    pub critical: bool,
    pub parallel: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartProgress {
    pub layer: usize,
    pub name: String,
    pub namespaces: Vec<String>,
    pub status: ChartStatus,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<ErrorType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub recovery_actions: Vec<RecoveryResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

/// Per-status chart counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub pending: usize,
}

/// Record of one orchestration run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentProgress {
    pub run_id: String,
    pub environment: Environment,
    pub strategy: DeploymentStrategy,
    pub status: RunStatus,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub layers: Vec<LayerProgress>,
    pub charts: Vec<ChartProgress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl DeploymentProgress {
    pub fn new(
        environment: Environment,
        strategy: DeploymentStrategy,
        dry_run: bool,
        layers: &[LayerConfiguration],
    ) -> Self {
        let started_at = Utc::now();
        let charts = layers
            .iter()
            .enumerate()
            .flat_map(|(index, layer)| {
                layer.charts.iter().map(move |chart| ChartProgress {
                    layer: index,
                    name: chart.name.clone(),
                    namespaces: Vec::new(),
                    status: ChartStatus::Pending,
                    attempts: 0,
                    error: None,
                    error_type: None,
                    suggestion: None,
                    recovery_actions: Vec::new(),
                    started_at: None,
                    finished_at: None,
                })
            })
            .collect();

        Self {
            run_id: format!(
                "{}-{}",
                strategy.name(),
                started_at.format("%Y%m%d%H%M%S")
            ),
            environment,
            strategy,
            status: RunStatus::Running,
            dry_run,
            started_at,
            finished_at: None,
            layers: layers
                .iter()
                .map(|layer| LayerProgress {
                    name: layer.name.clone(),
                    status: LayerStatus::Pending,
                    critical: layer.critical_layer,
                    parallel: layer.allow_parallel_deployment,
                    started_at: None,
                    finished_at: None,
                    error: None,
                })
                .collect(),
            charts,
            message: None,
        }
    }

    pub fn chart(&self, layer: usize, name: &str) -> Option<&ChartProgress> {
        self.charts
            .iter()
            .find(|c| c.layer == layer && c.name == name)
    }

    /// Status of the first entry for a chart, whatever its layer
    pub fn chart_status(&self, name: &str) -> Option<ChartStatus> {
        self.charts.iter().find(|c| c.name == name).map(|c| c.status)
    }

    pub fn layer(&self, name: &str) -> Option<&LayerProgress> {
        self.layers.iter().find(|l| l.name == name)
    }

    pub fn charts_in_layer(&self, layer: usize) -> impl Iterator<Item = &ChartProgress> {
        self.charts.iter().filter(move |c| c.layer == layer)
    }

    pub fn summary(&self) -> ProgressSummary {
        let mut summary = ProgressSummary {
            total: self.charts.len(),
            ..Default::default()
        };
        for chart in &self.charts {
            match chart.status {
                ChartStatus::Success => summary.succeeded += 1,
                ChartStatus::Failed => summary.failed += 1,
                ChartStatus::Skipped => summary.skipped += 1,
                ChartStatus::Pending | ChartStatus::InProgress => summary.pending += 1,
            }
        }
        summary
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    /// Non-critical layers that failed without stopping the run
    pub fn degraded_layers(&self) -> Vec<&LayerProgress> {
        self.layers
            .iter()
            .filter(|l| !l.critical && l.status == LayerStatus::Failed)
            .collect()
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|end| end - self.started_at)
    }

    fn chart_mut(&mut self, layer: usize, name: &str) -> Option<&mut ChartProgress> {
        self.charts
            .iter_mut()
            .find(|c| c.layer == layer && c.name == name)
    }
}

/// Shared, lock-guarded progress for a running deployment
#[derive(Debug)]
pub struct ProgressTracker {
    inner: Mutex<DeploymentProgress>,
}

impl ProgressTracker {
    pub fn new(progress: DeploymentProgress) -> Self {
        Self {
            inner: Mutex::new(progress),
        }
    }

    fn update<R>(&self, f: impl FnOnce(&mut DeploymentProgress) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    pub fn snapshot(&self) -> DeploymentProgress {
        self.update(|p| p.clone())
    }

    pub fn layer_started(&self, layer: usize) {
        self.update(|p| {
            if let Some(l) = p.layers.get_mut(layer) {
                l.status = LayerStatus::InProgress;
                l.started_at = Some(Utc::now());
            }
        });
    }

    pub fn layer_completed(&self, layer: usize) {
        self.finish_layer(layer, LayerStatus::Completed, None);
    }

    pub fn layer_failed(&self, layer: usize, error: impl Into<String>) {
        self.finish_layer(layer, LayerStatus::Failed, Some(error.into()));
    }

    /// Mark a layer and all of its unfinished charts skipped
    pub fn layer_skipped(&self, layer: usize, reason: impl Into<String>) {
        let reason = reason.into();
        self.skip_unfinished_charts(layer, &reason);
        self.finish_layer(layer, LayerStatus::Skipped, Some(reason));
    }

    /// Skip every chart of a layer that hasn't reached a terminal state
    pub fn skip_unfinished_charts(&self, layer: usize, reason: &str) {
        self.update(|p| {
            for chart in p.charts.iter_mut().filter(|c| c.layer == layer) {
                if !chart.status.is_terminal() {
                    chart.status = ChartStatus::Skipped;
                    chart.error.get_or_insert_with(|| reason.to_string());
                }
            }
        });
    }

    fn finish_layer(&self, layer: usize, status: LayerStatus, error: Option<String>) {
        self.update(|p| {
            if let Some(l) = p.layers.get_mut(layer) {
                l.status = status;
                l.finished_at = Some(Utc::now());
                l.error = error;
            }
        });
    }

    pub fn chart_started(&self, layer: usize, name: &str, namespaces: &[String]) {
        self.update(|p| {
            if let Some(c) = p.chart_mut(layer, name) {
                c.status = ChartStatus::InProgress;
                c.namespaces = namespaces.to_vec();
                c.started_at = Some(Utc::now());
            }
        });
    }

    pub fn chart_attempted(&self, layer: usize, name: &str) {
        self.update(|p| {
            if let Some(c) = p.chart_mut(layer, name) {
                c.attempts += 1;
            }
        });
    }

    pub fn chart_recovery(&self, layer: usize, name: &str, result: RecoveryResult) {
        self.update(|p| {
            if let Some(c) = p.chart_mut(layer, name) {
                c.recovery_actions.push(result);
            }
        });
    }

    pub fn chart_succeeded(&self, layer: usize, name: &str) {
        self.update(|p| {
            if let Some(c) = p.chart_mut(layer, name) {
                c.status = ChartStatus::Success;
                c.finished_at = Some(Utc::now());
            }
        });
    }

    pub fn chart_failed(
        &self,
        layer: usize,
        name: &str,
        error: impl Into<String>,
        classification: Option<&ErrorClassification>,
    ) {
        let error = error.into();
        self.update(|p| {
            if let Some(c) = p.chart_mut(layer, name) {
                c.status = ChartStatus::Failed;
                c.error = Some(error);
                if let Some(classification) = classification {
                    c.error_type = Some(classification.error_type);
                    c.suggestion = Some(classification.suggestion.clone());
                }
                c.finished_at = Some(Utc::now());
            }
        });
    }

    /// Fail every chart of a layer that hasn't reached a terminal state
    pub fn fail_unfinished_charts(&self, layer: usize, error: &str) -> Vec<String> {
        self.update(|p| {
            let mut failed = Vec::new();
            for chart in p.charts.iter_mut().filter(|c| c.layer == layer) {
                if !chart.status.is_terminal() {
                    chart.status = ChartStatus::Failed;
                    chart.error = Some(error.to_string());
                    chart.finished_at = Some(Utc::now());
                    failed.push(chart.name.clone());
                }
            }
            failed
        })
    }

    pub fn chart_status(&self, layer: usize, name: &str) -> Option<ChartStatus> {
        self.update(|p| p.chart(layer, name).map(|c| c.status))
    }

    /// Close the run and return the final record
    pub fn finish(&self, status: RunStatus, message: Option<String>) -> DeploymentProgress {
        self.update(|p| {
            p.status = status;
            p.message = message;
            p.finished_at = Some(Utc::now());
            p.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flotilla_core::ChartCatalog;
    use std::path::Path;

    fn tracker() -> ProgressTracker {
        let catalog = ChartCatalog::platform(Path::new("charts")).unwrap();
        let layers = DeploymentStrategy::DisasterRecovery
            .layer_configurations(&catalog)
            .unwrap();
        ProgressTracker::new(DeploymentProgress::new(
            Environment::Production,
            DeploymentStrategy::DisasterRecovery,
            false,
            &layers,
        ))
    }

    #[test]
    fn test_initial_state() {
        let progress = tracker().snapshot();
        assert_eq!(progress.status, RunStatus::Running);
        assert_eq!(progress.layers.len(), 3);
        assert!(progress.run_id.starts_with("disaster-recovery-"));
        let summary = progress.summary();
        assert_eq!(summary.total, 13);
        assert_eq!(summary.pending, 13);
    }

    #[test]
    fn test_chart_lifecycle() {
        let tracker = tracker();
        tracker.chart_started(1, "keycloak", &["alt-auth".to_string()]);
        tracker.chart_attempted(1, "keycloak");
        tracker.chart_attempted(1, "keycloak");
        tracker.chart_succeeded(1, "keycloak");

        let progress = tracker.snapshot();
        let chart = progress.chart(1, "keycloak").unwrap();
        assert_eq!(chart.status, ChartStatus::Success);
        assert_eq!(chart.attempts, 2);
        assert_eq!(chart.namespaces, vec!["alt-auth".to_string()]);
    }

    #[test]
    fn test_layer_skip_marks_charts() {
        let tracker = tracker();
        tracker.chart_started(2, "web-frontend", &[]);
        tracker.chart_succeeded(2, "web-frontend");
        tracker.layer_skipped(2, "critical layer failed");

        let progress = tracker.snapshot();
        assert_eq!(progress.layers[2].status, LayerStatus::Skipped);
        assert_eq!(
            progress.chart(2, "web-frontend").unwrap().status,
            ChartStatus::Success
        );
        assert_eq!(
            progress.chart(2, "platform-ingress").unwrap().status,
            ChartStatus::Skipped
        );
    }

    #[test]
    fn test_fail_unfinished() {
        let tracker = tracker();
        tracker.chart_started(0, "postgres-core", &[]);
        tracker.chart_succeeded(0, "postgres-core");
        let failed = tracker.fail_unfinished_charts(0, "layer timed out");
        assert_eq!(failed.len(), 5);
        assert!(!failed.contains(&"postgres-core".to_string()));
    }

    #[test]
    fn test_finish_and_degraded() {
        let tracker = tracker();
        tracker.layer_failed(1, "boom");
        let progress = tracker.finish(RunStatus::Failed, Some("boom".to_string()));
        assert!(progress.finished_at.is_some());
        assert!(!progress.is_success());
        // Every DR layer is critical
        assert!(progress.degraded_layers().is_empty());
    }

    #[test]
    fn test_serializes() {
        let progress = tracker().snapshot();
        let json = serde_json::to_value(&progress).unwrap();
        assert_eq!(json["strategy"], "disaster-recovery");
        assert_eq!(json["status"], "running");
        assert_eq!(json["layers"][0]["status"], "pending");
    }
}
