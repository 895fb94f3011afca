//! Layer configuration

use flotilla_core::Chart;
use serde::Serialize;
use std::time::Duration;

/// An ordered batch of charts sharing health-check, timing and parallelism policy
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerConfiguration {
    pub name: String,
    pub charts: Vec<Chart>,
    pub requires_health_check: bool,
    #[serde(with = "humantime_serde")]
    pub health_check_timeout: Duration,
    /// Pause between charts of a sequential layer
    #[serde(with = "humantime_serde")]
    pub wait_between_charts: Duration,
    /// Bound on the dispatch phase of the layer
    #[serde(with = "humantime_serde")]
    pub layer_completion_timeout: Duration,
    pub allow_parallel_deployment: bool,
    /// A failure here aborts the rest of the run
    pub critical_layer: bool,
}

impl LayerConfiguration {
    pub fn chart_names(&self) -> impl Iterator<Item = &str> {
        self.charts.iter().map(|c| c.name.as_str())
    }

    pub fn contains(&self, chart: &str) -> bool {
        self.charts.iter().any(|c| c.name == chart)
    }
}
