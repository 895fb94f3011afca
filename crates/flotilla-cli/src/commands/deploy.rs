//! Deploy command - roll the platform out to a cluster

use std::path::{Path, PathBuf};
use std::sync::Arc;

use console::style;
use flotilla_core::ChartCatalog;
use flotilla_engine::{
    CancellationSignal, DeploymentProgress, Orchestrator, Ports, RunOptions, RunStatus,
};
use flotilla_kube::{HelmCli, KubeCluster};

use crate::display;
use crate::error::{CliError, Result};
use crate::util::load_config;

/// Deploy command arguments
#[derive(Debug, Default)]
pub struct DeployArgs {
    pub environment: String,
    pub strategy: Option<String>,
    pub dry_run: bool,
    pub force_update: bool,
    pub namespace: Option<String>,
    pub config: Option<PathBuf>,
    pub json: bool,
    pub report: Option<PathBuf>,
}

/// Run the deploy command
pub async fn run(args: DeployArgs) -> Result<()> {
    let environment = super::parse_environment(&args.environment)?;
    let strategy = super::resolve_strategy(environment, args.strategy.as_deref())?;
    let config = load_config(args.config.as_deref())?;
    let catalog = ChartCatalog::platform(&config.charts_root)?.with_annotations()?;

    let cluster = Arc::new(KubeCluster::connect(config.kube_context.as_deref()).await?);
    let helm = Arc::new(HelmCli::new(config.helm_binary.clone()).with_kube_context(config.kube_context.clone()));
    let ports = Ports::new(helm, cluster.clone(), cluster);
    let orchestrator = Orchestrator::from_config(&config, Arc::new(catalog), ports);

    let cancellation = CancellationSignal::new();
    let mut options = RunOptions::new()
        .dry_run(args.dry_run)
        .force_update(args.force_update)
        .strategy(strategy)
        .cancellation(cancellation.clone());
    if let Some(namespace) = &args.namespace {
        options = options.target_namespace(namespace.clone());
    }

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping after in-flight operations");
            cancellation.cancel();
        }
    });

    if !args.json {
        println!(
            "{} Deploying {} with the {} strategy{}",
            style("→").blue().bold(),
            style(environment).cyan(),
            style(strategy.name()).yellow(),
            if args.dry_run { " (dry run)" } else { "" }
        );
    }

    let progress = orchestrator.run(environment, options).await?;

    if let Some(path) = &args.report {
        write_report(&progress, path)?;
        if !args.json {
            println!("{} Report written to {}", style("✓").green(), path.display());
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&progress)?);
    } else {
        display::print_report(&progress);
    }

    outcome(&progress)
}

/// Write the run record as JSON
pub fn write_report(progress: &DeploymentProgress, path: &Path) -> Result<()> {
    let content = serde_json::to_string_pretty(progress)?;
    std::fs::write(path, content)?;
    tracing::debug!(path = %path.display(), run = %progress.run_id, "deployment report written");
    Ok(())
}

/// Map a finished run onto the command result
pub fn outcome(progress: &DeploymentProgress) -> Result<()> {
    let message = progress
        .message
        .clone()
        .unwrap_or_else(|| format!("run {} {}", progress.run_id, progress.status));
    match progress.status {
        RunStatus::Succeeded => Ok(()),
        RunStatus::Degraded => Err(CliError::PartialFailure {
            layers: progress.degraded_layers().len(),
        }),
        RunStatus::Aborted => Err(CliError::Aborted { message }),
        RunStatus::Failed | RunStatus::Running => Err(CliError::DeploymentFailed {
            message,
            help: first_suggestion(progress),
        }),
    }
}

fn first_suggestion(progress: &DeploymentProgress) -> Option<String> {
    progress
        .charts
        .iter()
        .find_map(|chart| chart.suggestion.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flotilla_core::Environment;
    use flotilla_engine::{ChartStatus, DeploymentStrategy, ProgressTracker};
    use tempfile::TempDir;

    fn progress() -> ProgressTracker {
        let catalog = ChartCatalog::platform(Path::new("charts")).unwrap();
        let strategy = DeploymentStrategy::DisasterRecovery;
        let layers = strategy.layer_configurations(&catalog).unwrap();
        ProgressTracker::new(DeploymentProgress::new(
            Environment::Production,
            strategy,
            false,
            &layers,
        ))
    }

    #[test]
    fn test_outcome_success() {
        let progress = progress().finish(RunStatus::Succeeded, None);
        assert!(outcome(&progress).is_ok());
    }

    #[test]
    fn test_outcome_aborted() {
        let progress = progress().finish(RunStatus::Aborted, Some("cancelled".to_string()));
        let err = outcome(&progress).unwrap_err();
        assert_eq!(err.exit_code(), crate::exit_codes::ABORTED);
        assert!(err.to_string().contains("cancelled"));
    }

    #[test]
    fn test_outcome_failed_carries_suggestion() {
        let tracker = progress();
        let classification = flotilla_engine::classify(Some("permission denied"), "install");
        tracker.chart_started(0, "postgres-core", &["alt-database".to_string()]);
        tracker.chart_failed(0, "postgres-core", "permission denied", Some(&classification));
        tracker.layer_failed(0, "postgres-core failed");
        let progress = tracker.finish(RunStatus::Failed, Some("critical layer failed".to_string()));

        assert_eq!(progress.chart_status("postgres-core"), Some(ChartStatus::Failed));
        match outcome(&progress).unwrap_err() {
            CliError::DeploymentFailed { message, help } => {
                assert_eq!(message, "critical layer failed");
                assert_eq!(help, Some(classification.suggestion));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_write_report() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.json");
        let progress = progress().finish(RunStatus::Succeeded, None);

        write_report(&progress, &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let json: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(json["status"], "succeeded");
        assert_eq!(json["strategy"], "disaster-recovery");
        assert_eq!(json["runId"], progress.run_id.as_str());
    }
}
