//! Recover command - apply auto-recovery to error messages

use std::path::Path;
use std::sync::Arc;

use console::style;
use flotilla_engine::{BatchRecoveryReport, RecoveryEngine};
use flotilla_kube::KubeCluster;

use crate::display;
use crate::error::{CliError, Result};
use crate::util::load_config;

/// Run the recover command
pub async fn run(messages: &[String], config: Option<&Path>, json: bool) -> Result<()> {
    let config = load_config(config)?;
    let cluster = KubeCluster::connect(config.kube_context.as_deref()).await?;
    let engine = RecoveryEngine::new(Arc::new(cluster));

    let report = engine.recover_from_multiple_errors(messages).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for (index, result) in report.results.iter().enumerate() {
            display::print_recovery(index, result);
        }
        println!();
        println!(
            "{} {} recovered, {} need attention",
            style("Summary").bold(),
            style(report.succeeded).green(),
            style(report.failed).red()
        );
    }

    outcome(&report)
}

/// Fail when any error could not be recovered
pub fn outcome(report: &BatchRecoveryReport) -> Result<()> {
    if report.failed == 0 {
        Ok(())
    } else {
        Err(CliError::RecoveryIncomplete {
            failed: report.failed,
            total: report.results.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flotilla_engine::mock::MockCluster;

    #[tokio::test]
    async fn test_outcome_reflects_failures() {
        let engine = RecoveryEngine::new(Arc::new(MockCluster::new()));
        let report = engine
            .recover_from_multiple_errors(&[
                r#"namespaces "alt-apps" not found"#,
                "pods is forbidden: User cannot create resource",
            ])
            .await;

        assert_eq!(report.succeeded, 1);
        let err = outcome(&report).unwrap_err();
        assert!(matches!(err, CliError::RecoveryIncomplete { failed: 1, total: 2 }));
    }

    #[tokio::test]
    async fn test_outcome_all_recovered() {
        let engine = RecoveryEngine::new(Arc::new(MockCluster::new()));
        let report = engine
            .recover_from_multiple_errors(&[r#"namespace "alt-auth" not found"#])
            .await;
        assert!(outcome(&report).is_ok());
    }
}
