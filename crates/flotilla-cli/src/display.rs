//! Display formatting for CLI output
//!
//! Provides structured display for:
//! - Layer plans with resolved namespaces
//! - Deployment reports grouped by layer
//! - Error classifications and recovery results

use console::{StyledObject, style};
use flotilla_core::{Environment, NamespaceLayout};
use flotilla_engine::{
    ChartStatus, DeploymentProgress, DeploymentStrategy, ErrorClassification, LayerConfiguration,
    LayerStatus, RecoveryResult, RunStatus,
};

use crate::util::{format_duration, truncate_message};

/// Glyph for a chart status
pub fn chart_glyph(status: ChartStatus) -> &'static str {
    match status {
        ChartStatus::Success => "✓",
        ChartStatus::Failed => "✗",
        ChartStatus::Skipped => "○",
        ChartStatus::InProgress => "→",
        ChartStatus::Pending => "·",
    }
}

/// Glyph for a layer status
pub fn layer_glyph(status: LayerStatus) -> &'static str {
    match status {
        LayerStatus::Completed => "✓",
        LayerStatus::Failed => "✗",
        LayerStatus::Skipped => "○",
        LayerStatus::InProgress => "→",
        LayerStatus::Pending => "·",
    }
}

fn chart_symbol(status: ChartStatus) -> StyledObject<&'static str> {
    let glyph = style(chart_glyph(status));
    match status {
        ChartStatus::Success => glyph.green(),
        ChartStatus::Failed => glyph.red(),
        ChartStatus::InProgress => glyph.blue(),
        ChartStatus::Skipped | ChartStatus::Pending => glyph.dim(),
    }
}

fn layer_symbol(status: LayerStatus) -> StyledObject<&'static str> {
    let glyph = style(layer_glyph(status));
    match status {
        LayerStatus::Completed => glyph.green(),
        LayerStatus::Failed => glyph.red(),
        LayerStatus::InProgress => glyph.blue(),
        LayerStatus::Skipped | LayerStatus::Pending => glyph.dim(),
    }
}

/// Short mode tags for a layer header
pub fn layer_tags(parallel: bool, critical: bool) -> String {
    let mode = if parallel { "parallel" } else { "sequential" };
    if critical {
        format!("{}, critical", mode)
    } else {
        mode.to_string()
    }
}

/// Print the layer plan of a strategy
pub fn print_plan(
    environment: Environment,
    strategy: DeploymentStrategy,
    layers: &[LayerConfiguration],
    layout: &NamespaceLayout,
) {
    println!(
        "{} Plan for {} using the {} strategy",
        style("→").blue().bold(),
        style(environment).cyan(),
        style(strategy.name()).yellow()
    );
    println!(
        "  global timeout {}, {} operation attempt(s), {} health check retries{}",
        format_duration(strategy.global_timeout()),
        strategy.operation_retries(),
        strategy.health_check_retries(),
        if strategy.requires_zero_downtime() {
            ", zero-downtime"
        } else {
            ""
        }
    );

    for (index, layer) in layers.iter().enumerate() {
        println!();
        println!(
            "{} {} {}",
            style(format!("{}.", index + 1)).dim(),
            style(&layer.name).bold(),
            style(format!("({})", layer_tags(layer.allow_parallel_deployment, layer.critical_layer))).dim()
        );
        if layer.requires_health_check {
            println!(
                "   health check within {}, layer deadline {}",
                format_duration(layer.health_check_timeout),
                format_duration(layer.layer_completion_timeout)
            );
        } else {
            println!(
                "   no health check, layer deadline {}",
                format_duration(layer.layer_completion_timeout)
            );
        }
        for chart in &layer.charts {
            let namespaces = layout.target_namespaces_for(chart, environment);
            println!(
                "   - {} {} {}",
                style(&chart.name).cyan(),
                style("→").dim(),
                namespaces.join(", ")
            );
        }
    }
}

/// Print a finished run grouped by layer
pub fn print_report(progress: &DeploymentProgress) {
    println!();
    for (index, layer) in progress.layers.iter().enumerate() {
        println!(
            "{} {} {}",
            layer_symbol(layer.status),
            style(&layer.name).bold(),
            style(format!("({})", layer_tags(layer.parallel, layer.critical))).dim()
        );
        for chart in progress.charts_in_layer(index) {
            let attempts = if chart.attempts > 1 {
                format!(" after {} attempts", chart.attempts)
            } else {
                String::new()
            };
            println!(
                "    {} {}{}",
                chart_symbol(chart.status),
                chart.name,
                style(attempts).dim()
            );
            if let Some(error) = &chart.error {
                println!("      {} {}", style("error:").red(), truncate_message(error, 120));
            }
            if let Some(suggestion) = &chart.suggestion {
                println!("      {} {}", style("hint:").blue(), suggestion);
            }
            for action in &chart.recovery_actions {
                println!("      {} {}", style("recovery:").cyan(), action.description);
            }
        }
    }

    let summary = progress.summary();
    let duration = progress
        .duration()
        .and_then(|d| d.to_std().ok())
        .map(format_duration)
        .unwrap_or_default();

    println!();
    println!("{}", style("Summary").bold());
    println!(
        "  {} succeeded, {} failed, {} skipped, {} pending of {} chart(s) in {}",
        style(summary.succeeded).green(),
        style(summary.failed).red(),
        summary.skipped,
        summary.pending,
        summary.total,
        duration
    );

    let headline = match progress.status {
        RunStatus::Succeeded => style("✓").green().bold(),
        RunStatus::Degraded => style("⚠").yellow().bold(),
        RunStatus::Running => style("→").blue().bold(),
        RunStatus::Failed | RunStatus::Aborted => style("✗").red().bold(),
    };
    let dry_run = if progress.dry_run { " (dry run)" } else { "" };
    println!(
        "{} Run {} {}{}",
        headline,
        style(&progress.run_id).cyan(),
        progress.status,
        dry_run
    );
    if let Some(message) = &progress.message {
        println!("  {}", message);
    }
}

/// Print a classification of an error message
pub fn print_classification(classification: &ErrorClassification) {
    let verdict = if classification.retriable {
        style("retriable").green()
    } else {
        style("permanent").red()
    };
    println!(
        "{} {} ({})",
        style("→").blue().bold(),
        style(classification.error_type.as_str()).bold(),
        verdict
    );
    println!("  {} {}", style("reason:").dim(), classification.reason);
    if let Some(matched) = &classification.matched {
        println!("  {} {}", style("matched:").dim(), matched);
    }
    println!("  {} {}", style("hint:").blue(), classification.suggestion);
}

/// Print one recovery outcome
pub fn print_recovery(index: usize, result: &RecoveryResult) {
    let icon = if result.success {
        style("✓").green()
    } else {
        style("✗").red()
    };
    println!(
        "{} {} {} {}",
        icon,
        style(format!("[{}]", index + 1)).dim(),
        style(result.action).bold(),
        result.description
    );
    if let Some(error) = &result.error {
        println!("    {} {}", style("error:").red(), truncate_message(error, 120));
    }
    if result.retriable {
        println!("    {} the failed operation can be retried", style("hint:").blue());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_tags() {
        assert_eq!(layer_tags(true, true), "parallel, critical");
        assert_eq!(layer_tags(false, true), "sequential, critical");
        assert_eq!(layer_tags(false, false), "sequential");
    }

    #[test]
    fn test_symbols_are_distinct_for_terminal_states() {
        assert_eq!(chart_glyph(ChartStatus::Success), "✓");
        assert_eq!(chart_glyph(ChartStatus::Failed), "✗");
        assert_eq!(chart_glyph(ChartStatus::Skipped), "○");
        assert_eq!(layer_glyph(LayerStatus::Completed), "✓");
        assert_eq!(layer_glyph(LayerStatus::Failed), "✗");
        assert_eq!(layer_glyph(LayerStatus::Skipped), chart_glyph(ChartStatus::Skipped));
    }
}
