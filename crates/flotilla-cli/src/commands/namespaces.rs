//! Namespaces command - show where each chart lands

use std::collections::BTreeMap;
use std::path::Path;

use console::style;
use flotilla_core::{ChartCatalog, Environment, NamespaceLayout};

use crate::error::Result;
use crate::util::{load_catalog, load_config};

/// Run the namespaces command
pub fn run(environment: &str, config: Option<&Path>, json: bool) -> Result<()> {
    let environment = super::parse_environment(environment)?;
    let config = load_config(config)?;
    let catalog = load_catalog(&config)?;
    let layout = config.namespace_layout();
    let topology = topology(&catalog, &layout, environment);

    if json {
        let output = serde_json::json!({
            "environment": environment,
            "namespaces": layout.all_namespaces(environment),
            "charts": topology,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!(
        "{} Namespaces for {}",
        style("→").blue().bold(),
        style(environment).cyan()
    );
    for namespace in layout.all_namespaces(environment) {
        let charts: Vec<&str> = topology
            .iter()
            .filter(|(_, namespaces)| namespaces.contains(&namespace))
            .map(|(chart, _)| chart.as_str())
            .collect();
        println!();
        println!(
            "{} {}",
            style(&namespace).bold(),
            style(format!("({} chart(s))", charts.len())).dim()
        );
        for chart in charts {
            println!("   - {}", chart);
        }
    }
    Ok(())
}

/// Chart name to target namespaces, sorted by chart
pub fn topology(
    catalog: &ChartCatalog,
    layout: &NamespaceLayout,
    environment: Environment,
) -> BTreeMap<String, Vec<String>> {
    catalog
        .iter()
        .map(|chart| {
            (
                chart.name.clone(),
                layout.target_namespaces_for(chart, environment),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> ChartCatalog {
        ChartCatalog::platform(Path::new("charts")).unwrap()
    }

    #[test]
    fn test_staging_single_namespace() {
        let layout = NamespaceLayout::default();
        let topology = topology(&catalog(), &layout, Environment::Staging);
        assert!(topology.values().all(|ns| ns == &vec!["alt-staging".to_string()]));
    }

    #[test]
    fn test_production_splits_namespaces() {
        let layout = NamespaceLayout::default();
        let topology = topology(&catalog(), &layout, Environment::Production);
        let all = layout.all_namespaces(Environment::Production);
        assert!(topology.values().flatten().all(|ns| all.contains(ns)));
        assert!(topology.values().any(|ns| ns.len() > 1));
    }
}
