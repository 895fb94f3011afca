//! Plan command - show the layers a deployment would run

use std::path::Path;

use flotilla_core::{Environment, NamespaceLayout};
use flotilla_engine::{DeploymentStrategy, LayerConfiguration};
use serde_json::{Value, json};

use crate::display;
use crate::error::Result;
use crate::util::{load_catalog, load_config};

/// Run the plan command
pub fn run(environment: &str, strategy: Option<&str>, config: Option<&Path>, json: bool) -> Result<()> {
    let environment = super::parse_environment(environment)?;
    let strategy = super::resolve_strategy(environment, strategy)?;
    let config = load_config(config)?;
    let catalog = load_catalog(&config)?;
    let layout = config.namespace_layout();
    let layers = strategy.layer_configurations(&catalog)?;

    if json {
        let plan = plan_json(environment, strategy, &layers, &layout);
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        display::print_plan(environment, strategy, &layers, &layout);
    }
    Ok(())
}

/// Machine-readable plan with per-chart namespaces resolved
pub fn plan_json(
    environment: Environment,
    strategy: DeploymentStrategy,
    layers: &[LayerConfiguration],
    layout: &NamespaceLayout,
) -> Value {
    let layers: Vec<Value> = layers
        .iter()
        .map(|layer| {
            let charts: Vec<Value> = layer
                .charts
                .iter()
                .map(|chart| {
                    json!({
                        "name": chart.name,
                        "category": chart.category,
                        "namespaces": layout.target_namespaces_for(chart, environment),
                        "waitForReadiness": chart.wait_for_readiness,
                    })
                })
                .collect();
            json!({
                "name": layer.name,
                "parallel": layer.allow_parallel_deployment,
                "critical": layer.critical_layer,
                "requiresHealthCheck": layer.requires_health_check,
                "healthCheckTimeoutSeconds": layer.health_check_timeout.as_secs(),
                "layerCompletionTimeoutSeconds": layer.layer_completion_timeout.as_secs(),
                "charts": charts,
            })
        })
        .collect();

    json!({
        "environment": environment,
        "strategy": strategy,
        "globalTimeoutSeconds": strategy.global_timeout().as_secs(),
        "operationRetries": strategy.operation_retries(),
        "zeroDowntime": strategy.requires_zero_downtime(),
        "layers": layers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use flotilla_core::ChartCatalog;

    #[test]
    fn test_plan_json_production() {
        let catalog = ChartCatalog::platform(Path::new("charts")).unwrap();
        let layout = NamespaceLayout::default();
        let strategy = DeploymentStrategy::Production;
        let layers = strategy.layer_configurations(&catalog).unwrap();

        let plan = plan_json(Environment::Production, strategy, &layers, &layout);
        assert_eq!(plan["strategy"], "production");
        assert_eq!(plan["zeroDowntime"], true);
        assert_eq!(plan["layers"].as_array().unwrap().len(), layers.len());
        assert_eq!(plan["layers"][0]["name"], "Foundation Layer");
    }

    #[test]
    fn test_plan_json_development_namespaces() {
        let catalog = ChartCatalog::platform(Path::new("charts")).unwrap();
        let layout = NamespaceLayout::default();
        let strategy = DeploymentStrategy::Development;
        let layers = strategy.layer_configurations(&catalog).unwrap();

        let plan = plan_json(Environment::Development, strategy, &layers, &layout);
        for layer in plan["layers"].as_array().unwrap() {
            for chart in layer["charts"].as_array().unwrap() {
                assert_eq!(chart["namespaces"], json!(["alt-development"]));
            }
        }
    }
}
