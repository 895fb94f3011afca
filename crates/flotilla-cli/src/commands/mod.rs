//! CLI command implementations

pub mod classify;
pub mod deploy;
pub mod namespaces;
pub mod plan;
pub mod recover;

use flotilla_core::Environment;
use flotilla_engine::DeploymentStrategy;

use crate::error::Result;

/// Parse the environment argument
pub fn parse_environment(value: &str) -> Result<Environment> {
    Ok(value.parse()?)
}

/// Strategy from `--strategy`, else the environment's default
pub fn resolve_strategy(environment: Environment, name: Option<&str>) -> Result<DeploymentStrategy> {
    match name {
        Some(name) => Ok(name.parse()?),
        None => Ok(DeploymentStrategy::for_environment(environment)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_strategy_default() {
        let strategy = resolve_strategy(Environment::Staging, None).unwrap();
        assert_eq!(strategy, DeploymentStrategy::Staging);
    }

    #[test]
    fn test_resolve_strategy_override() {
        let strategy = resolve_strategy(Environment::Production, Some("dr")).unwrap();
        assert_eq!(strategy, DeploymentStrategy::DisasterRecovery);
    }

    #[test]
    fn test_resolve_strategy_unknown() {
        assert!(resolve_strategy(Environment::Development, Some("canary")).is_err());
    }
}
