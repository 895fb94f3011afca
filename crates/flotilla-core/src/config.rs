//! Orchestrator configuration
//!
//! Stored in `~/.config/flotilla/config.yaml`; every field has a default so
//! a missing file is equivalent to an empty one.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{CoreError, Result};
use crate::namespace::{DEFAULT_NAMESPACE_PREFIX, NamespaceLayout};

/// Orchestrator configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorConfig {
    /// Directory holding one sub-directory per chart
    #[serde(default = "default_charts_root")]
    pub charts_root: PathBuf,

    /// Prefix for every platform namespace
    #[serde(default = "default_namespace_prefix")]
    pub namespace_prefix: String,

    /// Retry and backoff settings for chart operations
    #[serde(default)]
    pub retry: RetryConfig,

    /// Delay between readiness polls
    #[serde(default = "default_health_check_interval", with = "humantime_serde")]
    pub health_check_interval: Duration,

    /// Release manager binary
    #[serde(default = "default_helm_binary")]
    pub helm_binary: String,

    /// Kubeconfig context to use (current context if unset)
    #[serde(default)]
    pub kube_context: Option<String>,
}

fn default_charts_root() -> PathBuf {
    PathBuf::from("charts")
}

fn default_namespace_prefix() -> String {
    DEFAULT_NAMESPACE_PREFIX.to_string()
}

fn default_health_check_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_helm_binary() -> String {
    "helm".to_string()
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            charts_root: default_charts_root(),
            namespace_prefix: default_namespace_prefix(),
            retry: RetryConfig::default(),
            health_check_interval: default_health_check_interval(),
            helm_binary: default_helm_binary(),
            kube_context: None,
        }
    }
}

/// Retry settings for transient chart failures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    /// Overrides the strategy's attempt budget when set
    #[serde(default)]
    pub max_retries: Option<u32>,

    /// Backoff before the first retry; doubles on each further retry
    #[serde(default = "default_base_backoff", with = "humantime_serde")]
    pub base_backoff: Duration,

    /// Upper bound for the backoff delay
    #[serde(default = "default_max_backoff", with = "humantime_serde")]
    pub max_backoff: Duration,
}

fn default_base_backoff() -> Duration {
    Duration::from_secs(5)
}

fn default_max_backoff() -> Duration {
    Duration::from_secs(60)
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: None,
            base_backoff: default_base_backoff(),
            max_backoff: default_max_backoff(),
        }
    }
}

impl OrchestratorConfig {
    /// Load configuration from the default location, or defaults if absent
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            tracing::debug!(path = %path.display(), "no configuration file, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get default configuration path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| CoreError::InvalidConfig {
            message: "Could not determine config directory".to_string(),
        })?;
        Ok(config_dir.join("flotilla").join("config.yaml"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.namespace_prefix.trim().is_empty() {
            return Err(CoreError::InvalidConfig {
                message: "namespacePrefix must not be empty".to_string(),
            });
        }
        if self.retry.base_backoff > self.retry.max_backoff {
            return Err(CoreError::InvalidConfig {
                message: "retry.baseBackoff must not exceed retry.maxBackoff".to_string(),
            });
        }
        Ok(())
    }

    /// Namespace layout for the configured prefix
    pub fn namespace_layout(&self) -> NamespaceLayout {
        NamespaceLayout::new(self.namespace_prefix.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.charts_root, PathBuf::from("charts"));
        assert_eq!(config.namespace_prefix, "alt");
        assert_eq!(config.retry.base_backoff, Duration::from_secs(5));
        assert_eq!(config.retry.max_retries, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            r#"
chartsRoot: /srv/platform/charts
namespacePrefix: acme
retry:
  maxRetries: 4
  baseBackoff: 2s
healthCheckInterval: 500ms
"#,
        )
        .unwrap();

        let config = OrchestratorConfig::load_from(&path).unwrap();
        assert_eq!(config.charts_root, PathBuf::from("/srv/platform/charts"));
        assert_eq!(config.namespace_layout().prefix(), "acme");
        assert_eq!(config.retry.max_retries, Some(4));
        assert_eq!(config.retry.base_backoff, Duration::from_secs(2));
        assert_eq!(config.retry.max_backoff, Duration::from_secs(60));
        assert_eq!(config.health_check_interval, Duration::from_millis(500));
        assert_eq!(config.helm_binary, "helm");
    }

    #[test]
    fn test_invalid_backoff_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "retry:\n  baseBackoff: 2m\n  maxBackoff: 10s\n").unwrap();

        assert!(matches!(
            OrchestratorConfig::load_from(&path),
            Err(CoreError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_empty_prefix_rejected() {
        let config = OrchestratorConfig {
            namespace_prefix: " ".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
