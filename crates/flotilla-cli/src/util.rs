//! Shared utility functions for CLI commands

use std::path::Path;
use std::time::Duration;

use flotilla_core::{ChartCatalog, OrchestratorConfig};

use crate::error::Result;

/// Load the configuration from `path`, or the default location
pub fn load_config(path: Option<&Path>) -> Result<OrchestratorConfig> {
    let config = match path {
        Some(path) => OrchestratorConfig::load_from(path)?,
        None => OrchestratorConfig::load()?,
    };
    tracing::debug!(
        charts_root = %config.charts_root.display(),
        prefix = %config.namespace_prefix,
        "configuration loaded"
    );
    Ok(config)
}

/// Platform catalog rooted at the configured charts directory
pub fn load_catalog(config: &OrchestratorConfig) -> Result<ChartCatalog> {
    Ok(ChartCatalog::platform(&config.charts_root)?)
}

/// Format a duration as a short human-readable string
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 3600 {
        format!("{}h{:02}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m{:02}s", secs / 60, secs % 60)
    } else if secs > 0 {
        format!("{}s", secs)
    } else {
        format!("{}ms", duration.as_millis())
    }
}

/// Safely truncate a message to `max_len` characters, marking the cut
#[must_use]
pub fn truncate_message(message: &str, max_len: usize) -> String {
    let first_line = message.lines().next().unwrap_or_default();
    if first_line.chars().count() <= max_len && first_line.len() == message.len() {
        return message.to_string();
    }
    let cut: String = first_line.chars().take(max_len).collect();
    format!("{}…", cut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_format_duration_millis() {
        assert_eq!(format_duration(Duration::ZERO), "0ms");
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
    }

    #[test]
    fn test_format_duration_seconds() {
        assert_eq!(format_duration(Duration::from_secs(1)), "1s");
        assert_eq!(format_duration(Duration::from_secs(59)), "59s");
    }

    #[test]
    fn test_format_duration_minutes() {
        assert_eq!(format_duration(Duration::from_secs(60)), "1m00s");
        assert_eq!(format_duration(Duration::from_secs(5 * 60 + 7)), "5m07s");
    }

    #[test]
    fn test_format_duration_hours() {
        assert_eq!(format_duration(Duration::from_secs(90 * 60)), "1h30m");
    }

    #[test]
    fn test_truncate_message_short() {
        assert_eq!(truncate_message("timeout", 20), "timeout");
    }

    #[test]
    fn test_truncate_message_long() {
        assert_eq!(truncate_message("connection refused", 10), "connection…");
    }

    #[test]
    fn test_truncate_message_multiline() {
        assert_eq!(truncate_message("first\nsecond", 20), "first…");
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "namespacePrefix: acme\nchartsRoot: /srv/charts").unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.namespace_prefix, "acme");

        let catalog = load_catalog(&config).unwrap();
        let chart = catalog.get("postgres-core").unwrap();
        assert!(chart.source_path.starts_with("/srv/charts"));
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config(Some(Path::new("/nonexistent/flotilla.yaml"))).unwrap_err();
        assert_eq!(err.exit_code(), crate::exit_codes::ERROR);
    }
}
