//! Target environments

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Environment a platform rollout targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    /// All environments, in promotion order
    pub const ALL: [Environment; 3] = [
        Environment::Development,
        Environment::Staging,
        Environment::Production,
    ];

    /// Lowercase name used in namespaces and values overlays
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }

    /// Production fans charts out into per-category namespaces
    pub fn splits_namespaces(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "development" => Ok(Self::Development),
            "staging" => Ok(Self::Staging),
            "production" => Ok(Self::Production),
            _ => Err(CoreError::InvalidEnvironment {
                value: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!(
            "Production".parse::<Environment>().unwrap(),
            Environment::Production
        );
        assert_eq!(
            "STAGING".parse::<Environment>().unwrap(),
            Environment::Staging
        );
        assert_eq!(
            " development ".parse::<Environment>().unwrap(),
            Environment::Development
        );
    }

    #[test]
    fn test_parse_rejects_unknown() {
        let err = "prod".parse::<Environment>().unwrap_err();
        assert!(matches!(err, CoreError::InvalidEnvironment { ref value } if value == "prod"));
        assert!("".parse::<Environment>().is_err());
        assert!("disaster-recovery".parse::<Environment>().is_err());
    }

    #[test]
    fn test_display_roundtrip() {
        for env in Environment::ALL {
            assert_eq!(env.to_string().parse::<Environment>().unwrap(), env);
        }
    }

    #[test]
    fn test_only_production_splits() {
        assert!(Environment::Production.splits_namespaces());
        assert!(!Environment::Staging.splits_namespaces());
        assert!(!Environment::Development.splits_namespaces());
    }
}
