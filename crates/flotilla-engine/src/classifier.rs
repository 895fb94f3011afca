//! Failure classification
//!
//! Turns the raw text of a failed release operation into an
//! [`ErrorClassification`]: a category, whether the same operation may succeed
//! on another attempt, and a hint for the operator. Categories are tested in a
//! fixed priority order and the first match wins, so a lint failure that
//! mentions a "connection" is still a validation error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of a failed operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorType {
    Validation,
    Configuration,
    Permission,
    Resource,
    Network,
    LockConflict,
    Timeout,
    Temporary,
    Unknown,
}

const VALIDATION_KEYWORDS: &[&str] = &[
    "values don't meet the specifications",
    "validation failed",
    "error validating",
    "invalid value",
    "parse error",
    "syntax error",
    "yaml:",
    "json:",
    "unmarshal",
    "template:",
    "lint",
    "schema",
];

const CONFIGURATION_KEYWORDS: &[&str] = &[
    "required value",
    "missing required",
    "is required",
    "incompatible",
    "unsupported",
    "unknown field",
    "no matches for kind",
    "chart requires kubeversion",
];

const PERMISSION_KEYWORDS: &[&str] = &[
    "forbidden",
    "unauthorized",
    "rbac",
    "access denied",
    "permission denied",
    "cannot list",
    "cannot create",
    "cannot get",
];

const RESOURCE_KEYWORDS: &[&str] = &[
    "already exists",
    "exceeded quota",
    "quota exceeded",
    "conflict",
    "storageclass",
    "storage class",
    "persistentvolume",
    "insufficient",
    "temporarily unavailable",
    "no nodes available",
    "unschedulable",
    "not found",
];

/// Resource keywords judged transient
const RETRIABLE_RESOURCE_KEYWORDS: &[&str] = &[
    "insufficient resources",
    "insufficient cpu",
    "insufficient memory",
    "temporarily unavailable",
    "no nodes available",
    "unschedulable",
];

const NETWORK_KEYWORDS: &[&str] = &[
    "connection refused",
    "connection reset",
    "connection timed out",
    "no such host",
    "dial tcp",
    "i/o timeout",
    "network is unreachable",
    "tls handshake",
    "unexpected eof",
    "dns lookup",
];

const LOCK_CONFLICT_KEYWORDS: &[&str] = &[
    "another operation (install/upgrade/rollback) is in progress",
    "another operation is in progress",
    "pending-install",
    "pending-upgrade",
    "pending-rollback",
];

const TIMEOUT_KEYWORDS: &[&str] = &[
    "deadline exceeded",
    "timed out",
    "timeout",
];

const TEMPORARY_KEYWORDS: &[&str] = &[
    "service unavailable",
    "too many requests",
    "rate limit",
    "internal error",
    "internal server error",
    "try again",
    "etcdserver: leader changed",
];

impl ErrorType {
    /// Categories in classification priority order
    pub const PRIORITY: [ErrorType; 8] = [
        ErrorType::Validation,
        ErrorType::Configuration,
        ErrorType::Permission,
        ErrorType::Resource,
        ErrorType::Network,
        ErrorType::LockConflict,
        ErrorType::Timeout,
        ErrorType::Temporary,
    ];

    /// Lower-case keywords that identify this category
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Self::Validation => VALIDATION_KEYWORDS,
            Self::Configuration => CONFIGURATION_KEYWORDS,
            Self::Permission => PERMISSION_KEYWORDS,
            Self::Resource => RESOURCE_KEYWORDS,
            Self::Network => NETWORK_KEYWORDS,
            Self::LockConflict => LOCK_CONFLICT_KEYWORDS,
            Self::Timeout => TIMEOUT_KEYWORDS,
            Self::Temporary => TEMPORARY_KEYWORDS,
            Self::Unknown => &[],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Configuration => "configuration",
            Self::Permission => "permission",
            Self::Resource => "resource",
            Self::Network => "network",
            Self::LockConflict => "lockConflict",
            Self::Timeout => "timeout",
            Self::Temporary => "temporary",
            Self::Unknown => "unknown",
        }
    }

    /// Whether errors of this category are permanent
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::Validation | Self::Configuration | Self::Permission
        )
    }

    fn reason(&self) -> &'static str {
        match self {
            Self::Validation => "chart or values failed validation",
            Self::Configuration => "configuration is missing or incompatible",
            Self::Permission => "insufficient permissions for the operation",
            Self::Resource => "cluster resource conflict or shortage",
            Self::Network => "network failure talking to the cluster",
            Self::LockConflict => "another release operation holds the lock",
            Self::Timeout => "operation exceeded its deadline",
            Self::Temporary => "cluster reported a transient failure",
            Self::Unknown => "unrecognized failure",
        }
    }

    fn suggestion(&self) -> &'static str {
        match self {
            Self::Validation => "Fix the chart templates or values file and lint the chart before redeploying",
            Self::Configuration => "Provide the missing values or align the chart with the cluster version",
            Self::Permission => "Check the service account RBAC bindings for the target namespace",
            Self::Resource => "Inspect existing resources, quotas and storage classes in the namespace",
            Self::Network => "Check cluster connectivity and API server reachability",
            Self::LockConflict => "Wait for the running operation or roll back the release stuck in a pending state",
            Self::Timeout => "Increase the timeout or check why pods are slow to become ready",
            Self::Temporary => "Retry shortly; the cluster should recover on its own",
            Self::Unknown => "Inspect the release and its pods manually",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of classifying one failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorClassification {
    #[serde(rename = "type")]
    pub error_type: ErrorType,
    pub retriable: bool,
    pub reason: String,
    pub suggestion: String,
    pub operation: String,
    pub timestamp: DateTime<Utc>,
    /// Keyword that decided the category
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched: Option<String>,
}

/// Classify a failure message produced by `operation`
///
/// `None` or blank input yields an unknown, non-retriable classification.
pub fn classify(error: Option<&str>, operation: &str) -> ErrorClassification {
    let text = match error.map(str::trim) {
        Some(text) if !text.is_empty() => text,
        _ => {
            return ErrorClassification {
                error_type: ErrorType::Unknown,
                retriable: false,
                reason: "no error provided".to_string(),
                suggestion: String::new(),
                operation: operation.to_string(),
                timestamp: Utc::now(),
                matched: None,
            };
        }
    };

    let lower = text.to_lowercase();
    let found = ErrorType::PRIORITY.iter().find_map(|error_type| {
        error_type
            .keywords()
            .iter()
            .find(|keyword| lower.contains(*keyword))
            .map(|keyword| (*error_type, *keyword))
    });

    let (error_type, matched) = match found {
        Some((error_type, keyword)) => (error_type, Some(keyword.to_string())),
        None => (ErrorType::Unknown, None),
    };

    let retriable = match error_type {
        ErrorType::Validation | ErrorType::Configuration | ErrorType::Permission => false,
        ErrorType::Resource => RETRIABLE_RESOURCE_KEYWORDS
            .iter()
            .any(|keyword| lower.contains(keyword)),
        ErrorType::Network
        | ErrorType::LockConflict
        | ErrorType::Timeout
        | ErrorType::Temporary
        | ErrorType::Unknown => true,
    };

    let reason = match &matched {
        Some(keyword) => format!("{} (matched '{}')", error_type.reason(), keyword),
        None => error_type.reason().to_string(),
    };

    ErrorClassification {
        error_type,
        retriable,
        reason,
        suggestion: error_type.suggestion().to_string(),
        operation: operation.to_string(),
        timestamp: Utc::now(),
        matched,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_error() {
        let c = classify(None, "install");
        assert_eq!(c.error_type, ErrorType::Unknown);
        assert!(!c.retriable);
        assert_eq!(c.reason, "no error provided");

        let c = classify(Some("   "), "install");
        assert_eq!(c.reason, "no error provided");
    }

    #[test]
    fn test_values_specification_error() {
        let c = classify(Some("values don't meet the specifications"), "upgrade");
        assert_eq!(c.error_type, ErrorType::Validation);
        assert!(!c.retriable);
        assert_eq!(c.operation, "upgrade");
    }

    #[test]
    fn test_lock_conflict() {
        let c = classify(
            Some("Error: UPGRADE FAILED: another operation (install/upgrade/rollback) is in progress"),
            "upgrade",
        );
        assert_eq!(c.error_type, ErrorType::LockConflict);
        assert!(c.retriable);
    }

    #[test]
    fn test_validation_beats_network() {
        let messages = [
            "template: api/templates/deploy.yaml:12: connection string invalid",
            "YAML: line 3 connection refused in comment",
            "lint failed: dial tcp mentioned in values",
        ];
        for msg in messages {
            let c = classify(Some(msg), "install");
            assert_eq!(c.error_type, ErrorType::Validation, "{}", msg);
            assert!(!c.retriable);
        }
    }

    #[test]
    fn test_permission() {
        let c = classify(
            Some("secrets is forbidden: User \"ci\" cannot list resource"),
            "install",
        );
        assert_eq!(c.error_type, ErrorType::Permission);
        assert!(!c.retriable);
        assert!(c.error_type.is_permanent());
    }

    #[test]
    fn test_resource_retriable_subset() {
        let c = classify(Some("0/3 nodes: Insufficient memory"), "install");
        assert_eq!(c.error_type, ErrorType::Resource);
        assert!(c.retriable);

        let c = classify(Some("configmaps \"x\" already exists"), "install");
        assert_eq!(c.error_type, ErrorType::Resource);
        assert!(!c.retriable);

        let c = classify(Some("namespaces \"alt-staging\" not found"), "install");
        assert_eq!(c.error_type, ErrorType::Resource);
        assert!(!c.retriable);
    }

    #[test]
    fn test_transient_categories() {
        let cases = [
            ("dial tcp 10.0.0.1:443: connection refused", ErrorType::Network),
            ("context deadline exceeded", ErrorType::Timeout),
            ("the server is currently unable: service unavailable", ErrorType::Temporary),
            ("release stuck in pending-upgrade", ErrorType::LockConflict),
        ];
        for (msg, expected) in cases {
            let c = classify(Some(msg), "install");
            assert_eq!(c.error_type, expected, "{}", msg);
            assert!(c.retriable, "{}", msg);
        }
    }

    #[test]
    fn test_unknown_is_retriable() {
        let c = classify(Some("something odd happened"), "install");
        assert_eq!(c.error_type, ErrorType::Unknown);
        assert!(c.retriable);
        assert!(c.matched.is_none());
    }

    #[test]
    fn test_serializes_type_camel_case() {
        let c = classify(Some("another operation is in progress"), "install");
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["type"], "lockConflict");
        assert_eq!(json["retriable"], true);
    }
}
