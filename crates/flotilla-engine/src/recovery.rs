//! Auto-recovery of known environment gaps
//!
//! Inspects the raw text of a failure for a small set of shapes the
//! orchestrator can fix (or at least name) before the operation is attempted
//! again: a missing namespace is created, a missing storage class is checked,
//! missing secrets and RBAC denials are escalated.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::ports::ClusterAdmin;

/// Storage class assumed when an error names none
pub const DEFAULT_STORAGE_CLASS: &str = "standard";

static NAMESPACE_NOT_FOUND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\bnamespaces?\s+"?([a-z0-9](?:[-a-z0-9]*[a-z0-9])?)"?\s+not\s+found"#)
        .expect("valid regex")
});

static SECRET_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\bsecrets?\s+"([^"]+)""#).expect("valid regex"));

static SECRET_NAMESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\bnamespace\s+"([^"]+)""#).expect("valid regex"));

static STORAGE_CLASS_NOT_FOUND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)storage\s?class(?:es)?(?:\.storage\.k8s\.io)?\b.*not\s+found")
        .expect("valid regex")
});

/// Namespace named by a "namespace not found" error
pub fn extract_missing_namespace(text: &str) -> Option<String> {
    NAMESPACE_NOT_FOUND
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Secret (and namespace, when given) named by a "secret not found" error
pub fn extract_missing_secret(text: &str) -> Option<(String, Option<String>)> {
    if !text.to_lowercase().contains("not found") {
        return None;
    }
    let secret = SECRET_NAME.captures(text)?.get(1)?.as_str().to_string();
    let namespace = SECRET_NAMESPACE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string());
    Some((secret, namespace))
}

pub fn mentions_missing_storage_class(text: &str) -> bool {
    STORAGE_CLASS_NOT_FOUND.is_match(text)
}

pub fn mentions_permission_denied(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("forbidden") || lower.contains("unauthorized")
}

/// A failure shape auto-recovery knows about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoverableError {
    NamespaceNotFound { namespace: String },
    StorageClassNotFound { storage_class: String },
    SecretNotFound {
        secret: String,
        namespace: Option<String>,
    },
    PermissionDenied,
    Unrecognized,
}

/// Recognize the failure shape of an error message
pub fn analyze_error(text: &str) -> RecoverableError {
    if let Some((secret, namespace)) = extract_missing_secret(text) {
        return RecoverableError::SecretNotFound { secret, namespace };
    }
    if let Some(namespace) = extract_missing_namespace(text) {
        return RecoverableError::NamespaceNotFound { namespace };
    }
    if mentions_missing_storage_class(text) {
        return RecoverableError::StorageClassNotFound {
            storage_class: DEFAULT_STORAGE_CLASS.to_string(),
        };
    }
    if mentions_permission_denied(text) {
        return RecoverableError::PermissionDenied;
    }
    RecoverableError::Unrecognized
}

/// Action taken by a recovery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RecoveryAction {
    CreateNamespace,
    ValidateStorageClass,
    EscalateSecret,
    EscalatePermission,
    NoAction,
}

impl RecoveryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateNamespace => "CreateNamespace",
            Self::ValidateStorageClass => "ValidateStorageClass",
            Self::EscalateSecret => "EscalateSecret",
            Self::EscalatePermission => "EscalatePermission",
            Self::NoAction => "NoAction",
        }
    }
}

impl fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of one recovery attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryResult {
    pub success: bool,
    pub action: RecoveryAction,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Whether the original operation is now worth attempting again
    pub retriable: bool,
}

impl RecoveryResult {
    fn recovered(action: RecoveryAction, description: String) -> Self {
        Self {
            success: true,
            action,
            description,
            error: None,
            retriable: true,
        }
    }

    fn escalated(action: RecoveryAction, description: String, error: &str) -> Self {
        Self {
            success: false,
            action,
            description,
            error: Some(error.to_string()),
            retriable: false,
        }
    }
}

/// Results of a batch recovery
#[derive(Debug, Clone, Serialize)]
pub struct BatchRecoveryReport {
    pub results: Vec<RecoveryResult>,
    pub succeeded: usize,
    pub failed: usize,
}

/// Performs targeted fixes through the cluster admin port
#[derive(Clone)]
pub struct RecoveryEngine {
    cluster: Arc<dyn ClusterAdmin>,
}

impl RecoveryEngine {
    pub fn new(cluster: Arc<dyn ClusterAdmin>) -> Self {
        Self { cluster }
    }

    /// Attempt to fix the environment behind an error
    ///
    /// Runs at most one corrective action and never retries it.
    pub async fn recover_from_error(&self, error: &str) -> RecoveryResult {
        match analyze_error(error) {
            RecoverableError::NamespaceNotFound { namespace } => {
                self.create_namespace(&namespace).await
            }
            RecoverableError::StorageClassNotFound { storage_class } => {
                self.validate_storage_class(&storage_class).await
            }
            RecoverableError::SecretNotFound { secret, namespace } => {
                let location = namespace
                    .map(|ns| format!(" in namespace '{}'", ns))
                    .unwrap_or_default();
                tracing::warn!(secret = %secret, "missing secret needs provisioning");
                RecoveryResult::escalated(
                    RecoveryAction::EscalateSecret,
                    format!(
                        "secret '{}'{} is missing and is not auto-recoverable here; provision it through the secrets flow",
                        secret, location
                    ),
                    error,
                )
            }
            RecoverableError::PermissionDenied => {
                tracing::warn!("permission denied; RBAC needs a human");
                RecoveryResult::escalated(
                    RecoveryAction::EscalatePermission,
                    "permission denied is not auto-recoverable; fix the RBAC bindings".to_string(),
                    error,
                )
            }
            RecoverableError::Unrecognized => {
                tracing::debug!(error, "no recovery known for error");
                RecoveryResult {
                    success: false,
                    action: RecoveryAction::NoAction,
                    description: "no recovery action for this error".to_string(),
                    error: Some(error.to_string()),
                    retriable: false,
                }
            }
        }
    }

    /// Attempt recovery for each error independently
    pub async fn recover_from_multiple_errors<S: AsRef<str>>(&self, errors: &[S]) -> BatchRecoveryReport {
        let mut results = Vec::with_capacity(errors.len());
        for error in errors {
            results.push(self.recover_from_error(error.as_ref()).await);
        }
        let succeeded = results.iter().filter(|r| r.success).count();
        BatchRecoveryReport {
            failed: results.len() - succeeded,
            succeeded,
            results,
        }
    }

    async fn create_namespace(&self, namespace: &str) -> RecoveryResult {
        match self.cluster.ensure_namespace(namespace).await {
            Ok(()) => {
                tracing::info!(namespace, "created missing namespace");
                RecoveryResult::recovered(
                    RecoveryAction::CreateNamespace,
                    format!("created namespace '{}'", namespace),
                )
            }
            Err(e) if e.to_string().to_lowercase().contains("already exists") => {
                RecoveryResult::recovered(
                    RecoveryAction::CreateNamespace,
                    format!("namespace '{}' already exists", namespace),
                )
            }
            Err(e) => {
                tracing::warn!(namespace, error = %e, "failed to create namespace");
                RecoveryResult {
                    success: false,
                    action: RecoveryAction::CreateNamespace,
                    description: format!("failed to create namespace '{}'", namespace),
                    error: Some(e.to_string()),
                    retriable: false,
                }
            }
        }
    }

    /// Storage classes are environment preconditions, so a failed check
    /// still lets the run continue
    async fn validate_storage_class(&self, storage_class: &str) -> RecoveryResult {
        match self.cluster.ensure_default_storage_class().await {
            Ok(()) => RecoveryResult::recovered(
                RecoveryAction::ValidateStorageClass,
                format!("default storage class available (expected '{}')", storage_class),
            ),
            Err(e) => {
                tracing::warn!(storage_class, error = %e, "storage class validation failed; continuing");
                RecoveryResult {
                    success: true,
                    action: RecoveryAction::ValidateStorageClass,
                    description: format!(
                        "could not validate storage class '{}'; continuing",
                        storage_class
                    ),
                    error: Some(e.to_string()),
                    retriable: false,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockCluster;

    #[test]
    fn test_extract_namespace() {
        assert_eq!(
            extract_missing_namespace(r#"namespaces "alt-staging" not found"#),
            Some("alt-staging".to_string())
        );
        assert_eq!(
            extract_missing_namespace("Error: create: failed: namespace alt-apps not found"),
            Some("alt-apps".to_string())
        );
        assert_eq!(extract_missing_namespace("pods \"x\" not found"), None);
    }

    #[test]
    fn test_extract_secret() {
        let text = r#"secret "db-credentials" in namespace "alt-database" not found"#;
        assert_eq!(
            extract_missing_secret(text),
            Some(("db-credentials".to_string(), Some("alt-database".to_string())))
        );
        assert_eq!(
            extract_missing_secret(r#"secrets "tls" not found"#),
            Some(("tls".to_string(), None))
        );
        assert_eq!(extract_missing_secret(r#"secret "tls" is immutable"#), None);
    }

    #[test]
    fn test_analyze_error() {
        assert_eq!(
            analyze_error(r#"namespaces "alt-staging" not found"#),
            RecoverableError::NamespaceNotFound {
                namespace: "alt-staging".to_string()
            }
        );
        assert!(matches!(
            analyze_error(r#"secret "x" in namespace "alt-auth" not found"#),
            RecoverableError::SecretNotFound { .. }
        ));
        assert_eq!(
            analyze_error(r#"storageclass.storage.k8s.io "fast" not found"#),
            RecoverableError::StorageClassNotFound {
                storage_class: "standard".to_string()
            }
        );
        assert_eq!(
            analyze_error("deployments.apps is forbidden"),
            RecoverableError::PermissionDenied
        );
        assert_eq!(analyze_error("boom"), RecoverableError::Unrecognized);
    }

    #[tokio::test]
    async fn test_recover_missing_namespace() {
        let cluster = Arc::new(MockCluster::new());
        let engine = RecoveryEngine::new(cluster.clone());

        let result = engine
            .recover_from_error(r#"namespaces "alt-staging" not found"#)
            .await;
        assert!(result.success);
        assert!(result.retriable);
        assert_eq!(result.action.to_string(), "CreateNamespace");
        assert!(cluster.has_namespace("alt-staging"));
    }

    #[tokio::test]
    async fn test_ensure_namespace_idempotent() {
        let cluster = Arc::new(MockCluster::new());
        let engine = RecoveryEngine::new(cluster.clone());
        for _ in 0..2 {
            let result = engine
                .recover_from_error(r#"namespaces "alt-apps" not found"#)
                .await;
            assert!(result.success);
        }
    }

    #[tokio::test]
    async fn test_namespace_creation_failure() {
        let cluster = Arc::new(MockCluster::new().fail_namespace_creation("quota exhausted"));
        let engine = RecoveryEngine::new(cluster);
        let result = engine
            .recover_from_error(r#"namespaces "alt-apps" not found"#)
            .await;
        assert!(!result.success);
        assert!(!result.retriable);
        assert_eq!(result.error.as_deref(), Some("quota exhausted"));
    }

    #[tokio::test]
    async fn test_storage_class_is_warning_level() {
        let cluster = Arc::new(MockCluster::new().without_storage_class());
        let engine = RecoveryEngine::new(cluster);
        let result = engine
            .recover_from_error(r#"storageclass.storage.k8s.io "standard" not found"#)
            .await;
        assert!(result.success);
        assert!(!result.retriable);
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn test_escalations() {
        let engine = RecoveryEngine::new(Arc::new(MockCluster::new()));

        let secret = engine
            .recover_from_error(r#"secret "jwt" in namespace "alt-auth" not found"#)
            .await;
        assert!(!secret.success);
        assert_eq!(secret.action, RecoveryAction::EscalateSecret);
        assert!(secret.error.is_some());

        let rbac = engine.recover_from_error("Unauthorized").await;
        assert!(!rbac.success);
        assert_eq!(rbac.action, RecoveryAction::EscalatePermission);

        let other = engine.recover_from_error("boom").await;
        assert_eq!(other.action, RecoveryAction::NoAction);
    }

    #[tokio::test]
    async fn test_batch_is_independent() {
        let cluster = Arc::new(MockCluster::new());
        let engine = RecoveryEngine::new(cluster.clone());
        let report = engine
            .recover_from_multiple_errors(&[
                r#"namespaces "alt-search" not found"#,
                "forbidden",
                r#"namespace alt-auth not found"#,
            ])
            .await;
        assert_eq!(report.results.len(), 3);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
        assert!(cluster.has_namespace("alt-search"));
        assert!(cluster.has_namespace("alt-auth"));
    }
}
