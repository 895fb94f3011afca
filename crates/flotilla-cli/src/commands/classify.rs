//! Classify command - explain how an error message would be handled

use console::style;
use flotilla_engine::{RecoverableError, analyze_error, classify};
use serde_json::{Value, json};

use crate::display;
use crate::error::Result;

/// Run the classify command
pub fn run(message: &str, operation: &str, json: bool) -> Result<()> {
    let classification = classify(Some(message), operation);
    let recoverable = analyze_error(message);

    if json {
        let output = json!({
            "classification": classification,
            "recovery": recovery_json(&recoverable),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    display::print_classification(&classification);
    if let Some(plan) = recovery_plan(&recoverable) {
        println!("  {} {}", style("recovery:").cyan(), plan);
    }
    Ok(())
}

/// What auto-recovery would do for a recognized failure
pub fn recovery_plan(error: &RecoverableError) -> Option<String> {
    match error {
        RecoverableError::NamespaceNotFound { namespace } => {
            Some(format!("create namespace '{}' and retry", namespace))
        }
        RecoverableError::StorageClassNotFound { storage_class } => Some(format!(
            "check that a default storage class exists (expected '{}')",
            storage_class
        )),
        RecoverableError::SecretNotFound { secret, namespace } => Some(match namespace {
            Some(ns) => format!("escalate: secret '{}' is missing in namespace '{}'", secret, ns),
            None => format!("escalate: secret '{}' is missing", secret),
        }),
        RecoverableError::PermissionDenied => {
            Some("escalate: the service account lacks permissions".to_string())
        }
        RecoverableError::Unrecognized => None,
    }
}

fn recovery_json(error: &RecoverableError) -> Value {
    let kind = match error {
        RecoverableError::NamespaceNotFound { .. } => "namespaceNotFound",
        RecoverableError::StorageClassNotFound { .. } => "storageClassNotFound",
        RecoverableError::SecretNotFound { .. } => "secretNotFound",
        RecoverableError::PermissionDenied => "permissionDenied",
        RecoverableError::Unrecognized => "unrecognized",
    };
    json!({
        "kind": kind,
        "plan": recovery_plan(error),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_plan() {
        let plan = recovery_plan(&analyze_error(r#"namespaces "alt-apps" not found"#)).unwrap();
        assert!(plan.contains("alt-apps"));
    }

    #[test]
    fn test_unrecognized_has_no_plan() {
        assert!(recovery_plan(&RecoverableError::Unrecognized).is_none());
        assert_eq!(recovery_json(&RecoverableError::Unrecognized)["plan"], Value::Null);
    }

    #[test]
    fn test_secret_plan_names_namespace() {
        let error = RecoverableError::SecretNotFound {
            secret: "db-credentials".to_string(),
            namespace: Some("alt-database".to_string()),
        };
        let plan = recovery_plan(&error).unwrap();
        assert!(plan.contains("db-credentials") && plan.contains("alt-database"));
        assert_eq!(recovery_json(&error)["kind"], "secretNotFound");
    }
}
