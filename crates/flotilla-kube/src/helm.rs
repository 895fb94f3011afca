//! Release operations through the helm binary
//!
//! Every call shells out to `helm` with JSON output. Failures surface helm's
//! stderr unchanged, so the engine classifies exactly what helm reported.

use async_trait::async_trait;
use serde::Deserialize;
use std::process::Output;
use tokio::process::Command;

use flotilla_engine::{ReleaseManager, ReleaseOutcome, ReleaseRequest, ReleaseStatus};

use crate::error::{KubeError, Result};

/// Release as printed by `helm install|upgrade|status --output json`
#[derive(Debug, Deserialize)]
struct HelmRelease {
    name: String,
    namespace: String,
    #[serde(default)]
    version: u32,
    info: HelmReleaseInfo,
}

#[derive(Debug, Deserialize)]
struct HelmReleaseInfo {
    status: String,
}

/// helm command-line client
#[derive(Debug, Clone)]
pub struct HelmCli {
    binary: String,
    kube_context: Option<String>,
}

impl HelmCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            kube_context: None,
        }
    }

    pub fn with_kube_context(mut self, context: Option<String>) -> Self {
        self.kube_context = context;
        self
    }

    /// Arguments for `helm install` or `helm upgrade`
    pub fn release_args(&self, command: &str, request: &ReleaseRequest) -> Vec<String> {
        let options = &request.options;
        let mut args = vec![
            command.to_string(),
            request.release.clone(),
            request.chart_path.display().to_string(),
            "--namespace".to_string(),
            request.namespace.clone(),
            "--output".to_string(),
            "json".to_string(),
        ];

        for file in &request.values_files {
            args.push("--values".to_string());
            args.push(file.display().to_string());
        }
        for (key, value) in &request.values {
            args.push("--set".to_string());
            args.push(format!("{}={}", key, value));
        }
        if options.zero_downtime {
            args.push("--set".to_string());
            args.push("global.zeroDowntime=true".to_string());
        }
        if options.wait {
            args.push("--wait".to_string());
        }
        if let Some(timeout) = options.timeout {
            args.push("--timeout".to_string());
            args.push(format!("{}s", timeout.as_secs()));
        }
        if options.dry_run {
            args.push("--dry-run".to_string());
        }
        // install has no --force
        if options.force && command == "upgrade" {
            args.push("--force".to_string());
        }
        self.push_context(&mut args);
        args
    }

    pub fn rollback_args(&self, release: &str, namespace: &str, revision: u32) -> Vec<String> {
        let mut args = vec!["rollback".to_string(), release.to_string()];
        if revision > 0 {
            args.push(revision.to_string());
        }
        args.push("--namespace".to_string());
        args.push(namespace.to_string());
        self.push_context(&mut args);
        args
    }

    pub fn uninstall_args(&self, release: &str, namespace: &str) -> Vec<String> {
        let mut args = vec![
            "uninstall".to_string(),
            release.to_string(),
            "--namespace".to_string(),
            namespace.to_string(),
        ];
        self.push_context(&mut args);
        args
    }

    pub fn status_args(&self, release: &str, namespace: &str) -> Vec<String> {
        let mut args = vec![
            "status".to_string(),
            release.to_string(),
            "--namespace".to_string(),
            namespace.to_string(),
            "--output".to_string(),
            "json".to_string(),
        ];
        self.push_context(&mut args);
        args
    }

    fn push_context(&self, args: &mut Vec<String>) {
        if let Some(context) = &self.kube_context {
            args.push("--kube-context".to_string());
            args.push(context.clone());
        }
    }

    /// Run helm, turning a non-zero exit into [`KubeError::Helm`]
    async fn run(&self, args: &[String]) -> Result<Output> {
        tracing::debug!(binary = %self.binary, args = ?args, "running helm");
        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => KubeError::HelmNotFound {
                    binary: self.binary.clone(),
                },
                _ => KubeError::Io(e),
            })?;

        if output.status.success() {
            Ok(output)
        } else {
            Err(KubeError::Helm {
                command: args.first().cloned().unwrap_or_default(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    async fn apply(&self, command: &str, request: &ReleaseRequest) -> Result<ReleaseOutcome> {
        let output = self.run(&self.release_args(command, request)).await?;
        parse_outcome(&output.stdout)
    }
}

/// Parse helm's JSON release output
fn parse_outcome(stdout: &[u8]) -> Result<ReleaseOutcome> {
    let release: HelmRelease = serde_json::from_slice(stdout)?;
    Ok(ReleaseOutcome {
        release: release.name,
        namespace: release.namespace,
        revision: release.version,
        status: ReleaseStatus::parse(&release.info.status),
    })
}

#[async_trait]
impl ReleaseManager for HelmCli {
    async fn install(&self, request: &ReleaseRequest) -> flotilla_engine::Result<ReleaseOutcome> {
        Ok(self.apply("install", request).await?)
    }

    async fn upgrade(&self, request: &ReleaseRequest) -> flotilla_engine::Result<ReleaseOutcome> {
        Ok(self.apply("upgrade", request).await?)
    }

    async fn rollback(&self, release: &str, namespace: &str, revision: u32) -> flotilla_engine::Result<()> {
        self.run(&self.rollback_args(release, namespace, revision))
            .await?;
        Ok(())
    }

    async fn uninstall(&self, release: &str, namespace: &str) -> flotilla_engine::Result<()> {
        self.run(&self.uninstall_args(release, namespace)).await?;
        Ok(())
    }

    async fn status(&self, release: &str, namespace: &str) -> flotilla_engine::Result<ReleaseStatus> {
        match self.run(&self.status_args(release, namespace)).await {
            Ok(output) => Ok(parse_outcome(&output.stdout)?.status),
            Err(KubeError::Helm { message, .. }) if message.contains("not found") => {
                Ok(ReleaseStatus::NotFound)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flotilla_engine::ReleaseOptions;
    use std::time::Duration;

    fn request() -> ReleaseRequest {
        ReleaseRequest::new("api-gateway", "charts/api-gateway", "alt-apps")
            .with_value("global.environment", "production")
    }

    #[test]
    fn test_install_args() {
        let helm = HelmCli::new("helm");
        let request = request().with_options(ReleaseOptions {
            wait: true,
            timeout: Some(Duration::from_secs(600)),
            force: true,
            zero_downtime: true,
            ..Default::default()
        });

        let args = helm.release_args("install", &request);
        assert_eq!(
            args,
            vec![
                "install",
                "api-gateway",
                "charts/api-gateway",
                "--namespace",
                "alt-apps",
                "--output",
                "json",
                "--set",
                "global.environment=production",
                "--set",
                "global.zeroDowntime=true",
                "--wait",
                "--timeout",
                "600s",
            ]
        );
    }

    #[test]
    fn test_upgrade_args() {
        let helm = HelmCli::new("helm").with_kube_context(Some("prod-eu".to_string()));
        let mut request = request().with_options(ReleaseOptions {
            dry_run: true,
            force: true,
            ..Default::default()
        });
        request.values_files.push("charts/api-gateway/values-production.yaml".into());

        let args = helm.release_args("upgrade", &request);
        assert!(args.contains(&"--dry-run".to_string()));
        assert!(args.contains(&"--force".to_string()));
        assert!(!args.contains(&"--wait".to_string()));
        let values = args.iter().position(|a| a == "--values").unwrap();
        assert_eq!(args[values + 1], "charts/api-gateway/values-production.yaml");
        assert_eq!(&args[args.len() - 2..], ["--kube-context", "prod-eu"]);
    }

    #[test]
    fn test_rollback_args() {
        let helm = HelmCli::new("helm");
        assert_eq!(
            helm.rollback_args("keycloak", "alt-auth", 0),
            vec!["rollback", "keycloak", "--namespace", "alt-auth"]
        );
        assert_eq!(
            helm.rollback_args("keycloak", "alt-auth", 4),
            vec!["rollback", "keycloak", "4", "--namespace", "alt-auth"]
        );
    }

    #[test]
    fn test_uninstall_args() {
        let helm = HelmCli::new("helm").with_kube_context(Some("staging".to_string()));
        assert_eq!(
            helm.uninstall_args("keycloak", "alt-staging"),
            vec!["uninstall", "keycloak", "--namespace", "alt-staging", "--kube-context", "staging"]
        );
    }

    #[test]
    fn test_parse_outcome() {
        let json = br#"{"name":"keycloak","namespace":"alt-auth","version":3,"info":{"status":"pending-upgrade","description":"Upgrade"},"manifest":""}"#;
        let outcome = parse_outcome(json).unwrap();
        assert_eq!(outcome.release, "keycloak");
        assert_eq!(outcome.revision, 3);
        assert_eq!(outcome.status, ReleaseStatus::PendingUpgrade);
        assert!(parse_outcome(b"not json").is_err());
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let helm = HelmCli::new("flotilla-test-no-such-helm");
        let err = helm.run(&helm.status_args("x", "y")).await.unwrap_err();
        assert!(matches!(err, KubeError::HelmNotFound { .. }));
    }
}
