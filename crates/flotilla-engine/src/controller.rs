//! Layer execution controller
//!
//! Walks a strategy's layers strictly in order. Charts of a parallel layer are
//! dispatched together and awaited as a group; a sequential layer deploys them
//! one by one with a pacing delay. A layer that finished dispatching is gated
//! on readiness when its configuration asks for it. A failure in a critical
//! layer skips everything after it, a failure elsewhere only degrades the run.

use flotilla_core::{
    Chart, ChartCatalog, DependencyGraph, Environment, NamespaceLayout, OrchestratorConfig,
    RetryConfig,
};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::classifier::{ErrorClassification, ErrorType, classify};
use crate::error::Result;
use crate::layer::LayerConfiguration;
use crate::options::RunOptions;
use crate::ports::{Ports, ReleaseOptions, ReleaseRequest, ReleaseStatus, ResourceRef};
use crate::progress::{ChartStatus, DeploymentProgress, ProgressTracker, RunStatus};
use crate::recovery::{RecoveryAction, RecoveryEngine};
use crate::retry::{DeploymentError, backoff_for_attempt};
use crate::strategy::DeploymentStrategy;

/// Default pause between readiness polls
pub const DEFAULT_HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(10);

/// How a chart's deployment ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChartOutcome {
    Succeeded,
    Failed,
    /// Never started because the run was cancelled
    Cancelled,
}

/// Why a readiness wait ended without the resource becoming ready
#[derive(Debug, Clone, PartialEq, Eq)]
enum WaitFailure {
    NotReady(String),
    Cancelled,
}

/// State shared by every chart task of one run
struct RunContext<'a> {
    environment: Environment,
    strategy: DeploymentStrategy,
    options: &'a RunOptions,
    graph: &'a DependencyGraph,
    tracker: &'a ProgressTracker,
    max_attempts: u32,
}

/// Drives orchestration runs against a set of ports
pub struct Orchestrator {
    catalog: Arc<ChartCatalog>,
    layout: NamespaceLayout,
    ports: Ports,
    recovery: RecoveryEngine,
    retry: RetryConfig,
    health_check_interval: Duration,
}

impl Orchestrator {
    pub fn new(catalog: Arc<ChartCatalog>, layout: NamespaceLayout, ports: Ports) -> Self {
        let recovery = RecoveryEngine::new(ports.cluster_admin.clone());
        Self {
            catalog,
            layout,
            ports,
            recovery,
            retry: RetryConfig::default(),
            health_check_interval: DEFAULT_HEALTH_CHECK_INTERVAL,
        }
    }

    /// Build an orchestrator with the layout, retry and polling settings of a
    /// configuration file
    pub fn from_config(config: &OrchestratorConfig, catalog: Arc<ChartCatalog>, ports: Ports) -> Self {
        Self::new(catalog, config.namespace_layout(), ports)
            .with_retry(config.retry.clone())
            .with_health_check_interval(config.health_check_interval)
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_health_check_interval(mut self, interval: Duration) -> Self {
        self.health_check_interval = interval;
        self
    }

    pub fn catalog(&self) -> &ChartCatalog {
        &self.catalog
    }

    pub fn layout(&self) -> &NamespaceLayout {
        &self.layout
    }

    /// Strategy a run would use
    pub fn strategy_for(&self, environment: Environment, options: &RunOptions) -> DeploymentStrategy {
        options
            .strategy_override
            .unwrap_or_else(|| DeploymentStrategy::for_environment(environment))
    }

    /// Run the environment's strategy (or the override from `options`)
    pub async fn run(&self, environment: Environment, options: RunOptions) -> Result<DeploymentProgress> {
        let strategy = self.strategy_for(environment, &options);
        let layers = strategy.layer_configurations(&self.catalog)?;
        self.execute(environment, strategy, &layers, &options).await
    }

    /// Execute an explicit layer list
    ///
    /// Errors are reserved for setup problems; chart and layer failures are
    /// reported through the returned progress.
    pub async fn execute(
        &self,
        environment: Environment,
        strategy: DeploymentStrategy,
        layers: &[LayerConfiguration],
        options: &RunOptions,
    ) -> Result<DeploymentProgress> {
        let graph = DependencyGraph::for_environment(environment, &self.layout, &self.catalog)?;
        let tracker = ProgressTracker::new(DeploymentProgress::new(
            environment,
            strategy,
            options.dry_run,
            layers,
        ));
        let ctx = RunContext {
            environment,
            strategy,
            options,
            graph: &graph,
            tracker: &tracker,
            max_attempts: self
                .retry
                .max_retries
                .unwrap_or_else(|| strategy.operation_retries()),
        };
        let deadline = Instant::now() + strategy.global_timeout();

        info!(
            environment = %environment,
            strategy = %strategy,
            layers = layers.len(),
            dry_run = options.dry_run,
            "starting deployment"
        );

        let mut stopped: Option<(RunStatus, String)> = None;
        let mut degraded: Vec<&str> = Vec::new();

        for (index, layer) in layers.iter().enumerate() {
            if let Some((_, reason)) = &stopped {
                tracker.layer_skipped(index, reason.clone());
                continue;
            }
            if options.cancellation.is_cancelled() {
                let reason = "deployment cancelled".to_string();
                tracker.layer_skipped(index, reason.clone());
                stopped = Some((RunStatus::Aborted, reason));
                continue;
            }
            let now = Instant::now();
            if now >= deadline {
                let reason = format!(
                    "global timeout of {:?} exceeded before layer '{}'",
                    strategy.global_timeout(),
                    layer.name
                );
                warn!(layer = %layer.name, "{}", reason);
                tracker.layer_skipped(index, reason.clone());
                stopped = Some((RunStatus::Failed, reason));
                continue;
            }

            info!(
                layer = %layer.name,
                charts = layer.charts.len(),
                parallel = layer.allow_parallel_deployment,
                critical = layer.critical_layer,
                "deploying layer"
            );
            tracker.layer_started(index);

            let budget = layer.layer_completion_timeout.min(deadline - now);
            self.execute_layer(&ctx, index, layer, budget).await;

            let snapshot = tracker.snapshot();
            let failed: Vec<&str> = snapshot
                .charts_in_layer(index)
                .filter(|c| c.status == ChartStatus::Failed)
                .map(|c| c.name.as_str())
                .collect();

            if options.cancellation.is_cancelled() {
                let reason = "deployment cancelled".to_string();
                warn!(layer = %layer.name, "deployment cancelled");
                tracker.skip_unfinished_charts(index, &reason);
                if failed.is_empty() {
                    tracker.layer_skipped(index, reason.clone());
                } else {
                    tracker.layer_failed(
                        index,
                        format!("{} chart(s) failed before cancellation: {}", failed.len(), failed.join(", ")),
                    );
                }
                stopped = Some((RunStatus::Aborted, reason));
                continue;
            }

            if failed.is_empty() {
                info!(layer = %layer.name, "layer completed");
                tracker.layer_completed(index);
                continue;
            }

            let message = format!("{} chart(s) failed: {}", failed.len(), failed.join(", "));
            tracker.layer_failed(index, message.clone());
            if layer.critical_layer {
                warn!(layer = %layer.name, "critical layer failed; skipping remaining layers");
                stopped = Some((
                    RunStatus::Failed,
                    format!("critical layer '{}' failed: {}", layer.name, message),
                ));
            } else {
                warn!(layer = %layer.name, "non-critical layer failed; continuing");
                degraded.push(layer.name.as_str());
            }
        }

        let (status, message) = match stopped {
            Some((status, reason)) => (status, Some(reason)),
            None if !degraded.is_empty() => (
                RunStatus::Degraded,
                Some(format!("non-critical layers failed: {}", degraded.join(", "))),
            ),
            None => (RunStatus::Succeeded, None),
        };

        let progress = tracker.finish(status, message);
        let summary = progress.summary();
        info!(
            status = %progress.status,
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            "deployment finished"
        );
        Ok(progress)
    }

    async fn execute_layer(
        &self,
        ctx: &RunContext<'_>,
        index: usize,
        layer: &LayerConfiguration,
        budget: Duration,
    ) {
        let dispatch = async {
            if layer.allow_parallel_deployment {
                join_all(
                    layer
                        .charts
                        .iter()
                        .map(|chart| self.deploy_chart(ctx, index, layer, chart)),
                )
                .await;
            } else {
                self.deploy_sequentially(ctx, index, layer).await;
            }
        };

        if tokio::time::timeout(budget, dispatch).await.is_err() {
            let reason = format!("layer '{}' did not finish within {:?}", layer.name, budget);
            let failed = ctx.tracker.fail_unfinished_charts(index, &reason);
            warn!(layer = %layer.name, charts = ?failed, "layer completion timeout");
            return;
        }

        if !ctx.options.cancellation.is_cancelled() {
            self.health_gate(ctx, index, layer).await;
        }
    }

    async fn deploy_sequentially(&self, ctx: &RunContext<'_>, index: usize, layer: &LayerConfiguration) {
        for (position, chart) in layer.charts.iter().enumerate() {
            if position > 0 && !ctx.options.dry_run && !layer.wait_between_charts.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(layer.wait_between_charts) => {}
                    _ = ctx.options.cancellation.cancelled() => return,
                }
            }

            match self.deploy_chart(ctx, index, layer, chart).await {
                ChartOutcome::Succeeded => {}
                ChartOutcome::Cancelled => return,
                ChartOutcome::Failed if layer.critical_layer => {
                    ctx.tracker.skip_unfinished_charts(
                        index,
                        &format!("'{}' failed in critical layer", chart.name),
                    );
                    return;
                }
                ChartOutcome::Failed => {}
            }
        }
    }

    async fn deploy_chart(
        &self,
        ctx: &RunContext<'_>,
        index: usize,
        layer: &LayerConfiguration,
        chart: &Chart,
    ) -> ChartOutcome {
        if ctx.options.cancellation.is_cancelled() {
            return ChartOutcome::Cancelled;
        }

        let namespaces = match &ctx.options.target_namespace {
            Some(namespace) => vec![namespace.clone()],
            None => self.layout.target_namespaces_for(chart, ctx.environment),
        };
        ctx.tracker.chart_started(index, &chart.name, &namespaces);

        match self.await_dependencies(ctx, chart).await {
            Ok(()) => {}
            Err(WaitFailure::Cancelled) => {
                debug!(chart = %chart.name, "cancelled while waiting for dependencies");
                return ChartOutcome::Cancelled;
            }
            Err(WaitFailure::NotReady(message)) => {
                warn!(chart = %chart.name, "{}", message);
                ctx.tracker.chart_failed(index, &chart.name, message, None);
                return ChartOutcome::Failed;
            }
        }
        if ctx.options.cancellation.is_cancelled() {
            return ChartOutcome::Cancelled;
        }

        for namespace in &namespaces {
            if let Err((message, classification)) =
                self.deploy_to_namespace(ctx, index, layer, chart, namespace).await
            {
                warn!(
                    chart = %chart.name,
                    namespace = %namespace,
                    error_type = %classification.error_type,
                    "chart deployment failed: {}",
                    message
                );
                ctx.tracker
                    .chart_failed(index, &chart.name, message, Some(&classification));
                return ChartOutcome::Failed;
            }
        }

        info!(chart = %chart.name, namespaces = ?namespaces, "chart deployed");
        ctx.tracker.chart_succeeded(index, &chart.name);
        ChartOutcome::Succeeded
    }

    /// Wait for a chart's runtime dependencies
    ///
    /// Required dependencies are polled up to their own timeout; optional ones
    /// are checked once.
    async fn await_dependencies(&self, ctx: &RunContext<'_>, chart: &Chart) -> std::result::Result<(), WaitFailure> {
        if !ctx.options.waits_for_readiness() {
            return Ok(());
        }

        for dependency in ctx.graph.dependencies_of(&chart.name) {
            let namespace = ctx
                .options
                .target_namespace
                .clone()
                .unwrap_or_else(|| dependency.namespace.clone());
            let resource = ResourceRef::new(&dependency.service_name, namespace);

            if dependency.required {
                debug!(chart = %chart.name, dependency = %resource, "waiting for dependency");
                let timeout = Duration::from_secs(dependency.timeout_seconds);
                match self.wait_until_ready(ctx, &resource, timeout, None).await {
                    Ok(()) => {}
                    Err(WaitFailure::Cancelled) => return Err(WaitFailure::Cancelled),
                    Err(WaitFailure::NotReady(_)) => {
                        return Err(WaitFailure::NotReady(format!(
                            "required dependency '{}' not ready within {}s",
                            resource, dependency.timeout_seconds
                        )));
                    }
                }
            } else {
                match self.ports.readiness.is_ready(&resource).await {
                    Ok(true) => {}
                    Ok(false) => {
                        warn!(chart = %chart.name, dependency = %resource, "optional dependency not ready")
                    }
                    Err(e) => {
                        warn!(chart = %chart.name, dependency = %resource, error = %e, "optional dependency check failed")
                    }
                }
            }
        }
        Ok(())
    }

    /// Install or upgrade a chart in one namespace, with recovery and retries
    async fn deploy_to_namespace(
        &self,
        ctx: &RunContext<'_>,
        index: usize,
        layer: &LayerConfiguration,
        chart: &Chart,
        namespace: &str,
    ) -> std::result::Result<(), (String, ErrorClassification)> {
        let request = self.release_request(ctx, layer, chart, namespace);
        let releases = &self.ports.release_manager;
        let mut tracked: Option<DeploymentError> = None;

        loop {
            ctx.tracker.chart_attempted(index, &chart.name);

            let existing = match releases.status(&chart.name, namespace).await {
                Ok(status) => status,
                Err(e) => {
                    debug!(chart = %chart.name, namespace, error = %e, "status lookup failed; assuming new release");
                    ReleaseStatus::NotFound
                }
            };
            let (operation, result) = if existing.exists() {
                ("upgrade", releases.upgrade(&request).await)
            } else {
                ("install", releases.install(&request).await)
            };

            let message = match result {
                Ok(outcome) => {
                    debug!(
                        chart = %chart.name,
                        namespace,
                        revision = outcome.revision,
                        operation,
                        "release applied"
                    );
                    return Ok(());
                }
                Err(e) => e.to_string(),
            };

            // Recovery runs once per error, before the retry decision
            let recovery = self.recovery.recover_from_error(&message).await;
            let recovered = recovery.success && recovery.retriable;
            if recovery.action != RecoveryAction::NoAction {
                info!(
                    chart = %chart.name,
                    namespace,
                    action = %recovery.action,
                    success = recovery.success,
                    "{}",
                    recovery.description
                );
                ctx.tracker.chart_recovery(index, &chart.name, recovery);
            }

            let classification = classify(Some(&message), operation);
            let error = match tracked.take() {
                Some(mut error) => {
                    error.record_attempt(classification);
                    error
                }
                None => DeploymentError::new(classification, &chart.name, namespace),
            };
            let error = tracked.insert(error);
            if recovered {
                error.classification.retriable = true;
            }

            warn!(
                chart = %chart.name,
                namespace,
                attempt = error.attempt,
                error_type = %error.error_type(),
                retriable = error.classification.retriable,
                "{} failed: {}",
                operation,
                message
            );

            if !error.classification.retriable
                || error.attempt >= error.effective_max_retries(ctx.max_attempts)
            {
                return Err((message, error.classification.clone()));
            }

            if error.error_type() == ErrorType::LockConflict {
                self.clear_stale_lock(&chart.name, namespace).await;
            }

            let backoff = if recovered {
                Duration::ZERO
            } else {
                backoff_for_attempt(error.attempt, self.retry.base_backoff, self.retry.max_backoff)
            };
            if !backoff.is_zero() {
                debug!(chart = %chart.name, namespace, backoff = ?backoff, "backing off before retry");
                tokio::select! {
                    _ = tokio::time::sleep(backoff) => {}
                    _ = ctx.options.cancellation.cancelled() => {
                        return Err((
                            format!("{} (cancelled before retry)", message),
                            error.classification.clone(),
                        ));
                    }
                }
            }
            if ctx.options.cancellation.is_cancelled()
                || !error.should_retry(ctx.max_attempts, backoff)
            {
                return Err((message, error.classification.clone()));
            }
        }
    }

    /// Clear a release left in a pending state by an interrupted operation
    ///
    /// A first install has no revision to roll back to, so it is uninstalled
    /// and the retry installs it again.
    async fn clear_stale_lock(&self, release: &str, namespace: &str) {
        let releases = &self.ports.release_manager;
        match releases.status(release, namespace).await {
            Ok(ReleaseStatus::PendingInstall) => {
                info!(release, namespace, "uninstalling release stuck in pending-install");
                if let Err(e) = releases.uninstall(release, namespace).await {
                    warn!(release, namespace, error = %e, "failed to clear stale install lock");
                }
            }
            Ok(status) if status.is_pending() => {
                info!(release, namespace, status = %status, "rolling back release stuck in pending state");
                if let Err(e) = releases.rollback(release, namespace, 0).await {
                    warn!(release, namespace, error = %e, "failed to clear stale release lock");
                }
            }
            Ok(_) => {}
            Err(e) => warn!(release, namespace, error = %e, "could not inspect release lock"),
        }
    }

    fn release_request(
        &self,
        ctx: &RunContext<'_>,
        layer: &LayerConfiguration,
        chart: &Chart,
        namespace: &str,
    ) -> ReleaseRequest {
        let options = ctx.options;
        let mut request = ReleaseRequest::new(&chart.name, &chart.source_path, namespace)
            .with_value("global.environment", ctx.environment.as_str())
            .with_options(ReleaseOptions {
                wait: chart.should_wait_for_readiness_with_options(options.dry_run, options.force_update),
                timeout: Some(layer.health_check_timeout),
                dry_run: options.dry_run,
                force: options.force_update,
                zero_downtime: ctx.strategy.requires_zero_downtime(),
            });
        if let Some(overlay) = chart.values_overlay(ctx.environment.as_str()) {
            request.values_files.push(overlay);
        }
        request
    }

    /// Poll readiness of every successfully dispatched chart of a layer
    async fn health_gate(&self, ctx: &RunContext<'_>, index: usize, layer: &LayerConfiguration) {
        if !layer.requires_health_check {
            return;
        }

        let snapshot = ctx.tracker.snapshot();
        let checks = layer
            .charts
            .iter()
            .filter(|chart| {
                chart.should_wait_for_readiness_with_options(ctx.options.dry_run, ctx.options.force_update)
            })
            .filter_map(|chart| {
                snapshot
                    .chart(index, &chart.name)
                    .filter(|p| p.status == ChartStatus::Success)
                    .map(|p| (chart, p.namespaces.clone()))
            })
            .map(|(chart, namespaces)| async move {
                for namespace in namespaces {
                    let resource = ResourceRef::new(&chart.name, namespace);
                    let budget = Some(ctx.strategy.health_check_retries());
                    match self
                        .wait_until_ready(ctx, &resource, layer.health_check_timeout, budget)
                        .await
                    {
                        Ok(()) => {}
                        Err(WaitFailure::Cancelled) => return,
                        Err(WaitFailure::NotReady(message)) => {
                            warn!(chart = %chart.name, layer = %layer.name, "health check failed: {}", message);
                            ctx.tracker.chart_failed(index, &chart.name, message, None);
                            return;
                        }
                    }
                }
                debug!(chart = %chart.name, "healthy");
            });

        join_all(checks).await;
    }

    /// Poll a resource until ready, `timeout` elapses or the run is cancelled
    ///
    /// `probe_error_budget` bounds probe errors; `None` treats them as "not
    /// ready yet".
    async fn wait_until_ready(
        &self,
        ctx: &RunContext<'_>,
        resource: &ResourceRef,
        timeout: Duration,
        probe_error_budget: Option<u32>,
    ) -> std::result::Result<(), WaitFailure> {
        let deadline = Instant::now() + timeout;
        let mut probe_errors = 0u32;

        loop {
            match self.ports.readiness.is_ready(resource).await {
                Ok(true) => return Ok(()),
                Ok(false) => debug!(resource = %resource, "not ready yet"),
                Err(e) => {
                    probe_errors += 1;
                    if probe_error_budget.is_some_and(|budget| probe_errors > budget) {
                        return Err(WaitFailure::NotReady(format!(
                            "readiness probe for '{}' failed {} times: {}",
                            resource, probe_errors, e
                        )));
                    }
                    debug!(resource = %resource, error = %e, "readiness probe failed");
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(WaitFailure::NotReady(format!(
                    "'{}' not ready within {:?}",
                    resource, timeout
                )));
            }
            tokio::select! {
                _ = tokio::time::sleep(self.health_check_interval.min(deadline - now)) => {}
                _ = ctx.options.cancellation.cancelled() => return Err(WaitFailure::Cancelled),
            }
        }
    }
}
