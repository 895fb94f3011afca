//! Run options and cancellation

use std::sync::Arc;
use tokio::sync::watch;

use crate::strategy::DeploymentStrategy;

/// Cooperative cancellation shared by everything taking part in a run
///
/// Clones observe the same signal. Cancelling stops new charts and layers
/// from starting; calls already in flight are allowed to finish.
#[derive(Debug, Clone)]
pub struct CancellationSignal {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
}

impl CancellationSignal {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolve once the signal is cancelled
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        // Fails only once every sender is gone: nothing can cancel anymore
        if receiver.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

impl Default for CancellationSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Options for one orchestration run
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Render and validate only; nothing is applied and nothing is awaited
    pub dry_run: bool,
    /// Push changes without blocking on readiness
    pub force_update: bool,
    /// Deploy every chart into this namespace instead of the resolved ones
    pub target_namespace: Option<String>,
    /// Use this strategy instead of the environment's default
    pub strategy_override: Option<DeploymentStrategy>,
    pub cancellation: CancellationSignal,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn force_update(mut self, force_update: bool) -> Self {
        self.force_update = force_update;
        self
    }

    pub fn target_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.target_namespace = Some(namespace.into());
        self
    }

    pub fn strategy(mut self, strategy: DeploymentStrategy) -> Self {
        self.strategy_override = Some(strategy);
        self
    }

    pub fn cancellation(mut self, signal: CancellationSignal) -> Self {
        self.cancellation = signal;
        self
    }

    /// Whether charts should block on readiness at all
    pub fn waits_for_readiness(&self) -> bool {
        !self.dry_run && !self.force_update
    }
}
