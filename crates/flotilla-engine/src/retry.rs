//! Retry bookkeeping for failed chart operations

use std::time::Duration;
use tokio::time::Instant;

use crate::classifier::{ErrorClassification, ErrorType};

/// Most attempts granted to a failure nobody recognized
pub const UNKNOWN_ERROR_MAX_ATTEMPTS: u32 = 2;

/// A classified failure of one chart operation, tracked across attempts
#[derive(Debug, Clone)]
pub struct DeploymentError {
    pub classification: ErrorClassification,
    pub chart_name: String,
    pub namespace: String,
    pub operation: String,
    /// Attempts made so far, starting at 1
    pub attempt: u32,
    pub last_attempt_time: Instant,
}

impl DeploymentError {
    /// Record the first failure of an operation
    pub fn new(
        classification: ErrorClassification,
        chart_name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            operation: classification.operation.clone(),
            classification,
            chart_name: chart_name.into(),
            namespace: namespace.into(),
            attempt: 1,
            last_attempt_time: Instant::now(),
        }
    }

    /// Record another failure of the same operation
    pub fn record_attempt(&mut self, classification: ErrorClassification) {
        self.operation = classification.operation.clone();
        self.classification = classification;
        self.attempt += 1;
        self.last_attempt_time = Instant::now();
    }

    pub fn error_type(&self) -> ErrorType {
        self.classification.error_type
    }

    /// Attempt budget for this failure, given the configured maximum
    pub fn effective_max_retries(&self, max_retries: u32) -> u32 {
        if self.classification.error_type == ErrorType::Unknown {
            max_retries.min(UNKNOWN_ERROR_MAX_ATTEMPTS)
        } else {
            max_retries
        }
    }

    /// Whether another attempt is allowed now
    ///
    /// This is a guard, not a scheduler: it refuses when the backoff since the
    /// last attempt has not elapsed yet but never sleeps.
    pub fn should_retry(&self, max_retries: u32, backoff: Duration) -> bool {
        if !self.classification.retriable {
            return false;
        }
        if self.attempt >= self.effective_max_retries(max_retries) {
            return false;
        }
        self.last_attempt_time.elapsed() >= backoff
    }
}

/// Exponential backoff: `base * 2^(attempt - 1)`, capped at `max`
pub fn backoff_for_attempt(attempt: u32, base: Duration, max: Duration) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    base.checked_mul(1u32 << exponent)
        .map_or(max, |delay| delay.min(max))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify;

    fn error_for(msg: &str) -> DeploymentError {
        DeploymentError::new(classify(Some(msg), "install"), "api-gateway", "alt-apps")
    }

    #[test]
    fn test_backoff_schedule() {
        let base = Duration::from_secs(5);
        let max = Duration::from_secs(60);
        assert_eq!(backoff_for_attempt(1, base, max), Duration::from_secs(5));
        assert_eq!(backoff_for_attempt(2, base, max), Duration::from_secs(10));
        assert_eq!(backoff_for_attempt(3, base, max), Duration::from_secs(20));
        assert_eq!(backoff_for_attempt(5, base, max), Duration::from_secs(60));
        assert_eq!(backoff_for_attempt(0, base, max), Duration::from_secs(5));
        assert_eq!(backoff_for_attempt(u32::MAX, base, max), max);
    }

    #[tokio::test(start_paused = true)]
    async fn test_validation_never_retries() {
        let mut err = error_for("values don't meet the specifications");
        tokio::time::advance(Duration::from_secs(3600)).await;
        for max in [0, 1, 5, 100] {
            assert!(!err.should_retry(max, Duration::ZERO));
        }
        err.attempt = 0;
        assert!(!err.should_retry(100, Duration::ZERO));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_guard() {
        let err = error_for("connection refused");
        assert!(!err.should_retry(3, Duration::from_secs(10)));

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(err.should_retry(3, Duration::from_secs(10)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_budget() {
        let mut err = error_for("connection refused");
        err.record_attempt(classify(Some("connection refused"), "upgrade"));
        err.record_attempt(classify(Some("connection refused"), "upgrade"));
        assert_eq!(err.attempt, 3);
        assert_eq!(err.operation, "upgrade");
        assert!(!err.should_retry(3, Duration::ZERO));
        assert!(err.should_retry(4, Duration::ZERO));
    }

    #[test]
    fn test_unknown_capped() {
        let err = error_for("weird failure");
        assert_eq!(err.effective_max_retries(5), UNKNOWN_ERROR_MAX_ATTEMPTS);
        assert_eq!(err.effective_max_retries(1), 1);
        assert!(err.should_retry(5, Duration::ZERO));

        let mut err = err;
        err.attempt = 2;
        assert!(!err.should_retry(5, Duration::ZERO));
    }
}
