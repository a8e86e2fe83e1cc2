use std::time::Duration;

use crate::config::RetryConfig;

/// Decision for a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Give up and surface the failure to the submitter.
    NoRetry,
    /// Schedule another attempt after the delay.
    RetryAfter(Duration),
}

/// Exponential backoff with caps.
///
/// The budget lives on each operation (`retries_left`); the policy only
/// answers whether another attempt is allowed and how long to wait.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    /// Default retry budget for operations that don't override it.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl BackoffPolicy {
    pub fn from_config(cfg: &RetryConfig) -> Self {
        Self {
            max_retries: cfg.max_retries,
            base_delay: Duration::from_secs_f64(cfg.base_delay_secs.max(0.0)),
            max_delay: Duration::from_secs(cfg.max_delay_secs),
        }
    }

    /// Delay before retry number `attempt_index` (1-based):
    /// `base * 2^(n-1)`, capped at `max_delay`.
    pub fn delay_for(&self, attempt_index: u32) -> Duration {
        let exp = 1u32 << attempt_index.saturating_sub(1).min(8);
        self.base_delay.saturating_mul(exp).min(self.max_delay)
    }

    /// `recoverable` comes from classification; `retries_left` is the
    /// operation's remaining budget; `attempt_index` counts failed attempts
    /// so far (1 after the initial attempt fails).
    pub fn decide(&self, recoverable: bool, retries_left: u32, attempt_index: u32) -> RetryDecision {
        if !recoverable || retries_left == 0 {
            return RetryDecision::NoRetry;
        }
        RetryDecision::RetryAfter(self.delay_for(attempt_index))
    }
}
