use std::time::Duration;

use mlpipe_config::RetryConfig;
use mlpipe_dag::{NodeError, RetryPolicy};

/// A node's retry policy with engine defaults filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRetry {
  pub attempts: u32,
  pub delay: Duration,
  pub exceptions: Option<Vec<String>>,
  pub use_default: bool,
}

impl ResolvedRetry {
  /// Overlay `policy` on the configured defaults.
  pub fn resolve(policy: Option<&RetryPolicy>, defaults: &RetryConfig) -> Self {
    let policy = policy.cloned().unwrap_or_default();
    Self {
      attempts: policy.attempts.unwrap_or(defaults.attempts).max(1),
      delay: policy
        .delay
        .unwrap_or(Duration::from_millis(defaults.delay_ms)),
      exceptions: policy.exceptions.or_else(|| defaults.exceptions.clone()),
      use_default: policy.use_default,
    }
  }

  /// Whether `err` is in the retryable set. No set means everything is.
  pub fn is_retryable(&self, err: &NodeError) -> bool {
    match &self.exceptions {
      Some(kinds) => kinds.iter().any(|k| err.is(k)),
      None => true,
    }
  }

  /// Whether attempt number `attempt` (1-based) failing with `err` earns another try.
  pub fn should_retry(&self, attempt: u32, err: &NodeError) -> bool {
    attempt < self.attempts && self.is_retryable(err)
  }
}
