use std::time::Duration;

/// Per-node retry capability.
///
/// Unset fields fall back to the engine's configured defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryPolicy {
  /// Total invocations of a failing body, including the first (>= 1).
  pub attempts: Option<u32>,
  /// Pause between consecutive attempts.
  pub delay: Option<Duration>,
  /// Retryable error kinds. `None` retries every error.
  pub exceptions: Option<Vec<String>>,
  /// Resolve to the node's default value once attempts are exhausted.
  pub use_default: bool,
}

impl RetryPolicy {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn attempts(mut self, attempts: u32) -> Self {
    self.attempts = Some(attempts);
    self
  }

  pub fn delay(mut self, delay: Duration) -> Self {
    self.delay = Some(delay);
    self
  }

  pub fn exceptions<I, S>(mut self, kinds: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.exceptions = Some(kinds.into_iter().map(Into::into).collect());
    self
  }

  pub fn use_default(mut self) -> Self {
    self.use_default = true;
    self
  }
}
