use serde::{Deserialize, Serialize};

/// Default retry behaviour for nodes that do not override it.
///
/// A node's own retry policy is overlaid on top of these values field by field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
  /// Total number of invocations of a failing body, including the first.
  pub attempts: u32,

  /// Pause between two consecutive attempts, in milliseconds.
  pub delay_ms: u64,

  /// Error kinds that are retried. `None` retries every error.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub exceptions: Option<Vec<String>>,
}

impl Default for RetryConfig {
  fn default() -> Self {
    Self {
      attempts: 3,
      delay_ms: 0,
      exceptions: None,
    }
  }
}
