use serde::{Deserialize, Serialize};

/// Sizing of the worker lanes used by blocking node bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkerConfig {
  /// Concurrent bodies tagged for a private thread (I/O-blocking work).
  pub thread_pool_size: usize,

  /// Concurrent bodies tagged for a process context (CPU-heavy work).
  pub process_pool_size: usize,
}

impl Default for WorkerConfig {
  fn default() -> Self {
    Self {
      thread_pool_size: 8,
      process_pool_size: std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4),
    }
  }
}
