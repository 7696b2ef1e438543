//! Worker lanes for node bodies.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use mlpipe_config::WorkerConfig;
use mlpipe_dag::{Body, Dag, ExecutionLane, NodeError, NodeInput, NodeOutput};
use tokio::sync::Semaphore;
use tracing::debug;

/// Bounded execution lanes for blocking bodies.
///
/// Async bodies run on the calling task. Blocking bodies run inline unless
/// tagged, in which case they take a permit from their lane and move to the
/// blocking thread pool. Lanes are only created when the graph uses them.
#[derive(Debug, Clone, Default)]
pub struct WorkerPool {
  thread: Option<Arc<Semaphore>>,
  process: Option<Arc<Semaphore>>,
}

impl WorkerPool {
  /// Both lanes, sized from `config`.
  pub fn new(config: &WorkerConfig) -> Self {
    Self {
      thread: Some(lane(config.thread_pool_size)),
      process: Some(lane(config.process_pool_size)),
    }
  }

  /// The lanes `dag` needs and nothing more.
  pub fn for_dag(dag: &Dag, config: &WorkerConfig) -> Self {
    let pool = Self {
      thread: dag
        .is_thread_pool_needed()
        .then(|| lane(config.thread_pool_size)),
      process: dag
        .is_process_pool_needed()
        .then(|| lane(config.process_pool_size)),
    };
    debug!(
      thread_lane = pool.thread.is_some(),
      process_lane = pool.process.is_some(),
      "worker_pool_ready"
    );
    pool
  }

  /// Run `body` on `lane`. Panics are reported as errors of kind `Panic`.
  pub async fn run(
    &self,
    lane: ExecutionLane,
    body: Body,
    input: NodeInput,
  ) -> Result<NodeOutput, NodeError> {
    match body {
      Body::Async(processor) => AssertUnwindSafe(processor.process(input))
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| Err(panic_error(payload))),
      Body::Blocking(processor) => {
        let semaphore = match lane {
          ExecutionLane::Thread => self.thread.clone(),
          ExecutionLane::Process => self.process.clone(),
          ExecutionLane::Cooperative => None,
        };
        let Some(semaphore) = semaphore else {
          return std::panic::catch_unwind(AssertUnwindSafe(|| processor.process(input)))
            .unwrap_or_else(|payload| Err(panic_error(payload)));
        };

        let permit = semaphore
          .acquire_owned()
          .await
          .map_err(|_| NodeError::new("WorkerPool", "worker lane closed"))?;

        // The permit lives as long as the body, even if this future is dropped.
        let work = move || {
          let _permit = permit;
          processor.process(input)
        };
        match tokio::task::spawn_blocking(work).await {
          Ok(result) => result,
          Err(e) if e.is_panic() => Err(panic_error(e.into_panic())),
          Err(e) => Err(NodeError::new("Cancelled", e.to_string())),
        }
      }
    }
  }
}

fn lane(size: usize) -> Arc<Semaphore> {
  Arc::new(Semaphore::new(size.max(1)))
}

fn panic_error(payload: Box<dyn Any + Send>) -> NodeError {
  let message = if let Some(s) = payload.downcast_ref::<&str>() {
    s.to_string()
  } else if let Some(s) = payload.downcast_ref::<String>() {
    s.clone()
  } else {
    "node body panicked".to_string()
  };
  NodeError::new("Panic", message)
}

#[cfg(test)]
mod tests {
  use super::*;
  use mlpipe_dag::{blocking_fn, processor_fn};
  use serde_json::{Map, json};
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::time::Duration;

  fn input() -> NodeInput {
    NodeInput::new("p", "n", Map::new())
  }

  #[tokio::test]
  async fn test_async_panic_becomes_error() {
    let body = processor_fn(|_| async {
      if true {
        panic!("exploded");
      }
      Ok::<_, NodeError>(json!(1))
    });
    let err = WorkerPool::default()
      .run(ExecutionLane::Cooperative, body, input())
      .await
      .unwrap_err();
    assert_eq!(err, NodeError::new("Panic", "exploded"));
  }

  #[tokio::test]
  async fn test_blocking_panic_on_thread_lane() {
    let body = blocking_fn(|_| -> Result<serde_json::Value, NodeError> { panic!("worker down") });
    let err = WorkerPool::new(&WorkerConfig::default())
      .run(ExecutionLane::Thread, body, input())
      .await
      .unwrap_err();
    assert!(err.is("Panic"));
    assert_eq!(err.message, "worker down");
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
  async fn test_thread_lane_is_bounded() {
    let config = WorkerConfig {
      thread_pool_size: 1,
      process_pool_size: 1,
    };
    let pool = WorkerPool::new(&config);
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let body = {
      let running = running.clone();
      let peak = peak.clone();
      blocking_fn(move |_| {
        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(20));
        running.fetch_sub(1, Ordering::SeqCst);
        Ok(json!(null))
      })
    };

    let runs = (0..3).map(|_| pool.run(ExecutionLane::Thread, body.clone(), input()));
    for result in futures::future::join_all(runs).await {
      result.unwrap();
    }
    assert_eq!(peak.load(Ordering::SeqCst), 1);
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
  async fn test_aborted_caller_keeps_lane_permit() {
    let config = WorkerConfig {
      thread_pool_size: 1,
      process_pool_size: 1,
    };
    let pool = WorkerPool::new(&config);
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let body = {
      let running = running.clone();
      let peak = peak.clone();
      blocking_fn(move |_| {
        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(100));
        running.fetch_sub(1, Ordering::SeqCst);
        Ok(json!(null))
      })
    };

    let first = {
      let pool = pool.clone();
      let body = body.clone();
      tokio::spawn(async move { pool.run(ExecutionLane::Thread, body, input()).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    first.abort();

    pool
      .run(ExecutionLane::Thread, body, input())
      .await
      .unwrap();
    assert_eq!(peak.load(Ordering::SeqCst), 1);
  }
}
