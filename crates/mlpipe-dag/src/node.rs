use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::io::{NodeError, NodeInput};
use crate::processor::{Body, DefaultProvider};
use crate::retry::RetryPolicy;

/// Declared execution tags of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeTag {
  /// Blocking body that needs a private thread (I/O-bound).
  Thread,
  /// Blocking body that needs an isolated CPU worker.
  Process,
}

/// Where a node body is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionLane {
  /// On the scheduler's runtime, alongside every other cooperative task.
  Cooperative,
  /// Bounded worker lane for blocking I/O.
  Thread,
  /// Bounded worker lane for CPU-heavy work.
  Process,
}

/// Recurrence capability: returning a continuation re-runs the sub-graph
/// between `start_node` and this node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recurrence {
  pub start_node: String,
  pub max_iterations: u32,
}

/// The type of a node.
#[derive(Clone, Debug)]
pub enum NodeKind {
  /// User code.
  Processor(Body),
  /// Resolves to the first candidate, in declared order, that succeeds.
  OneOf { candidates: Vec<String> },
}

/// A node in a pipeline graph.
#[derive(Clone)]
pub struct Node {
  pub node_id: String,
  pub name: Option<String>,
  pub kind: NodeKind,
  pub tags: Vec<NodeTag>,
  pub retry: Option<RetryPolicy>,
  pub default: Option<Arc<dyn DefaultProvider>>,
  pub recurrence: Option<Recurrence>,
}

impl Node {
  /// A processor node running `body`.
  pub fn new(node_id: impl Into<String>, body: Body) -> Self {
    Self::with_kind(node_id, NodeKind::Processor(body))
  }

  /// A one-of head over `candidates`, tried in the given order.
  pub fn one_of<I, S>(node_id: impl Into<String>, candidates: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self::with_kind(
      node_id,
      NodeKind::OneOf {
        candidates: candidates.into_iter().map(Into::into).collect(),
      },
    )
  }

  fn with_kind(node_id: impl Into<String>, kind: NodeKind) -> Self {
    Self {
      node_id: node_id.into(),
      name: None,
      kind,
      tags: Vec::new(),
      retry: None,
      default: None,
      recurrence: None,
    }
  }

  pub fn named(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }

  pub fn tag(mut self, tag: NodeTag) -> Self {
    if !self.tags.contains(&tag) {
      self.tags.push(tag);
    }
    self
  }

  pub fn retry(mut self, policy: RetryPolicy) -> Self {
    self.retry = Some(policy);
    self
  }

  pub fn default_value<F>(mut self, provider: F) -> Self
  where
    F: Fn(&NodeInput) -> Result<Value, NodeError> + Send + Sync + 'static,
  {
    self.default = Some(Arc::new(provider));
    self
  }

  pub fn recurrent(mut self, start_node: impl Into<String>, max_iterations: u32) -> Self {
    self.recurrence = Some(Recurrence {
      start_node: start_node.into(),
      max_iterations,
    });
    self
  }

  /// The user body, if this is a processor node.
  pub fn body(&self) -> Option<&Body> {
    match &self.kind {
      NodeKind::Processor(body) => Some(body),
      NodeKind::OneOf { .. } => None,
    }
  }

  pub fn is_one_of(&self) -> bool {
    matches!(self.kind, NodeKind::OneOf { .. })
  }

  /// Execution lane derived from the tags. Async bodies are always
  /// cooperative; `Process` wins over `Thread`.
  pub fn lane(&self) -> ExecutionLane {
    match self.body() {
      Some(body) if body.is_blocking() => {
        if self.tags.contains(&NodeTag::Process) {
          ExecutionLane::Process
        } else if self.tags.contains(&NodeTag::Thread) {
          ExecutionLane::Thread
        } else {
          ExecutionLane::Cooperative
        }
      }
      _ => ExecutionLane::Cooperative,
    }
  }

  /// Label used in logs: the human name when set, else the id.
  pub fn display_name(&self) -> &str {
    self.name.as_deref().unwrap_or(&self.node_id)
  }
}

impl fmt::Debug for Node {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Node")
      .field("node_id", &self.node_id)
      .field("name", &self.name)
      .field("kind", &self.kind)
      .field("tags", &self.tags)
      .field("retry", &self.retry)
      .field("has_default", &self.default.is_some())
      .field("recurrence", &self.recurrence)
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::processor::{blocking_fn, processor_fn};
  use serde_json::json;

  #[test]
  fn test_lane_from_tags() {
    let blocking = Node::new("b", blocking_fn(|_| Ok(json!(1))));
    assert_eq!(blocking.lane(), ExecutionLane::Cooperative);
    assert_eq!(
      blocking.clone().tag(NodeTag::Thread).lane(),
      ExecutionLane::Thread
    );
    assert_eq!(
      blocking
        .tag(NodeTag::Thread)
        .tag(NodeTag::Process)
        .lane(),
      ExecutionLane::Process
    );
  }

  #[test]
  fn test_async_body_ignores_tags() {
    let node = Node::new("a", processor_fn(|_| async { Ok(json!(1)) })).tag(NodeTag::Process);
    assert_eq!(node.lane(), ExecutionLane::Cooperative);
  }

  #[test]
  fn test_one_of_has_no_body() {
    let head = Node::one_of("head", ["a", "b"]);
    assert!(head.is_one_of());
    assert!(head.body().is_none());
    assert_eq!(head.display_name(), "head");
  }
}
