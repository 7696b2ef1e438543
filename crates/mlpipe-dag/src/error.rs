use thiserror::Error;

/// Structural and configuration errors detected while building a graph.
///
/// These are fatal: a graph that fails validation can never be executed and
/// nothing about it is retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DagError {
  #[error("node not found: {0}")]
  NodeNotFound(String),

  #[error("duplicate node id: {0}")]
  DuplicateNode(String),

  #[error("edge references unknown node: from={from}, to={to}")]
  InvalidEdge { from: String, to: String },

  #[error("node '{node_id}' receives input '{kwarg}' more than once")]
  DuplicateInput { node_id: String, kwarg: String },

  #[error("no input node declared")]
  MissingInputNode,

  #[error("no output node declared")]
  MissingOutputNode,

  #[error("input node '{0}' must not have incoming edges")]
  EntryHasInputs(String),

  #[error("node '{0}' has no incoming edges but is not the input node (orphan node)")]
  OrphanNode(String),

  #[error("graph contains a cycle through: {}", nodes.join(", "))]
  Cycle { nodes: Vec<String> },

  #[error("invalid one-of group '{head}': {message}")]
  OneOf { head: String, message: String },

  #[error("invalid retry policy for node '{node_id}': {message}")]
  InvalidRetry { node_id: String, message: String },

  #[error("node '{0}' uses a default value but declares no default provider")]
  MissingDefault(String),

  #[error("invalid recurrence for node '{node_id}': {message}")]
  InvalidRecurrence { node_id: String, message: String },
}
