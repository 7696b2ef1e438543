//! Run outcome errors.

use mlpipe_dag::{DagError, NodeError};

/// Errors that end a node, and through it possibly the whole run.
///
/// Cloneable so a single root cause can be handed to every dependent of the
/// node that produced it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineError {
  /// A node body failed after exhausting its retry attempts.
  #[error("node '{node_id}' failed: {source}")]
  Node {
    node_id: String,
    #[source]
    source: NodeError,
  },

  /// A mandatory input resolved without a value.
  #[error("node '{node_id}' is missing required input '{input}'")]
  MissingInput { node_id: String, input: String },

  /// An upstream result could not be read back.
  #[error("failed to load inputs for node '{node_id}': {message}")]
  Dependency { node_id: String, message: String },

  /// A node returned a result its capabilities do not allow.
  #[error("invalid output from node '{node_id}': {message}")]
  InvalidOutput { node_id: String, message: String },

  /// The artifact store rejected a result.
  #[error("failed to store result of node '{node_id}': {message}")]
  Store { node_id: String, message: String },

  /// An event hook failed while events are strict.
  #[error("event hook failed: {message}")]
  Event { message: String },

  /// Invalid graph structure.
  #[error("invalid graph: {message}")]
  InvalidGraph { message: String },

  /// The output node was pruned and produced nothing.
  #[error("output node '{node_id}' was skipped")]
  OutputSkipped { node_id: String },

  /// Execution was cancelled.
  #[error("execution cancelled")]
  Cancelled,
}

impl PipelineError {
  /// The body error behind a [`PipelineError::Node`].
  pub fn node_error(&self) -> Option<&NodeError> {
    match self {
      PipelineError::Node { source, .. } => Some(source),
      _ => None,
    }
  }

  /// The node the error originated from, if any.
  pub fn node_id(&self) -> Option<&str> {
    match self {
      PipelineError::Node { node_id, .. }
      | PipelineError::MissingInput { node_id, .. }
      | PipelineError::Dependency { node_id, .. }
      | PipelineError::InvalidOutput { node_id, .. }
      | PipelineError::Store { node_id, .. }
      | PipelineError::OutputSkipped { node_id } => Some(node_id),
      PipelineError::Event { .. } | PipelineError::InvalidGraph { .. } | PipelineError::Cancelled => {
        None
      }
    }
  }
}

impl From<DagError> for PipelineError {
  fn from(err: DagError) -> Self {
    PipelineError::InvalidGraph {
      message: err.to_string(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_node_error_accessors() {
    let err = PipelineError::Node {
      node_id: "fetch".to_string(),
      source: NodeError::new("Timeout", "slow"),
    };
    assert_eq!(err.node_id(), Some("fetch"));
    assert!(err.node_error().unwrap().is("Timeout"));
    assert_eq!(err.to_string(), "node 'fetch' failed: Timeout: slow");
  }

  #[test]
  fn test_from_dag_error() {
    let err: PipelineError = DagError::MissingInputNode.into();
    assert_eq!(
      err,
      PipelineError::InvalidGraph {
        message: "no input node declared".to_string()
      }
    );
    assert_eq!(err.node_id(), None);
  }
}
