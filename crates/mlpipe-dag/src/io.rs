//! Values exchanged between the scheduler and node bodies.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Error raised by a node body.
///
/// `kind` plays the role of an error class: retry policies filter on it, and
/// callers compare it to tell failures apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct NodeError {
  pub kind: String,
  pub message: String,
}

impl NodeError {
  pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
    Self {
      kind: kind.into(),
      message: message.into(),
    }
  }

  /// A generic error without a specific kind.
  pub fn msg(message: impl Into<String>) -> Self {
    Self::new("Error", message)
  }

  /// A required keyword argument was not supplied.
  pub fn missing_input(name: &str) -> Self {
    Self::new("MissingInput", format!("missing required input: {}", name))
  }

  /// A keyword argument had an unexpected shape.
  pub fn type_error(message: impl Into<String>) -> Self {
    Self::new("TypeError", message)
  }

  /// Check the error kind.
  pub fn is(&self, kind: &str) -> bool {
    self.kind == kind
  }
}

/// Structured input bundle handed to a node body.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeInput {
  /// Pipeline run this invocation belongs to.
  pub pipeline_id: String,
  /// Node being invoked.
  pub node_id: String,
  /// Keyword arguments, one per live incoming edge (or the run's input
  /// arguments for the entry node).
  pub kwargs: Map<String, Value>,
  /// Recurrence iteration, 0 for the first pass.
  pub iteration: u32,
  /// 1-based attempt number under the node's retry policy.
  pub attempt: u32,
  /// Continuation data, set on a recurrence start node after a continuation.
  pub additional_data: Option<Value>,
}

impl NodeInput {
  pub fn new(
    pipeline_id: impl Into<String>,
    node_id: impl Into<String>,
    kwargs: Map<String, Value>,
  ) -> Self {
    Self {
      pipeline_id: pipeline_id.into(),
      node_id: node_id.into(),
      kwargs,
      iteration: 0,
      attempt: 1,
      additional_data: None,
    }
  }

  /// Get a keyword argument.
  pub fn get(&self, name: &str) -> Option<&Value> {
    self.kwargs.get(name)
  }

  /// Get a keyword argument that must be present.
  pub fn require(&self, name: &str) -> Result<&Value, NodeError> {
    self
      .kwargs
      .get(name)
      .ok_or_else(|| NodeError::missing_input(name))
  }

  /// Get a required keyword argument deserialized into `T`.
  pub fn require_as<T: DeserializeOwned>(&self, name: &str) -> Result<T, NodeError> {
    let value = self.require(name)?;
    serde_json::from_value(value.clone())
      .map_err(|e| NodeError::type_error(format!("input '{}': {}", name, e)))
  }
}

/// Result of a switch node: the label selects the live branch, `data` is what
/// the branch nodes receive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseResult {
  pub label: String,
  pub data: Value,
}

impl CaseResult {
  pub fn new(label: impl Into<String>, data: Value) -> Self {
    Self {
      label: label.into(),
      data,
    }
  }

  /// A case whose data is the label itself.
  pub fn label(label: impl Into<String>) -> Self {
    let label = label.into();
    Self {
      data: Value::String(label.clone()),
      label,
    }
  }
}

/// Continuation signal: asks the engine to re-run the node's recurrent
/// sub-graph, threading `data` into the start node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recurrent {
  pub data: Option<Value>,
}

impl Recurrent {
  pub fn new(data: Value) -> Self {
    Self { data: Some(data) }
  }

  pub fn empty() -> Self {
    Self::default()
  }
}

/// What a node body produces.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeOutput {
  Value(Value),
  Case(CaseResult),
  Recurrent(Recurrent),
}

impl From<Value> for NodeOutput {
  fn from(value: Value) -> Self {
    NodeOutput::Value(value)
  }
}

impl From<CaseResult> for NodeOutput {
  fn from(case: CaseResult) -> Self {
    NodeOutput::Case(case)
  }
}

impl From<Recurrent> for NodeOutput {
  fn from(signal: Recurrent) -> Self {
    NodeOutput::Recurrent(signal)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn input(kwargs: Value) -> NodeInput {
    let Value::Object(map) = kwargs else {
      panic!("kwargs must be an object");
    };
    NodeInput::new("p1", "n1", map)
  }

  #[test]
  fn test_require_missing() {
    let err = input(json!({})).require("num").unwrap_err();
    assert!(err.is("MissingInput"));
    assert_eq!(err.message, "missing required input: num");
  }

  #[test]
  fn test_require_as_type_mismatch() {
    let input = input(json!({ "num": "ten" }));
    let err = input.require_as::<f64>("num").unwrap_err();
    assert!(err.is("TypeError"));
    assert_eq!(input.require_as::<String>("num").unwrap(), "ten");
  }

  #[test]
  fn test_case_label_data() {
    let case = CaseResult::label("high");
    assert_eq!(case.data, json!("high"));
  }

  #[test]
  fn test_node_error_display() {
    let err = NodeError::new("Timeout", "upstream too slow");
    assert_eq!(err.to_string(), "Timeout: upstream too slow");
  }
}
