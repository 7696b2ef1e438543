//! Run result type.

use serde_json::{Value, json};

use crate::error::PipelineError;

/// Outcome of one pipeline run: exactly one of `value` and `error` is set.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineResult {
  pub pipeline_id: String,
  pub value: Option<Value>,
  pub error: Option<PipelineError>,
}

impl PipelineResult {
  pub fn success(pipeline_id: impl Into<String>, value: Value) -> Self {
    Self {
      pipeline_id: pipeline_id.into(),
      value: Some(value),
      error: None,
    }
  }

  pub fn failure(pipeline_id: impl Into<String>, error: PipelineError) -> Self {
    Self {
      pipeline_id: pipeline_id.into(),
      value: None,
      error: Some(error),
    }
  }

  pub(crate) fn from_outcome(
    pipeline_id: impl Into<String>,
    outcome: Result<Value, PipelineError>,
  ) -> Self {
    match outcome {
      Ok(value) => Self::success(pipeline_id, value),
      Err(error) => Self::failure(pipeline_id, error),
    }
  }

  pub fn is_ok(&self) -> bool {
    self.error.is_none()
  }

  /// Return the value, or the error that ended the run.
  pub fn into_result(self) -> Result<Value, PipelineError> {
    match self.error {
      Some(error) => Err(error),
      None => Ok(self.value.unwrap_or(Value::Null)),
    }
  }

  /// JSON rendering for reports: `{ pipeline_id, value }` or `{ pipeline_id, error }`.
  pub fn to_json(&self) -> Value {
    match &self.error {
      Some(error) => json!({
        "pipeline_id": self.pipeline_id,
        "error": error.to_string(),
      }),
      None => json!({
        "pipeline_id": self.pipeline_id,
        "value": self.value,
      }),
    }
  }
}
