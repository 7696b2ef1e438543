//! Per-run state shared by the scheduler and event managers.

use std::sync::Arc;

use mlpipe_artifact::{ArtifactKey, ArtifactStore, Error as ArtifactError};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::warn;

use crate::error::PipelineError;
use crate::events::{EventError, EventManager};
use crate::result::PipelineResult;

/// State of one pipeline run.
///
/// Created fresh by every [`PipelineChart::run`](crate::PipelineChart::run)
/// and dropped when the run ends.
pub struct PipelineContext {
  pipeline_id: String,
  model_name: String,
  input_kwargs: Map<String, Value>,
  meta: RwLock<Map<String, Value>>,
  store: Arc<dyn ArtifactStore>,
  event_managers: Vec<Arc<dyn EventManager>>,
  strict_events: bool,
}

impl PipelineContext {
  pub fn new(
    pipeline_id: impl Into<String>,
    model_name: impl Into<String>,
    input_kwargs: Map<String, Value>,
    store: Arc<dyn ArtifactStore>,
  ) -> Self {
    Self {
      pipeline_id: pipeline_id.into(),
      model_name: model_name.into(),
      input_kwargs,
      meta: RwLock::new(Map::new()),
      store,
      event_managers: Vec::new(),
      strict_events: false,
    }
  }

  pub fn with_meta(mut self, meta: Map<String, Value>) -> Self {
    self.meta = RwLock::new(meta);
    self
  }

  pub fn with_event_managers(mut self, managers: Vec<Arc<dyn EventManager>>) -> Self {
    self.event_managers = managers;
    self
  }

  /// Make hook failures fatal for the run.
  pub fn with_strict_events(mut self, strict: bool) -> Self {
    self.strict_events = strict;
    self
  }

  pub fn pipeline_id(&self) -> &str {
    &self.pipeline_id
  }

  pub fn model_name(&self) -> &str {
    &self.model_name
  }

  /// Arguments the run was invoked with, handed to the input node.
  pub fn input_kwargs(&self) -> &Map<String, Value> {
    &self.input_kwargs
  }

  pub fn store(&self) -> &Arc<dyn ArtifactStore> {
    &self.store
  }

  pub async fn meta(&self, key: &str) -> Option<Value> {
    self.meta.read().await.get(key).cloned()
  }

  pub async fn set_meta(&self, key: impl Into<String>, value: Value) {
    self.meta.write().await.insert(key.into(), value);
  }

  pub async fn meta_snapshot(&self) -> Map<String, Value> {
    self.meta.read().await.clone()
  }

  pub fn artifact_key(&self, node_id: &str, iteration: u32) -> ArtifactKey {
    ArtifactKey::new(&self.pipeline_id, node_id, iteration)
  }

  pub async fn save_node_result(
    &self,
    node_id: &str,
    iteration: u32,
    value: &Value,
  ) -> Result<(), ArtifactError> {
    self
      .store
      .save(&self.artifact_key(node_id, iteration), value)
      .await
  }

  pub async fn load_node_result(&self, node_id: &str, iteration: u32) -> Result<Value, ArtifactError> {
    self.store.load(&self.artifact_key(node_id, iteration)).await
  }

  pub(crate) async fn emit_pipeline_start(&self) -> Result<(), PipelineError> {
    for manager in &self.event_managers {
      self.check_hook("on_pipeline_start", manager.on_pipeline_start(self).await)?;
    }
    Ok(())
  }

  pub(crate) async fn emit_pipeline_complete(
    &self,
    result: &PipelineResult,
  ) -> Result<(), PipelineError> {
    for manager in &self.event_managers {
      self.check_hook(
        "on_pipeline_complete",
        manager.on_pipeline_complete(self, result).await,
      )?;
    }
    Ok(())
  }

  pub(crate) async fn emit_node_start(&self, node_id: &str) -> Result<(), PipelineError> {
    for manager in &self.event_managers {
      self.check_hook("on_node_start", manager.on_node_start(self, node_id).await)?;
    }
    Ok(())
  }

  pub(crate) async fn emit_node_complete(
    &self,
    node_id: &str,
    error: Option<&PipelineError>,
  ) -> Result<(), PipelineError> {
    for manager in &self.event_managers {
      self.check_hook(
        "on_node_complete",
        manager.on_node_complete(self, node_id, error).await,
      )?;
    }
    Ok(())
  }

  fn check_hook(&self, hook: &'static str, result: Result<(), EventError>) -> Result<(), PipelineError> {
    match result {
      Ok(()) => Ok(()),
      Err(e) if self.strict_events => Err(PipelineError::Event {
        message: format!("{}: {}", hook, e),
      }),
      Err(e) => {
        warn!(
          pipeline_id = %self.pipeline_id,
          hook = hook,
          error = %e,
          "event_hook_failed"
        );
        Ok(())
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use async_trait::async_trait;
  use mlpipe_artifact::InMemoryArtifactStore;
  use serde_json::json;

  struct FailingHooks;

  #[async_trait]
  impl EventManager for FailingHooks {
    async fn on_node_start(&self, _ctx: &PipelineContext, _node_id: &str) -> Result<(), EventError> {
      Err(EventError::new("sink unavailable"))
    }
  }

  fn context() -> PipelineContext {
    PipelineContext::new(
      "p1",
      "model",
      Map::new(),
      Arc::new(InMemoryArtifactStore::new()),
    )
    .with_event_managers(vec![Arc::new(FailingHooks)])
  }

  #[tokio::test]
  async fn test_hook_failure_swallowed_by_default() {
    assert!(context().emit_node_start("a").await.is_ok());
  }

  #[tokio::test]
  async fn test_hook_failure_fatal_when_strict() {
    let err = context()
      .with_strict_events(true)
      .emit_node_start("a")
      .await
      .unwrap_err();
    assert_eq!(
      err,
      PipelineError::Event {
        message: "on_node_start: sink unavailable".to_string()
      }
    );
  }

  #[tokio::test]
  async fn test_results_keyed_by_iteration() {
    let ctx = context();
    ctx.save_node_result("n", 0, &json!("first")).await.unwrap();
    ctx.save_node_result("n", 1, &json!("second")).await.unwrap();

    assert_eq!(ctx.load_node_result("n", 0).await.unwrap(), json!("first"));
    assert_eq!(ctx.load_node_result("n", 1).await.unwrap(), json!("second"));
    assert_eq!(ctx.artifact_key("n", 1).storage_key(), "p1/n@1");
  }

  #[tokio::test]
  async fn test_meta() {
    let ctx = context();
    assert_eq!(ctx.meta("tenant").await, None);
    ctx.set_meta("tenant", json!("acme")).await;
    assert_eq!(ctx.meta("tenant").await, Some(json!("acme")));
    assert_eq!(ctx.meta_snapshot().await.len(), 1);
  }
}
