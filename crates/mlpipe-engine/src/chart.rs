//! Pipeline chart: a graph bundled with everything needed to run it.

use std::sync::Arc;

use mlpipe_artifact::{ArtifactStore, ArtifactStoreFactory, in_memory_factory};
use mlpipe_config::EngineConfig;
use mlpipe_dag::Dag;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::context::PipelineContext;
use crate::events::EventManager;
use crate::pool::WorkerPool;
use crate::result::PipelineResult;
use crate::run_manager::RunManager;

/// Arguments for one run.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
  /// Defaults to a fresh UUID v4.
  pub pipeline_id: Option<String>,
  pub input_kwargs: Map<String, Value>,
  pub meta: Map<String, Value>,
}

impl RunRequest {
  pub fn new(input_kwargs: Map<String, Value>) -> Self {
    Self {
      input_kwargs,
      ..Self::default()
    }
  }

  /// Build a request from a JSON object of input arguments. Any other JSON
  /// value yields an empty argument map.
  pub fn from_json(input: Value) -> Self {
    match input {
      Value::Object(map) => Self::new(map),
      _ => Self::default(),
    }
  }

  pub fn pipeline_id(mut self, pipeline_id: impl Into<String>) -> Self {
    self.pipeline_id = Some(pipeline_id.into());
    self
  }

  pub fn meta(mut self, key: impl Into<String>, value: Value) -> Self {
    self.meta.insert(key.into(), value);
    self
  }
}

#[derive(Clone)]
struct ChartInner {
  model_name: String,
  dag: Arc<Dag>,
  config: EngineConfig,
  event_managers: Vec<Arc<dyn EventManager>>,
  store_factory: ArtifactStoreFactory,
}

/// An immutable, shareable pipeline ready to be run any number of times.
///
/// Each run gets its own [`PipelineContext`] and artifact store; nothing
/// carries over between runs except what a persistent store keeps.
#[derive(Clone)]
pub struct PipelineChart {
  inner: Arc<ChartInner>,
}

impl PipelineChart {
  pub fn new(model_name: impl Into<String>, dag: Dag) -> Self {
    Self {
      inner: Arc::new(ChartInner {
        model_name: model_name.into(),
        dag: Arc::new(dag),
        config: EngineConfig::default(),
        event_managers: Vec::new(),
        store_factory: in_memory_factory(),
      }),
    }
  }

  pub fn with_config(mut self, config: EngineConfig) -> Self {
    Arc::make_mut(&mut self.inner).config = config;
    self
  }

  pub fn with_event_manager(mut self, manager: impl EventManager + 'static) -> Self {
    Arc::make_mut(&mut self.inner)
      .event_managers
      .push(Arc::new(manager));
    self
  }

  /// Use `factory` to build each run's artifact store.
  pub fn with_artifact_store<F>(mut self, factory: F) -> Self
  where
    F: Fn(&str) -> Arc<dyn ArtifactStore> + Send + Sync + 'static,
  {
    Arc::make_mut(&mut self.inner).store_factory = Arc::new(factory);
    self
  }

  pub fn model_name(&self) -> &str {
    &self.inner.model_name
  }

  pub fn dag(&self) -> &Dag {
    &self.inner.dag
  }

  pub fn config(&self) -> &EngineConfig {
    &self.inner.config
  }

  /// Run the pipeline to completion.
  pub async fn run(&self, request: RunRequest) -> PipelineResult {
    self.run_with_cancel(request, CancellationToken::new()).await
  }

  /// Run the pipeline, stopping early with
  /// [`PipelineError::Cancelled`](crate::PipelineError::Cancelled) once
  /// `cancel` fires.
  #[instrument(
    name = "pipeline_run",
    skip(self, request, cancel),
    fields(model_name = %self.inner.model_name)
  )]
  pub async fn run_with_cancel(&self, request: RunRequest, cancel: CancellationToken) -> PipelineResult {
    let inner = &self.inner;
    let pipeline_id = request
      .pipeline_id
      .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    info!(
      pipeline_id = %pipeline_id,
      model_name = %inner.model_name,
      dag = %inner.dag.name(),
      "pipeline_started"
    );

    let store = (inner.store_factory)(&pipeline_id);
    let ctx = Arc::new(
      PipelineContext::new(&pipeline_id, &inner.model_name, request.input_kwargs, store)
        .with_meta(request.meta)
        .with_event_managers(inner.event_managers.clone())
        .with_strict_events(inner.config.events.strict),
    );

    let outcome = match ctx.emit_pipeline_start().await {
      Ok(()) => {
        let pool = WorkerPool::for_dag(&inner.dag, &inner.config.workers);
        let mut manager = RunManager::new(inner.dag.clone(), ctx.clone(), pool, &inner.config.retry);
        manager.run(cancel).await
      }
      Err(e) => Err(e),
    };

    let mut result = PipelineResult::from_outcome(&pipeline_id, outcome);
    if let Err(e) = ctx.emit_pipeline_complete(&result).await {
      result = PipelineResult::failure(&pipeline_id, e);
    }

    info!(
      pipeline_id = %pipeline_id,
      success = result.is_ok(),
      "pipeline_completed"
    );
    result
  }
}
