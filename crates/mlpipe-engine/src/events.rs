//! Lifecycle events and event managers.
//!
//! The run manager reports pipeline and node lifecycle transitions to every
//! [`EventManager`] registered on the chart. Managers decide what to do with
//! them (persist, stream to a UI, log, ignore, etc.).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::context::PipelineContext;
use crate::error::PipelineError;
use crate::result::PipelineResult;

/// Error returned by an event hook.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct EventError {
  pub message: String,
}

impl EventError {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
    }
  }
}

/// Lifecycle hooks, all no-ops by default.
///
/// Hooks run on the scheduler between node transitions, so a slow hook delays
/// scheduling. Failures are logged and ignored unless events are strict.
#[async_trait]
pub trait EventManager: Send + Sync {
  async fn on_pipeline_start(&self, _ctx: &PipelineContext) -> Result<(), EventError> {
    Ok(())
  }

  async fn on_pipeline_complete(
    &self,
    _ctx: &PipelineContext,
    _result: &PipelineResult,
  ) -> Result<(), EventError> {
    Ok(())
  }

  /// Called before a node body is first invoked in an iteration.
  async fn on_node_start(&self, _ctx: &PipelineContext, _node_id: &str) -> Result<(), EventError> {
    Ok(())
  }

  /// Called once a node has resolved, `error` set if it failed.
  async fn on_node_complete(
    &self,
    _ctx: &PipelineContext,
    _node_id: &str,
    _error: Option<&PipelineError>,
  ) -> Result<(), EventError> {
    Ok(())
  }
}

/// Events as plain data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
  PipelineStarted {
    pipeline_id: String,
    model_name: String,
  },

  NodeStarted {
    pipeline_id: String,
    node_id: String,
  },

  NodeCompleted {
    pipeline_id: String,
    node_id: String,
    error: Option<String>,
  },

  PipelineCompleted {
    pipeline_id: String,
    value: Option<Value>,
    error: Option<String>,
  },
}

/// Discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopEventManager;

impl EventManager for NoopEventManager {}

/// Sends events to an unbounded channel.
///
/// Use this when events are consumed asynchronously (persisted, streamed to a
/// UI, asserted on in tests).
#[derive(Debug, Clone)]
pub struct ChannelEventManager {
  sender: mpsc::UnboundedSender<PipelineEvent>,
}

impl ChannelEventManager {
  pub fn new(sender: mpsc::UnboundedSender<PipelineEvent>) -> Self {
    Self { sender }
  }

  /// A manager together with the receiving end of its channel.
  pub fn channel() -> (Self, mpsc::UnboundedReceiver<PipelineEvent>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (Self::new(sender), receiver)
  }

  fn send(&self, event: PipelineEvent) {
    // Receiver may have been dropped
    let _ = self.sender.send(event);
  }
}

#[async_trait]
impl EventManager for ChannelEventManager {
  async fn on_pipeline_start(&self, ctx: &PipelineContext) -> Result<(), EventError> {
    self.send(PipelineEvent::PipelineStarted {
      pipeline_id: ctx.pipeline_id().to_string(),
      model_name: ctx.model_name().to_string(),
    });
    Ok(())
  }

  async fn on_pipeline_complete(
    &self,
    ctx: &PipelineContext,
    result: &PipelineResult,
  ) -> Result<(), EventError> {
    self.send(PipelineEvent::PipelineCompleted {
      pipeline_id: ctx.pipeline_id().to_string(),
      value: result.value.clone(),
      error: result.error.as_ref().map(ToString::to_string),
    });
    Ok(())
  }

  async fn on_node_start(&self, ctx: &PipelineContext, node_id: &str) -> Result<(), EventError> {
    self.send(PipelineEvent::NodeStarted {
      pipeline_id: ctx.pipeline_id().to_string(),
      node_id: node_id.to_string(),
    });
    Ok(())
  }

  async fn on_node_complete(
    &self,
    ctx: &PipelineContext,
    node_id: &str,
    error: Option<&PipelineError>,
  ) -> Result<(), EventError> {
    self.send(PipelineEvent::NodeCompleted {
      pipeline_id: ctx.pipeline_id().to_string(),
      node_id: node_id.to_string(),
      error: error.map(ToString::to_string),
    });
    Ok(())
  }
}

/// Writes every event as a structured log line.
#[derive(Debug, Clone, Default)]
pub struct TracingEventManager;

#[async_trait]
impl EventManager for TracingEventManager {
  async fn on_pipeline_start(&self, ctx: &PipelineContext) -> Result<(), EventError> {
    info!(
      pipeline_id = %ctx.pipeline_id(),
      model_name = %ctx.model_name(),
      "pipeline_started"
    );
    Ok(())
  }

  async fn on_pipeline_complete(
    &self,
    ctx: &PipelineContext,
    result: &PipelineResult,
  ) -> Result<(), EventError> {
    match &result.error {
      None => info!(pipeline_id = %ctx.pipeline_id(), "pipeline_completed"),
      Some(e) => error!(pipeline_id = %ctx.pipeline_id(), error = %e, "pipeline_failed"),
    }
    Ok(())
  }

  async fn on_node_start(&self, ctx: &PipelineContext, node_id: &str) -> Result<(), EventError> {
    info!(pipeline_id = %ctx.pipeline_id(), node_id = %node_id, "node_started");
    Ok(())
  }

  async fn on_node_complete(
    &self,
    ctx: &PipelineContext,
    node_id: &str,
    error: Option<&PipelineError>,
  ) -> Result<(), EventError> {
    match error {
      None => info!(pipeline_id = %ctx.pipeline_id(), node_id = %node_id, "node_completed"),
      Some(e) => error!(
        pipeline_id = %ctx.pipeline_id(),
        node_id = %node_id,
        error = %e,
        "node_failed"
      ),
    }
    Ok(())
  }
}
