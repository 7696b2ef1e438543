//! Node body contracts.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::io::{NodeError, NodeInput, NodeOutput};

/// An asynchronous node body.
///
/// Runs cooperatively on the scheduler's runtime, so it must not block.
#[async_trait]
pub trait Processor: Send + Sync {
  async fn process(&self, input: NodeInput) -> Result<NodeOutput, NodeError>;
}

/// A synchronous node body.
///
/// Bodies tagged [`NodeTag::Thread`](crate::NodeTag::Thread) or
/// [`NodeTag::Process`](crate::NodeTag::Process) are moved to a worker lane;
/// untagged ones run inline and should be cheap.
pub trait BlockingProcessor: Send + Sync {
  fn process(&self, input: NodeInput) -> Result<NodeOutput, NodeError>;
}

/// Supplies a node's value once its retry attempts are exhausted.
///
/// Receives the original invocation input so the default can depend on it.
pub trait DefaultProvider: Send + Sync {
  fn default_value(&self, input: &NodeInput) -> Result<Value, NodeError>;
}

impl<F> DefaultProvider for F
where
  F: Fn(&NodeInput) -> Result<Value, NodeError> + Send + Sync,
{
  fn default_value(&self, input: &NodeInput) -> Result<Value, NodeError> {
    self(input)
  }
}

/// The executable part of a processor node.
#[derive(Clone)]
pub enum Body {
  Async(Arc<dyn Processor>),
  Blocking(Arc<dyn BlockingProcessor>),
}

impl Body {
  pub fn is_blocking(&self) -> bool {
    matches!(self, Body::Blocking(_))
  }
}

impl fmt::Debug for Body {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Body::Async(_) => f.write_str("Body::Async"),
      Body::Blocking(_) => f.write_str("Body::Blocking"),
    }
  }
}

struct FnProcessor<F>(F);

#[async_trait]
impl<F, Fut, O> Processor for FnProcessor<F>
where
  F: Fn(NodeInput) -> Fut + Send + Sync,
  Fut: Future<Output = Result<O, NodeError>> + Send,
  O: Into<NodeOutput>,
{
  async fn process(&self, input: NodeInput) -> Result<NodeOutput, NodeError> {
    (self.0)(input).await.map(Into::into)
  }
}

struct FnBlocking<F>(F);

impl<F, O> BlockingProcessor for FnBlocking<F>
where
  F: Fn(NodeInput) -> Result<O, NodeError> + Send + Sync,
  O: Into<NodeOutput>,
{
  fn process(&self, input: NodeInput) -> Result<NodeOutput, NodeError> {
    (self.0)(input).map(Into::into)
  }
}

/// Wrap an async closure as a node body.
///
/// ```ignore
/// let body = processor_fn(|input: NodeInput| async move {
///   let num: f64 = input.require_as("num")?;
///   Ok::<_, NodeError>(json!(-num))
/// });
/// ```
pub fn processor_fn<F, Fut, O>(f: F) -> Body
where
  F: Fn(NodeInput) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<O, NodeError>> + Send + 'static,
  O: Into<NodeOutput> + 'static,
{
  Body::Async(Arc::new(FnProcessor(f)))
}

/// Wrap a synchronous closure as a node body.
pub fn blocking_fn<F, O>(f: F) -> Body
where
  F: Fn(NodeInput) -> Result<O, NodeError> + Send + Sync + 'static,
  O: Into<NodeOutput> + 'static,
{
  Body::Blocking(Arc::new(FnBlocking(f)))
}
