//! mlpipe Engine
//!
//! This crate runs pipelines described by [`mlpipe_dag::Dag`]. A
//! [`PipelineChart`] bundles a graph with its configuration, event managers
//! and artifact store factory; every [`PipelineChart::run`] builds a fresh
//! [`PipelineContext`] and hands it to a [`RunManager`], which schedules nodes
//! as their inputs resolve.
//!
//! A run always produces a [`PipelineResult`] carrying either the output
//! node's value or the [`PipelineError`] that ended the run.

mod chart;
mod context;
mod error;
mod events;
mod pool;
mod result;
mod retry;
mod run_manager;

pub use chart::{PipelineChart, RunRequest};
pub use context::PipelineContext;
pub use error::PipelineError;
pub use events::{
  ChannelEventManager, EventError, EventManager, NoopEventManager, PipelineEvent,
  TracingEventManager,
};
pub use pool::WorkerPool;
pub use result::PipelineResult;
pub use retry::ResolvedRetry;
pub use run_manager::{NodeState, RunManager};
