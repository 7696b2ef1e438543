//! mlpipe DAG
//!
//! This crate provides the graph model consumed by the mlpipe engine.
//! A [`Dag`] is a validated, immutable description of a pipeline that is
//! ready for execution.
//!
//! Key properties of a built [`Dag`]:
//! - Edge endpoints exist and the dependency structure is acyclic
//! - The entry and output nodes are known
//! - Switch branches, one-of groups and recurrent sub-graphs are exposed as
//!   queryable relations so the scheduler never re-derives them
//!
//! Graphs are declared explicitly through [`DagBuilder`]. Node bodies implement
//! [`Processor`] (async) or [`BlockingProcessor`] (sync); optional capabilities
//! such as retry, default values and recurrence are plain structs attached to
//! a [`Node`].

mod builder;
mod dag;
mod edge;
mod error;
mod graph;
mod io;
mod node;
mod processor;
mod retry;

pub use builder::DagBuilder;
pub use dag::Dag;
pub use edge::Edge;
pub use error::DagError;
pub use graph::Graph;
pub use io::{CaseResult, NodeError, NodeInput, NodeOutput, Recurrent};
pub use node::{ExecutionLane, Node, NodeKind, NodeTag, Recurrence};
pub use processor::{
  BlockingProcessor, Body, DefaultProvider, Processor, blocking_fn, processor_fn,
};
pub use retry::RetryPolicy;

/// Identifier of a node, unique within one graph.
pub type NodeId = String;

/// Label selecting one branch of a switch.
pub type CaseLabel = String;
