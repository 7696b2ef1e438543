use std::collections::{BTreeMap, HashMap};

use crate::edge::Edge;
use crate::graph::Graph;
use crate::node::{ExecutionLane, Node, NodeKind};

/// A validated pipeline graph ready for execution.
///
/// Built by [`DagBuilder`](crate::DagBuilder); immutable afterwards.
#[derive(Debug, Clone)]
pub struct Dag {
  pub(crate) name: String,
  pub(crate) nodes: HashMap<String, Node>,
  pub(crate) edges: Vec<Edge>,
  pub(crate) input_node: String,
  pub(crate) output_node: String,
  pub(crate) graph: Graph,
  pub(crate) order: Vec<String>,
  /// switch node -> label -> indices of the edges carrying that label.
  pub(crate) switch_groups: HashMap<String, BTreeMap<String, Vec<usize>>>,
  /// one-of candidate -> its head.
  pub(crate) oneof_heads: HashMap<String, String>,
  /// recurrent node -> its sub-graph in topological order.
  pub(crate) recurrent_subgraphs: HashMap<String, Vec<String>>,
}

impl Dag {
  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn input_node(&self) -> &str {
    &self.input_node
  }

  pub fn output_node(&self) -> &str {
    &self.output_node
  }

  /// Get a node by ID.
  pub fn node(&self, node_id: &str) -> Option<&Node> {
    self.nodes.get(node_id)
  }

  pub fn nodes(&self) -> impl Iterator<Item = &Node> {
    self.order.iter().filter_map(|id| self.nodes.get(id))
  }

  pub fn edge(&self, index: usize) -> Option<&Edge> {
    self.edges.get(index)
  }

  pub fn edges(&self) -> &[Edge] {
    &self.edges
  }

  pub fn graph(&self) -> &Graph {
    &self.graph
  }

  /// All node ids, dependencies first. Ties are broken by id.
  pub fn topological_order(&self) -> &[String] {
    &self.order
  }

  /// Incoming edges of a node together with their indices.
  pub fn predecessors(&self, node_id: &str) -> impl Iterator<Item = (usize, &Edge)> {
    self
      .graph
      .incoming(node_id)
      .iter()
      .map(|&index| (index, &self.edges[index]))
  }

  /// Outgoing edges of a node together with their indices.
  pub fn successors(&self, node_id: &str) -> impl Iterator<Item = (usize, &Edge)> {
    self
      .graph
      .outgoing(node_id)
      .iter()
      .map(|&index| (index, &self.edges[index]))
  }

  /// Ordered candidates of a one-of head.
  pub fn oneof_candidates(&self, head: &str) -> Option<&[String]> {
    match self.nodes.get(head).map(|n| &n.kind) {
      Some(NodeKind::OneOf { candidates }) => Some(candidates),
      _ => None,
    }
  }

  /// The one-of head a candidate belongs to.
  pub fn oneof_head_of(&self, candidate: &str) -> Option<&str> {
    self.oneof_heads.get(candidate).map(String::as_str)
  }

  /// Switch branches of a node, keyed by case label.
  pub fn switch_groups(&self, node_id: &str) -> Option<&BTreeMap<String, Vec<usize>>> {
    self.switch_groups.get(node_id)
  }

  pub fn is_switch(&self, node_id: &str) -> bool {
    self.switch_groups.contains_key(node_id)
  }

  /// Nodes re-executed when `node_id` signals a continuation: descendants of
  /// its start node that lead to it, both ends included, dependencies first.
  pub fn recurrent_subgraph(&self, node_id: &str) -> Option<&[String]> {
    self.recurrent_subgraphs.get(node_id).map(|v| v.as_slice())
  }

  pub fn is_thread_pool_needed(&self) -> bool {
    self
      .nodes
      .values()
      .any(|n| n.lane() == ExecutionLane::Thread)
  }

  pub fn is_process_pool_needed(&self) -> bool {
    self
      .nodes
      .values()
      .any(|n| n.lane() == ExecutionLane::Process)
  }
}
