use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use crate::edge::Edge;
use crate::node::{Node, NodeKind};

/// Graph structure for traversal and analysis.
///
/// Dependencies come from two sources: plain edges, and the implicit
/// candidate -> head relation of one-of groups. Both count for
/// `upstream`/`downstream` and ordering; only plain edges are reachable
/// through `incoming`/`outgoing`.
#[derive(Debug, Clone)]
pub struct Graph {
  /// node_id -> indices of edges leaving it.
  outgoing: HashMap<String, Vec<usize>>,
  /// node_id -> indices of edges entering it.
  incoming: HashMap<String, Vec<usize>>,
  /// Adjacency list: node_id -> downstream node_ids.
  adjacency: HashMap<String, Vec<String>>,
  /// Reverse adjacency: node_id -> upstream node_ids.
  reverse_adjacency: HashMap<String, Vec<String>>,
  /// Nodes with no upstream dependency.
  entry_points: Vec<String>,
}

impl Graph {
  /// Build a graph from nodes and edges.
  ///
  /// Edges whose endpoints are unknown are ignored here; validation reports
  /// them before a graph is ever built from user input.
  pub fn new(nodes: &HashMap<String, Node>, edges: &[Edge]) -> Self {
    let mut outgoing: HashMap<String, Vec<usize>> = HashMap::new();
    let mut incoming: HashMap<String, Vec<usize>> = HashMap::new();
    let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();
    let mut reverse_adjacency: HashMap<String, Vec<String>> = HashMap::new();

    for node_id in nodes.keys() {
      outgoing.entry(node_id.clone()).or_default();
      incoming.entry(node_id.clone()).or_default();
      adjacency.entry(node_id.clone()).or_default();
      reverse_adjacency.entry(node_id.clone()).or_default();
    }

    for (index, edge) in edges.iter().enumerate() {
      if !nodes.contains_key(&edge.from) || !nodes.contains_key(&edge.to) {
        continue;
      }
      outgoing.entry(edge.from.clone()).or_default().push(index);
      incoming.entry(edge.to.clone()).or_default().push(index);
      link(&mut adjacency, &mut reverse_adjacency, &edge.from, &edge.to);
    }

    for (head, node) in nodes {
      if let NodeKind::OneOf { candidates } = &node.kind {
        for candidate in candidates.iter().filter(|c| nodes.contains_key(*c)) {
          link(&mut adjacency, &mut reverse_adjacency, candidate, head);
        }
      }
    }

    let mut entry_points: Vec<String> = nodes
      .keys()
      .filter(|id| reverse_adjacency.get(*id).is_none_or(|v| v.is_empty()))
      .cloned()
      .collect();
    entry_points.sort();

    Self {
      outgoing,
      incoming,
      adjacency,
      reverse_adjacency,
      entry_points,
    }
  }

  /// Get entry points (nodes with no upstream dependency), sorted by id.
  pub fn entry_points(&self) -> &[String] {
    &self.entry_points
  }

  /// Get downstream nodes for a given node.
  pub fn downstream(&self, node_id: &str) -> &[String] {
    self
      .adjacency
      .get(node_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Get upstream nodes for a given node.
  pub fn upstream(&self, node_id: &str) -> &[String] {
    self
      .reverse_adjacency
      .get(node_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Indices of edges entering a node.
  pub fn incoming(&self, node_id: &str) -> &[usize] {
    self
      .incoming
      .get(node_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Indices of edges leaving a node.
  pub fn outgoing(&self, node_id: &str) -> &[usize] {
    self
      .outgoing
      .get(node_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Every node reachable downstream of `node_id` (excluding itself).
  pub fn descendants(&self, node_id: &str) -> HashSet<String> {
    walk(node_id, |id| self.downstream(id))
  }

  /// Every node `node_id` transitively depends on (excluding itself).
  pub fn ancestors(&self, node_id: &str) -> HashSet<String> {
    walk(node_id, |id| self.upstream(id))
  }

  /// Kahn's algorithm with ties broken by node id, so the order is stable
  /// across runs. On a cycle, returns the nodes that could not be ordered.
  pub fn topological_order(&self) -> Result<Vec<String>, Vec<String>> {
    let mut in_degree: HashMap<&str, usize> = self
      .reverse_adjacency
      .iter()
      .map(|(id, up)| (id.as_str(), up.len()))
      .collect();

    let mut ready: BTreeSet<&str> = in_degree
      .iter()
      .filter(|(_, degree)| **degree == 0)
      .map(|(id, _)| *id)
      .collect();

    let mut order = Vec::with_capacity(in_degree.len());
    while let Some(id) = ready.pop_first() {
      order.push(id.to_string());
      for down in self.downstream(id) {
        if let Some(degree) = in_degree.get_mut(down.as_str()) {
          *degree -= 1;
          if *degree == 0 {
            ready.insert(down.as_str());
          }
        }
      }
    }

    if order.len() == in_degree.len() {
      Ok(order)
    } else {
      let mut stuck: Vec<String> = in_degree
        .into_iter()
        .filter(|(_, degree)| *degree > 0)
        .map(|(id, _)| id.to_string())
        .collect();
      stuck.sort();
      Err(stuck)
    }
  }
}

fn link(
  adjacency: &mut HashMap<String, Vec<String>>,
  reverse_adjacency: &mut HashMap<String, Vec<String>>,
  from: &str,
  to: &str,
) {
  let down = adjacency.entry(from.to_string()).or_default();
  if !down.iter().any(|d| d == to) {
    down.push(to.to_string());
  }
  let up = reverse_adjacency.entry(to.to_string()).or_default();
  if !up.iter().any(|u| u == from) {
    up.push(from.to_string());
  }
}

fn walk<'a, F>(start: &str, next: F) -> HashSet<String>
where
  F: Fn(&str) -> &'a [String],
{
  let mut seen = HashSet::new();
  let mut queue: VecDeque<&str> = next(start).iter().map(String::as_str).collect();
  while let Some(id) = queue.pop_front() {
    if seen.insert(id.to_string()) {
      queue.extend(next(id).iter().map(String::as_str));
    }
  }
  seen
}
