//! Explicit-declaration front end producing a validated [`Dag`].

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::dag::Dag;
use crate::edge::Edge;
use crate::error::DagError;
use crate::graph::Graph;
use crate::node::{Node, NodeKind};

/// Fluent builder for a [`Dag`].
///
/// ```ignore
/// let dag = DagBuilder::new("scoring")
///   .add_node(Node::new("input", blocking_fn(|i| Ok(Value::Object(i.kwargs)))))
///   .add_node(Node::new("double", double_body))
///   .edge("input", "double", "num")
///   .input_node("input")
///   .output_node("double")
///   .build()?;
/// ```
#[derive(Debug, Default)]
pub struct DagBuilder {
  name: String,
  nodes: HashMap<String, Node>,
  duplicates: Vec<String>,
  edges: Vec<Edge>,
  input_node: Option<String>,
  output_node: Option<String>,
}

impl DagBuilder {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      ..Self::default()
    }
  }

  pub fn add_node(mut self, node: Node) -> Self {
    if self.nodes.contains_key(&node.node_id) {
      self.duplicates.push(node.node_id.clone());
    }
    self.nodes.insert(node.node_id.clone(), node);
    self
  }

  /// Pass `from`'s result to `to` as `kwarg`.
  pub fn edge(self, from: &str, to: &str, kwarg: &str) -> Self {
    self.add_edge(Edge::new(from, to, kwarg))
  }

  /// Like [`edge`](Self::edge), but `to` still runs when `from` has no value.
  pub fn optional_edge(self, from: &str, to: &str, kwarg: &str) -> Self {
    self.add_edge(Edge::new(from, to, kwarg).into_optional())
  }

  /// Branch `label` of switch node `from`.
  pub fn switch_edge(self, from: &str, to: &str, kwarg: &str, label: &str) -> Self {
    self.add_edge(Edge::switch(from, to, kwarg, label))
  }

  pub fn add_edge(mut self, edge: Edge) -> Self {
    self.edges.push(edge);
    self
  }

  /// Declare a one-of head node over `candidates`.
  pub fn one_of<I, S>(self, head: &str, candidates: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.add_node(Node::one_of(head, candidates))
  }

  pub fn input_node(mut self, node_id: &str) -> Self {
    self.input_node = Some(node_id.to_string());
    self
  }

  pub fn output_node(mut self, node_id: &str) -> Self {
    self.output_node = Some(node_id.to_string());
    self
  }

  /// Validate the declarations and build the graph.
  pub fn build(self) -> Result<Dag, DagError> {
    if let Some(dup) = self.duplicates.first() {
      return Err(DagError::DuplicateNode(dup.clone()));
    }

    let input_node = self.input_node.ok_or(DagError::MissingInputNode)?;
    let output_node = self.output_node.ok_or(DagError::MissingOutputNode)?;
    for id in [&input_node, &output_node] {
      if !self.nodes.contains_key(id) {
        return Err(DagError::NodeNotFound(id.clone()));
      }
    }

    validate_edges(&self.nodes, &self.edges, &input_node)?;
    let oneof_heads = validate_one_of(&self.nodes, &self.edges, &input_node)?;

    let graph = Graph::new(&self.nodes, &self.edges);

    for node_id in graph.entry_points() {
      if *node_id != input_node && !oneof_heads.contains_key(node_id) {
        return Err(DagError::OrphanNode(node_id.clone()));
      }
    }

    let order = graph
      .topological_order()
      .map_err(|nodes| DagError::Cycle { nodes })?;

    validate_capabilities(&self.nodes)?;
    let recurrent_subgraphs = recurrent_subgraphs(&self.nodes, &graph, &order)?;

    let mut switch_groups: HashMap<String, BTreeMap<String, Vec<usize>>> = HashMap::new();
    for (index, edge) in self.edges.iter().enumerate() {
      if let Some(label) = &edge.case_branch {
        switch_groups
          .entry(edge.from.clone())
          .or_default()
          .entry(label.clone())
          .or_default()
          .push(index);
      }
    }

    Ok(Dag {
      name: self.name,
      nodes: self.nodes,
      edges: self.edges,
      input_node,
      output_node,
      graph,
      order,
      switch_groups,
      oneof_heads,
      recurrent_subgraphs,
    })
  }
}

fn validate_edges(
  nodes: &HashMap<String, Node>,
  edges: &[Edge],
  input_node: &str,
) -> Result<(), DagError> {
  let mut seen: HashSet<(&str, &str)> = HashSet::new();

  for edge in edges {
    if !nodes.contains_key(&edge.from) || !nodes.contains_key(&edge.to) {
      return Err(DagError::InvalidEdge {
        from: edge.from.clone(),
        to: edge.to.clone(),
      });
    }
    if edge.to == input_node {
      return Err(DagError::EntryHasInputs(edge.to.clone()));
    }
    if nodes[&edge.to].is_one_of() {
      return Err(DagError::OneOf {
        head: edge.to.clone(),
        message: format!(
          "edge from '{}' enters a one-of head; heads only receive their candidates",
          edge.from
        ),
      });
    }
    if !seen.insert((edge.to.as_str(), edge.kwarg.as_str())) {
      return Err(DagError::DuplicateInput {
        node_id: edge.to.clone(),
        kwarg: edge.kwarg.clone(),
      });
    }
  }

  Ok(())
}

/// Check one-of groups and index candidates by head.
fn validate_one_of(
  nodes: &HashMap<String, Node>,
  edges: &[Edge],
  input_node: &str,
) -> Result<HashMap<String, String>, DagError> {
  let mut heads: HashMap<String, String> = HashMap::new();

  for (head, node) in nodes {
    let NodeKind::OneOf { candidates } = &node.kind else {
      continue;
    };
    let fail = |message: String| DagError::OneOf {
      head: head.clone(),
      message,
    };

    if candidates.is_empty() {
      return Err(fail("no candidates declared".to_string()));
    }
    if head == input_node {
      return Err(fail("the input node cannot be a one-of head".to_string()));
    }

    for candidate in candidates {
      if !nodes.contains_key(candidate) {
        return Err(DagError::NodeNotFound(candidate.clone()));
      }
      if candidate == input_node {
        return Err(fail("the input node cannot be a candidate".to_string()));
      }
      if let Some(other) = heads.insert(candidate.clone(), head.clone()) {
        return Err(fail(format!(
          "candidate '{}' already belongs to '{}'",
          candidate, other
        )));
      }
      if edges.iter().any(|e| e.from == *candidate) {
        return Err(fail(format!(
          "candidate '{}' must only be consumed through its head",
          candidate
        )));
      }
    }
  }

  Ok(heads)
}

fn validate_capabilities(nodes: &HashMap<String, Node>) -> Result<(), DagError> {
  for node in nodes.values() {
    if let Some(policy) = &node.retry {
      if policy.attempts == Some(0) {
        return Err(DagError::InvalidRetry {
          node_id: node.node_id.clone(),
          message: "attempts must be at least 1".to_string(),
        });
      }
      if policy.use_default && node.default.is_none() {
        return Err(DagError::MissingDefault(node.node_id.clone()));
      }
    }
    if node.is_one_of() && (node.retry.is_some() || node.recurrence.is_some()) {
      return Err(DagError::OneOf {
        head: node.node_id.clone(),
        message: "one-of heads carry no retry or recurrence".to_string(),
      });
    }
  }
  Ok(())
}

fn recurrent_subgraphs(
  nodes: &HashMap<String, Node>,
  graph: &Graph,
  order: &[String],
) -> Result<HashMap<String, Vec<String>>, DagError> {
  let mut subgraphs = HashMap::new();

  for node in nodes.values() {
    let Some(recurrence) = &node.recurrence else {
      continue;
    };
    let fail = |message: String| DagError::InvalidRecurrence {
      node_id: node.node_id.clone(),
      message,
    };

    if recurrence.max_iterations == 0 {
      return Err(fail("max_iterations must be at least 1".to_string()));
    }
    let start = &recurrence.start_node;
    if !nodes.contains_key(start) {
      return Err(DagError::NodeNotFound(start.clone()));
    }

    let ancestors = graph.ancestors(&node.node_id);
    if *start != node.node_id && !ancestors.contains(start) {
      return Err(fail(format!(
        "start node '{}' is not upstream of the recurrent node",
        start
      )));
    }

    let descendants = graph.descendants(start);
    let body: Vec<String> = order
      .iter()
      .filter(|id| {
        *id == start
          || **id == node.node_id
          || (descendants.contains(*id) && ancestors.contains(*id))
      })
      .cloned()
      .collect();
    subgraphs.insert(node.node_id.clone(), body);
  }

  Ok(subgraphs)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::processor::blocking_fn;
  use crate::retry::RetryPolicy;
  use serde_json::json;

  fn node(id: &str) -> Node {
    Node::new(id, blocking_fn(|_| Ok(json!(null))))
  }

  fn chain() -> DagBuilder {
    DagBuilder::new("chain")
      .add_node(node("a"))
      .add_node(node("b"))
      .add_node(node("c"))
      .edge("a", "b", "x")
      .edge("b", "c", "x")
      .input_node("a")
      .output_node("c")
  }

  #[test]
  fn test_build_chain() {
    let dag = chain().build().unwrap();
    assert_eq!(dag.name(), "chain");
    assert_eq!(dag.topological_order(), ["a", "b", "c"]);
    assert_eq!(dag.predecessors("c").count(), 1);
    assert_eq!(dag.successors("a").next().unwrap().1.to, "b");
    assert!(!dag.is_switch("a"));
    assert!(!dag.is_thread_pool_needed());
  }

  #[test]
  fn test_missing_output() {
    let err = DagBuilder::new("x")
      .add_node(node("a"))
      .input_node("a")
      .build()
      .unwrap_err();
    assert_eq!(err, DagError::MissingOutputNode);
  }

  #[test]
  fn test_duplicate_node() {
    let err = chain().add_node(node("b")).build().unwrap_err();
    assert_eq!(err, DagError::DuplicateNode("b".to_string()));
  }

  #[test]
  fn test_unknown_edge_endpoint() {
    let err = chain().edge("c", "ghost", "x").build().unwrap_err();
    assert_eq!(
      err,
      DagError::InvalidEdge {
        from: "c".to_string(),
        to: "ghost".to_string()
      }
    );
  }

  #[test]
  fn test_duplicate_kwarg() {
    let err = chain()
      .add_node(node("d"))
      .edge("a", "d", "v")
      .edge("d", "c", "x")
      .build()
      .unwrap_err();
    assert!(matches!(err, DagError::DuplicateInput { .. }));
  }

  #[test]
  fn test_orphan_rejected() {
    let err = chain().add_node(node("lonely")).build().unwrap_err();
    assert_eq!(err, DagError::OrphanNode("lonely".to_string()));
  }

  #[test]
  fn test_cycle_rejected() {
    let err = chain().edge("c", "b", "back").build().unwrap_err();
    assert_eq!(
      err,
      DagError::Cycle {
        nodes: vec!["b".to_string(), "c".to_string()]
      }
    );
  }

  #[test]
  fn test_entry_with_inputs_rejected() {
    let err = chain().edge("c", "a", "loop").build().unwrap_err();
    assert_eq!(err, DagError::EntryHasInputs("a".to_string()));
  }

  #[test]
  fn test_one_of_candidates_may_be_unwired() {
    let dag = chain()
      .add_node(node("fallback"))
      .one_of("head", ["b", "fallback"])
      .add_node(node("consumer"))
      .edge("head", "consumer", "value")
      .output_node("consumer")
      .build();
    // "b" is a candidate but also feeds "c": not allowed.
    assert!(matches!(dag, Err(DagError::OneOf { .. })));

    let dag = DagBuilder::new("oneof")
      .add_node(node("a"))
      .add_node(node("b"))
      .add_node(node("fallback"))
      .edge("a", "b", "x")
      .one_of("head", ["b", "fallback"])
      .add_node(node("consumer"))
      .edge("head", "consumer", "value")
      .input_node("a")
      .output_node("consumer")
      .build()
      .unwrap();

    assert_eq!(
      dag.oneof_candidates("head").unwrap(),
      ["b".to_string(), "fallback".to_string()]
    );
    assert_eq!(dag.oneof_head_of("fallback"), Some("head"));
    assert_eq!(dag.oneof_head_of("a"), None);
  }

  #[test]
  fn test_candidate_in_two_groups() {
    let err = DagBuilder::new("oneof")
      .add_node(node("a"))
      .add_node(node("b"))
      .edge("a", "b", "x")
      .one_of("h1", ["b"])
      .one_of("h2", ["b"])
      .add_node(node("out"))
      .edge("h1", "out", "one")
      .edge("h2", "out", "two")
      .input_node("a")
      .output_node("out")
      .build()
      .unwrap_err();
    assert!(matches!(err, DagError::OneOf { .. }));
  }

  #[test]
  fn test_switch_groups() {
    let dag = DagBuilder::new("switch")
      .add_node(node("sw"))
      .add_node(node("left"))
      .add_node(node("right"))
      .add_node(node("right2"))
      .switch_edge("sw", "left", "v", "L")
      .switch_edge("sw", "right", "v", "R")
      .switch_edge("sw", "right2", "v", "R")
      .input_node("sw")
      .output_node("left")
      .build()
      .unwrap();

    let groups = dag.switch_groups("sw").unwrap();
    assert_eq!(groups["L"], vec![0]);
    assert_eq!(groups["R"], vec![1, 2]);
    assert!(dag.is_switch("sw"));
  }

  #[test]
  fn test_use_default_requires_provider() {
    let err = chain()
      .add_node(node("d").retry(RetryPolicy::new().use_default()))
      .edge("a", "d", "x")
      .build()
      .unwrap_err();
    assert_eq!(err, DagError::MissingDefault("d".to_string()));

    let dag = chain()
      .add_node(
        node("d")
          .retry(RetryPolicy::new().use_default())
          .default_value(|_| Ok(json!(0))),
      )
      .edge("a", "d", "x")
      .build();
    assert!(dag.is_ok());
  }

  #[test]
  fn test_zero_attempts_rejected() {
    let err = DagBuilder::new("x")
      .add_node(node("a").retry(RetryPolicy::new().attempts(0)))
      .input_node("a")
      .output_node("a")
      .build()
      .unwrap_err();
    assert!(matches!(err, DagError::InvalidRetry { .. }));
  }

  #[test]
  fn test_recurrent_subgraph() {
    let dag = DagBuilder::new("loop")
      .add_node(node("input"))
      .add_node(node("start"))
      .add_node(node("side"))
      .add_node(node("mid"))
      .add_node(node("check").recurrent("start", 3))
      .add_node(node("out"))
      .edge("input", "start", "x")
      .edge("start", "mid", "x")
      .edge("start", "side", "x")
      .edge("input", "check", "raw")
      .edge("mid", "check", "x")
      .edge("check", "out", "x")
      .input_node("input")
      .output_node("out")
      .build()
      .unwrap();

    assert_eq!(
      dag.recurrent_subgraph("check").unwrap(),
      ["start", "mid", "check"]
    );
  }

  #[test]
  fn test_recurrence_start_must_be_upstream() {
    let err = chain()
      .add_node(node("d").recurrent("c", 2))
      .edge("a", "d", "x")
      .build()
      .unwrap_err();
    assert!(matches!(err, DagError::InvalidRecurrence { .. }));
  }
}
