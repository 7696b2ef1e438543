//! Pipeline run manager.
//!
//! Drives one run of a [`Dag`]: dispatches every node whose inputs are
//! resolved, reacts to each completion as it arrives, and stops as soon as
//! the output node reaches a terminal state.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use mlpipe_config::RetryConfig;
use mlpipe_dag::{Dag, Edge, NodeError, NodeInput, NodeOutput};
use serde_json::{Map, Value};
use tokio::task::{AbortHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::context::PipelineContext;
use crate::error::PipelineError;
use crate::pool::WorkerPool;
use crate::retry::ResolvedRetry;

/// Execution state of one node within a run.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeState {
  /// Waiting on dependencies.
  Pending,
  Running { attempt: u32 },
  /// An attempt failed; waiting out the retry delay before `attempt` runs.
  Retrying { attempt: u32 },
  Succeeded,
  /// A one-of head whose candidates all failed or were skipped.
  Absent,
  Failed(PipelineError),
  /// Pruned by a switch, abandoned as a one-of candidate, or unreachable.
  Skipped,
}

impl NodeState {
  pub fn is_terminal(&self) -> bool {
    matches!(
      self,
      NodeState::Succeeded | NodeState::Absent | NodeState::Failed(_) | NodeState::Skipped
    )
  }

  fn is_in_flight(&self) -> bool {
    matches!(self, NodeState::Running { .. } | NodeState::Retrying { .. })
  }
}

/// Scheduler bookkeeping for one node.
#[derive(Debug)]
struct NodeRun {
  state: NodeState,
  /// Recurrence iteration the node currently computes.
  iteration: u32,
  /// Bumped whenever in-flight work is abandoned so stale completions are dropped.
  generation: u64,
  /// Continuation signals received so far (recurrent nodes only).
  recurrences: u32,
  /// Label picked by a switch node.
  selected_case: Option<String>,
  /// Continuation data for a recurrence start node.
  additional_data: Option<Value>,
  abort: Option<AbortHandle>,
  retry: ResolvedRetry,
}

/// What a spawned attempt reports back.
struct AttemptResult {
  node_id: String,
  generation: u64,
  input: NodeInput,
  outcome: AttemptOutcome,
}

enum AttemptOutcome {
  /// A result from an earlier run was found in the artifact store.
  Cached(Value),
  Computed(Result<NodeOutput, NodeError>),
  /// The retry delay elapsed; the next attempt may start.
  RetryDue,
}

/// How an incoming edge contributes to its consumer.
enum EdgeStatus {
  /// The producer has not resolved yet.
  Unresolved,
  /// The producer was skipped, or a switch picked another branch.
  Dead,
  Live,
}

/// Executes one run of a graph.
pub struct RunManager {
  dag: Arc<Dag>,
  ctx: Arc<PipelineContext>,
  pool: WorkerPool,
  nodes: HashMap<String, NodeRun>,
  tasks: JoinSet<AttemptResult>,
}

impl RunManager {
  pub fn new(
    dag: Arc<Dag>,
    ctx: Arc<PipelineContext>,
    pool: WorkerPool,
    retry_defaults: &RetryConfig,
  ) -> Self {
    let nodes = dag
      .nodes()
      .map(|node| {
        let run = NodeRun {
          state: NodeState::Pending,
          iteration: 0,
          generation: 0,
          recurrences: 0,
          selected_case: None,
          additional_data: None,
          abort: None,
          retry: ResolvedRetry::resolve(node.retry.as_ref(), retry_defaults),
        };
        (node.node_id.clone(), run)
      })
      .collect();

    Self {
      dag,
      ctx,
      pool,
      nodes,
      tasks: JoinSet::new(),
    }
  }

  /// Current state of a node.
  pub fn state(&self, node_id: &str) -> Option<&NodeState> {
    self.nodes.get(node_id).map(|run| &run.state)
  }

  /// Run until the output node is terminal, the token is cancelled, or an
  /// event hook fails under strict events.
  #[instrument(
    name = "run_manager",
    skip(self, cancel),
    fields(pipeline_id = %self.ctx.pipeline_id(), dag = %self.dag.name())
  )]
  pub async fn run(&mut self, cancel: CancellationToken) -> Result<Value, PipelineError> {
    let outcome = self.run_loop(&cancel).await;
    self.tasks.abort_all();

    match &outcome {
      Ok(_) => info!(pipeline_id = %self.ctx.pipeline_id(), "run_finished"),
      Err(e) => error!(pipeline_id = %self.ctx.pipeline_id(), error = %e, "run_failed"),
    }
    outcome
  }

  async fn run_loop(&mut self, cancel: &CancellationToken) -> Result<Value, PipelineError> {
    self.advance().await?;

    loop {
      if let Some(outcome) = self.output_outcome().await {
        return outcome;
      }

      if cancel.is_cancelled() {
        warn!(pipeline_id = %self.ctx.pipeline_id(), "run cancelled");
        return Err(PipelineError::Cancelled);
      }

      if self.tasks.is_empty() {
        return Err(PipelineError::InvalidGraph {
          message: format!(
            "no runnable node left before output '{}' resolved",
            self.dag.output_node()
          ),
        });
      }

      let joined = tokio::select! {
        joined = self.tasks.join_next() => joined,
        _ = cancel.cancelled() => {
          warn!(pipeline_id = %self.ctx.pipeline_id(), "run cancelled during node execution");
          return Err(PipelineError::Cancelled);
        }
      };

      match joined {
        Some(Ok(result)) => {
          self.on_attempt_finished(result).await?;
          self.advance().await?;
        }
        // Aborted attempts surface here; their node has already moved on.
        Some(Err(e)) if e.is_cancelled() => {}
        Some(Err(e)) => {
          return Err(PipelineError::InvalidGraph {
            message: format!("node task join error: {}", e),
          });
        }
        None => {}
      }
    }
  }

  /// Terminal outcome of the output node, if it has one.
  async fn output_outcome(&self) -> Option<Result<Value, PipelineError>> {
    let output = self.dag.output_node();
    let run = self.nodes.get(output)?;
    match &run.state {
      NodeState::Succeeded => Some(
        self
          .ctx
          .load_node_result(output, run.iteration)
          .await
          .map_err(|e| PipelineError::Store {
            node_id: output.to_string(),
            message: e.to_string(),
          }),
      ),
      NodeState::Absent => Some(Err(PipelineError::MissingInput {
        node_id: output.to_string(),
        input: output.to_string(),
      })),
      NodeState::Failed(e) => Some(Err(e.clone())),
      NodeState::Skipped => Some(Err(PipelineError::OutputSkipped {
        node_id: output.to_string(),
      })),
      _ => None,
    }
  }

  /// Settle every pending node whose fate is decided, until nothing changes.
  async fn advance(&mut self) -> Result<(), PipelineError> {
    let dag = self.dag.clone();
    loop {
      let mut progressed = false;
      for node_id in dag.topological_order() {
        if self.state(node_id) == Some(&NodeState::Pending) {
          progressed |= self.evaluate(node_id).await?;
        }
      }
      if !progressed {
        return Ok(());
      }
    }
  }

  /// Try to move a pending node forward. Returns whether its state changed.
  async fn evaluate(&mut self, node_id: &str) -> Result<bool, PipelineError> {
    let dag = self.dag.clone();
    let Some(node) = dag.node(node_id) else {
      return Ok(false);
    };

    if node.is_one_of() {
      return self.resolve_one_of(node_id).await;
    }

    if node_id == dag.input_node() {
      let kwargs = self.ctx.input_kwargs().clone();
      self.dispatch(node_id, kwargs).await?;
      return Ok(true);
    }

    let mut live: Vec<&Edge> = Vec::new();
    for (_, edge) in dag.predecessors(node_id) {
      match self.edge_status(edge) {
        EdgeStatus::Unresolved => return Ok(false),
        EdgeStatus::Dead => {}
        EdgeStatus::Live => live.push(edge),
      }
    }

    if live.is_empty() {
      self.skip(node_id);
      return Ok(true);
    }

    let upstream_failure = live.iter().find_map(|edge| match self.state(&edge.from) {
      Some(NodeState::Failed(e)) => Some(e.clone()),
      _ => None,
    });
    if let Some(err) = upstream_failure {
      debug!(
        pipeline_id = %self.ctx.pipeline_id(),
        node_id = %node_id,
        error = %err,
        "node_failed_upstream"
      );
      self.set_state(node_id, NodeState::Failed(err));
      return Ok(true);
    }

    let mut kwargs = Map::new();
    for edge in live {
      match self.state(&edge.from) {
        Some(NodeState::Absent) if edge.optional => {}
        Some(NodeState::Absent) => {
          let err = PipelineError::MissingInput {
            node_id: node_id.to_string(),
            input: edge.kwarg.clone(),
          };
          error!(pipeline_id = %self.ctx.pipeline_id(), node_id = %node_id, error = %err, "node_failed");
          self.set_state(node_id, NodeState::Failed(err));
          return Ok(true);
        }
        _ => {
          let iteration = self.iteration(&edge.from);
          match self.ctx.load_node_result(&edge.from, iteration).await {
            Ok(value) => {
              kwargs.insert(edge.kwarg.clone(), value);
            }
            Err(e) => {
              let err = PipelineError::Dependency {
                node_id: node_id.to_string(),
                message: format!("input '{}' from '{}': {}", edge.kwarg, edge.from, e),
              };
              error!(pipeline_id = %self.ctx.pipeline_id(), node_id = %node_id, error = %err, "node_failed");
              self.set_state(node_id, NodeState::Failed(err));
              return Ok(true);
            }
          }
        }
      }
    }

    self.dispatch(node_id, kwargs).await?;
    Ok(true)
  }

  fn edge_status(&self, edge: &Edge) -> EdgeStatus {
    let Some(producer) = self.nodes.get(&edge.from) else {
      return EdgeStatus::Dead;
    };
    match &producer.state {
      NodeState::Skipped => EdgeStatus::Dead,
      NodeState::Failed(_) | NodeState::Absent => EdgeStatus::Live,
      NodeState::Succeeded => match &edge.case_branch {
        Some(label) if producer.selected_case.as_ref() != Some(label) => EdgeStatus::Dead,
        _ => EdgeStatus::Live,
      },
      _ => EdgeStatus::Unresolved,
    }
  }

  /// Resolve a one-of head from its candidates, in declared order.
  async fn resolve_one_of(&mut self, head: &str) -> Result<bool, PipelineError> {
    let dag = self.dag.clone();
    let candidates = dag.oneof_candidates(head).unwrap_or_default();

    let mut winner = None;
    let mut all_skipped = true;
    for (index, candidate) in candidates.iter().enumerate() {
      match self.state(candidate) {
        Some(NodeState::Succeeded) => {
          winner = Some(index);
          break;
        }
        Some(NodeState::Skipped) => {}
        Some(NodeState::Failed(_)) | Some(NodeState::Absent) => all_skipped = false,
        // An earlier candidate is still undecided.
        _ => return Ok(false),
      }
    }

    let Some(index) = winner else {
      if all_skipped {
        self.skip(head);
      } else {
        self.ctx.emit_node_start(head).await?;
        warn!(pipeline_id = %self.ctx.pipeline_id(), node_id = %head, "one_of_exhausted");
        self.set_state(head, NodeState::Absent);
        self.ctx.emit_node_complete(head, None).await?;
      }
      return Ok(true);
    };

    for abandoned in &candidates[index + 1..] {
      if !self.state(abandoned).is_some_and(NodeState::is_terminal) {
        self.abandon(abandoned).await?;
      }
    }

    let chosen = &candidates[index];
    debug!(
      pipeline_id = %self.ctx.pipeline_id(),
      node_id = %head,
      candidate = %chosen,
      "one_of_resolved"
    );

    self.ctx.emit_node_start(head).await?;
    match self
      .ctx
      .load_node_result(chosen, self.iteration(chosen))
      .await
    {
      Ok(value) => self.resolve(head, value).await?,
      Err(e) => {
        let err = PipelineError::Dependency {
          node_id: head.to_string(),
          message: format!("candidate '{}': {}", chosen, e),
        };
        self.fail(head, err).await?;
      }
    }
    Ok(true)
  }

  /// Emit node-start and spawn the first attempt.
  async fn dispatch(&mut self, node_id: &str, kwargs: Map<String, Value>) -> Result<(), PipelineError> {
    let (iteration, additional_data) = match self.nodes.get(node_id) {
      Some(run) => (run.iteration, run.additional_data.clone()),
      None => return Ok(()),
    };

    let mut input = NodeInput::new(self.ctx.pipeline_id(), node_id, kwargs);
    input.iteration = iteration;
    input.additional_data = additional_data;

    self.ctx.emit_node_start(node_id).await?;
    debug!(
      pipeline_id = %self.ctx.pipeline_id(),
      node_id = %node_id,
      iteration = iteration,
      "node_started"
    );

    let use_cache = !self.dag.is_switch(node_id)
      && self
        .dag
        .node(node_id)
        .is_some_and(|n| n.recurrence.is_none());

    self.set_state(node_id, NodeState::Running { attempt: 1 });
    self.spawn_attempt(node_id, input, use_cache);
    Ok(())
  }

  fn spawn_attempt(&mut self, node_id: &str, input: NodeInput, use_cache: bool) {
    let Some((body, lane)) = self
      .dag
      .node(node_id)
      .and_then(|n| n.body().map(|body| (body.clone(), n.lane())))
    else {
      return;
    };
    let Some(run) = self.nodes.get_mut(node_id) else {
      return;
    };

    let pool = self.pool.clone();
    let ctx = self.ctx.clone();
    let node_id = node_id.to_string();
    let generation = run.generation;
    let iteration = run.iteration;

    let handle = self.tasks.spawn(async move {
      if use_cache {
        if let Ok(value) = ctx.load_node_result(&node_id, iteration).await {
          return AttemptResult {
            node_id,
            generation,
            input,
            outcome: AttemptOutcome::Cached(value),
          };
        }
      }

      let outcome = AttemptOutcome::Computed(pool.run(lane, body, input.clone()).await);
      AttemptResult {
        node_id,
        generation,
        input,
        outcome,
      }
    });
    run.abort = Some(handle);
  }

  /// Wake the scheduler once `delay` has passed so the next attempt can run.
  fn schedule_retry(&mut self, node_id: &str, input: NodeInput, delay: Duration) {
    let Some(run) = self.nodes.get_mut(node_id) else {
      return;
    };
    let node_id = node_id.to_string();
    let generation = run.generation;

    let handle = self.tasks.spawn(async move {
      tokio::time::sleep(delay).await;
      AttemptResult {
        node_id,
        generation,
        input,
        outcome: AttemptOutcome::RetryDue,
      }
    });
    run.abort = Some(handle);
  }

  async fn on_attempt_finished(&mut self, result: AttemptResult) -> Result<(), PipelineError> {
    let Some(run) = self.nodes.get_mut(&result.node_id) else {
      return Ok(());
    };
    if run.generation != result.generation || !run.state.is_in_flight() {
      return Ok(());
    }
    run.abort = None;

    let node_id = result.node_id;
    match result.outcome {
      AttemptOutcome::Cached(value) => {
        debug!(pipeline_id = %self.ctx.pipeline_id(), node_id = %node_id, "node_cache_hit");
        self.resolve(&node_id, value).await
      }
      AttemptOutcome::Computed(Ok(output)) => self.handle_output(&node_id, output).await,
      AttemptOutcome::Computed(Err(err)) => self.handle_error(&node_id, result.input, err).await,
      AttemptOutcome::RetryDue => {
        self.set_state(&node_id, NodeState::Running { attempt: result.input.attempt });
        self.spawn_attempt(&node_id, result.input, false);
        Ok(())
      }
    }
  }

  async fn handle_output(&mut self, node_id: &str, output: NodeOutput) -> Result<(), PipelineError> {
    let dag = self.dag.clone();
    let is_switch = dag.is_switch(node_id);

    match output {
      NodeOutput::Value(_) if is_switch => {
        let err = invalid_output(node_id, "switch node must return a case result");
        self.fail(node_id, err).await
      }
      NodeOutput::Value(value) => self.resolve(node_id, value).await,
      NodeOutput::Case(_) if !is_switch => {
        let err = invalid_output(node_id, "case result from a node without switch edges");
        self.fail(node_id, err).await
      }
      NodeOutput::Case(case) => {
        debug!(
          pipeline_id = %self.ctx.pipeline_id(),
          node_id = %node_id,
          case = %case.label,
          "switch_selected"
        );
        if let Some(run) = self.nodes.get_mut(node_id) {
          run.selected_case = Some(case.label);
        }
        self.resolve(node_id, case.data).await
      }
      NodeOutput::Recurrent(signal) => {
        let Some(recurrence) = dag.node(node_id).and_then(|n| n.recurrence.as_ref()) else {
          let err = invalid_output(node_id, "recurrent signal from a node without recurrence");
          return self.fail(node_id, err).await;
        };

        let count = match self.nodes.get_mut(node_id) {
          Some(run) => {
            run.recurrences += 1;
            run.recurrences
          }
          None => return Ok(()),
        };

        if count < recurrence.max_iterations {
          info!(
            pipeline_id = %self.ctx.pipeline_id(),
            node_id = %node_id,
            iteration = count,
            "node_recurrence"
          );
          self
            .restart_subgraph(node_id, &recurrence.start_node, count, signal.data)
            .await
        } else {
          self
            .resolve(node_id, signal.data.unwrap_or(Value::Null))
            .await
        }
      }
    }
  }

  async fn handle_error(
    &mut self,
    node_id: &str,
    mut input: NodeInput,
    err: NodeError,
  ) -> Result<(), PipelineError> {
    let Some(retry) = self.nodes.get(node_id).map(|run| run.retry.clone()) else {
      return Ok(());
    };
    let attempt = input.attempt;

    if retry.should_retry(attempt, &err) {
      warn!(
        pipeline_id = %self.ctx.pipeline_id(),
        node_id = %node_id,
        attempt = attempt,
        max_attempts = retry.attempts,
        error = %err,
        "node_retrying"
      );
      input.attempt = attempt + 1;
      if retry.delay.is_zero() {
        self.set_state(node_id, NodeState::Running { attempt: input.attempt });
        self.spawn_attempt(node_id, input, false);
      } else {
        self.set_state(node_id, NodeState::Retrying { attempt: input.attempt });
        self.schedule_retry(node_id, input, retry.delay);
      }
      return Ok(());
    }

    let provider = self.dag.node(node_id).and_then(|n| n.default.clone());
    if let (true, Some(provider)) = (retry.use_default, provider) {
      match provider.default_value(&input) {
        Ok(value) => {
          warn!(
            pipeline_id = %self.ctx.pipeline_id(),
            node_id = %node_id,
            error = %err,
            "node_default_used"
          );
          return self.resolve(node_id, value).await;
        }
        Err(default_err) => {
          let err = PipelineError::Node {
            node_id: node_id.to_string(),
            source: default_err,
          };
          return self.fail(node_id, err).await;
        }
      }
    }

    let err = PipelineError::Node {
      node_id: node_id.to_string(),
      source: err,
    };
    self.fail(node_id, err).await
  }

  /// Store a node's value and mark it succeeded, releasing its dependents.
  async fn resolve(&mut self, node_id: &str, value: Value) -> Result<(), PipelineError> {
    let iteration = self.iteration(node_id);
    if let Err(e) = self.ctx.save_node_result(node_id, iteration, &value).await {
      let err = PipelineError::Store {
        node_id: node_id.to_string(),
        message: e.to_string(),
      };
      return self.fail(node_id, err).await;
    }

    self.set_state(node_id, NodeState::Succeeded);
    debug!(
      pipeline_id = %self.ctx.pipeline_id(),
      node_id = %node_id,
      iteration = iteration,
      "node_completed"
    );
    self.ctx.emit_node_complete(node_id, None).await
  }

  async fn fail(&mut self, node_id: &str, err: PipelineError) -> Result<(), PipelineError> {
    error!(
      pipeline_id = %self.ctx.pipeline_id(),
      node_id = %node_id,
      error = %err,
      "node_failed"
    );
    self.set_state(node_id, NodeState::Failed(err.clone()));
    self.ctx.emit_node_complete(node_id, Some(&err)).await
  }

  fn skip(&mut self, node_id: &str) {
    debug!(pipeline_id = %self.ctx.pipeline_id(), node_id = %node_id, "node_skipped");
    self.set_state(node_id, NodeState::Skipped);
  }

  /// Stop any in-flight work of a node and skip it.
  async fn abandon(&mut self, node_id: &str) -> Result<(), PipelineError> {
    let was_in_flight = self.halt(node_id);
    self.skip(node_id);
    if was_in_flight {
      self.ctx.emit_node_complete(node_id, None).await?;
    }
    Ok(())
  }

  /// Abort a node's outstanding task and drop its late completions.
  /// Returns whether the node was in flight.
  fn halt(&mut self, node_id: &str) -> bool {
    let Some(run) = self.nodes.get_mut(node_id) else {
      return false;
    };
    if let Some(handle) = run.abort.take() {
      handle.abort();
    }
    run.generation += 1;
    run.state.is_in_flight()
  }

  /// Reset a recurrent sub-graph so it runs again as `iteration`.
  ///
  /// Every other descendant of the start node is reset too: it consumed the
  /// previous iteration, or was pruned by a switch that decides again.
  async fn restart_subgraph(
    &mut self,
    node_id: &str,
    start_node: &str,
    iteration: u32,
    data: Option<Value>,
  ) -> Result<(), PipelineError> {
    let dag = self.dag.clone();
    let mut members: Vec<String> = dag.recurrent_subgraph(node_id).unwrap_or_default().to_vec();
    let in_subgraph: HashSet<String> = members.iter().cloned().collect();
    let mut downstream: Vec<String> = dag
      .graph()
      .descendants(start_node)
      .into_iter()
      .filter(|id| !in_subgraph.contains(id))
      .collect();
    downstream.sort();
    members.extend(downstream);

    for member in &members {
      if self.halt(member) {
        self.ctx.emit_node_complete(member, None).await?;
      }
      if let Some(run) = self.nodes.get_mut(member) {
        run.state = NodeState::Pending;
        run.iteration = iteration;
        run.selected_case = None;
        run.additional_data = None;
      }
    }
    if let Some(run) = self.nodes.get_mut(start_node) {
      run.additional_data = data;
    }
    Ok(())
  }

  fn set_state(&mut self, node_id: &str, state: NodeState) {
    if let Some(run) = self.nodes.get_mut(node_id) {
      run.state = state;
    }
  }

  fn iteration(&self, node_id: &str) -> u32 {
    self.nodes.get(node_id).map_or(0, |run| run.iteration)
  }
}

fn invalid_output(node_id: &str, message: &str) -> PipelineError {
  PipelineError::InvalidOutput {
    node_id: node_id.to_string(),
    message: message.to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use mlpipe_artifact::InMemoryArtifactStore;
  use mlpipe_dag::{DagBuilder, Node, RetryPolicy, blocking_fn};
  use serde_json::json;

  fn manager(policy: RetryPolicy) -> RunManager {
    let dag = DagBuilder::new("retry")
      .add_node(Node::new("flaky", blocking_fn(|_| Ok(json!(1)))).retry(policy))
      .input_node("flaky")
      .output_node("flaky")
      .build()
      .unwrap();
    let ctx = PipelineContext::new("p", "m", Map::new(), Arc::new(InMemoryArtifactStore::new()));
    RunManager::new(
      Arc::new(dag),
      Arc::new(ctx),
      WorkerPool::default(),
      &RetryConfig::default(),
    )
  }

  #[tokio::test]
  async fn test_delayed_retry_returns_to_running() {
    let mut manager = manager(RetryPolicy::new().attempts(2).delay(Duration::from_millis(10)));
    manager.set_state("flaky", NodeState::Running { attempt: 1 });

    let input = NodeInput::new("p", "flaky", Map::new());
    manager
      .handle_error("flaky", input, NodeError::msg("down"))
      .await
      .unwrap();
    assert_eq!(
      manager.state("flaky"),
      Some(&NodeState::Retrying { attempt: 2 })
    );

    let due = manager.tasks.join_next().await.unwrap().unwrap();
    manager.on_attempt_finished(due).await.unwrap();
    assert_eq!(
      manager.state("flaky"),
      Some(&NodeState::Running { attempt: 2 })
    );

    let attempt = manager.tasks.join_next().await.unwrap().unwrap();
    manager.on_attempt_finished(attempt).await.unwrap();
    assert_eq!(manager.state("flaky"), Some(&NodeState::Succeeded));
  }

  #[tokio::test]
  async fn test_immediate_retry_skips_waiting() {
    let mut manager = manager(RetryPolicy::new().attempts(2));
    manager.set_state("flaky", NodeState::Running { attempt: 1 });

    let input = NodeInput::new("p", "flaky", Map::new());
    manager
      .handle_error("flaky", input, NodeError::msg("down"))
      .await
      .unwrap();
    assert_eq!(
      manager.state("flaky"),
      Some(&NodeState::Running { attempt: 2 })
    );
  }
}
