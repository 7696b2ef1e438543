//! Bounded re-execution of recurrent sub-graphs.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use mlpipe_dag::{
  CaseResult, Dag, DagBuilder, Node, NodeError, NodeOutput, Recurrent, blocking_fn,
};
use mlpipe_engine::{PipelineChart, PipelineError, RunRequest};
use serde_json::{Value, json};

type Calls = Arc<Mutex<Vec<(u32, Option<Value>)>>>;

/// input -> refine -> check (recurrent, restarts at refine) -> output
fn refine_dag(calls: Calls, max_iterations: u32, stop_at: i64) -> Dag {
  DagBuilder::new("refine")
    .add_node(Node::new(
      "input",
      blocking_fn(|input| Ok(input.require("x")?.clone())),
    ))
    .add_node(Node::new(
      "refine",
      blocking_fn(move |input| {
        calls
          .lock()
          .unwrap()
          .push((input.iteration, input.additional_data.clone()));
        let base = match &input.additional_data {
          Some(data) => data.as_i64(),
          None => input.require("x")?.as_i64(),
        }
        .ok_or_else(|| NodeError::type_error("x must be an integer"))?;
        Ok(json!(base + 1))
      }),
    ))
    .add_node(
      Node::new(
        "check",
        blocking_fn(move |input| {
          let value: i64 = input.require_as("value")?;
          if value >= stop_at {
            Ok(NodeOutput::Value(json!({ "final": value })))
          } else {
            Ok(Recurrent::new(json!(value)).into())
          }
        }),
      )
      .recurrent("refine", max_iterations),
    )
    .add_node(Node::new(
      "output",
      blocking_fn(|input| Ok(input.require("result")?.clone())),
    ))
    .edge("input", "refine", "x")
    .edge("refine", "check", "value")
    .edge("check", "output", "result")
    .input_node("input")
    .output_node("output")
    .build()
    .unwrap()
}

#[tokio::test]
async fn test_recurrence_bounded_by_max_iterations() {
  let calls: Calls = Arc::default();
  let chart = PipelineChart::new("m", refine_dag(calls.clone(), 3, i64::MAX));

  let result = chart.run(RunRequest::from_json(json!({ "x": 0 }))).await;

  // Third signal hits the limit and resolves with its data.
  assert_eq!(result.into_result().unwrap(), json!(3));
  assert_eq!(
    *calls.lock().unwrap(),
    vec![(0, None), (1, Some(json!(1))), (2, Some(json!(2)))]
  );
}

#[tokio::test]
async fn test_recurrence_stops_on_plain_value() {
  let calls: Calls = Arc::default();
  let chart = PipelineChart::new("m", refine_dag(calls.clone(), 10, 2));

  let result = chart.run(RunRequest::from_json(json!({ "x": 0 }))).await;

  assert_eq!(result.into_result().unwrap(), json!({ "final": 2 }));
  assert_eq!(calls.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_single_iteration_limit() {
  let calls: Calls = Arc::default();
  let chart = PipelineChart::new("m", refine_dag(calls.clone(), 1, i64::MAX));

  let result = chart.run(RunRequest::from_json(json!({ "x": 5 }))).await;

  assert_eq!(result.into_result().unwrap(), json!(6));
  assert_eq!(calls.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_recurrent_signal_without_capability() {
  let dag = DagBuilder::new("no-recurrence")
    .add_node(Node::new(
      "input",
      blocking_fn(|_| Ok(Recurrent::empty())),
    ))
    .input_node("input")
    .output_node("input")
    .build()
    .unwrap();

  let result = PipelineChart::new("m", dag).run(RunRequest::default()).await;

  assert!(matches!(
    result.error,
    Some(PipelineError::InvalidOutput { .. })
  ));
}

/// input -> start -> route (switch)
///   route:"again" -> retry -> loop (recurrent, restarts at start) -> output
///   route:"done"  -> finish -> output
fn routed_dag(finish_calls: Arc<AtomicU32>, retry_calls: Arc<AtomicU32>) -> Dag {
  DagBuilder::new("routed")
    .add_node(Node::new("input", blocking_fn(|_| Ok(json!(null)))))
    .add_node(Node::new(
      "start",
      blocking_fn(|input| Ok(json!(input.additional_data.is_some()))),
    ))
    .add_node(Node::new(
      "route",
      blocking_fn(|input| {
        let continued: bool = input.require_as("continued")?;
        let label = if continued { "done" } else { "again" };
        Ok(CaseResult::label(label))
      }),
    ))
    .add_node(Node::new(
      "retry",
      blocking_fn(move |_| {
        retry_calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!("retry"))
      }),
    ))
    .add_node(
      Node::new(
        "loop",
        blocking_fn(|_| Ok(Recurrent::new(json!("again")))),
      )
      .recurrent("start", 3),
    )
    .add_node(Node::new(
      "finish",
      blocking_fn(move |_| {
        finish_calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!("finished"))
      }),
    ))
    .add_node(Node::new(
      "output",
      blocking_fn(|input| Ok(Value::Object(input.kwargs))),
    ))
    .edge("input", "start", "x")
    .edge("start", "route", "continued")
    .switch_edge("route", "retry", "label", "again")
    .switch_edge("route", "finish", "label", "done")
    .edge("retry", "loop", "retry")
    .edge("loop", "output", "looped")
    .edge("finish", "output", "finished")
    .input_node("input")
    .output_node("output")
    .build()
    .unwrap()
}

#[tokio::test]
async fn test_switch_in_recurrence_revives_pruned_branch() {
  let finish_calls = Arc::new(AtomicU32::new(0));
  let retry_calls = Arc::new(AtomicU32::new(0));
  let chart = PipelineChart::new("m", routed_dag(finish_calls.clone(), retry_calls.clone()));

  let result = chart.run(RunRequest::default()).await;

  // First pass takes "again"; the continuation takes "done".
  assert_eq!(
    result.into_result().unwrap(),
    json!({ "finished": "finished" })
  );
  assert_eq!(retry_calls.load(Ordering::SeqCst), 1);
  assert_eq!(finish_calls.load(Ordering::SeqCst), 1);
}
