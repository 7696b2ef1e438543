//! Built-in demo charts.

use std::time::Duration;

use mlpipe_dag::{
  CaseResult, Dag, DagBuilder, DagError, Node, NodeError, NodeInput, NodeOutput, NodeTag,
  Recurrent, RetryPolicy, blocking_fn,
};
use serde_json::{Value, json};

/// A named chart the CLI can run.
pub struct BuiltinChart {
  pub name: &'static str,
  pub description: &'static str,
  pub sample_input: fn() -> Value,
  pub build: fn() -> Result<Dag, DagError>,
}

pub const CHARTS: &[BuiltinChart] = &[
  BuiltinChart {
    name: "scoring",
    description: "credit score with bureau retry, internal fallback and a default debt ratio",
    sample_input: || json!({ "income": 5200.0, "debt": 1300.0, "bureau_id": "B-1047" }),
    build: scoring,
  },
  BuiltinChart {
    name: "refine",
    description: "iterative refinement toward a target, routed by convergence",
    sample_input: || json!({ "value": 0.0, "target": 40.0 }),
    build: refine,
  },
];

pub fn find(name: &str) -> Option<&'static BuiltinChart> {
  CHARTS.iter().find(|c| c.name == name)
}

fn number(input: &NodeInput, name: &str) -> Result<f64, NodeError> {
  input.require_as(name)
}

fn field(value: &Value, name: &str) -> Result<f64, NodeError> {
  value[name]
    .as_f64()
    .ok_or_else(|| NodeError::type_error(format!("'{}' must be a number", name)))
}

/// applicant -> debt_ratio -> internal_score --+
///           -> bureau_score ------------------+-> credit_signal (one-of) -> risk_model
fn scoring() -> Result<Dag, DagError> {
  DagBuilder::new("scoring")
    .add_node(Node::new(
      "applicant",
      blocking_fn(|input| {
        number(&input, "income")?;
        number(&input, "debt")?;
        Ok(Value::Object(input.kwargs))
      }),
    ))
    .add_node(
      Node::new(
        "debt_ratio",
        blocking_fn(|input| {
          let applicant = input.require("applicant")?;
          let income = field(applicant, "income")?;
          if income <= 0.0 {
            return Err(NodeError::new("ZeroDivision", "income must be positive"));
          }
          Ok(json!(field(applicant, "debt")? / income))
        }),
      )
      .retry(
        RetryPolicy::new()
          .attempts(1)
          .use_default(),
      )
      .default_value(|_| Ok(json!(1.0))),
    )
    .add_node(
      Node::new(
        "bureau_score",
        blocking_fn(|input| {
          let applicant = input.require("applicant")?;
          let Some(id) = applicant["bureau_id"].as_str() else {
            return Err(NodeError::new("BureauUnavailable", "no bureau record"));
          };
          let digits: u32 = id.chars().filter_map(|c| c.to_digit(10)).sum();
          Ok(json!(600 + digits * 5))
        }),
      )
      .tag(NodeTag::Thread)
      .retry(
        RetryPolicy::new()
          .attempts(2)
          .delay(Duration::from_millis(50))
          .exceptions(["BureauUnavailable"]),
      ),
    )
    .add_node(Node::new(
      "internal_score",
      blocking_fn(|input| {
        let ratio: f64 = input.require_as("ratio")?;
        Ok(json!((850.0 - ratio.clamp(0.0, 1.0) * 550.0).round()))
      }),
    ))
    .one_of("credit_signal", ["bureau_score", "internal_score"])
    .add_node(
      Node::new(
        "risk_model",
        blocking_fn(|input| {
          let score: f64 = input.require_as("score")?;
          let band = match score {
            s if s >= 740.0 => "low",
            s if s >= 620.0 => "medium",
            _ => "high",
          };
          Ok(json!({ "score": score, "risk": band }))
        }),
      )
      .tag(NodeTag::Process),
    )
    .edge("applicant", "debt_ratio", "applicant")
    .edge("applicant", "bureau_score", "applicant")
    .edge("debt_ratio", "internal_score", "ratio")
    .edge("credit_signal", "risk_model", "score")
    .input_node("applicant")
    .output_node("risk_model")
    .build()
}

const TOLERANCE: f64 = 1.0;

fn gap(state: &Value) -> Result<f64, NodeError> {
  Ok((field(state, "target")? - field(state, "value")?).abs())
}

/// request -> step -> converge (recurs to step) -> route (switch) -> accept | give_up -> report
fn refine() -> Result<Dag, DagError> {
  DagBuilder::new("refine")
    .add_node(Node::new(
      "request",
      blocking_fn(|input| {
        number(&input, "value")?;
        number(&input, "target")?;
        Ok(Value::Object(input.kwargs))
      }),
    ))
    .add_node(Node::new(
      "step",
      blocking_fn(|input| {
        let state = match &input.additional_data {
          Some(previous) => previous.clone(),
          None => input.require("request")?.clone(),
        };
        let value = field(&state, "value")?;
        let target = field(&state, "target")?;
        Ok(json!({
          "value": value + (target - value) / 2.0,
          "target": target,
          "iteration": input.iteration,
        }))
      }),
    ))
    .add_node(
      Node::new(
        "converge",
        blocking_fn(|input| {
          let state = input.require("state")?.clone();
          if gap(&state)? < TOLERANCE {
            Ok(NodeOutput::Value(state))
          } else {
            Ok(Recurrent::new(state).into())
          }
        }),
      )
      .recurrent("step", 5),
    )
    .add_node(Node::new(
      "route",
      blocking_fn(|input| {
        let state = input.require("state")?.clone();
        let label = if gap(&state)? < TOLERANCE {
          "converged"
        } else {
          "exhausted"
        };
        Ok(CaseResult::new(label, state))
      }),
    ))
    .add_node(Node::new(
      "accept",
      blocking_fn(|input| Ok(json!({ "status": "converged", "state": input.require("state")? }))),
    ))
    .add_node(Node::new(
      "give_up",
      blocking_fn(|input| Ok(json!({ "status": "gave_up", "state": input.require("state")? }))),
    ))
    .add_node(Node::new(
      "report",
      blocking_fn(|input| {
        input
          .get("accepted")
          .or_else(|| input.get("rejected"))
          .cloned()
          .ok_or_else(|| NodeError::missing_input("accepted"))
      }),
    ))
    .edge("request", "step", "request")
    .edge("step", "converge", "state")
    .edge("converge", "route", "state")
    .switch_edge("route", "accept", "state", "converged")
    .switch_edge("route", "give_up", "state", "exhausted")
    .edge("accept", "report", "accepted")
    .edge("give_up", "report", "rejected")
    .input_node("request")
    .output_node("report")
    .build()
}
