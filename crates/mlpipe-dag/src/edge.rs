use serde::{Deserialize, Serialize};

/// A data dependency from `from` to `to`.
///
/// The producer's result is passed to the consumer under `kwarg`. A switch
/// edge is live only when the producer's case label equals `case_branch`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
  pub from: String,
  pub to: String,
  pub kwarg: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub case_branch: Option<String>,
  /// An optional input is omitted, rather than failing the consumer, when the
  /// producer resolves without a value.
  #[serde(default)]
  pub optional: bool,
}

impl Edge {
  pub fn new(from: impl Into<String>, to: impl Into<String>, kwarg: impl Into<String>) -> Self {
    Self {
      from: from.into(),
      to: to.into(),
      kwarg: kwarg.into(),
      case_branch: None,
      optional: false,
    }
  }

  /// One branch of a switch fan-out.
  pub fn switch(
    from: impl Into<String>,
    to: impl Into<String>,
    kwarg: impl Into<String>,
    label: impl Into<String>,
  ) -> Self {
    Self {
      case_branch: Some(label.into()),
      ..Self::new(from, to, kwarg)
    }
  }

  pub fn into_optional(mut self) -> Self {
    self.optional = true;
    self
  }

  pub fn is_switch(&self) -> bool {
    self.case_branch.is_some()
  }
}
