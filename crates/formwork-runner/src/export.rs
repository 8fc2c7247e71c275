//! Export projection types.
//!
//! A hidden question and an unanswered one are different facts to a grant
//! assessor, so the projection keeps `NotAsked` and `NotAnswered` distinct
//! instead of collapsing both to an empty cell.

use serde::Serialize;

/// One cell of the answers export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum ExportValue {
  Answered(String),
  /// Visible but not yet answered.
  NotAnswered,
  /// Hidden by a condition; the respondent never saw it.
  NotAsked,
}

impl std::fmt::Display for ExportValue {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Answered(text) => f.write_str(text),
      Self::NotAnswered => f.write_str("Not answered"),
      Self::NotAsked => f.write_str("Not asked"),
    }
  }
}

/// One question's column: header plus cell value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRow {
  pub header: String,
  pub value:  ExportValue,
}
