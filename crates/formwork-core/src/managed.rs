//! The managed expression catalog.
//!
//! Schema builders never write raw sandbox source; they pick a template
//! (greater-than, any-of, is-yes, …) and fill in parameters. Each template
//! knows how to render itself as sandbox source, describe itself to humans,
//! and declare which questions and data-source items it depends on.
//!
//! The catalog is the sealed [`ManagedExpression`] enum itself — variants
//! are discovered by exhaustive `match`, not by registration side effects,
//! so completeness is checked by the compiler. [`ManagedExpressionName`] is
//! the stable discriminant stored in the database, and
//! [`ManagedExpression::from_parts`] reconstructs a live instance from a
//! stored row.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  component::{QuestionDataType, safe_qid},
  error::{Error, Result},
};

// ─── Names ───────────────────────────────────────────────────────────────────

/// Stable catalog discriminant, stored in the `managed_name` column.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ManagedExpressionName {
  GreaterThan,
  LessThan,
  Between,
  AnyOf,
  Specifically,
  IsYes,
  IsNo,
}

// ─── Comparison values ───────────────────────────────────────────────────────

/// The right-hand side of a numeric comparison: a literal, or the answer to
/// another (earlier) question.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ComparisonValue {
  Literal(i64),
  Question(Uuid),
}

impl ComparisonValue {
  /// Sandbox-source rendering.
  fn render(&self) -> String {
    match self {
      Self::Literal(n) => n.to_string(),
      Self::Question(id) => safe_qid(*id),
    }
  }

  /// Human-readable rendering; a question reference becomes an
  /// interpolation token so the UI can substitute the live answer.
  fn describe(&self) -> String {
    match self {
      Self::Literal(n) => n.to_string(),
      Self::Question(id) => format!("(( {} ))", safe_qid(*id)),
    }
  }

  pub fn question_id(&self) -> Option<Uuid> {
    match self {
      Self::Question(id) => Some(*id),
      Self::Literal(_) => None,
    }
  }
}

// ─── Catalog ─────────────────────────────────────────────────────────────────

/// A typed, serializable condition/validation template.
///
/// `question_id` is always the question this expression reads: for numeric
/// and choice variants, the question supplying the compared value or option
/// set; for `IsYes`/`IsNo`, the boolean question itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "context", rename_all = "snake_case")]
pub enum ManagedExpression {
  GreaterThan {
    question_id:   Uuid,
    minimum_value: ComparisonValue,
    inclusive:     bool,
  },
  LessThan {
    question_id:   Uuid,
    maximum_value: ComparisonValue,
    inclusive:     bool,
  },
  Between {
    question_id:       Uuid,
    minimum_value:     ComparisonValue,
    minimum_inclusive: bool,
    maximum_value:     ComparisonValue,
    maximum_inclusive: bool,
  },
  AnyOf {
    question_id: Uuid,
    keys:        Vec<String>,
  },
  Specifically {
    question_id: Uuid,
    key:         String,
  },
  IsYes { question_id: Uuid },
  IsNo { question_id: Uuid },
}

const NUMERIC: &[QuestionDataType] = &[QuestionDataType::Integer];
const CHOICE: &[QuestionDataType] =
  &[QuestionDataType::Radios, QuestionDataType::Checkboxes];
const BOOLEAN: &[QuestionDataType] = &[QuestionDataType::YesNo];

impl ManagedExpression {
  pub fn name(&self) -> ManagedExpressionName {
    match self {
      Self::GreaterThan { .. } => ManagedExpressionName::GreaterThan,
      Self::LessThan { .. } => ManagedExpressionName::LessThan,
      Self::Between { .. } => ManagedExpressionName::Between,
      Self::AnyOf { .. } => ManagedExpressionName::AnyOf,
      Self::Specifically { .. } => ManagedExpressionName::Specifically,
      Self::IsYes { .. } => ManagedExpressionName::IsYes,
      Self::IsNo { .. } => ManagedExpressionName::IsNo,
    }
  }

  /// The question this expression reads.
  pub fn referenced_question_id(&self) -> Uuid {
    match self {
      Self::GreaterThan { question_id, .. }
      | Self::LessThan { question_id, .. }
      | Self::Between { question_id, .. }
      | Self::AnyOf { question_id, .. }
      | Self::Specifically { question_id, .. }
      | Self::IsYes { question_id }
      | Self::IsNo { question_id } => *question_id,
    }
  }

  /// Further questions referenced as comparison values (numeric variants
  /// comparing against another answer).
  pub fn comparison_question_ids(&self) -> Vec<Uuid> {
    match self {
      Self::GreaterThan { minimum_value, .. } => {
        minimum_value.question_id().into_iter().collect()
      }
      Self::LessThan { maximum_value, .. } => {
        maximum_value.question_id().into_iter().collect()
      }
      Self::Between {
        minimum_value,
        maximum_value,
        ..
      } => minimum_value
        .question_id()
        .into_iter()
        .chain(maximum_value.question_id())
        .collect(),
      _ => Vec::new(),
    }
  }

  /// Data-source item keys this expression pins (blocks their deletion).
  pub fn referenced_data_source_keys(&self) -> Vec<&str> {
    match self {
      Self::AnyOf { keys, .. } => keys.iter().map(String::as_str).collect(),
      Self::Specifically { key, .. } => vec![key.as_str()],
      _ => Vec::new(),
    }
  }

  /// Data types the referenced question may have when this template is used
  /// as a condition.
  pub fn supported_condition_data_types(&self) -> &'static [QuestionDataType] {
    match self {
      Self::GreaterThan { .. }
      | Self::LessThan { .. }
      | Self::Between { .. } => NUMERIC,
      Self::AnyOf { .. } | Self::Specifically { .. } => CHOICE,
      Self::IsYes { .. } | Self::IsNo { .. } => BOOLEAN,
    }
  }

  /// Data types this template can validate. Only numeric bounds make sense
  /// as validations; the rest are condition-only.
  pub fn supported_validator_data_types(&self) -> &'static [QuestionDataType] {
    match self {
      Self::GreaterThan { .. }
      | Self::LessThan { .. }
      | Self::Between { .. } => NUMERIC,
      _ => &[],
    }
  }

  // ── Rendering ───────────────────────────────────────────────────────────

  /// Render to sandbox source.
  pub fn statement(&self) -> String {
    match self {
      Self::GreaterThan {
        question_id,
        minimum_value,
        inclusive,
      } => {
        let op = if *inclusive { ">=" } else { ">" };
        format!("{} {op} {}", safe_qid(*question_id), minimum_value.render())
      }
      Self::LessThan {
        question_id,
        maximum_value,
        inclusive,
      } => {
        let op = if *inclusive { "<=" } else { "<" };
        format!("{} {op} {}", safe_qid(*question_id), maximum_value.render())
      }
      Self::Between {
        question_id,
        minimum_value,
        minimum_inclusive,
        maximum_value,
        maximum_inclusive,
      } => {
        let qid = safe_qid(*question_id);
        let lower = if *minimum_inclusive { ">=" } else { ">" };
        let upper = if *maximum_inclusive { "<=" } else { "<" };
        format!(
          "{qid} {lower} {} and {qid} {upper} {}",
          minimum_value.render(),
          maximum_value.render()
        )
      }
      Self::AnyOf { question_id, keys } => {
        let set = keys
          .iter()
          .map(|k| format!("'{k}'"))
          .collect::<Vec<_>>()
          .join(", ");
        format!("{} in {{{set}}}", safe_qid(*question_id))
      }
      Self::Specifically { question_id, key } => {
        format!("{} == '{key}'", safe_qid(*question_id))
      }
      Self::IsYes { question_id } => {
        format!("{} == true", safe_qid(*question_id))
      }
      Self::IsNo { question_id } => {
        format!("{} == false", safe_qid(*question_id))
      }
    }
  }

  /// Short human-readable summary for the builder UI.
  pub fn description(&self) -> String {
    match self {
      Self::GreaterThan {
        minimum_value,
        inclusive,
        ..
      } => format!(
        "is greater than {}{}",
        if *inclusive { "or equal to " } else { "" },
        minimum_value.describe()
      ),
      Self::LessThan {
        maximum_value,
        inclusive,
        ..
      } => format!(
        "is less than {}{}",
        if *inclusive { "or equal to " } else { "" },
        maximum_value.describe()
      ),
      Self::Between {
        minimum_value,
        maximum_value,
        ..
      } => format!(
        "is between {} and {}",
        minimum_value.describe(),
        maximum_value.describe()
      ),
      Self::AnyOf { keys, .. } => format!("is any of: {}", keys.join(", ")),
      Self::Specifically { key, .. } => format!("is specifically {key:?}"),
      Self::IsYes { .. } => "is yes".into(),
      Self::IsNo { .. } => "is no".into(),
    }
  }

  /// Default validation failure text shown to respondents.
  pub fn message(&self) -> String {
    match self {
      Self::GreaterThan {
        minimum_value,
        inclusive,
        ..
      } => format!(
        "The answer must be greater than {}{}",
        if *inclusive { "or equal to " } else { "" },
        minimum_value.describe()
      ),
      Self::LessThan {
        maximum_value,
        inclusive,
        ..
      } => format!(
        "The answer must be less than {}{}",
        if *inclusive { "or equal to " } else { "" },
        maximum_value.describe()
      ),
      Self::Between {
        minimum_value,
        maximum_value,
        ..
      } => format!(
        "The answer must be between {} and {}",
        minimum_value.describe(),
        maximum_value.describe()
      ),
      Self::AnyOf { keys, .. } => {
        format!("The answer must be one of: {}", keys.join(", "))
      }
      Self::Specifically { key, .. } => {
        format!("The answer must be {key:?}")
      }
      Self::IsYes { .. } => "The answer must be yes".into(),
      Self::IsNo { .. } => "The answer must be no".into(),
    }
  }

  // ── Round-trip ──────────────────────────────────────────────────────────

  /// Serialise the parameter payload (without the name tag) for the
  /// `context` database column.
  pub fn to_context(&self) -> Result<serde_json::Value> {
    let full = serde_json::to_value(self)?;
    Ok(
      full
        .get("context")
        .cloned()
        .unwrap_or(serde_json::Value::Null),
    )
  }

  /// Reconstruct from the discriminant and JSON payload stored in the
  /// database.
  pub fn from_parts(
    name: ManagedExpressionName,
    context: serde_json::Value,
  ) -> Result<Self> {
    let wrapped = serde_json::json!({
      "name": name.to_string(),
      "context": context,
    });
    Ok(serde_json::from_value(wrapped)?)
  }

  // ── Builder integration ─────────────────────────────────────────────────

  /// Build a validated instance from flat builder-form input. The rendering
  /// layer submits string fields; this is its entire contract with the
  /// catalog.
  pub fn from_builder_input(
    name: ManagedExpressionName,
    fields: &HashMap<String, String>,
  ) -> Result<Self> {
    let question_id = parse_uuid_field(fields, "question_id")?;
    Ok(match name {
      ManagedExpressionName::GreaterThan => Self::GreaterThan {
        question_id,
        minimum_value: parse_comparison_field(fields, "minimum_value")?,
        inclusive: parse_bool_field(fields, "inclusive")?,
      },
      ManagedExpressionName::LessThan => Self::LessThan {
        question_id,
        maximum_value: parse_comparison_field(fields, "maximum_value")?,
        inclusive: parse_bool_field(fields, "inclusive")?,
      },
      ManagedExpressionName::Between => Self::Between {
        question_id,
        minimum_value: parse_comparison_field(fields, "minimum_value")?,
        minimum_inclusive: parse_bool_field(fields, "minimum_inclusive")?,
        maximum_value: parse_comparison_field(fields, "maximum_value")?,
        maximum_inclusive: parse_bool_field(fields, "maximum_inclusive")?,
      },
      ManagedExpressionName::AnyOf => Self::AnyOf {
        question_id,
        keys: require_field(fields, "keys")?
          .split(',')
          .map(|k| k.trim().to_string())
          .filter(|k| !k.is_empty())
          .collect(),
      },
      ManagedExpressionName::Specifically => Self::Specifically {
        question_id,
        key: require_field(fields, "key")?.to_string(),
      },
      ManagedExpressionName::IsYes => Self::IsYes { question_id },
      ManagedExpressionName::IsNo => Self::IsNo { question_id },
    })
  }
}

fn require_field<'a>(
  fields: &'a HashMap<String, String>,
  name: &str,
) -> Result<&'a str> {
  fields
    .get(name)
    .map(String::as_str)
    .ok_or_else(|| Error::InvalidBuilderInput {
      field:  name.to_string(),
      detail: "missing".into(),
    })
}

fn parse_uuid_field(
  fields: &HashMap<String, String>,
  name: &str,
) -> Result<Uuid> {
  let raw = require_field(fields, name)?;
  Uuid::try_parse(raw).map_err(|e| Error::InvalidBuilderInput {
    field:  name.to_string(),
    detail: e.to_string(),
  })
}

fn parse_bool_field(
  fields: &HashMap<String, String>,
  name: &str,
) -> Result<bool> {
  // Absent checkbox fields read as false.
  match fields.get(name).map(String::as_str) {
    None | Some("") | Some("false") => Ok(false),
    Some("true") | Some("on") => Ok(true),
    Some(other) => Err(Error::InvalidBuilderInput {
      field:  name.to_string(),
      detail: format!("not a boolean: {other:?}"),
    }),
  }
}

/// A comparison field is either an integer literal or a `q_<hex>` reference.
fn parse_comparison_field(
  fields: &HashMap<String, String>,
  name: &str,
) -> Result<ComparisonValue> {
  let raw = require_field(fields, name)?.trim();
  if let Ok(n) = raw.parse::<i64>() {
    return Ok(ComparisonValue::Literal(n));
  }
  if let Some(id) = crate::component::parse_safe_qid(raw) {
    return Ok(ComparisonValue::Question(id));
  }
  Err(Error::InvalidBuilderInput {
    field:  name.to_string(),
    detail: format!("expected an integer or question reference: {raw:?}"),
  })
}
