//! The expression entity attached to a question or group.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  error::{Error, Result},
  managed::{ManagedExpression, ManagedExpressionName},
};

/// Whether an expression gates visibility or validates an answer.
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
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExpressionKind {
  Condition,
  Validation,
}

/// A condition or validation owned by exactly one question/group.
///
/// Managed expressions carry their catalog discriminant plus the serialized
/// parameter blob; free-text statements are stored but not evaluatable
/// (the builder UI never produces them).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expression {
  pub id:           Uuid,
  pub kind:         ExpressionKind,
  pub managed_name: Option<ManagedExpressionName>,
  /// Serialized [`ManagedExpression`] parameters (`to_context` output).
  pub context:      serde_json::Value,
  /// Unmanaged free-text sandbox source. Mutually exclusive with
  /// `managed_name`.
  pub statement:    Option<String>,
}

impl Expression {
  /// Wrap a catalog instance as a stored expression row.
  pub fn new_managed(
    kind: ExpressionKind,
    managed: &ManagedExpression,
  ) -> Result<Self> {
    Ok(Self {
      id: Uuid::new_v4(),
      kind,
      managed_name: Some(managed.name()),
      context: managed.to_context()?,
      statement: None,
    })
  }

  /// Reconstruct the live catalog instance. Unmanaged rows cannot be
  /// evaluated and error here.
  pub fn managed(&self) -> Result<ManagedExpression> {
    let name = self
      .managed_name
      .ok_or(Error::UnmanagedExpression(self.id))?;
    ManagedExpression::from_parts(name, self.context.clone())
  }

  /// Sandbox source for this expression.
  pub fn statement(&self) -> Result<String> {
    match &self.statement {
      // Free-text statements are stored for forward compatibility but are
      // not supported for evaluation.
      Some(_) => Err(Error::UnmanagedExpression(self.id)),
      None => Ok(self.managed()?.statement()),
    }
  }
}
