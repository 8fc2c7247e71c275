//! Error types for `formwork-core`, plus the flash-message projection used
//! by UI layers.
//!
//! Every variant is recoverable at the request boundary: callers roll back
//! their transaction and render a response. Nothing here is fatal to the
//! process.

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::{
  component::QuestionDataType, expression::ExpressionKind,
  managed::ManagedExpressionName,
};

/// One dependent question and the removed data-source items it relies on.
#[derive(Debug, Clone, Serialize)]
pub struct DataSourceItemDependency {
  pub question_id:   Uuid,
  pub question_name: String,
  pub item_keys:     Vec<String>,
}

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Expression(#[from] formwork_expr::Error),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  /// Free-text (unmanaged) statements are stored but never evaluated.
  #[error("expression {0} has no managed form and cannot be evaluated")]
  UnmanagedExpression(Uuid),

  #[error("component not found: {0}")]
  ComponentNotFound(Uuid),

  #[error("form not found: {0}")]
  FormNotFound(Uuid),

  /// A `((...))` span in a free-text field was not a valid reference to an
  /// earlier question. Carries the field and the exact offending text.
  #[error("invalid reference in {field}: {reference:?}")]
  InvalidReference { field: String, reference: String },

  /// A component depends on another that does not come strictly earlier in
  /// display order.
  #[error(
    "{component_name:?} cannot depend on {depends_on_name:?}, which does \
     not come before it"
  )]
  DependencyOrder {
    component_id:    Uuid,
    component_name:  String,
    depends_on_id:   Uuid,
    depends_on_name: String,
  },

  /// Data-source items cannot be removed while managed expressions on other
  /// questions reference them. Lists every dependent question.
  #[error("data source items for question {question_id} are still referenced")]
  DataSourceItemReference {
    question_id: Uuid,
    dependents:  Vec<DataSourceItemDependency>,
  },

  #[error(
    "a {expression} {kind} cannot reference a {data_type} question"
  )]
  IncompatibleDataType {
    question_id: Uuid,
    data_type:   QuestionDataType,
    expression:  ManagedExpressionName,
    kind:        ExpressionKind,
  },

  /// Answers inside an "add another" container are per-entry and cannot be
  /// referenced from outside that container.
  #[error(
    "component {component_id} cannot reference question \
     {referenced_question_id} inside a different add-another container"
  )]
  AddAnotherDependency {
    component_id:           Uuid,
    referenced_question_id: Uuid,
  },

  #[error("group {0} contains an add-another container")]
  GroupContainsAddAnother(Uuid),

  #[error("component {0} cannot be made add-another here")]
  AddAnotherNotValid(Uuid),

  #[error("group {group_id} would exceed the nesting limit of {max_depth}")]
  NestedGroup { group_id: Uuid, max_depth: usize },

  #[error(
    "group {0} displays questions on the same page and cannot contain a \
     nested group"
  )]
  NestedGroupDisplayTypeSamePage(Uuid),

  /// Deletion blocked: other components reference this one.
  #[error("component {component_id} has dependent components")]
  ComponentHasDependencies {
    component_id: Uuid,
    dependents:   Vec<Uuid>,
  },

  /// A uniqueness rule was violated (name/slug within a parent scope, or a
  /// duplicate managed expression on a question).
  #[error("{field} {value:?} is already in use")]
  DuplicateValue { field: String, value: String },

  #[error("data source for question {question_id} has no item {key:?}")]
  UnknownDataSourceItem { question_id: Uuid, key: String },

  #[error("could not decode a {data_type} answer: {detail}")]
  AnswerDecode {
    data_type: QuestionDataType,
    detail:    String,
  },

  #[error("invalid builder input for {field}: {detail}")]
  InvalidBuilderInput { field: String, detail: String },

  // ── Submission-side guards ────────────────────────────────────────────
  #[error("submission {0} is already completed and cannot be edited")]
  SubmissionCompleted(Uuid),

  #[error("form {0} has unanswered questions and cannot be marked complete")]
  IncompleteForm(Uuid),

  #[error("submission {0} has incomplete forms and cannot be submitted")]
  FormsNotCompleted(Uuid),

  /// Caller error, not user-facing validation: an add-another entry index
  /// outside the stored array.
  #[error("entry index {index} out of range (len {len})")]
  IndexOutOfRange { index: usize, len: usize },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

// ─── Flash projection ────────────────────────────────────────────────────────

/// A renderable payload for the schema-builder UI. Projection is separate
/// from error identity so callers can match on variants without dragging
/// display concerns into the type.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FlashContext {
  pub heading: String,
  pub message: String,
}

/// Map a structural-guard error to its UI flash payload. Errors that surface
/// as field-level validation (or are internal) project to `None`.
pub fn flash_context(error: &Error) -> Option<FlashContext> {
  match error {
    Error::DependencyOrder {
      component_name,
      depends_on_name,
      ..
    } => Some(FlashContext {
      heading: "You cannot move this question".into(),
      message: format!(
        "You cannot move {component_name:?} above {depends_on_name:?}, \
         which it depends on"
      ),
    }),
    Error::DataSourceItemReference { dependents, .. } => Some(FlashContext {
      heading: "You cannot remove these options".into(),
      message: format!(
        "{} other question(s) depend on options you are removing",
        dependents.len()
      ),
    }),
    Error::IncompatibleDataType {
      expression,
      data_type,
      kind,
      ..
    } => Some(FlashContext {
      heading: "You cannot add this expression".into(),
      message: format!(
        "A {expression} {kind} cannot reference a {data_type} question"
      ),
    }),
    Error::AddAnotherDependency { .. } => Some(FlashContext {
      heading: "You cannot reference this question".into(),
      message: "Questions inside an add-another container can only be \
                referenced from inside the same container"
        .into(),
    }),
    Error::GroupContainsAddAnother(_) => Some(FlashContext {
      heading: "You cannot make this repeatable".into(),
      message: "This group already contains a repeatable section".into(),
    }),
    Error::AddAnotherNotValid(_) => Some(FlashContext {
      heading: "You cannot make this repeatable".into(),
      message: "This component is already inside a repeatable section".into(),
    }),
    Error::NestedGroup { max_depth, .. } => Some(FlashContext {
      heading: "You cannot add a group here".into(),
      message: format!("Groups can only be nested {max_depth} level(s) deep"),
    }),
    Error::NestedGroupDisplayTypeSamePage(_) => Some(FlashContext {
      heading: "You cannot add a group here".into(),
      message: "Groups shown on a single page cannot contain other groups"
        .into(),
    }),
    Error::ComponentHasDependencies { dependents, .. } => {
      Some(FlashContext {
        heading: "You cannot delete this question".into(),
        message: format!(
          "{} other question(s) depend on this question",
          dependents.len()
        ),
      })
    }
    _ => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn dependency_order_projects_a_flash_payload() {
    let err = Error::DependencyOrder {
      component_id:    Uuid::new_v4(),
      component_name:  "Budget".into(),
      depends_on_id:   Uuid::new_v4(),
      depends_on_name: "Amount".into(),
    };
    let flash = flash_context(&err).unwrap();
    assert!(flash.message.contains("Budget"));
    assert!(flash.message.contains("Amount"));
  }

  #[test]
  fn field_level_errors_do_not_project() {
    let err = Error::InvalidReference {
      field:     "text".into(),
      reference: "q_x + 100".into(),
    };
    assert!(flash_context(&err).is_none());
  }
}
