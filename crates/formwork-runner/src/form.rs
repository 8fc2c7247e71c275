//! The dynamic question form.
//!
//! A page of questions becomes a flat field map keyed by safe qid; raw
//! submitted values are validated in two passes. Pass one parses each field
//! into a typed [`Answer`] (type, required, option membership). Pass two
//! overlays the just-parsed data as the context's form layer and evaluates
//! the managed validation expressions, so a validator can compare against
//! an answer submitted on the same page. Errors are keyed per field.

use std::collections::HashMap;

use formwork_core::{
  Result,
  answer::Answer,
  component::{Question, QuestionDataType},
  expression::{Expression, ExpressionKind},
};
use formwork_expr::{ContextLayer, LayeredContext};
use uuid::Uuid;

// ─── Descriptors ─────────────────────────────────────────────────────────────

/// Everything the form needs to know about one question's field.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
  pub question_id: Uuid,
  pub data_type:   QuestionDataType,
  pub required:    bool,
  /// Valid data-source keys for choice fields.
  pub options:     Vec<String>,
  pub word_limit:  Option<u32>,
  pub validators:  Vec<Expression>,
}

/// One page's fields, keyed by safe qid, in display order.
#[derive(Debug, Clone, Default)]
pub struct QuestionForm {
  fields: Vec<(String, FieldDescriptor)>,
}

/// A per-field validation failure, keyed by safe qid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
  pub field:   String,
  pub message: String,
}

/// Outcome of a validation pass: parsed answers plus any field errors.
/// Internal faults (a corrupt expression row) surface as `Err` instead.
#[derive(Debug, Clone, Default)]
pub struct ValidatedForm {
  pub answers: HashMap<Uuid, Answer>,
  pub errors:  Vec<FieldError>,
}

impl ValidatedForm {
  pub fn is_valid(&self) -> bool { self.errors.is_empty() }
}

// ─── Form ────────────────────────────────────────────────────────────────────

impl QuestionForm {
  /// Build the field map for a page of questions. Every question is
  /// required; optionality is not a concept the schema supports.
  pub fn for_questions(questions: &[&Question]) -> Self {
    let fields = questions
      .iter()
      .map(|q| {
        (q.safe_qid(), FieldDescriptor {
          question_id: q.id,
          data_type:   q.data_type,
          required:    true,
          options:     q
            .data_source
            .as_ref()
            .map(|ds| ds.keys().map(str::to_string).collect())
            .unwrap_or_default(),
          word_limit:  q.presentation.word_limit,
          validators:  q
            .expressions
            .iter()
            .filter(|e| e.kind == ExpressionKind::Validation)
            .cloned()
            .collect(),
        })
      })
      .collect();
    Self { fields }
  }

  pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldDescriptor)> {
    self.fields.iter().map(|(k, d)| (k.as_str(), d))
  }

  /// Validate raw submitted values (keyed by safe qid) against this form.
  pub fn validate(
    &self,
    raw: &HashMap<String, serde_json::Value>,
    base_ctx: &LayeredContext,
  ) -> Result<ValidatedForm> {
    let mut out = ValidatedForm::default();

    // Pass 1: type, required, option membership, word limit.
    for (key, field) in &self.fields {
      let Some(value) = raw.get(key).filter(|v| !v.is_null()) else {
        if field.required {
          out.errors.push(FieldError {
            field:   key.clone(),
            message: "Enter an answer".into(),
          });
        }
        continue;
      };
      let answer = match Answer::from_json(field.data_type, value) {
        Ok(answer) => answer,
        Err(_) => {
          out.errors.push(FieldError {
            field:   key.clone(),
            message: "Enter a valid answer".into(),
          });
          continue;
        }
      };
      if let Some(error) = check_field(field, &answer) {
        out.errors.push(FieldError {
          field:   key.clone(),
          message: error,
        });
        continue;
      }
      out.answers.insert(field.question_id, answer);
    }

    // Pass 2: managed validators, with the parsed page data overlaid so a
    // validator can read answers submitted alongside it.
    let mut form_layer = ContextLayer::new();
    for (key, field) in &self.fields {
      if let Some(answer) = out.answers.get(&field.question_id) {
        form_layer.insert(key.clone(), answer.to_value());
      }
    }
    let mut ctx = base_ctx.clone();
    ctx.set_form_layer(form_layer);

    for (key, field) in &self.fields {
      if !out.answers.contains_key(&field.question_id) {
        continue;
      }
      for validator in &field.validators {
        let managed = validator.managed()?;
        let statement = managed.statement();
        match formwork_expr::evaluate(&statement, &ctx) {
          Ok(true) => {}
          Ok(false) => out.errors.push(FieldError {
            field:   key.clone(),
            message: managed.message(),
          }),
          // A comparison question with no answer yet cannot fail the field.
          Err(formwork_expr::Error::UndefinedVariable(name)) => {
            tracing::warn!(
              name = %name,
              statement = %statement,
              "validator references an unanswered question, skipping"
            );
          }
          Err(e) => return Err(e.into()),
        }
      }
    }

    Ok(out)
  }
}

fn check_field(field: &FieldDescriptor, answer: &Answer) -> Option<String> {
  match answer {
    Answer::Text(text) => {
      if text.trim().is_empty() {
        return Some("Enter an answer".into());
      }
      if let Some(limit) = field.word_limit {
        let words = text.split_whitespace().count();
        if words > limit as usize {
          return Some(format!("The answer must be {limit} words or fewer"));
        }
      }
      None
    }
    Answer::SingleChoice(key) => {
      if field.options.iter().any(|k| k == key) {
        None
      } else {
        Some("Select a valid option".into())
      }
    }
    Answer::MultipleChoice(keys) => {
      if keys.is_empty() {
        return Some("Select at least one option".into());
      }
      if keys.iter().all(|key| field.options.iter().any(|k| k == key)) {
        None
      } else {
        Some("Select a valid option".into())
      }
    }
    _ => None,
  }
}
