//! Questions, groups, and their presentation metadata.
//!
//! A component is the tagged union stored in a form: either a question or a
//! group of further components. Ordering is a dense 0-based integer within
//! the parent; names and slugs are unique within their scope (enforced by
//! the store).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::expression::Expression;

/// How deep groups may nest below a form. The observed production default.
pub const MAX_GROUP_DEPTH: usize = 1;

// ─── Data types ──────────────────────────────────────────────────────────────

/// The answer type a question collects.
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
pub enum QuestionDataType {
  TextSingleLine,
  TextMultiLine,
  Email,
  Url,
  Integer,
  YesNo,
  Radios,
  Checkboxes,
  Date,
}

impl QuestionDataType {
  /// Only choice-based questions carry a data source.
  pub fn has_data_source(self) -> bool {
    matches!(self, Self::Radios | Self::Checkboxes)
  }
}

// ─── Presentation ────────────────────────────────────────────────────────────

/// Widget-level options the rendering layer consumes. The core only stores
/// and round-trips these.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PresentationOptions {
  pub word_limit:   Option<u32>,
  pub prefix:       Option<String>,
  pub suffix:       Option<String>,
  /// Offer a free-text "other" option on choice questions.
  pub other_option: bool,
}

// ─── Data source ─────────────────────────────────────────────────────────────

/// One selectable option of a RADIOS/CHECKBOXES question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSourceItem {
  pub id:    Uuid,
  /// Slug, unique within the data source; the stored answer value.
  pub key:   String,
  pub label: String,
}

/// The ordered option set of a choice question (1:1 with the question).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataSource {
  pub items: Vec<DataSourceItem>,
}

impl DataSource {
  pub fn item_by_key(&self, key: &str) -> Option<&DataSourceItem> {
    self.items.iter().find(|item| item.key == key)
  }

  pub fn keys(&self) -> impl Iterator<Item = &str> {
    self.items.iter().map(|item| item.key.as_str())
  }
}

// ─── Question ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
  pub id:           Uuid,
  /// Stable short identifier shown in the builder and used in references.
  pub name:         String,
  pub slug:         String,
  /// Page heading; may contain `((...))` interpolation references.
  pub text:         String,
  pub hint:         Option<String>,
  pub data_type:    QuestionDataType,
  pub presentation: PresentationOptions,
  pub data_source:  Option<DataSource>,
  pub expressions:  Vec<Expression>,
  /// Repeatable-entry ("add another") flag.
  pub add_another:  bool,
  pub order:        u32,
}

impl Question {
  /// The identifier-safe rendering of the question's UUID used in
  /// expression source and interpolation spans.
  pub fn safe_qid(&self) -> String { safe_qid(self.id) }
}

/// `q_<32 hex chars>` — stable, identifier-safe rendering of a question id.
pub fn safe_qid(id: Uuid) -> String { format!("q_{}", id.simple()) }

/// Reverse of [`safe_qid`]. Returns `None` for anything else.
pub fn parse_safe_qid(name: &str) -> Option<Uuid> {
  let hex = name.strip_prefix("q_")?;
  Uuid::try_parse(hex).ok()
}

// ─── Group ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
  pub id:          Uuid,
  pub name:        String,
  pub slug:        String,
  pub text:        String,
  pub guidance_heading: Option<String>,
  /// May contain `((...))` interpolation references.
  pub guidance_body:    Option<String>,
  /// Render all direct child questions on one page.
  pub show_questions_on_the_same_page: bool,
  pub add_another: bool,
  pub expressions: Vec<Expression>,
  pub components:  Vec<Component>,
  pub order:       u32,
}

impl Group {
  /// Direct child questions, in order.
  pub fn questions(&self) -> impl Iterator<Item = &Question> {
    self.components.iter().filter_map(Component::as_question)
  }

  pub fn contains_group(&self) -> bool {
    self
      .components
      .iter()
      .any(|c| matches!(c, Component::Group(_)))
  }

  /// True if this group or anything below it is repeatable.
  pub fn contains_add_another(&self) -> bool {
    self.components.iter().any(|c| match c {
      Component::Question(q) => q.add_another,
      Component::Group(g) => g.add_another || g.contains_add_another(),
    })
  }
}

// ─── Component ───────────────────────────────────────────────────────────────

/// The tagged union a form is composed of.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Component {
  Question(Question),
  Group(Group),
}

impl Component {
  pub fn id(&self) -> Uuid {
    match self {
      Self::Question(q) => q.id,
      Self::Group(g) => g.id,
    }
  }

  pub fn name(&self) -> &str {
    match self {
      Self::Question(q) => &q.name,
      Self::Group(g) => &g.name,
    }
  }

  pub fn order(&self) -> u32 {
    match self {
      Self::Question(q) => q.order,
      Self::Group(g) => g.order,
    }
  }

  pub fn order_mut(&mut self) -> &mut u32 {
    match self {
      Self::Question(q) => &mut q.order,
      Self::Group(g) => &mut g.order,
    }
  }

  pub fn add_another(&self) -> bool {
    match self {
      Self::Question(q) => q.add_another,
      Self::Group(g) => g.add_another,
    }
  }

  pub fn expressions(&self) -> &[Expression] {
    match self {
      Self::Question(q) => &q.expressions,
      Self::Group(g) => &g.expressions,
    }
  }

  pub fn as_question(&self) -> Option<&Question> {
    match self {
      Self::Question(q) => Some(q),
      Self::Group(_) => None,
    }
  }

  pub fn as_group(&self) -> Option<&Group> {
    match self {
      Self::Group(g) => Some(g),
      Self::Question(_) => None,
    }
  }

  /// Interpolatable free-text fields, with their field names for error
  /// reporting.
  pub fn interpolatable_fields(&self) -> Vec<(&'static str, &str)> {
    let mut fields = Vec::new();
    match self {
      Self::Question(q) => {
        fields.push(("text", q.text.as_str()));
        if let Some(hint) = &q.hint {
          fields.push(("hint", hint.as_str()));
        }
      }
      Self::Group(g) => {
        fields.push(("text", g.text.as_str()));
        if let Some(body) = &g.guidance_body {
          fields.push(("guidance_body", body.as_str()));
        }
      }
    }
    fields
  }
}
