//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings, UUIDs hyphenated lowercase strings,
//! structured payloads (presentation, expression context, submission data)
//! compact JSON. Enum columns store the snake_case strum rendering.

use chrono::{DateTime, Utc};
use formwork_core::{
  component::{
    Component, DataSource, DataSourceItem, PresentationOptions, Question,
    QuestionDataType,
  },
  expression::{Expression, ExpressionKind},
  managed::ManagedExpressionName,
  submission::{EventKey, Submission, SubmissionEvent, SubmissionMode},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(e.to_string()))
}

/// Parse a strum-rendered enum column.
pub fn decode_enum<T: std::str::FromStr>(column: &str, s: &str) -> Result<T> {
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown {column}: {s:?}")))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `components` row. Assembly into the
/// tree (attaching children, items, and expressions) happens in the store.
pub struct RawComponent {
  pub id:               String,
  pub parent_id:        Option<String>,
  pub kind:             String,
  pub name:             String,
  pub slug:             String,
  pub text:             String,
  pub hint:             Option<String>,
  pub data_type:        Option<String>,
  pub presentation:     String,
  pub guidance_heading: Option<String>,
  pub guidance_body:    Option<String>,
  pub same_page:        bool,
  pub add_another:      bool,
  pub order:            i64,
}

impl RawComponent {
  pub fn into_component(
    self,
    items: Vec<DataSourceItem>,
    expressions: Vec<Expression>,
    children: Vec<Component>,
  ) -> Result<Component> {
    let id = decode_uuid(&self.id)?;
    let order = self.order as u32;
    match self.kind.as_str() {
      "question" => {
        let data_type: QuestionDataType = decode_enum(
          "data_type",
          self.data_type.as_deref().unwrap_or_default(),
        )?;
        let presentation: PresentationOptions =
          serde_json::from_str(&self.presentation)?;
        let data_source = if data_type.has_data_source() {
          Some(DataSource { items })
        } else {
          None
        };
        Ok(Component::Question(Question {
          id,
          name: self.name,
          slug: self.slug,
          text: self.text,
          hint: self.hint,
          data_type,
          presentation,
          data_source,
          expressions,
          add_another: self.add_another,
          order,
        }))
      }
      "group" => Ok(Component::Group(formwork_core::component::Group {
        id,
        name: self.name,
        slug: self.slug,
        text: self.text,
        guidance_heading: self.guidance_heading,
        guidance_body: self.guidance_body,
        show_questions_on_the_same_page: self.same_page,
        add_another: self.add_another,
        expressions,
        components: children,
        order,
      })),
      other => Err(Error::Decode(format!("unknown component type: {other:?}"))),
    }
  }
}

/// Raw strings read directly from an `expressions` row.
pub struct RawExpression {
  pub id:           String,
  pub component_id: String,
  pub kind:         String,
  pub managed_name: Option<String>,
  pub context:      String,
  pub statement:    Option<String>,
}

impl RawExpression {
  pub fn into_expression(self) -> Result<Expression> {
    let kind: ExpressionKind = decode_enum("expression kind", &self.kind)?;
    let managed_name: Option<ManagedExpressionName> = self
      .managed_name
      .as_deref()
      .map(|s| decode_enum("managed name", s))
      .transpose()?;
    Ok(Expression {
      id: decode_uuid(&self.id)?,
      kind,
      managed_name,
      context: serde_json::from_str(&self.context)?,
      statement: self.statement,
    })
  }
}

/// Raw strings read directly from a `submissions` row.
pub struct RawSubmission {
  pub id:                 String,
  pub collection_id:      String,
  pub collection_version: i64,
  pub mode:               String,
  pub created_by:         String,
  pub created_at:         String,
  pub data:               String,
}

impl RawSubmission {
  pub fn into_submission(
    self,
    events: Vec<SubmissionEvent>,
  ) -> Result<Submission> {
    let mode: SubmissionMode = decode_enum("submission mode", &self.mode)?;
    let data: serde_json::Map<String, serde_json::Value> =
      serde_json::from_str(&self.data)?;
    Ok(Submission {
      id: decode_uuid(&self.id)?,
      collection_id: decode_uuid(&self.collection_id)?,
      collection_version: self.collection_version as u32,
      mode,
      created_by: self.created_by,
      created_at: decode_dt(&self.created_at)?,
      data,
      events,
    })
  }
}

/// Raw strings read directly from a `submission_events` row.
pub struct RawEvent {
  pub id:         String,
  pub key:        String,
  pub created_by: String,
  pub form_id:    Option<String>,
  pub created_at: String,
}

impl RawEvent {
  pub fn into_event(self) -> Result<SubmissionEvent> {
    Ok(SubmissionEvent {
      id:         decode_uuid(&self.id)?,
      key:        decode_enum("event key", &self.key)?,
      created_by: self.created_by,
      form_id:    self.form_id.as_deref().map(decode_uuid).transpose()?,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}
