//! Submissions, their answer data blob, and the append-only event log.
//!
//! A submission pins a specific collection *version*. Its status is never
//! stored: it is derived from answers plus completion events at read time.
//! Marking a form incomplete removes the matching events rather than
//! appending a negation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

// ─── Enums ───────────────────────────────────────────────────────────────────

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
pub enum SubmissionMode {
  Test,
  Live,
}

/// Milestone keys recorded in the event log.
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
pub enum EventKey {
  FormCompleted,
  SubmissionSubmitted,
}

/// Derived status of a whole submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
  NotStarted,
  InProgress,
  Completed,
}

/// Derived status of one form within a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormStatus {
  NotStarted,
  InProgress,
  Completed,
}

// ─── Events ──────────────────────────────────────────────────────────────────

/// One append-only milestone record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionEvent {
  pub id:         Uuid,
  pub key:        EventKey,
  pub created_by: String,
  /// Set for form-scoped events, `None` for submission-level ones.
  pub form_id:    Option<Uuid>,
  pub created_at: DateTime<Utc>,
}

// ─── Submission ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
  pub id:                 Uuid,
  pub collection_id:      Uuid,
  pub collection_version: u32,
  pub mode:               SubmissionMode,
  pub created_by:         String,
  pub created_at:         DateTime<Utc>,
  /// Stringified question id → serialized answer; for repeatable
  /// containers, container id → ordered array of per-entry objects.
  pub data:               serde_json::Map<String, serde_json::Value>,
  pub events:             Vec<SubmissionEvent>,
}

impl Submission {
  pub fn new(
    collection_id: Uuid,
    collection_version: u32,
    mode: SubmissionMode,
    created_by: impl Into<String>,
  ) -> Self {
    Self {
      id: Uuid::new_v4(),
      collection_id,
      collection_version,
      mode,
      created_by: created_by.into(),
      created_at: Utc::now(),
      data: serde_json::Map::new(),
      events: Vec::new(),
    }
  }

  // ── Answer data ─────────────────────────────────────────────────────────

  pub fn answer_json(&self, question_id: Uuid) -> Option<&serde_json::Value> {
    self.data.get(&question_id.to_string())
  }

  pub fn set_answer(&mut self, question_id: Uuid, value: serde_json::Value) {
    self.data.insert(question_id.to_string(), value);
  }

  pub fn clear_answer(&mut self, question_id: Uuid) {
    self.data.remove(&question_id.to_string());
  }

  /// The per-entry answer objects of a repeatable container. Empty when no
  /// entries exist yet.
  pub fn add_another_entries(
    &self,
    container_id: Uuid,
  ) -> Vec<&serde_json::Map<String, serde_json::Value>> {
    self
      .data
      .get(&container_id.to_string())
      .and_then(|v| v.as_array())
      .map(|entries| entries.iter().filter_map(|e| e.as_object()).collect())
      .unwrap_or_default()
  }

  /// Write one field of one repeat entry, growing the array with empty
  /// entries if needed so the index exists.
  pub fn set_add_another_answer(
    &mut self,
    container_id: Uuid,
    index: usize,
    question_id: Uuid,
    value: serde_json::Value,
  ) {
    let entry_list = self
      .data
      .entry(container_id.to_string())
      .or_insert_with(|| serde_json::Value::Array(Vec::new()));
    let serde_json::Value::Array(entries) = entry_list else {
      *entry_list = serde_json::Value::Array(Vec::new());
      return self.set_add_another_answer(
        container_id,
        index,
        question_id,
        value,
      );
    };
    while entries.len() <= index {
      entries.push(serde_json::Value::Object(serde_json::Map::new()));
    }
    if let Some(entry) = entries[index].as_object_mut() {
      entry.insert(question_id.to_string(), value);
    }
  }

  /// Remove one repeat entry, splicing the array so later entries shift
  /// down. An out-of-range index is a caller error.
  pub fn remove_add_another_entry(
    &mut self,
    container_id: Uuid,
    index: usize,
  ) -> Result<()> {
    let entries = self
      .data
      .get_mut(&container_id.to_string())
      .and_then(|v| v.as_array_mut())
      .ok_or(Error::IndexOutOfRange { index, len: 0 })?;
    if index >= entries.len() {
      return Err(Error::IndexOutOfRange {
        index,
        len: entries.len(),
      });
    }
    entries.remove(index);
    Ok(())
  }

  // ── Events ──────────────────────────────────────────────────────────────

  pub fn has_event(&self, key: EventKey, form_id: Option<Uuid>) -> bool {
    self
      .events
      .iter()
      .any(|e| e.key == key && e.form_id == form_id)
  }

  pub fn is_submitted(&self) -> bool {
    self.has_event(EventKey::SubmissionSubmitted, None)
  }

  pub fn append_event(
    &mut self,
    key: EventKey,
    created_by: impl Into<String>,
    form_id: Option<Uuid>,
  ) {
    self.events.push(SubmissionEvent {
      id: Uuid::new_v4(),
      key,
      created_by: created_by.into(),
      form_id,
      created_at: Utc::now(),
    });
  }

  /// Clearing a milestone removes its events; nothing is ever rewritten.
  pub fn remove_events(&mut self, key: EventKey, form_id: Option<Uuid>) {
    self
      .events
      .retain(|e| !(e.key == key && e.form_id == form_id));
  }
}
