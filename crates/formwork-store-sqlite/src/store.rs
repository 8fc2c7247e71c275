//! [`SqliteStore`] — transactional persistence for collections and
//! submissions.
//!
//! Builder writes follow one shape: open a transaction, apply the write,
//! re-hydrate the collection inside the same transaction, run the domain
//! validators over the hydrated tree, recompute every reference row, commit.
//! Any validation failure propagates out of the `call` closure, the
//! transaction drops, and everything rolls back.
//!
//! Domain errors cross the [`tokio_rusqlite`] boundary boxed inside
//! [`tokio_rusqlite::Error::Other`] and are unwrapped again by
//! [`Error::from_call`], so callers match on [`formwork_core::Error`]
//! variants directly.

use std::{collections::HashMap, path::Path};

use formwork_core::{
  collection::{Collection, Form, Section},
  component::{
    Component, DataSourceItem, PresentationOptions, QuestionDataType,
  },
  expression::{Expression, ExpressionKind},
  managed::ManagedExpression,
  reference::{
    ComponentReference, check_add_another_allowed, check_component_swap,
    check_component_has_no_dependencies, check_data_source_items_not_referenced,
    check_form_swap, check_group_can_nest, check_group_same_page_display,
    check_section_swap, collect_all_references,
  },
  submission::{EventKey, Submission, SubmissionEvent, SubmissionMode},
};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    RawComponent, RawEvent, RawExpression, RawSubmission, decode_uuid,
    encode_dt, encode_uuid,
  },
  schema::SCHEMA,
};

type CallResult<T> = std::result::Result<T, tokio_rusqlite::Error>;

/// Box a domain error across the call boundary.
fn domain(e: formwork_core::Error) -> tokio_rusqlite::Error {
  tokio_rusqlite::Error::Other(Box::new(e))
}

/// Box a store error across the call boundary.
fn store_err(e: Error) -> tokio_rusqlite::Error {
  tokio_rusqlite::Error::Other(Box::new(e))
}

/// Map a UNIQUE violation to `DuplicateValue`; pass everything else through.
fn map_unique(
  e: rusqlite::Error,
  field: &str,
  value: &str,
) -> tokio_rusqlite::Error {
  let is_unique = matches!(
    &e,
    rusqlite::Error::SqliteFailure(err, Some(msg))
      if err.code == rusqlite::ErrorCode::ConstraintViolation
        && msg.contains("UNIQUE")
  );
  if is_unique {
    domain(formwork_core::Error::DuplicateValue {
      field: field.to_string(),
      value: value.to_string(),
    })
  } else {
    e.into()
  }
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// Builder input for creating or updating a question.
#[derive(Debug, Clone)]
pub struct NewQuestion {
  pub name:         String,
  pub slug:         String,
  pub text:         String,
  pub hint:         Option<String>,
  pub data_type:    QuestionDataType,
  pub presentation: PresentationOptions,
  /// `(key, label)` pairs for choice questions, in display order.
  pub items:        Vec<(String, String)>,
  pub add_another:  bool,
}

/// Builder input for creating or updating a group.
#[derive(Debug, Clone)]
pub struct NewGroup {
  pub name:             String,
  pub slug:             String,
  pub text:             String,
  pub guidance_heading: Option<String>,
  pub guidance_body:    Option<String>,
  pub same_page:        bool,
  pub add_another:      bool,
}

#[derive(Debug, Clone)]
pub struct NewSubmission {
  pub collection_id:      Uuid,
  pub collection_version: u32,
  pub mode:               SubmissionMode,
  pub created_by:         String,
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A formwork store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path)
      .await
      .map_err(Error::from_call)?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory()
      .await
      .map_err(Error::from_call)?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await
  }

  async fn call<T, F>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&mut rusqlite::Connection) -> CallResult<T> + Send + 'static,
    T: Send + 'static,
  {
    self.conn.call(f).await.map_err(Error::from_call)
  }

  // ── Collections ─────────────────────────────────────────────────────────

  /// Create a collection at version 1 with one default section.
  pub async fn create_collection(&self, name: &str) -> Result<Collection> {
    let name = name.to_string();
    self
      .call(move |conn| {
        let tx = conn.transaction()?;
        let collection_id = Uuid::new_v4();
        let id_str = encode_uuid(collection_id);
        tx.execute(
          "INSERT INTO collections (id, version, name) VALUES (?1, 1, ?2)",
          rusqlite::params![id_str, name],
        )
        .map_err(|e| map_unique(e, "name", &name))?;
        tx.execute(
          "INSERT INTO sections
             (id, collection_id, collection_version, title, slug, \"order\")
           VALUES (?1, ?2, 1, 'Tasks', 'tasks', 0)",
          rusqlite::params![encode_uuid(Uuid::new_v4()), id_str],
        )?;
        let collection = hydrate(&tx, &id_str, 1)?
          .ok_or_else(|| store_err(Error::CollectionNotFound(collection_id)))?;
        tx.commit()?;
        Ok(collection)
      })
      .await
  }

  /// Hydrate a collection; `version: None` means the highest version.
  pub async fn get_collection(
    &self,
    collection_id: Uuid,
    version: Option<u32>,
  ) -> Result<Collection> {
    let id_str = encode_uuid(collection_id);
    self
      .call(move |conn| {
        let version = match version {
          Some(v) => v,
          None => latest_version(conn, &id_str)?
            .ok_or_else(|| store_err(Error::CollectionNotFound(collection_id)))?,
        };
        hydrate(conn, &id_str, version)?
          .ok_or_else(|| store_err(Error::CollectionNotFound(collection_id)))
      })
      .await
  }

  pub async fn create_section(
    &self,
    collection_id: Uuid,
    version: u32,
    title: &str,
    slug: &str,
  ) -> Result<Uuid> {
    let id_str = encode_uuid(collection_id);
    let title = title.to_string();
    let slug = slug.to_string();
    self
      .call(move |conn| {
        let tx = conn.transaction()?;
        let section_id = Uuid::new_v4();
        let order: i64 = tx.query_row(
          "SELECT COALESCE(MAX(\"order\") + 1, 0) FROM sections
           WHERE collection_id = ?1 AND collection_version = ?2",
          rusqlite::params![id_str, version],
          |r| r.get(0),
        )?;
        tx.execute(
          "INSERT INTO sections
             (id, collection_id, collection_version, title, slug, \"order\")
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![
            encode_uuid(section_id),
            id_str,
            version,
            title,
            slug,
            order
          ],
        )
        .map_err(|e| map_unique(e, "slug", &slug))?;
        tx.commit()?;
        Ok(section_id)
      })
      .await
  }

  pub async fn create_form(
    &self,
    section_id: Uuid,
    title: &str,
    slug: &str,
  ) -> Result<Uuid> {
    let section_str = encode_uuid(section_id);
    let title = title.to_string();
    let slug = slug.to_string();
    self
      .call(move |conn| {
        let tx = conn.transaction()?;
        let form_id = Uuid::new_v4();
        let order: i64 = tx.query_row(
          "SELECT COALESCE(MAX(\"order\") + 1, 0) FROM forms
           WHERE section_id = ?1",
          rusqlite::params![section_str],
          |r| r.get(0),
        )?;
        tx.execute(
          "INSERT INTO forms (id, section_id, title, slug, \"order\")
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![
            encode_uuid(form_id),
            section_str,
            title,
            slug,
            order
          ],
        )
        .map_err(|e| map_unique(e, "slug", &slug))?;
        tx.commit()?;
        Ok(form_id)
      })
      .await
  }

  // ── Components ──────────────────────────────────────────────────────────

  pub async fn create_question(
    &self,
    form_id: Uuid,
    parent_group: Option<Uuid>,
    input: NewQuestion,
  ) -> Result<Uuid> {
    self
      .call(move |conn| {
        let tx = conn.transaction()?;
        let question_id = Uuid::new_v4();
        insert_component_row(
          &tx,
          question_id,
          form_id,
          parent_group,
          "question",
          &input.name,
          &input.slug,
          &input.text,
          input.hint.as_deref(),
          Some(input.data_type),
          &input.presentation,
          None,
          None,
          false,
          input.add_another,
        )?;
        replace_items(&tx, question_id, &input.items)?;

        let (collection_id, version) = collection_scope(&tx, question_id)?;
        let collection = hydrate_required(&tx, &collection_id, version)?;
        if input.add_another {
          check_add_another_allowed(&collection, question_id)
            .map_err(domain)?;
        }
        let refs = collect_all_references(&collection).map_err(domain)?;
        resync_references(&tx, &collection_id, version, &refs)?;
        tx.commit()?;
        Ok(question_id)
      })
      .await
  }

  pub async fn create_group(
    &self,
    form_id: Uuid,
    parent_group: Option<Uuid>,
    input: NewGroup,
  ) -> Result<Uuid> {
    self
      .call(move |conn| {
        let tx = conn.transaction()?;
        let group_id = Uuid::new_v4();
        insert_component_row(
          &tx,
          group_id,
          form_id,
          parent_group,
          "group",
          &input.name,
          &input.slug,
          &input.text,
          None,
          None,
          &PresentationOptions::default(),
          input.guidance_heading.as_deref(),
          input.guidance_body.as_deref(),
          input.same_page,
          input.add_another,
        )?;

        let (collection_id, version) = collection_scope(&tx, group_id)?;
        let collection = hydrate_required(&tx, &collection_id, version)?;
        check_group_can_nest(&collection, parent_group).map_err(domain)?;
        if input.add_another {
          check_add_another_allowed(&collection, group_id).map_err(domain)?;
        }
        let refs = collect_all_references(&collection).map_err(domain)?;
        resync_references(&tx, &collection_id, version, &refs)?;
        tx.commit()?;
        Ok(group_id)
      })
      .await
  }

  pub async fn update_question(
    &self,
    question_id: Uuid,
    input: NewQuestion,
  ) -> Result<()> {
    self
      .call(move |conn| {
        let tx = conn.transaction()?;
        let (collection_id, version) = collection_scope(&tx, question_id)?;

        // Option-removal guard runs against the pre-update tree so the
        // error can enumerate current dependents.
        let before = hydrate_required(&tx, &collection_id, version)?;
        let existing_keys: Vec<String> = before
          .question_by_id(question_id)
          .and_then(|q| q.data_source.as_ref())
          .map(|ds| ds.keys().map(str::to_string).collect())
          .unwrap_or_default();
        let removed: Vec<String> = existing_keys
          .into_iter()
          .filter(|k| !input.items.iter().any(|(key, _)| key == k))
          .collect();
        if !removed.is_empty() {
          check_data_source_items_not_referenced(&before, question_id, &removed)
            .map_err(domain)?;
        }

        let presentation = serde_json::to_string(&input.presentation)
          .map_err(|e| store_err(e.into()))?;
        tx.execute(
          "UPDATE components SET
             name = ?2, slug = ?3, text = ?4, hint = ?5, data_type = ?6,
             presentation = ?7, add_another = ?8
           WHERE id = ?1 AND type = 'question'",
          rusqlite::params![
            encode_uuid(question_id),
            input.name,
            input.slug,
            input.text,
            input.hint,
            input.data_type.to_string(),
            presentation,
            input.add_another,
          ],
        )
        .map_err(|e| map_unique(e, "name", &input.name))?;
        replace_items(&tx, question_id, &input.items)?;

        let collection = hydrate_required(&tx, &collection_id, version)?;
        if input.add_another {
          check_add_another_allowed(&collection, question_id)
            .map_err(domain)?;
        }
        let refs = collect_all_references(&collection).map_err(domain)?;
        resync_references(&tx, &collection_id, version, &refs)?;
        tx.commit()?;
        Ok(())
      })
      .await
  }

  pub async fn update_group(
    &self,
    group_id: Uuid,
    input: NewGroup,
  ) -> Result<()> {
    self
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "UPDATE components SET
             name = ?2, slug = ?3, text = ?4, guidance_heading = ?5,
             guidance_body = ?6, same_page = ?7, add_another = ?8
           WHERE id = ?1 AND type = 'group'",
          rusqlite::params![
            encode_uuid(group_id),
            input.name,
            input.slug,
            input.text,
            input.guidance_heading,
            input.guidance_body,
            input.same_page,
            input.add_another,
          ],
        )
        .map_err(|e| map_unique(e, "name", &input.name))?;

        let (collection_id, version) = collection_scope(&tx, group_id)?;
        let collection = hydrate_required(&tx, &collection_id, version)?;
        if input.same_page {
          check_group_same_page_display(&collection, group_id)
            .map_err(domain)?;
        }
        if input.add_another {
          check_add_another_allowed(&collection, group_id).map_err(domain)?;
        }
        let refs = collect_all_references(&collection).map_err(domain)?;
        resync_references(&tx, &collection_id, version, &refs)?;
        tx.commit()?;
        Ok(())
      })
      .await
  }

  /// Delete a component (and, for groups, everything below it). Blocked
  /// while anything else references it.
  pub async fn delete_component(&self, component_id: Uuid) -> Result<()> {
    self
      .call(move |conn| {
        let tx = conn.transaction()?;
        let (collection_id, version) = collection_scope(&tx, component_id)?;
        let collection = hydrate_required(&tx, &collection_id, version)?;
        check_component_has_no_dependencies(&collection, component_id)
          .map_err(domain)?;
        tx.execute(
          "DELETE FROM components WHERE id = ?1",
          rusqlite::params![encode_uuid(component_id)],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await
  }

  // ── Expressions ─────────────────────────────────────────────────────────

  pub async fn add_expression(
    &self,
    component_id: Uuid,
    kind: ExpressionKind,
    managed: ManagedExpression,
  ) -> Result<Uuid> {
    self
      .call(move |conn| {
        let tx = conn.transaction()?;
        let expression =
          Expression::new_managed(kind, &managed).map_err(domain)?;
        tx.execute(
          "INSERT INTO expressions
             (id, component_id, kind, managed_name, context, statement)
           VALUES (?1, ?2, ?3, ?4, ?5, NULL)",
          rusqlite::params![
            encode_uuid(expression.id),
            encode_uuid(component_id),
            expression.kind.to_string(),
            managed.name().to_string(),
            expression.context.to_string(),
          ],
        )?;

        let (collection_id, version) = collection_scope(&tx, component_id)?;
        let collection = hydrate_required(&tx, &collection_id, version)?;
        let refs = collect_all_references(&collection).map_err(domain)?;
        resync_references(&tx, &collection_id, version, &refs)?;
        tx.commit()?;
        Ok(expression.id)
      })
      .await
  }

  pub async fn remove_expression(&self, expression_id: Uuid) -> Result<()> {
    self
      .call(move |conn| {
        let tx = conn.transaction()?;
        let component_str: String = tx.query_row(
          "SELECT component_id FROM expressions WHERE id = ?1",
          rusqlite::params![encode_uuid(expression_id)],
          |r| r.get(0),
        )?;
        let component_id = decode_uuid(&component_str).map_err(store_err)?;
        tx.execute(
          "DELETE FROM expressions WHERE id = ?1",
          rusqlite::params![encode_uuid(expression_id)],
        )?;

        let (collection_id, version) = collection_scope(&tx, component_id)?;
        let collection = hydrate_required(&tx, &collection_id, version)?;
        let refs = collect_all_references(&collection).map_err(domain)?;
        resync_references(&tx, &collection_id, version, &refs)?;
        tx.commit()?;
        Ok(())
      })
      .await
  }

  // ── Reordering ──────────────────────────────────────────────────────────

  pub async fn move_component_up(&self, component_id: Uuid) -> Result<()> {
    self.move_component(component_id, -1).await
  }

  pub async fn move_component_down(&self, component_id: Uuid) -> Result<()> {
    self.move_component(component_id, 1).await
  }

  async fn move_component(
    &self,
    component_id: Uuid,
    direction: i64,
  ) -> Result<()> {
    self
      .call(move |conn| {
        let tx = conn.transaction()?;
        let id_str = encode_uuid(component_id);
        let (form_str, parent_str, order): (String, Option<String>, i64) = tx
          .query_row(
            "SELECT form_id, parent_id, \"order\" FROM components
             WHERE id = ?1",
            rusqlite::params![id_str],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
          )?;
        let sibling: Option<(String, i64)> = tx
          .query_row(
            "SELECT id, \"order\" FROM components
             WHERE form_id = ?1
               AND COALESCE(parent_id, '') = COALESCE(?2, '')
               AND \"order\" = ?3",
            rusqlite::params![form_str, parent_str, order + direction],
            |r| Ok((r.get(0)?, r.get(1)?)),
          )
          .optional()?;
        let (sibling_str, sibling_order) = sibling
          .ok_or_else(|| store_err(Error::CannotMove(component_id)))?;
        let sibling_id = decode_uuid(&sibling_str).map_err(store_err)?;

        let (collection_id, version) = collection_scope(&tx, component_id)?;
        let collection = hydrate_required(&tx, &collection_id, version)?;
        check_component_swap(&collection, component_id, sibling_id)
          .map_err(domain)?;

        swap_orders(&tx, "components", &id_str, order, &sibling_str,
          sibling_order)?;
        tx.commit()?;
        Ok(())
      })
      .await
  }

  pub async fn move_form_up(&self, form_id: Uuid) -> Result<()> {
    self.move_form(form_id, -1).await
  }

  pub async fn move_form_down(&self, form_id: Uuid) -> Result<()> {
    self.move_form(form_id, 1).await
  }

  async fn move_form(&self, form_id: Uuid, direction: i64) -> Result<()> {
    self
      .call(move |conn| {
        let tx = conn.transaction()?;
        let id_str = encode_uuid(form_id);
        let (section_str, order): (String, i64) = tx.query_row(
          "SELECT section_id, \"order\" FROM forms WHERE id = ?1",
          rusqlite::params![id_str],
          |r| Ok((r.get(0)?, r.get(1)?)),
        )?;
        let sibling: Option<(String, i64)> = tx
          .query_row(
            "SELECT id, \"order\" FROM forms
             WHERE section_id = ?1 AND \"order\" = ?2",
            rusqlite::params![section_str, order + direction],
            |r| Ok((r.get(0)?, r.get(1)?)),
          )
          .optional()?;
        let (sibling_str, sibling_order) =
          sibling.ok_or_else(|| store_err(Error::CannotMove(form_id)))?;
        let sibling_id = decode_uuid(&sibling_str).map_err(store_err)?;

        let (collection_id, version): (String, u32) = tx.query_row(
          "SELECT collection_id, collection_version FROM sections
           WHERE id = ?1",
          rusqlite::params![section_str],
          |r| Ok((r.get(0)?, r.get(1)?)),
        )?;
        let collection = hydrate_required(&tx, &collection_id, version)?;
        check_form_swap(&collection, form_id, sibling_id).map_err(domain)?;

        swap_orders(&tx, "forms", &id_str, order, &sibling_str,
          sibling_order)?;
        tx.commit()?;
        Ok(())
      })
      .await
  }

  pub async fn move_section_up(&self, section_id: Uuid) -> Result<()> {
    self.move_section(section_id, -1).await
  }

  pub async fn move_section_down(&self, section_id: Uuid) -> Result<()> {
    self.move_section(section_id, 1).await
  }

  async fn move_section(
    &self,
    section_id: Uuid,
    direction: i64,
  ) -> Result<()> {
    self
      .call(move |conn| {
        let tx = conn.transaction()?;
        let id_str = encode_uuid(section_id);
        let (collection_id, version, order): (String, u32, i64) = tx
          .query_row(
            "SELECT collection_id, collection_version, \"order\"
             FROM sections WHERE id = ?1",
            rusqlite::params![id_str],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
          )?;
        let sibling: Option<(String, i64)> = tx
          .query_row(
            "SELECT id, \"order\" FROM sections
             WHERE collection_id = ?1 AND collection_version = ?2
               AND \"order\" = ?3",
            rusqlite::params![collection_id, version, order + direction],
            |r| Ok((r.get(0)?, r.get(1)?)),
          )
          .optional()?;
        let (sibling_str, sibling_order) =
          sibling.ok_or_else(|| store_err(Error::CannotMove(section_id)))?;
        let sibling_id = decode_uuid(&sibling_str).map_err(store_err)?;

        let collection = hydrate_required(&tx, &collection_id, version)?;
        check_section_swap(&collection, section_id, sibling_id)
          .map_err(domain)?;

        swap_orders(&tx, "sections", &id_str, order, &sibling_str,
          sibling_order)?;
        tx.commit()?;
        Ok(())
      })
      .await
  }

  // ── Submissions ─────────────────────────────────────────────────────────

  pub async fn create_submission(
    &self,
    input: NewSubmission,
  ) -> Result<Submission> {
    let submission = Submission::new(
      input.collection_id,
      input.collection_version,
      input.mode,
      input.created_by,
    );
    let row = submission.clone();
    self
      .call(move |conn| {
        conn.execute(
          "INSERT INTO submissions
             (id, collection_id, collection_version, mode, created_by,
              created_at, data)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, '{}')",
          rusqlite::params![
            encode_uuid(row.id),
            encode_uuid(row.collection_id),
            row.collection_version,
            row.mode.to_string(),
            row.created_by,
            encode_dt(row.created_at),
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(submission)
  }

  pub async fn get_submission(&self, id: Uuid) -> Result<Option<Submission>> {
    let id_str = encode_uuid(id);
    self
      .call(move |conn| {
        let raw: Option<RawSubmission> = conn
          .query_row(
            "SELECT id, collection_id, collection_version, mode,
                    created_by, created_at, data
             FROM submissions WHERE id = ?1",
            rusqlite::params![id_str],
            |row| {
              Ok(RawSubmission {
                id:                 row.get(0)?,
                collection_id:      row.get(1)?,
                collection_version: row.get(2)?,
                mode:               row.get(3)?,
                created_by:         row.get(4)?,
                created_at:         row.get(5)?,
                data:               row.get(6)?,
              })
            },
          )
          .optional()?;
        let Some(raw) = raw else {
          return Ok(None);
        };

        let mut stmt = conn.prepare(
          "SELECT id, key, created_by, form_id, created_at
           FROM submission_events WHERE submission_id = ?1
           ORDER BY created_at",
        )?;
        let events = stmt
          .query_map(rusqlite::params![id_str], |row| {
            Ok(RawEvent {
              id:         row.get(0)?,
              key:        row.get(1)?,
              created_by: row.get(2)?,
              form_id:    row.get(3)?,
              created_at: row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?
          .into_iter()
          .map(RawEvent::into_event)
          .collect::<Result<Vec<_>>>()
          .map_err(store_err)?;

        Ok(Some(raw.into_submission(events).map_err(store_err)?))
      })
      .await
  }

  /// The submission write choke point: persist a helper-mutated submission
  /// (data blob and event diff) in one transaction.
  pub async fn save_submission(&self, submission: &Submission) -> Result<()> {
    let submission = submission.clone();
    self
      .call(move |conn| {
        let tx = conn.transaction()?;
        let id_str = encode_uuid(submission.id);
        let data = serde_json::Value::Object(submission.data.clone());
        let changed = tx.execute(
          "UPDATE submissions SET data = ?2 WHERE id = ?1",
          rusqlite::params![id_str, data.to_string()],
        )?;
        if changed == 0 {
          return Err(store_err(Error::SubmissionNotFound(submission.id)));
        }

        // Event rows are rewritten wholesale so in-memory removals (an
        // un-completed form) take effect; timestamps survive because they
        // ride in with each event.
        tx.execute(
          "DELETE FROM submission_events WHERE submission_id = ?1",
          rusqlite::params![id_str],
        )?;
        for event in &submission.events {
          insert_event(&tx, &id_str, event)?;
        }
        tx.commit()?;
        Ok(())
      })
      .await
  }

  /// Replace the answer data blob without touching events.
  pub async fn update_submission_data(
    &self,
    id: Uuid,
    data: &serde_json::Map<String, serde_json::Value>,
  ) -> Result<()> {
    let id_str = encode_uuid(id);
    let data = serde_json::Value::Object(data.clone()).to_string();
    self
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE submissions SET data = ?2 WHERE id = ?1",
          rusqlite::params![id_str, data],
        )?;
        if changed == 0 {
          return Err(store_err(Error::SubmissionNotFound(id)));
        }
        Ok(())
      })
      .await
  }

  pub async fn append_event(
    &self,
    submission_id: Uuid,
    event: &SubmissionEvent,
  ) -> Result<()> {
    let id_str = encode_uuid(submission_id);
    let event = event.clone();
    self
      .call(move |conn| {
        insert_event(conn, &id_str, &event)?;
        Ok(())
      })
      .await
  }

  pub async fn remove_form_completed_events(
    &self,
    submission_id: Uuid,
    form_id: Uuid,
  ) -> Result<()> {
    let id_str = encode_uuid(submission_id);
    let form_str = encode_uuid(form_id);
    let key = EventKey::FormCompleted.to_string();
    self
      .call(move |conn| {
        conn.execute(
          "DELETE FROM submission_events
           WHERE submission_id = ?1 AND key = ?2 AND form_id = ?3",
          rusqlite::params![id_str, key, form_str],
        )?;
        Ok(())
      })
      .await
  }
}

// ─── Row helpers ─────────────────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
fn insert_component_row(
  tx: &rusqlite::Transaction<'_>,
  id: Uuid,
  form_id: Uuid,
  parent: Option<Uuid>,
  kind: &str,
  name: &str,
  slug: &str,
  text: &str,
  hint: Option<&str>,
  data_type: Option<QuestionDataType>,
  presentation: &PresentationOptions,
  guidance_heading: Option<&str>,
  guidance_body: Option<&str>,
  same_page: bool,
  add_another: bool,
) -> CallResult<()> {
  let form_str = encode_uuid(form_id);
  let parent_str = parent.map(encode_uuid);
  let order: i64 = tx.query_row(
    "SELECT COALESCE(MAX(\"order\") + 1, 0) FROM components
     WHERE form_id = ?1 AND COALESCE(parent_id, '') = COALESCE(?2, '')",
    rusqlite::params![form_str, parent_str],
    |r| r.get(0),
  )?;
  let presentation =
    serde_json::to_string(presentation).map_err(|e| store_err(e.into()))?;
  tx.execute(
    "INSERT INTO components
       (id, form_id, parent_id, type, name, slug, text, hint, data_type,
        presentation, guidance_heading, guidance_body, same_page,
        add_another, \"order\")
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
    rusqlite::params![
      encode_uuid(id),
      form_str,
      parent_str,
      kind,
      name,
      slug,
      text,
      hint,
      data_type.map(|d| d.to_string()),
      presentation,
      guidance_heading,
      guidance_body,
      same_page,
      add_another,
      order,
    ],
  )
  .map_err(|e| map_unique(e, "name", name))?;
  Ok(())
}

/// Replace a question's data-source items wholesale.
fn replace_items(
  tx: &rusqlite::Transaction<'_>,
  question_id: Uuid,
  items: &[(String, String)],
) -> CallResult<()> {
  let id_str = encode_uuid(question_id);
  tx.execute(
    "DELETE FROM data_source_items WHERE component_id = ?1",
    rusqlite::params![id_str],
  )?;
  for (order, (key, label)) in items.iter().enumerate() {
    tx.execute(
      "INSERT INTO data_source_items (id, component_id, key, label, \"order\")
       VALUES (?1, ?2, ?3, ?4, ?5)",
      rusqlite::params![
        encode_uuid(Uuid::new_v4()),
        id_str,
        key,
        label,
        order as i64
      ],
    )
    .map_err(|e| map_unique(e, "key", key))?;
  }
  Ok(())
}

fn insert_event(
  conn: &rusqlite::Connection,
  submission_str: &str,
  event: &SubmissionEvent,
) -> CallResult<()> {
  conn.execute(
    "INSERT OR IGNORE INTO submission_events
       (id, submission_id, key, created_by, form_id, created_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    rusqlite::params![
      encode_uuid(event.id),
      submission_str,
      event.key.to_string(),
      event.created_by,
      event.form_id.map(encode_uuid),
      encode_dt(event.created_at),
    ],
  )?;
  Ok(())
}

/// Swap two sibling order values via a temporary ordinal. SQLite checks
/// UNIQUE per row and cannot defer it, so a direct two-row swap would trip
/// the sibling-order index mid-statement.
fn swap_orders(
  tx: &rusqlite::Transaction<'_>,
  table: &str,
  a_id: &str,
  a_order: i64,
  b_id: &str,
  b_order: i64,
) -> CallResult<()> {
  tx.execute(
    &format!("UPDATE {table} SET \"order\" = -1 WHERE id = ?1"),
    rusqlite::params![a_id],
  )?;
  tx.execute(
    &format!("UPDATE {table} SET \"order\" = ?2 WHERE id = ?1"),
    rusqlite::params![b_id, a_order],
  )?;
  tx.execute(
    &format!("UPDATE {table} SET \"order\" = ?2 WHERE id = ?1"),
    rusqlite::params![a_id, b_order],
  )?;
  Ok(())
}

// ─── Scope lookup ────────────────────────────────────────────────────────────

/// The `(collection_id, version)` owning a component.
fn collection_scope(
  tx: &rusqlite::Transaction<'_>,
  component_id: Uuid,
) -> CallResult<(String, u32)> {
  let result = tx
    .query_row(
      "SELECT s.collection_id, s.collection_version
       FROM components c
       JOIN forms f ON c.form_id = f.id
       JOIN sections s ON f.section_id = s.id
       WHERE c.id = ?1",
      rusqlite::params![encode_uuid(component_id)],
      |r| Ok((r.get(0)?, r.get(1)?)),
    )
    .optional()?;
  result.ok_or_else(|| {
    domain(formwork_core::Error::ComponentNotFound(component_id))
  })
}

fn latest_version(
  conn: &rusqlite::Connection,
  collection_str: &str,
) -> CallResult<Option<u32>> {
  let version: Option<u32> = conn.query_row(
    "SELECT MAX(version) FROM collections WHERE id = ?1",
    rusqlite::params![collection_str],
    |r| r.get(0),
  )?;
  Ok(version)
}

// ─── Reference sync ──────────────────────────────────────────────────────────

/// Delete-then-insert the whole reference index for a collection.
fn resync_references(
  tx: &rusqlite::Transaction<'_>,
  collection_str: &str,
  version: u32,
  references: &[ComponentReference],
) -> CallResult<()> {
  tx.execute(
    "DELETE FROM component_references WHERE component_id IN (
       SELECT c.id FROM components c
       JOIN forms f ON c.form_id = f.id
       JOIN sections s ON f.section_id = s.id
       WHERE s.collection_id = ?1 AND s.collection_version = ?2
     )",
    rusqlite::params![collection_str, version],
  )?;
  for reference in references {
    tx.execute(
      "INSERT INTO component_references
         (component_id, depends_on_component_id, expression_id,
          depends_on_data_source_item_id)
       VALUES (?1, ?2, ?3, ?4)",
      rusqlite::params![
        encode_uuid(reference.component_id),
        encode_uuid(reference.depends_on_component_id),
        reference.expression_id.map(encode_uuid),
        reference.depends_on_data_source_item_id.map(encode_uuid),
      ],
    )?;
  }
  Ok(())
}

// ─── Hydration ───────────────────────────────────────────────────────────────

fn hydrate_required(
  conn: &rusqlite::Connection,
  collection_str: &str,
  version: u32,
) -> CallResult<Collection> {
  hydrate(conn, collection_str, version)?.ok_or_else(|| {
    store_err(Error::Decode(format!(
      "collection {collection_str} v{version} vanished mid-transaction"
    )))
  })
}

/// Load a full collection tree: sections, forms, components (nested),
/// data-source items, and expressions, all in display order.
fn hydrate(
  conn: &rusqlite::Connection,
  collection_str: &str,
  version: u32,
) -> CallResult<Option<Collection>> {
  let name: Option<String> = conn
    .query_row(
      "SELECT name FROM collections WHERE id = ?1 AND version = ?2",
      rusqlite::params![collection_str, version],
      |r| r.get(0),
    )
    .optional()?;
  let Some(name) = name else {
    return Ok(None);
  };

  let mut stmt = conn.prepare(
    "SELECT id, title, slug, \"order\" FROM sections
     WHERE collection_id = ?1 AND collection_version = ?2
     ORDER BY \"order\"",
  )?;
  let raw_sections = stmt
    .query_map(rusqlite::params![collection_str, version], |row| {
      Ok((
        row.get::<_, String>(0)?,
        row.get::<_, String>(1)?,
        row.get::<_, String>(2)?,
        row.get::<_, i64>(3)?,
      ))
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  let mut sections = Vec::new();
  for (section_str, title, slug, order) in raw_sections {
    let mut stmt = conn.prepare(
      "SELECT id, title, slug, \"order\" FROM forms
       WHERE section_id = ?1 ORDER BY \"order\"",
    )?;
    let raw_forms = stmt
      .query_map(rusqlite::params![section_str], |row| {
        Ok((
          row.get::<_, String>(0)?,
          row.get::<_, String>(1)?,
          row.get::<_, String>(2)?,
          row.get::<_, i64>(3)?,
        ))
      })?
      .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut forms = Vec::new();
    for (form_str, form_title, form_slug, form_order) in raw_forms {
      let components = hydrate_components(conn, &form_str)?;
      forms.push(Form {
        id: decode_uuid(&form_str).map_err(store_err)?,
        title: form_title,
        slug: form_slug,
        order: form_order as u32,
        components,
      });
    }

    sections.push(Section {
      id: decode_uuid(&section_str).map_err(store_err)?,
      title,
      slug,
      order: order as u32,
      forms,
    });
  }

  Ok(Some(Collection {
    id: decode_uuid(collection_str).map_err(store_err)?,
    version,
    name,
    sections,
  }))
}

fn hydrate_components(
  conn: &rusqlite::Connection,
  form_str: &str,
) -> CallResult<Vec<Component>> {
  let mut stmt = conn.prepare(
    "SELECT id, parent_id, type, name, slug, text, hint, data_type,
            presentation, guidance_heading, guidance_body, same_page,
            add_another, \"order\"
     FROM components WHERE form_id = ?1 ORDER BY \"order\"",
  )?;
  let raws = stmt
    .query_map(rusqlite::params![form_str], |row| {
      Ok(RawComponent {
        id:               row.get(0)?,
        parent_id:        row.get(1)?,
        kind:             row.get(2)?,
        name:             row.get(3)?,
        slug:             row.get(4)?,
        text:             row.get(5)?,
        hint:             row.get(6)?,
        data_type:        row.get(7)?,
        presentation:     row.get(8)?,
        guidance_heading: row.get(9)?,
        guidance_body:    row.get(10)?,
        same_page:        row.get(11)?,
        add_another:      row.get(12)?,
        order:            row.get(13)?,
      })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  let mut items_by: HashMap<String, Vec<DataSourceItem>> = HashMap::new();
  let mut stmt = conn.prepare(
    "SELECT component_id, id, key, label FROM data_source_items
     WHERE component_id IN (SELECT id FROM components WHERE form_id = ?1)
     ORDER BY \"order\"",
  )?;
  let item_rows = stmt
    .query_map(rusqlite::params![form_str], |row| {
      Ok((
        row.get::<_, String>(0)?,
        row.get::<_, String>(1)?,
        row.get::<_, String>(2)?,
        row.get::<_, String>(3)?,
      ))
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  for (component_str, item_str, key, label) in item_rows {
    items_by.entry(component_str).or_default().push(DataSourceItem {
      id: decode_uuid(&item_str).map_err(store_err)?,
      key,
      label,
    });
  }

  let mut exprs_by: HashMap<String, Vec<Expression>> = HashMap::new();
  let mut stmt = conn.prepare(
    "SELECT id, component_id, kind, managed_name, context, statement
     FROM expressions
     WHERE component_id IN (SELECT id FROM components WHERE form_id = ?1)",
  )?;
  let expr_rows = stmt
    .query_map(rusqlite::params![form_str], |row| {
      Ok(RawExpression {
        id:           row.get(0)?,
        component_id: row.get(1)?,
        kind:         row.get(2)?,
        managed_name: row.get(3)?,
        context:      row.get(4)?,
        statement:    row.get(5)?,
      })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  for raw in expr_rows {
    let component_str = raw.component_id.clone();
    exprs_by
      .entry(component_str)
      .or_default()
      .push(raw.into_expression().map_err(store_err)?);
  }

  let mut by_parent: HashMap<Option<String>, Vec<RawComponent>> =
    HashMap::new();
  for raw in raws {
    by_parent.entry(raw.parent_id.clone()).or_default().push(raw);
  }
  assemble(None, &mut by_parent, &mut items_by, &mut exprs_by)
}

/// Recursively assemble the component tree under `parent`.
fn assemble(
  parent: Option<&str>,
  by_parent: &mut HashMap<Option<String>, Vec<RawComponent>>,
  items_by: &mut HashMap<String, Vec<DataSourceItem>>,
  exprs_by: &mut HashMap<String, Vec<Expression>>,
) -> CallResult<Vec<Component>> {
  let Some(mut raws) = by_parent.remove(&parent.map(str::to_string)) else {
    return Ok(Vec::new());
  };
  raws.sort_by_key(|r| r.order);
  let mut out = Vec::new();
  for raw in raws {
    let id = raw.id.clone();
    let children = assemble(Some(&id), by_parent, items_by, exprs_by)?;
    let items = items_by.remove(&id).unwrap_or_default();
    let expressions = exprs_by.remove(&id).unwrap_or_default();
    out.push(
      raw
        .into_component(items, expressions, children)
        .map_err(store_err)?,
    );
  }
  Ok(out)
}
