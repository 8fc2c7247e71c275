//! Handlers for `/submissions` endpoints — the form-filling surface.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/submissions` | Start a submission against a collection |
//! | `GET`  | `/submissions/:id` | Tasklist with derived statuses |
//! | `GET`  | `/submissions/:id/forms/:form_id/questions/:question_id` | Page payload |
//! | `POST` | `/submissions/:id/questions/:question_id` | Record an answer |
//! | `POST` | `/submissions/:id/forms/:form_id/complete` | Mark complete / reopen |
//! | `POST` | `/submissions/:id/submit` | Final submit (idempotent) |
//! | `GET`  | `/submissions/:id/export` | Flat answer rows |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use formwork_core::{
  answer::Answer,
  component::QuestionDataType,
  submission::{FormStatus, SubmissionMode, SubmissionStatus},
};
use formwork_runner::{SubmissionHelper, export::ExportRow};
use formwork_store_sqlite::{NewSubmission, SqliteStore};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

/// Load a submission and its pinned collection version into a helper.
async fn load_helper(
  store: &SqliteStore,
  submission_id: Uuid,
) -> Result<SubmissionHelper, ApiError> {
  let submission = store
    .get_submission(submission_id)
    .await?
    .ok_or_else(|| {
      ApiError::NotFound(format!("submission {submission_id} not found"))
    })?;
  let collection = store
    .get_collection(
      submission.collection_id,
      Some(submission.collection_version),
    )
    .await?;
  Ok(SubmissionHelper::new(collection, submission)?)
}

// ─── Create ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub collection_id: Uuid,
  pub mode:          SubmissionMode,
  pub created_by:    String,
}

/// `POST /submissions` — pins the collection's latest version.
pub async fn create(
  State(store): State<SqliteStore>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError> {
  let collection = store.get_collection(body.collection_id, None).await?;
  let submission = store
    .create_submission(NewSubmission {
      collection_id:      collection.id,
      collection_version: collection.version,
      mode:               body.mode,
      created_by:         body.created_by,
    })
    .await?;
  Ok((StatusCode::CREATED, Json(submission)))
}

// ─── Tasklist ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct TasklistForm {
  pub form_id: Uuid,
  pub title:   String,
  pub status:  FormStatus,
}

#[derive(Debug, Serialize)]
pub struct Tasklist {
  pub submission_id: Uuid,
  pub status:        SubmissionStatus,
  pub forms:         Vec<TasklistForm>,
}

/// `GET /submissions/:id` — per-form and overall derived status.
pub async fn tasklist(
  State(store): State<SqliteStore>,
  Path(id): Path<Uuid>,
) -> Result<Json<Tasklist>, ApiError> {
  let mut helper = load_helper(&store, id).await?;
  let form_meta: Vec<(Uuid, String)> = helper
    .collection()
    .forms()
    .map(|f| (f.id, f.title.clone()))
    .collect();
  let mut forms = Vec::with_capacity(form_meta.len());
  for (form_id, title) in form_meta {
    forms.push(TasklistForm {
      form_id,
      title,
      status: helper.form_status(form_id)?,
    });
  }
  Ok(Json(Tasklist {
    submission_id: id,
    status: helper.status()?,
    forms,
  }))
}

// ─── Question page ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct OptionItem {
  pub key:   String,
  pub label: String,
}

#[derive(Debug, Serialize)]
pub struct QuestionPage {
  pub question_id:       Uuid,
  /// Display text with `((...))` spans interpolated against answers.
  pub text:              String,
  pub hint:              Option<String>,
  pub data_type:         QuestionDataType,
  pub options:           Vec<OptionItem>,
  pub answer:            Option<serde_json::Value>,
  pub next_question:     Option<Uuid>,
  pub previous_question: Option<Uuid>,
}

/// `GET /submissions/:id/forms/:form_id/questions/:question_id`
pub async fn question_page(
  State(store): State<SqliteStore>,
  Path((id, form_id, question_id)): Path<(Uuid, Uuid, Uuid)>,
) -> Result<Json<QuestionPage>, ApiError> {
  let mut helper = load_helper(&store, id).await?;
  let question = helper
    .collection()
    .question_by_id(question_id)
    .ok_or_else(|| {
      ApiError::NotFound(format!("question {question_id} not found"))
    })?;
  let raw_text = question.text.clone();
  let hint = question.hint.clone();
  let data_type = question.data_type;
  let options = question
    .data_source
    .as_ref()
    .map(|ds| {
      ds.items
        .iter()
        .map(|item| OptionItem {
          key:   item.key.clone(),
          label: item.label.clone(),
        })
        .collect()
    })
    .unwrap_or_default();

  let text = helper.interpolate(&raw_text)?;
  let answer = helper
    .answer_for_question(question_id)?
    .map(|a| a.to_json());
  let next_question = helper.get_next_question(form_id, question_id)?;
  let previous_question = helper.get_previous_question(form_id, question_id)?;

  Ok(Json(QuestionPage {
    question_id,
    text,
    hint,
    data_type,
    options,
    answer,
    next_question,
    previous_question,
  }))
}

// ─── Answers ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AnswerBody {
  pub value: serde_json::Value,
}

/// `POST /submissions/:id/questions/:question_id` — body: `{"value":...}`
pub async fn post_answer(
  State(store): State<SqliteStore>,
  Path((id, question_id)): Path<(Uuid, Uuid)>,
  Json(body): Json<AnswerBody>,
) -> Result<StatusCode, ApiError> {
  let mut helper = load_helper(&store, id).await?;
  let data_type = helper
    .collection()
    .question_by_id(question_id)
    .ok_or_else(|| {
      ApiError::NotFound(format!("question {question_id} not found"))
    })?
    .data_type;
  let answer = Answer::from_json(data_type, &body.value)?;
  helper.submit_answer(question_id, answer)?;
  store.save_submission(helper.submission()).await?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Completion and submit ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CompleteBody {
  pub completed: bool,
  pub user:      String,
}

/// `POST /submissions/:id/forms/:form_id/complete`
pub async fn toggle_complete(
  State(store): State<SqliteStore>,
  Path((id, form_id)): Path<(Uuid, Uuid)>,
  Json(body): Json<CompleteBody>,
) -> Result<StatusCode, ApiError> {
  let mut helper = load_helper(&store, id).await?;
  helper.toggle_form_completed(form_id, &body.user, body.completed)?;
  store.save_submission(helper.submission()).await?;
  Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct SubmitBody {
  pub user: String,
}

/// `POST /submissions/:id/submit`
pub async fn submit(
  State(store): State<SqliteStore>,
  Path(id): Path<Uuid>,
  Json(body): Json<SubmitBody>,
) -> Result<StatusCode, ApiError> {
  let mut helper = load_helper(&store, id).await?;
  helper.submit(&body.user)?;
  store.save_submission(helper.submission()).await?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Export ──────────────────────────────────────────────────────────────────

/// `GET /submissions/:id/export` — one row per question the respondent
/// could have seen, with `not_asked` / `not_answered` sentinels.
pub async fn export(
  State(store): State<SqliteStore>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<ExportRow>>, ApiError> {
  let mut helper = load_helper(&store, id).await?;
  Ok(Json(helper.export_rows()?))
}
