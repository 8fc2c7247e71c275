//! JSON HTTP API for formwork.
//!
//! Exposes an axum [`Router`] backed by a [`SqliteStore`]. Auth, TLS, and
//! transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", formwork_api::api_router(store.clone()))
//! ```

pub mod collections;
pub mod error;
pub mod submissions;

use std::path::PathBuf;

use axum::{
  Router,
  routing::{get, post},
};
use formwork_store_sqlite::SqliteStore;
use serde::Deserialize;

pub use error::ApiError;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `FORMWORK_*` environment variables.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router(store: SqliteStore) -> Router<()> {
  Router::new()
    // Collections
    .route("/collections", post(collections::create))
    .route("/collections/{id}", get(collections::get_one))
    // Submissions
    .route("/submissions", post(submissions::create))
    .route("/submissions/{id}", get(submissions::tasklist))
    .route(
      "/submissions/{id}/forms/{form_id}/questions/{question_id}",
      get(submissions::question_page),
    )
    .route(
      "/submissions/{id}/questions/{question_id}",
      post(submissions::post_answer),
    )
    .route(
      "/submissions/{id}/forms/{form_id}/complete",
      post(submissions::toggle_complete),
    )
    .route("/submissions/{id}/submit", post(submissions::submit))
    .route("/submissions/{id}/export", get(submissions::export))
    .with_state(store)
}

#[cfg(test)]
mod tests {
  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use formwork_store_sqlite::SqliteStore;
  use tower::ServiceExt as _;

  use super::*;

  async fn oneshot_json(
    store: SqliteStore,
    method: &str,
    uri: &str,
    body: &str,
  ) -> (StatusCode, serde_json::Value) {
    let req = Request::builder()
      .method(method)
      .uri(uri)
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(body.to_string()))
      .unwrap();
    let resp = api_router(store).oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
      .await
      .unwrap();
    let json = if bytes.is_empty() {
      serde_json::Value::Null
    } else {
      serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
  }

  #[tokio::test]
  async fn create_and_fetch_collection() {
    let store = SqliteStore::open_in_memory().await.unwrap();

    let (status, created) = oneshot_json(
      store.clone(),
      "POST",
      "/collections",
      r#"{"name":"Apply for a grant"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["name"], "Apply for a grant");

    let id = created["id"].as_str().unwrap();
    let (status, fetched) =
      oneshot_json(store, "GET", &format!("/collections/{id}"), "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["version"], 1);
  }

  #[tokio::test]
  async fn duplicate_collection_returns_409() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let body = r#"{"name":"Apply for a grant"}"#;
    oneshot_json(store.clone(), "POST", "/collections", body).await;
    let (status, payload) =
      oneshot_json(store, "POST", "/collections", body).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(payload["error"].as_str().unwrap().contains("already in use"));
  }

  #[tokio::test]
  async fn missing_submission_returns_404() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let id = uuid::Uuid::new_v4();
    let (status, _) =
      oneshot_json(store, "GET", &format!("/submissions/{id}"), "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn submission_lifecycle_over_http() {
    let store = SqliteStore::open_in_memory().await.unwrap();

    let (_, collection) = oneshot_json(
      store.clone(),
      "POST",
      "/collections",
      r#"{"name":"Apply for a grant"}"#,
    )
    .await;
    let collection_id = collection["id"].as_str().unwrap().to_string();
    let section_id = collection["sections"][0]["id"]
      .as_str()
      .unwrap()
      .parse()
      .unwrap();
    let form_id = store
      .create_form(section_id, "About you", "about-you")
      .await
      .unwrap();
    let question_id = store
      .create_question(
        form_id,
        None,
        formwork_store_sqlite::NewQuestion {
          name:         "Full name".to_string(),
          slug:         "full-name".to_string(),
          text:         "What is your full name?".to_string(),
          hint:         None,
          data_type:    formwork_core::component::QuestionDataType::TextSingleLine,
          presentation: Default::default(),
          items:        Vec::new(),
          add_another:  false,
        },
      )
      .await
      .unwrap();

    let (status, submission) = oneshot_json(
      store.clone(),
      "POST",
      "/submissions",
      &format!(
        r#"{{"collection_id":"{collection_id}","mode":"test","created_by":"alice@example.com"}}"#
      ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let submission_id = submission["id"].as_str().unwrap().to_string();

    // Submitting before completing the form is rejected.
    let (status, _) = oneshot_json(
      store.clone(),
      "POST",
      &format!("/submissions/{submission_id}/submit"),
      r#"{"user":"alice@example.com"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = oneshot_json(
      store.clone(),
      "POST",
      &format!("/submissions/{submission_id}/questions/{question_id}"),
      r#"{"value":"Alice Liddell"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = oneshot_json(
      store.clone(),
      "POST",
      &format!("/submissions/{submission_id}/forms/{form_id}/complete"),
      r#"{"completed":true,"user":"alice@example.com"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = oneshot_json(
      store.clone(),
      "POST",
      &format!("/submissions/{submission_id}/submit"),
      r#"{"user":"alice@example.com"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, tasklist) = oneshot_json(
      store.clone(),
      "GET",
      &format!("/submissions/{submission_id}"),
      "",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tasklist["status"], "completed");

    let (status, rows) = oneshot_json(
      store,
      "GET",
      &format!("/submissions/{submission_id}/export"),
      "",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rows[0]["value"]["state"], "answered");
    assert_eq!(rows[0]["value"]["value"], "Alice Liddell");
  }
}
