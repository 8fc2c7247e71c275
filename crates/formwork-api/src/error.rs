//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use formwork_core::error::flash_context;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// A domain-rule violation; mapped to 409/422 with a flash payload
  /// where the builder UI shows one.
  #[error(transparent)]
  Domain(#[from] formwork_core::Error),

  #[error("store error: {0}")]
  Store(formwork_store_sqlite::Error),
}

impl From<formwork_store_sqlite::Error> for ApiError {
  fn from(e: formwork_store_sqlite::Error) -> Self {
    use formwork_store_sqlite::Error as StoreError;
    match e {
      StoreError::Core(core) => Self::Domain(core),
      StoreError::CollectionNotFound(id) => {
        Self::NotFound(format!("collection {id} not found"))
      }
      StoreError::SubmissionNotFound(id) => {
        Self::NotFound(format!("submission {id} not found"))
      }
      StoreError::CannotMove(id) => {
        Self::BadRequest(format!("component {id} cannot move further"))
      }
      other => Self::Store(other),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    match self {
      Self::NotFound(m) => {
        (StatusCode::NOT_FOUND, Json(json!({ "error": m }))).into_response()
      }
      Self::BadRequest(m) => {
        (StatusCode::BAD_REQUEST, Json(json!({ "error": m }))).into_response()
      }
      Self::Domain(e) => domain_response(e),
      Self::Store(e) => (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": e.to_string() })),
      )
        .into_response(),
    }
  }
}

fn domain_response(e: formwork_core::Error) -> Response {
  use formwork_core::Error as E;
  let status = match &e {
    E::DuplicateValue { .. } => StatusCode::CONFLICT,
    E::ComponentNotFound(_) | E::FormNotFound(_) => StatusCode::NOT_FOUND,
    E::Expression(_) | E::Serialization(_) => {
      StatusCode::INTERNAL_SERVER_ERROR
    }
    _ => StatusCode::UNPROCESSABLE_ENTITY,
  };
  let flash = flash_context(&e);
  (status, Json(json!({ "error": e.to_string(), "flash": flash })))
    .into_response()
}
