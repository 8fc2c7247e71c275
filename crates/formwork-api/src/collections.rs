//! Handlers for `/collections` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/collections` | Body: `{"name":"Apply for a grant"}` |
//! | `GET`  | `/collections/:id` | Optional `?version=N`, default latest |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use formwork_core::collection::Collection;
use formwork_store_sqlite::SqliteStore;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub name: String,
}

/// `POST /collections` — body: `{"name":"..."}`
pub async fn create(
  State(store): State<SqliteStore>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError> {
  let collection = store.create_collection(&body.name).await?;
  Ok((StatusCode::CREATED, Json(collection)))
}

#[derive(Debug, Deserialize)]
pub struct GetParams {
  pub version: Option<u32>,
}

/// `GET /collections/:id[?version=N]`
pub async fn get_one(
  State(store): State<SqliteStore>,
  Path(id): Path<Uuid>,
  Query(params): Query<GetParams>,
) -> Result<Json<Collection>, ApiError> {
  Ok(Json(store.get_collection(id, params.version).await?))
}
