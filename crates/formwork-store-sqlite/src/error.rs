//! Error type for `formwork-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] formwork_core::Error),

  #[error("database error: {0}")]
  Database(tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("decode error: {0}")]
  Decode(String),

  #[error("collection not found: {0}")]
  CollectionNotFound(uuid::Uuid),

  #[error("submission not found: {0}")]
  SubmissionNotFound(uuid::Uuid),

  /// A move with no sibling in that direction (already first/last).
  #[error("component {0} cannot move further in that direction")]
  CannotMove(uuid::Uuid),
}

impl Error {
  /// Unwrap domain errors smuggled through [`tokio_rusqlite::Error::Other`]
  /// so callers can match on [`formwork_core::Error`] variants directly.
  pub(crate) fn from_call(e: tokio_rusqlite::Error) -> Self {
    match e {
      tokio_rusqlite::Error::Other(boxed) => match boxed.downcast::<Error>() {
        Ok(own) => *own,
        Err(other) => match other.downcast::<formwork_core::Error>() {
          Ok(core) => Self::Core(*core),
          Err(other) => Self::Database(tokio_rusqlite::Error::Other(other)),
        },
      },
      other => Self::Database(other),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
