//! SQLite persistence for formwork collections and submissions.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime. Every builder write is one
//! transaction: the write is applied, the affected tree is re-hydrated and
//! re-validated inside that transaction, and any failure rolls the whole
//! thing back, reference rows included.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::{NewGroup, NewQuestion, NewSubmission, SqliteStore};

#[cfg(test)]
mod tests;
