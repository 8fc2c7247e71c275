//! Submission-side runtime: the submission state engine, the dynamic
//! question form, page routing, and the export projection.
//!
//! Everything here operates on a hydrated [`formwork_core::collection::
//! Collection`] plus a [`formwork_core::submission::Submission`]; storage
//! hydrates, this crate reasons. Statuses are always derived, never stored.

pub mod cache;
pub mod export;
pub mod form;
pub mod helper;
pub mod runner;

pub use formwork_core::{Error, Result};
pub use helper::SubmissionHelper;
pub use runner::{FormRunner, PageState, Source, UrlMap};
