//! Core types and validation logic for the formwork grant-monitoring
//! schema engine.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! It owns the hydrated schema tree (collections, sections, forms,
//! questions, groups), typed answers, the managed expression catalog, and
//! the dependency & reference validator. Storage backends hydrate the tree
//! and call into here; the form runner reasons over it.

pub mod answer;
pub mod collection;
pub mod component;
pub mod error;
pub mod expression;
pub mod managed;
pub mod reference;
pub mod submission;

pub use error::{Error, FlashContext, Result, flash_context};
