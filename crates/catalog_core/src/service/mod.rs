//! Catalog use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into publish/unpublish/reorder use cases.
//! - Produce the parent-association data the form layer renders.

pub mod parent_field;
pub mod record_store;
