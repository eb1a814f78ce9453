//! Repository layer abstractions and SQLite implementations.
//!
//! # Responsibility
//! - Keep SQL details for Draft/Live rows and parent pages out of the
//!   publishing service.
//!
//! # Invariants
//! - Table and column names reaching SQL come from a validated `TypeSchema`.
//! - Repository APIs return semantic errors (`NotFound`) in addition to DB
//!   transport errors.

pub mod page_repo;
pub mod record_repo;
