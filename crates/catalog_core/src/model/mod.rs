//! Domain model for versioned catalog records and their parent pages.
//!
//! # Invariants
//! - Every record is identified by a stable `RecordId` once saved.
//! - Draft and Live rows of one record share that identifier.

pub mod page;
pub mod record;
