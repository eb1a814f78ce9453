//! Versioned catalog records for a content-management system.
//!
//! Records live in a Draft and a Live storage area, hang under parent pages
//! and carry a manual sort order that follows them into Live on publish.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod schema;
pub mod service;

pub use config::{CatalogConfig, CatalogTypeConfig, ConfigError, ParentClasses};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::page::ParentPage;
pub use model::record::{CatalogRecord, RecordId, Stage};
pub use repo::page_repo::{PageRepository, SqlitePageRepository};
pub use repo::record_repo::{RecordRepository, RepoError, RepoResult, SqliteRecordRepository};
pub use schema::{SchemaRegistry, TypeSchema};
pub use service::parent_field::{
    ParentField, ParentFieldError, ParentFieldResolver, PARENT_FIELD_LABEL, PARENT_FIELD_NAME,
    SUPPRESSED_FIELDS,
};
pub use service::record_store::{StoreError, StoreResult, VersionedRecordStore};

/// Store type used by callers holding a plain SQLite connection.
pub type SqliteRecordStore<'conn> =
    VersionedRecordStore<SqliteRecordRepository<'conn>, SqlitePageRepository<'conn>>;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
