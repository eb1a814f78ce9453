//! Explicit mapping from record class to physical Draft/Live storage.
//!
//! # Responsibility
//! - Resolve a record class to its storage tables once, at registration.
//! - Create missing per-table Draft/Live tables on a migrated connection.
//!
//! # Invariants
//! - Classes sharing a storage table resolve to the same Draft/Live pair.
//! - A Live row references its Draft row with `ON DELETE CASCADE`.

use crate::config::{CatalogConfig, ConfigError, LIVE_TABLE_SUFFIX};
use crate::db::{DbError, DbResult};
use crate::model::record::Stage;
use log::info;
use rusqlite::Connection;
use std::collections::{BTreeMap, BTreeSet};

/// Storage layout and behavior flags for one record class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSchema {
    pub class_name: String,
    pub draft_table: String,
    pub live_table: String,
    pub sort_column: String,
    pub parent_classes: Vec<String>,
    pub can_duplicate: bool,
    pub automatic_live_sort: bool,
}

impl TypeSchema {
    pub fn table(&self, stage: Stage) -> &str {
        match stage {
            Stage::Draft => &self.draft_table,
            Stage::Live => &self.live_table,
        }
    }
}

/// Validated registry of catalog record classes.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    types: BTreeMap<String, TypeSchema>,
    page_classes: BTreeSet<String>,
}

impl SchemaRegistry {
    /// Builds the registry from a configuration, validating it first.
    pub fn from_config(config: &CatalogConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let page_classes = config
            .page_classes
            .iter()
            .map(|class| class.trim().to_string())
            .collect();
        let types = config
            .types
            .iter()
            .map(|item| {
                let draft_table = item.table_name();
                let schema = TypeSchema {
                    class_name: item.class_name.trim().to_string(),
                    live_table: format!("{draft_table}{LIVE_TABLE_SUFFIX}"),
                    draft_table,
                    sort_column: item.sort_column_name(),
                    parent_classes: item.parent_classes(),
                    can_duplicate: item.can_duplicate,
                    automatic_live_sort: item.automatic_live_sort,
                };
                (schema.class_name.clone(), schema)
            })
            .collect();

        Ok(Self {
            types,
            page_classes,
        })
    }

    pub fn resolve(&self, class_name: &str) -> Option<&TypeSchema> {
        self.types.get(class_name.trim())
    }

    /// Returns registered record classes in sorted order.
    pub fn class_names(&self) -> Vec<String> {
        self.types.keys().cloned().collect()
    }

    pub fn is_page_class(&self, class_name: &str) -> bool {
        self.page_classes.contains(class_name.trim())
    }

    /// Creates missing Draft/Live tables and checks existing ones.
    ///
    /// Tables shared by several classes are created once.
    ///
    /// # Errors
    /// - `DbError::MissingRequiredColumn` when an existing table lacks a
    ///   column this registry expects, e.g. after a sort column rename.
    pub fn ensure_tables(&self, conn: &Connection) -> DbResult<()> {
        let mut seen = BTreeSet::new();
        for schema in self.types.values() {
            if !seen.insert(schema.draft_table.to_ascii_lowercase()) {
                continue;
            }

            conn.execute_batch(&create_tables_sql(schema))?;
            for table in [&schema.draft_table, &schema.live_table] {
                for column in required_columns(schema) {
                    if !table_has_column(conn, table, column)? {
                        return Err(DbError::MissingRequiredColumn {
                            table: table.clone(),
                            column: column.to_string(),
                        });
                    }
                }
            }
            info!(
                "event=schema_register module=schema status=ok table={} sort_column={}",
                schema.draft_table, schema.sort_column
            );
        }
        Ok(())
    }
}

fn required_columns(schema: &TypeSchema) -> [&str; 8] {
    [
        "id",
        "class_name",
        "parent_id",
        "title",
        "content",
        schema.sort_column.as_str(),
        "created_at",
        "updated_at",
    ]
}

fn create_tables_sql(schema: &TypeSchema) -> String {
    let draft = &schema.draft_table;
    let live = &schema.live_table;
    let sort = &schema.sort_column;
    format!(
        "CREATE TABLE IF NOT EXISTS \"{draft}\" (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            class_name TEXT NOT NULL,
            parent_id INTEGER REFERENCES pages (id) ON DELETE SET NULL,
            title TEXT NOT NULL,
            content TEXT NOT NULL DEFAULT '',
            \"{sort}\" INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now') * 1000),
            updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now') * 1000)
        );
        CREATE TABLE IF NOT EXISTS \"{live}\" (
            id INTEGER PRIMARY KEY REFERENCES \"{draft}\" (id) ON DELETE CASCADE,
            class_name TEXT NOT NULL,
            parent_id INTEGER,
            title TEXT NOT NULL,
            content TEXT NOT NULL DEFAULT '',
            \"{sort}\" INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS \"idx_{draft}_parent_sort\" ON \"{draft}\" (parent_id, \"{sort}\", id);
        CREATE INDEX IF NOT EXISTS \"idx_{live}_parent_sort\" ON \"{live}\" (parent_id, \"{sort}\", id);"
    )
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> DbResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info(\"{table}\");"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::SchemaRegistry;
    use crate::config::{CatalogConfig, CatalogTypeConfig};
    use crate::db::{open_db_in_memory, DbError};
    use crate::model::record::Stage;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::from_config(&CatalogConfig {
            page_classes: vec!["CatalogPage".to_string()],
            types: vec![
                CatalogTypeConfig::new("Product", "CatalogPage"),
                CatalogTypeConfig::new("DigitalProduct", "CatalogPage").with_table("product"),
            ],
        })
        .expect("registry should build")
    }

    #[test]
    fn classes_sharing_a_table_resolve_to_same_storage() {
        let registry = registry();
        let product = registry.resolve("Product").expect("Product registered");
        let digital = registry.resolve("DigitalProduct").expect("DigitalProduct registered");
        assert_eq!(product.draft_table, "product");
        assert_eq!(digital.table(Stage::Draft), product.table(Stage::Draft));
        assert_eq!(digital.table(Stage::Live), "product_live");
        assert!(registry.resolve("Unknown").is_none());
        assert!(registry.is_page_class("CatalogPage"));
    }

    #[test]
    fn ensure_tables_is_idempotent() {
        let conn = open_db_in_memory().expect("db should open");
        let registry = registry();
        registry.ensure_tables(&conn).expect("first ensure");
        registry.ensure_tables(&conn).expect("second ensure");
    }

    #[test]
    fn ensure_tables_rejects_renamed_sort_column() {
        let conn = open_db_in_memory().expect("db should open");
        registry().ensure_tables(&conn).expect("initial tables");

        let renamed = SchemaRegistry::from_config(&CatalogConfig {
            page_classes: vec!["CatalogPage".to_string()],
            types: vec![CatalogTypeConfig::new("Product", "CatalogPage").with_sort_column("position")],
        })
        .expect("registry should build");
        let err = renamed
            .ensure_tables(&conn)
            .expect_err("missing column must fail");
        assert!(matches!(
            err,
            DbError::MissingRequiredColumn { ref column, .. } if column == "position"
        ));
    }
}
