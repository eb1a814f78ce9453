//! Parent page repository.
//!
//! Pages are plain single-stage rows in the `pages` table. Catalog records
//! point at them through `parent_id`.

use crate::model::page::ParentPage;
use crate::model::record::RecordId;
use crate::repo::record_repo::{ensure_connection_ready, RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const PAGE_SELECT_SQL: &str = "SELECT
    id,
    class_name,
    parent_id,
    title,
    sort
FROM pages";

/// Repository interface for parent pages.
pub trait PageRepository {
    fn create_page(
        &self,
        class_name: &str,
        parent_id: Option<RecordId>,
        title: &str,
    ) -> RepoResult<ParentPage>;
    fn get_page(&self, id: RecordId) -> RepoResult<Option<ParentPage>>;
    /// Lists pages whose class is one of `classes`, in site-tree order.
    fn list_pages_by_classes(&self, classes: &[String]) -> RepoResult<Vec<ParentPage>>;
}

/// SQLite-backed page repository.
pub struct SqlitePageRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePageRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl PageRepository for SqlitePageRepository<'_> {
    fn create_page(
        &self,
        class_name: &str,
        parent_id: Option<RecordId>,
        title: &str,
    ) -> RepoResult<ParentPage> {
        let sort: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(sort), -1) + 1
             FROM pages
             WHERE parent_id IS ?1;",
            [parent_id],
            |row| row.get(0),
        )?;
        self.conn.execute(
            "INSERT INTO pages (class_name, parent_id, title, sort)
             VALUES (?1, ?2, ?3, ?4);",
            params![class_name, parent_id, title, sort],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_page(id)?.ok_or(RepoError::NotFound {
            table: "pages".to_string(),
            id,
        })
    }

    fn get_page(&self, id: RecordId) -> RepoResult<Option<ParentPage>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PAGE_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_page_row(row)?));
        }
        Ok(None)
    }

    fn list_pages_by_classes(&self, classes: &[String]) -> RepoResult<Vec<ParentPage>> {
        if classes.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; classes.len()].join(", ");
        let sql = format!(
            "{PAGE_SELECT_SQL}
             WHERE class_name IN ({placeholders})
             ORDER BY sort ASC, id ASC;"
        );
        let bind_values = classes
            .iter()
            .map(|class| Value::Text(class.clone()))
            .collect::<Vec<_>>();

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut pages = Vec::new();
        while let Some(row) = rows.next()? {
            pages.push(parse_page_row(row)?);
        }
        Ok(pages)
    }
}

fn parse_page_row(row: &Row<'_>) -> RepoResult<ParentPage> {
    Ok(ParentPage {
        id: row.get("id")?,
        class_name: row.get("class_name")?,
        parent_id: row.get("parent_id")?,
        title: row.get("title")?,
        sort: row.get("sort")?,
    })
}
