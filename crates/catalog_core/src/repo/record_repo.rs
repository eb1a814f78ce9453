//! Versioned record repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Read and write catalog rows in the Draft and Live tables of one
//!   storage schema.
//! - Own the promotion of a Draft row into Live, including the guarded copy
//!   of the manually managed sort column.
//!
//! # Invariants
//! - Draft writes never touch Live rows.
//! - Live rows are only created by promotion, so they always mirror a Draft id.
//! - Child listing is deterministic: `<sort column> ASC, id ASC`.

use crate::db::DbError;
use crate::db::migrations::{current_user_version, latest_version};
use crate::model::record::{CatalogRecord, RecordId, Stage};
use crate::schema::TypeSchema;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for catalog persistence operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// Target row does not exist in the given table.
    NotFound { table: String, id: RecordId },
    /// Write path was handed a record without identifier.
    MissingId,
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { table, id } => write!(f, "row {id} not found in `{table}`"),
            Self::MissingId => write!(f, "record has no identifier"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "catalog repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted record data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for Draft/Live record storage.
pub trait RecordRepository {
    /// Inserts a new Draft row and returns its assigned identifier.
    fn insert_draft(&self, schema: &TypeSchema, record: &CatalogRecord) -> RepoResult<RecordId>;
    /// Updates an existing Draft row in place.
    fn update_draft(&self, schema: &TypeSchema, record: &CatalogRecord) -> RepoResult<()>;
    /// Loads one row from the given stage.
    fn get(
        &self,
        schema: &TypeSchema,
        stage: Stage,
        id: RecordId,
    ) -> RepoResult<Option<CatalogRecord>>;
    /// Returns whether a row with `id` exists in the given stage.
    fn exists(&self, schema: &TypeSchema, stage: Stage, id: RecordId) -> RepoResult<bool>;
    /// Lists rows sharing one parent, ordered by the sort column.
    fn list_children(
        &self,
        schema: &TypeSchema,
        stage: Stage,
        parent_id: Option<RecordId>,
    ) -> RepoResult<Vec<CatalogRecord>>;
    /// Deletes one row from the given stage. Returns whether a row was removed.
    fn delete(&self, schema: &TypeSchema, stage: Stage, id: RecordId) -> RepoResult<bool>;
    /// Copies the Draft row into Live and then its sort value, atomically.
    fn publish_draft(&self, schema: &TypeSchema, id: RecordId) -> RepoResult<()>;
    /// Copies Draft sort values onto the Live rows of `ids` that have a Draft
    /// counterpart. Returns the number of Live rows updated.
    fn sync_live_sort(&self, schema: &TypeSchema, ids: &[RecordId]) -> RepoResult<usize>;
    /// Returns the sort value that places a new row after its siblings.
    fn next_sort(&self, schema: &TypeSchema, parent_id: Option<RecordId>) -> RepoResult<i64>;
    /// Moves one Draft row to `target_index` among its siblings and renumbers
    /// them `0..n`. Returns sibling ids in their new order.
    fn reorder(
        &self,
        schema: &TypeSchema,
        id: RecordId,
        target_index: usize,
    ) -> RepoResult<Vec<RecordId>>;
    /// Re-saves an existing Draft row without changing its fields.
    fn touch_draft(&self, schema: &TypeSchema, id: RecordId) -> RepoResult<()>;
}

/// SQLite-backed record repository.
pub struct SqliteRecordRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRecordRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl RecordRepository for SqliteRecordRepository<'_> {
    fn insert_draft(&self, schema: &TypeSchema, record: &CatalogRecord) -> RepoResult<RecordId> {
        self.conn.execute(
            &format!(
                "INSERT INTO \"{}\" (class_name, parent_id, title, content, \"{}\")
                 VALUES (?1, ?2, ?3, ?4, ?5);",
                schema.draft_table, schema.sort_column
            ),
            params![
                record.class_name.as_str(),
                record.parent_id,
                record.title.as_str(),
                record.content.as_str(),
                record.sort,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_draft(&self, schema: &TypeSchema, record: &CatalogRecord) -> RepoResult<()> {
        let id = record.id.ok_or(RepoError::MissingId)?;
        let changed = self.conn.execute(
            &format!(
                "UPDATE \"{}\"
                 SET class_name = ?2,
                     parent_id = ?3,
                     title = ?4,
                     content = ?5,
                     \"{}\" = ?6,
                     updated_at = (strftime('%s', 'now') * 1000)
                 WHERE id = ?1;",
                schema.draft_table, schema.sort_column
            ),
            params![
                id,
                record.class_name.as_str(),
                record.parent_id,
                record.title.as_str(),
                record.content.as_str(),
                record.sort,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                table: schema.draft_table.clone(),
                id,
            });
        }
        Ok(())
    }

    fn get(
        &self,
        schema: &TypeSchema,
        stage: Stage,
        id: RecordId,
    ) -> RepoResult<Option<CatalogRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{} WHERE id = ?1;", select_sql(schema, stage)))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_record_row(row)?));
        }
        Ok(None)
    }

    fn exists(&self, schema: &TypeSchema, stage: Stage, id: RecordId) -> RepoResult<bool> {
        row_exists(self.conn, schema.table(stage), id)
    }

    fn list_children(
        &self,
        schema: &TypeSchema,
        stage: Stage,
        parent_id: Option<RecordId>,
    ) -> RepoResult<Vec<CatalogRecord>> {
        let sql = format!(
            "{} WHERE parent_id IS ?1 ORDER BY \"{}\" ASC, id ASC;",
            select_sql(schema, stage),
            schema.sort_column
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([parent_id])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_record_row(row)?);
        }
        Ok(items)
    }

    fn delete(&self, schema: &TypeSchema, stage: Stage, id: RecordId) -> RepoResult<bool> {
        let changed = self.conn.execute(
            &format!("DELETE FROM \"{}\" WHERE id = ?1;", schema.table(stage)),
            [id],
        )?;
        Ok(changed > 0)
    }

    fn publish_draft(&self, schema: &TypeSchema, id: RecordId) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        promote_row(&tx, schema, id)?;
        sync_sort(&tx, schema, id)?;
        tx.commit()?;
        Ok(())
    }

    fn sync_live_sort(&self, schema: &TypeSchema, ids: &[RecordId]) -> RepoResult<usize> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let mut updated = 0;
        for id in ids {
            updated += sync_sort(&tx, schema, *id)?;
        }
        tx.commit()?;
        Ok(updated)
    }

    fn next_sort(&self, schema: &TypeSchema, parent_id: Option<RecordId>) -> RepoResult<i64> {
        let next = self.conn.query_row(
            &format!(
                "SELECT COALESCE(MAX(\"{}\"), -1) + 1
                 FROM \"{}\"
                 WHERE parent_id IS ?1;",
                schema.sort_column, schema.draft_table
            ),
            [parent_id],
            |row| row.get(0),
        )?;
        Ok(next)
    }

    fn reorder(
        &self,
        schema: &TypeSchema,
        id: RecordId,
        target_index: usize,
    ) -> RepoResult<Vec<RecordId>> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let parent_id: Option<RecordId> = tx
            .query_row(
                &format!("SELECT parent_id FROM \"{}\" WHERE id = ?1;", schema.draft_table),
                [id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| RepoError::NotFound {
                table: schema.draft_table.clone(),
                id,
            })?;

        let mut sibling_ids = list_child_ids(&tx, schema, parent_id)?;
        sibling_ids.retain(|sibling| *sibling != id);
        let target_index = target_index.min(sibling_ids.len());
        sibling_ids.insert(target_index, id);

        for (index, sibling) in sibling_ids.iter().enumerate() {
            tx.execute(
                &format!(
                    "UPDATE \"{}\"
                     SET \"{}\" = ?2,
                         updated_at = (strftime('%s', 'now') * 1000)
                     WHERE id = ?1;",
                    schema.draft_table, schema.sort_column
                ),
                params![sibling, index as i64],
            )?;
        }

        tx.commit()?;
        Ok(sibling_ids)
    }

    fn touch_draft(&self, schema: &TypeSchema, id: RecordId) -> RepoResult<()> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE \"{}\"
                 SET updated_at = (strftime('%s', 'now') * 1000)
                 WHERE id = ?1;",
                schema.draft_table
            ),
            [id],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                table: schema.draft_table.clone(),
                id,
            });
        }
        Ok(())
    }
}

fn select_sql(schema: &TypeSchema, stage: Stage) -> String {
    format!(
        "SELECT
            id,
            class_name,
            parent_id,
            title,
            content,
            \"{}\" AS sort
         FROM \"{}\"",
        schema.sort_column,
        schema.table(stage)
    )
}

/// Copies every standard column of the Draft row into Live. The sort column
/// is left to `sync_sort`; a fresh Live row starts at the column default.
fn promote_row(conn: &Connection, schema: &TypeSchema, id: RecordId) -> RepoResult<()> {
    let changed = conn.execute(
        &format!(
            "INSERT INTO \"{live}\" (id, class_name, parent_id, title, content, created_at, updated_at)
             SELECT id, class_name, parent_id, title, content, created_at, updated_at
             FROM \"{draft}\"
             WHERE id = ?1
             ON CONFLICT (id) DO UPDATE SET
                class_name = excluded.class_name,
                parent_id = excluded.parent_id,
                title = excluded.title,
                content = excluded.content,
                updated_at = excluded.updated_at;",
            live = schema.live_table,
            draft = schema.draft_table,
        ),
        [id],
    )?;
    if changed == 0 {
        return Err(RepoError::NotFound {
            table: schema.draft_table.clone(),
            id,
        });
    }
    Ok(())
}

fn sync_sort(conn: &Connection, schema: &TypeSchema, id: RecordId) -> RepoResult<usize> {
    let changed = conn.execute(
        &format!(
            "UPDATE \"{live}\"
             SET \"{sort}\" = (
                SELECT \"{draft}\".\"{sort}\"
                FROM \"{draft}\"
                WHERE \"{draft}\".id = \"{live}\".id
             )
             WHERE id = ?1
               AND EXISTS (
                SELECT 1
                FROM \"{draft}\"
                WHERE \"{draft}\".id = \"{live}\".id
             );",
            live = schema.live_table,
            draft = schema.draft_table,
            sort = schema.sort_column,
        ),
        [id],
    )?;
    Ok(changed)
}

fn list_child_ids(
    conn: &Connection,
    schema: &TypeSchema,
    parent_id: Option<RecordId>,
) -> RepoResult<Vec<RecordId>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id
         FROM \"{}\"
         WHERE parent_id IS ?1
         ORDER BY \"{}\" ASC, id ASC;",
        schema.draft_table, schema.sort_column
    ))?;
    let mut rows = stmt.query([parent_id])?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        ids.push(row.get(0)?);
    }
    Ok(ids)
}

fn row_exists(conn: &Connection, table: &str, id: RecordId) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        &format!("SELECT EXISTS(SELECT 1 FROM \"{table}\" WHERE id = ?1);"),
        [id],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn parse_record_row(row: &Row<'_>) -> RepoResult<CatalogRecord> {
    let class_name: String = row.get("class_name")?;
    if class_name.trim().is_empty() {
        return Err(RepoError::InvalidData(
            "empty class_name in catalog row".to_string(),
        ));
    }

    Ok(CatalogRecord {
        id: Some(row.get("id")?),
        class_name,
        parent_id: row.get("parent_id")?,
        title: row.get("title")?,
        content: row.get("content")?,
        sort: row.get("sort")?,
    })
}

pub(crate) fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = current_user_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }
    Ok(())
}
