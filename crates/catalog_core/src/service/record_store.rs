//! Draft/Live publishing service for catalog records.
//!
//! # Responsibility
//! - Answer lifecycle questions (new, published, modified) for one record.
//! - Publish Draft state to Live and withdraw it again.
//! - Maintain manual sort order among siblings.
//!
//! # Invariants
//! - Every storage lookup goes through the `SchemaRegistry`; no table name is
//!   derived from the record at call time.
//! - The reading stage is always an explicit argument.
//! - After `publish`, the Live sort value equals the Draft sort value.

use crate::model::record::{CatalogRecord, RecordId, Stage};
use crate::repo::page_repo::PageRepository;
use crate::repo::record_repo::{RecordRepository, RepoError};
use crate::schema::{SchemaRegistry, TypeSchema};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Instant;

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from record store operations.
#[derive(Debug)]
pub enum StoreError {
    /// Record class is not registered as a catalog type.
    UnknownClass(String),
    /// `parent_id` does not reference a page of a permitted class.
    InvalidParent {
        parent_id: RecordId,
        expected: Vec<String>,
    },
    /// The record type does not allow duplication.
    DuplicateNotAllowed(String),
    /// Target record has no Draft row.
    RecordNotFound { class_name: String, id: RecordId },
    Repo(RepoError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownClass(class) => write!(f, "class `{class}` is not a catalog type"),
            Self::InvalidParent {
                parent_id,
                expected,
            } => write!(
                f,
                "parent {parent_id} is not a page of class {}",
                expected.join(",")
            ),
            Self::DuplicateNotAllowed(class) => {
                write!(f, "records of class `{class}` cannot be duplicated")
            }
            Self::RecordNotFound { class_name, id } => {
                write!(f, "{class_name} record {id} not found")
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for StoreError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Versioned record store over Draft/Live repositories.
pub struct VersionedRecordStore<R: RecordRepository, P: PageRepository> {
    records: R,
    pages: P,
    registry: Arc<SchemaRegistry>,
}

impl<R: RecordRepository, P: PageRepository> VersionedRecordStore<R, P> {
    pub fn new(records: R, pages: P, registry: Arc<SchemaRegistry>) -> Self {
        Self {
            records,
            pages,
            registry,
        }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Returns whether the record has no identifier yet.
    pub fn is_new(&self, record: &CatalogRecord) -> bool {
        record.is_new()
    }

    /// Returns whether a Live row exists for the record.
    ///
    /// New records are never published.
    pub fn is_published(&self, record: &CatalogRecord) -> StoreResult<bool> {
        let Some(id) = record.id else {
            return Ok(false);
        };
        let schema = self.schema(&record.class_name)?;
        Ok(self.records.exists(schema, Stage::Live, id)?)
    }

    /// `Yes`/`No` form of [`Self::is_published`] for listings.
    pub fn is_published_nice(&self, record: &CatalogRecord) -> StoreResult<&'static str> {
        self.is_published(record).map(boolean_nice)
    }

    /// Returns whether the Draft and Live rows differ in any field.
    ///
    /// A Draft without Live counterpart counts as modified; a new record does not.
    pub fn is_modified(&self, record: &CatalogRecord) -> StoreResult<bool> {
        let Some(id) = record.id else {
            return Ok(false);
        };
        let schema = self.schema(&record.class_name)?;
        let draft = self.records.get(schema, Stage::Draft, id)?;
        let live = self.records.get(schema, Stage::Live, id)?;
        Ok(match (draft, live) {
            (Some(draft), Some(live)) => !draft.same_content_as(&live),
            (None, None) => false,
            _ => true,
        })
    }

    /// `Yes`/`No` form of [`Self::is_modified`] for listings.
    pub fn is_modified_nice(&self, record: &CatalogRecord) -> StoreResult<&'static str> {
        self.is_modified(record).map(boolean_nice)
    }

    /// Writes the record to Draft, assigning an identifier on first save.
    ///
    /// # Errors
    /// - `InvalidParent` when `parent_id` is not a page of a permitted class.
    /// - `RecordNotFound` when the record carries an id whose Draft row was
    ///   deleted. Such a record is never re-inserted under a fresh id.
    pub fn save(&self, record: &mut CatalogRecord) -> StoreResult<RecordId> {
        let schema = self.schema(&record.class_name)?;
        self.ensure_valid_parent(schema, record.parent_id)?;

        match record.id {
            Some(id) => {
                self.records
                    .update_draft(schema, record)
                    .map_err(|err| match err {
                        RepoError::NotFound { id, .. } => StoreError::RecordNotFound {
                            class_name: record.class_name.clone(),
                            id,
                        },
                        other => other.into(),
                    })?;
                Ok(id)
            }
            None => {
                let id = self.records.insert_draft(schema, record)?;
                record.id = Some(id);
                Ok(id)
            }
        }
    }

    /// Places the record after its current siblings, then saves it.
    pub fn append(&self, record: &mut CatalogRecord) -> StoreResult<RecordId> {
        let schema = self.schema(&record.class_name)?;
        record.sort = self.records.next_sort(schema, record.parent_id)?;
        self.save(record)
    }

    pub fn get(
        &self,
        class_name: &str,
        id: RecordId,
        stage: Stage,
    ) -> StoreResult<Option<CatalogRecord>> {
        let schema = self.schema(class_name)?;
        Ok(self.records.get(schema, stage, id)?)
    }

    /// Lists siblings under one parent in display order.
    pub fn list_children(
        &self,
        class_name: &str,
        parent_id: Option<RecordId>,
        stage: Stage,
    ) -> StoreResult<Vec<CatalogRecord>> {
        let schema = self.schema(class_name)?;
        Ok(self.records.list_children(schema, stage, parent_id)?)
    }

    /// Publishes the record: saves Draft, promotes it to Live and copies the
    /// sort value across.
    ///
    /// A failure after the Draft write leaves that write in place. A record
    /// whose Draft row was deleted fails with `RecordNotFound`, as in [`Self::save`].
    pub fn publish(&self, record: &mut CatalogRecord) -> StoreResult<bool> {
        let started_at = Instant::now();
        let schema = self.schema(&record.class_name)?;
        let mode = match record.id {
            Some(id) if self.records.exists(schema, Stage::Live, id)? => "update",
            _ => "insert",
        };

        let result = self.save(record).and_then(|id| {
            self.records.publish_draft(schema, id)?;
            Ok(id)
        });
        match result {
            Ok(id) => {
                info!(
                    "event=record_publish module=store status=ok class={} id={} mode={} duration_ms={}",
                    record.class_name,
                    id,
                    mode,
                    started_at.elapsed().as_millis()
                );
                Ok(true)
            }
            Err(err) => {
                error!(
                    "event=record_publish module=store status=error class={} mode={} duration_ms={} error={}",
                    record.class_name,
                    mode,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    /// Removes the Live row of the record while keeping its Draft row.
    ///
    /// `context` is the stage the caller is reading from. When it is not
    /// Live and the Draft row survived the delete, that row is re-saved.
    /// Returns `Ok(false)` for records without identifier.
    pub fn unpublish(&self, record: &CatalogRecord, context: Stage) -> StoreResult<bool> {
        let Some(id) = record.id else {
            return Ok(false);
        };
        let started_at = Instant::now();
        let schema = self.schema(&record.class_name)?;

        let removed = self.records.delete(schema, Stage::Live, id)?;
        if !removed {
            warn!(
                "event=record_unpublish module=store status=noop class={} id={} reason=not_live",
                record.class_name, id
            );
        }

        if context != Stage::Live && self.records.exists(schema, Stage::Draft, id)? {
            self.records.touch_draft(schema, id)?;
        }

        info!(
            "event=record_unpublish module=store status=ok class={} id={} context={} duration_ms={}",
            record.class_name,
            id,
            context.as_str(),
            started_at.elapsed().as_millis()
        );
        Ok(true)
    }

    /// Moves one record to `target_index` among its Draft siblings.
    ///
    /// With `automatic_live_sort`, the new order is copied onto the Live rows
    /// of published siblings. Returns sibling ids in their new order.
    pub fn move_record(
        &self,
        class_name: &str,
        id: RecordId,
        target_index: usize,
    ) -> StoreResult<Vec<RecordId>> {
        let started_at = Instant::now();
        let schema = self.schema(class_name)?;
        let ordered = self
            .records
            .reorder(schema, id, target_index)
            .map_err(|err| match err {
                RepoError::NotFound { id, .. } => StoreError::RecordNotFound {
                    class_name: class_name.to_string(),
                    id,
                },
                other => other.into(),
            })?;

        let live_updated = if schema.automatic_live_sort {
            self.records.sync_live_sort(schema, &ordered)?
        } else {
            0
        };

        info!(
            "event=record_move module=store status=ok class={} id={} index={} siblings={} live_updated={} duration_ms={}",
            class_name,
            id,
            target_index,
            ordered.len(),
            live_updated,
            started_at.elapsed().as_millis()
        );
        Ok(ordered)
    }

    /// Creates a Draft copy of the record under the same parent, placed last.
    pub fn duplicate(&self, record: &CatalogRecord) -> StoreResult<CatalogRecord> {
        let schema = self.schema(&record.class_name)?;
        if !schema.can_duplicate {
            return Err(StoreError::DuplicateNotAllowed(schema.class_name.clone()));
        }

        let mut copy = record.clone();
        copy.id = None;
        self.append(&mut copy)?;
        Ok(copy)
    }

    /// Deletes the Draft row; the Live row goes with it.
    pub fn delete(&self, record: &CatalogRecord) -> StoreResult<bool> {
        let Some(id) = record.id else {
            return Ok(false);
        };
        let schema = self.schema(&record.class_name)?;
        Ok(self.records.delete(schema, Stage::Draft, id)?)
    }

    /// Permitted parent page classes of a record class.
    pub fn parent_classes(&self, class_name: &str) -> StoreResult<Vec<String>> {
        Ok(self.schema(class_name)?.parent_classes.clone())
    }

    /// Name of the column holding the manual sort order of a record class.
    pub fn sort_fieldname(&self, class_name: &str) -> StoreResult<String> {
        Ok(self.schema(class_name)?.sort_column.clone())
    }

    fn schema(&self, class_name: &str) -> StoreResult<&TypeSchema> {
        self.registry
            .resolve(class_name)
            .ok_or_else(|| StoreError::UnknownClass(class_name.to_string()))
    }

    fn ensure_valid_parent(
        &self,
        schema: &TypeSchema,
        parent_id: Option<RecordId>,
    ) -> StoreResult<()> {
        let Some(parent_id) = parent_id else {
            return Ok(());
        };
        match self.pages.get_page(parent_id)? {
            Some(page) if schema.parent_classes.contains(&page.class_name) => Ok(()),
            _ => Err(StoreError::InvalidParent {
                parent_id,
                expected: schema.parent_classes.clone(),
            }),
        }
    }
}

fn boolean_nice(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        "No"
    }
}
