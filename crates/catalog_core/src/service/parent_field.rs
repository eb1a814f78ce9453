//! Parent association control for catalog record forms.
//!
//! # Responsibility
//! - Decide how the form layer offers the parent page of a record: fixed
//!   when only one candidate exists, selectable otherwise.
//!
//! # Invariants
//! - Candidates are pages whose class is a permitted parent class.
//! - No candidate at all is a fatal configuration error for the operator.

use crate::model::record::{CatalogRecord, RecordId};
use crate::repo::page_repo::PageRepository;
use crate::repo::record_repo::RepoError;
use crate::schema::SchemaRegistry;
use log::error;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Form field name carrying the parent reference.
pub const PARENT_FIELD_NAME: &str = "ParentID";

/// Label of the selectable parent control.
pub const PARENT_FIELD_LABEL: &str = "Parent Page";

/// Version bookkeeping fields the form layer must not show.
pub const SUPPRESSED_FIELDS: &[&str] = &["Version", "Versions"];

/// Parent control the form layer should render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParentField {
    /// Exactly one candidate page; the value is fixed.
    Hidden { parent_id: RecordId },
    /// Several candidates as `(id, title)` options.
    Dropdown {
        options: Vec<(RecordId, String)>,
        selected: RecordId,
    },
}

impl ParentField {
    /// Parent id the form submits when left untouched.
    pub fn value(&self) -> RecordId {
        match self {
            Self::Hidden { parent_id } => *parent_id,
            Self::Dropdown { selected, .. } => *selected,
        }
    }
}

/// Fatal parent configuration errors.
#[derive(Debug)]
pub enum ParentFieldError {
    UnknownClass(String),
    /// No page of any permitted parent class exists.
    NoParentPages { classes: Vec<String> },
    Repo(RepoError),
}

impl Display for ParentFieldError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownClass(class) => write!(f, "class `{class}` is not a catalog type"),
            Self::NoParentPages { classes } => write!(
                f,
                "You must create a parent page of class {}",
                classes.join(",")
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ParentFieldError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ParentFieldError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Resolves the parent control for records of registered classes.
pub struct ParentFieldResolver<P: PageRepository> {
    pages: P,
    registry: Arc<SchemaRegistry>,
}

impl<P: PageRepository> ParentFieldResolver<P> {
    pub fn new(pages: P, registry: Arc<SchemaRegistry>) -> Self {
        Self { pages, registry }
    }

    /// Builds the parent control for `record`.
    ///
    /// # Errors
    /// - `UnknownClass` when the record class is not registered.
    /// - `NoParentPages` when no page of a permitted class exists.
    pub fn resolve(&self, record: &CatalogRecord) -> Result<ParentField, ParentFieldError> {
        let schema = self
            .registry
            .resolve(&record.class_name)
            .ok_or_else(|| ParentFieldError::UnknownClass(record.class_name.clone()))?;

        let pages = self.pages.list_pages_by_classes(&schema.parent_classes)?;
        let Some(first) = pages.first() else {
            error!(
                "event=parent_field module=service status=error class={} error_code=no_parent_pages expected={}",
                schema.class_name,
                schema.parent_classes.join(",")
            );
            return Err(ParentFieldError::NoParentPages {
                classes: schema.parent_classes.clone(),
            });
        };

        if pages.len() == 1 {
            return Ok(ParentField::Hidden {
                parent_id: first.id,
            });
        }

        // A stale or foreign parent is not an option; fall back to the first page.
        let selected = record
            .parent_id
            .filter(|id| pages.iter().any(|page| page.id == *id))
            .unwrap_or(first.id);
        Ok(ParentField::Dropdown {
            options: pages
                .into_iter()
                .map(|page| (page.id, page.title))
                .collect(),
            selected,
        })
    }
}
