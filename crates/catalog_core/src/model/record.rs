//! Versioned catalog record model.
//!
//! # Responsibility
//! - Define the record shape shared by the Draft and Live storage areas.
//! - Name the two storage stages explicitly instead of a process-wide
//!   reading mode.
//!
//! # Invariants
//! - `id` is `None` until the first Draft write and never changes afterwards.
//! - A Live row reuses the id of the Draft row it was promoted from.

use serde::{Deserialize, Serialize};

/// Stable identifier of a catalog record, shared by its Draft and Live rows.
pub type RecordId = i64;

/// Storage area a record is read from or written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Editable, work-in-progress rows.
    Draft,
    /// Published rows visible to the public site.
    Live,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Live => "live",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "draft" | "stage" => Some(Self::Draft),
            "live" => Some(Self::Live),
            _ => None,
        }
    }
}

/// Catalog record as stored in one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRecord {
    /// `None` for records that were never saved.
    pub id: Option<RecordId>,
    /// Configured record type; selects the storage table.
    pub class_name: String,
    /// Parent page id. Must point to a page of a permitted class.
    pub parent_id: Option<RecordId>,
    pub title: String,
    pub content: String,
    /// Manual display order among siblings sharing `parent_id`.
    pub sort: i64,
}

impl CatalogRecord {
    /// Creates an unsaved record with empty content and sort `0`.
    pub fn new(class_name: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: None,
            class_name: class_name.into(),
            parent_id: None,
            title: title.into(),
            content: String::new(),
            sort: 0,
        }
    }

    pub fn with_parent(mut self, parent_id: RecordId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_sort(mut self, sort: i64) -> Self {
        self.sort = sort;
        self
    }

    /// Returns whether the record has not been assigned an identifier yet.
    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    /// Compares every persisted field except the identifier.
    pub fn same_content_as(&self, other: &Self) -> bool {
        self.class_name == other.class_name
            && self.parent_id == other.parent_id
            && self.title == other.title
            && self.content == other.content
            && self.sort == other.sort
    }
}

#[cfg(test)]
mod tests {
    use super::{CatalogRecord, Stage};

    #[test]
    fn unsaved_record_is_new() {
        let record = CatalogRecord::new("Product", "Kettle");
        assert!(record.is_new());
        assert_eq!(record.sort, 0);
    }

    #[test]
    fn stage_parse_accepts_stage_alias() {
        assert_eq!(Stage::parse(" Stage "), Some(Stage::Draft));
        assert_eq!(Stage::parse("LIVE"), Some(Stage::Live));
        assert_eq!(Stage::parse("archive"), None);
    }

    #[test]
    fn same_content_ignores_identifier() {
        let mut left = CatalogRecord::new("Product", "Kettle").with_sort(3);
        let right = left.clone();
        left.id = Some(9);
        assert!(left.same_content_as(&right));
        assert!(!left.same_content_as(&right.clone().with_sort(4)));
    }
}
