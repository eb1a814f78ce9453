//! Parent page read model.

use crate::model::record::RecordId;
use serde::{Deserialize, Serialize};

/// Container record that catalog records attach to via `parent_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentPage {
    pub id: RecordId,
    pub class_name: String,
    /// Parent page of this page, if nested.
    pub parent_id: Option<RecordId>,
    /// Shown as the option label of the parent-selection control.
    pub title: String,
    pub sort: i64,
}
