//! Per-type catalog configuration.
//!
//! # Responsibility
//! - Declare which record classes are catalog types, where they are stored,
//!   which page classes may parent them and which column holds their order.
//! - Validate the whole declaration once at startup.
//!
//! # Invariants
//! - Table and column names are plain SQL identifiers; they are interpolated
//!   into statements and must never carry quoting or whitespace.
//! - Every permitted parent class is a declared page class.
//! - Types sharing one storage table agree on its sort column.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Sort column used when a type does not name one. Matches the site tree.
pub const DEFAULT_SORT_COLUMN: &str = "sort";

/// Suffix appended to a storage table to form its Live table.
pub const LIVE_TABLE_SUFFIX: &str = "_live";

const RESERVED_TABLES: &[&str] = &["pages"];

/// Columns every storage table carries besides the sort column.
const FIXED_COLUMNS: &[&str] = &[
    "id",
    "class_name",
    "parent_id",
    "title",
    "content",
    "created_at",
    "updated_at",
];

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("valid identifier regex"));

/// Configuration load and validation errors.
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(serde_json::Error),
    NoCatalogTypes,
    InvalidIdentifier { field: &'static str, value: String },
    ReservedTable(String),
    /// Sort column name collides with a fixed storage column.
    ReservedColumn { class_name: String, column: String },
    DuplicateClass(String),
    MissingParentClass(String),
    UnknownParentClass { class_name: String, parent_class: String },
    ConflictingSortColumn {
        table: String,
        first: String,
        second: String,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid catalog config: {err}"),
            Self::NoCatalogTypes => write!(f, "catalog config declares no types"),
            Self::InvalidIdentifier { field, value } => {
                write!(f, "`{value}` is not a valid identifier for {field}")
            }
            Self::ReservedTable(table) => write!(f, "table name `{table}` is reserved"),
            Self::ReservedColumn { class_name, column } => write!(
                f,
                "sort column `{column}` of `{class_name}` collides with a fixed column"
            ),
            Self::DuplicateClass(class) => write!(f, "class `{class}` is declared twice"),
            Self::MissingParentClass(class) => {
                write!(f, "class `{class}` declares no parent class")
            }
            Self::UnknownParentClass {
                class_name,
                parent_class,
            } => write!(
                f,
                "Parent class {parent_class} of `{class_name}` does not exist."
            ),
            Self::ConflictingSortColumn {
                table,
                first,
                second,
            } => write!(
                f,
                "table `{table}` is configured with sort columns `{first}` and `{second}`"
            ),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// Permitted parent classes: a single class name or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParentClasses {
    One(String),
    Many(Vec<String>),
}

impl ParentClasses {
    /// Normalizes to a list; a single value becomes a one-element list.
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Self::One(class) => vec![class.clone()],
            Self::Many(classes) => classes.clone(),
        }
    }
}

/// Declaration of one catalog record type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogTypeConfig {
    pub class_name: String,
    /// Storage table; defaults to the lowercased class name. Several classes
    /// may share one table.
    #[serde(default)]
    pub table: Option<String>,
    pub parent_class: ParentClasses,
    #[serde(default)]
    pub sort_column: Option<String>,
    #[serde(default = "default_true")]
    pub can_duplicate: bool,
    /// Propagate manual reordering to already published siblings.
    #[serde(default = "default_true")]
    pub automatic_live_sort: bool,
}

impl CatalogTypeConfig {
    pub fn new(class_name: impl Into<String>, parent_class: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            table: None,
            parent_class: ParentClasses::One(parent_class.into()),
            sort_column: None,
            can_duplicate: true,
            automatic_live_sort: true,
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn with_parent_classes<I, S>(mut self, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parent_class = ParentClasses::Many(classes.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_sort_column(mut self, column: impl Into<String>) -> Self {
        self.sort_column = Some(column.into());
        self
    }

    pub fn table_name(&self) -> String {
        match self.table.as_deref() {
            Some(table) => table.trim().to_string(),
            None => self.class_name.trim().to_ascii_lowercase(),
        }
    }

    pub fn sort_column_name(&self) -> String {
        self.sort_column
            .as_deref()
            .map(str::trim)
            .filter(|column| !column.is_empty())
            .unwrap_or(DEFAULT_SORT_COLUMN)
            .to_string()
    }

    pub fn parent_classes(&self) -> Vec<String> {
        self.parent_class
            .to_vec()
            .into_iter()
            .map(|class| class.trim().to_string())
            .collect()
    }
}

/// Full catalog declaration loaded at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Classes of parent pages stored in the `pages` table.
    #[serde(default)]
    pub page_classes: Vec<String>,
    pub types: Vec<CatalogTypeConfig>,
}

impl CatalogConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Validates declaration-level invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.types.is_empty() {
            return Err(ConfigError::NoCatalogTypes);
        }

        let mut page_classes = BTreeSet::new();
        for class in &self.page_classes {
            ensure_identifier("page class", class.trim())?;
            page_classes.insert(class.trim());
        }

        let mut classes = BTreeSet::new();
        let mut table_sort_columns = BTreeMap::<String, String>::new();
        for item in &self.types {
            let class_name = item.class_name.trim();
            ensure_identifier("class name", class_name)?;
            if !classes.insert(class_name) || page_classes.contains(class_name) {
                return Err(ConfigError::DuplicateClass(class_name.to_string()));
            }

            let table = item.table_name();
            ensure_identifier("table", &table)?;
            let lowered = table.to_ascii_lowercase();
            if RESERVED_TABLES.contains(&lowered.as_str())
                || lowered.ends_with(LIVE_TABLE_SUFFIX)
                || lowered.starts_with("sqlite_")
            {
                return Err(ConfigError::ReservedTable(table));
            }

            let sort_column = item.sort_column_name();
            ensure_identifier("sort column", &sort_column)?;
            if FIXED_COLUMNS
                .iter()
                .any(|column| column.eq_ignore_ascii_case(&sort_column))
            {
                return Err(ConfigError::ReservedColumn {
                    class_name: class_name.to_string(),
                    column: sort_column,
                });
            }
            match table_sort_columns.get(&lowered) {
                Some(existing) if !existing.eq_ignore_ascii_case(&sort_column) => {
                    return Err(ConfigError::ConflictingSortColumn {
                        table,
                        first: existing.clone(),
                        second: sort_column,
                    });
                }
                Some(_) => {}
                None => {
                    table_sort_columns.insert(lowered, sort_column);
                }
            }

            let parents = item.parent_classes();
            if parents.iter().all(|parent| parent.is_empty()) {
                return Err(ConfigError::MissingParentClass(class_name.to_string()));
            }
            for parent in parents {
                if !page_classes.contains(parent.as_str()) {
                    return Err(ConfigError::UnknownParentClass {
                        class_name: class_name.to_string(),
                        parent_class: parent,
                    });
                }
            }
        }

        Ok(())
    }
}

/// Returns whether `value` can be used as a table or column name.
pub fn is_valid_identifier(value: &str) -> bool {
    IDENTIFIER_RE.is_match(value)
}

fn ensure_identifier(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if is_valid_identifier(value) {
        return Ok(());
    }
    Err(ConfigError::InvalidIdentifier {
        field,
        value: value.to_string(),
    })
}

fn default_true() -> bool {
    true
}
