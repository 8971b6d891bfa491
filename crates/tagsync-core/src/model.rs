//! Domain model for a tag synchronization run
//!
//! Everything here is created from API responses at the start of a run and
//! dropped when the process exits. Database identity is always compared on the
//! uppercase name.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Parsed `datasourceId.database.schema.table.column` key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QualifiedKey {
    /// Catalog datasource id (first segment)
    pub datasource_id: String,

    /// Database name as stored in the catalog
    pub database: String,

    /// Schema name
    pub schema: String,

    /// Table name
    pub table: String,

    /// Column name (everything after the fourth dot)
    pub column: String,
}

impl QualifiedKey {
    /// Minimum number of dot-separated segments in a well-formed key
    pub const MIN_SEGMENTS: usize = 5;

    /// Split a qualified key positionally on `.`
    ///
    /// Keys with fewer than five segments, or with an empty segment, are
    /// rejected. Callers treat the error as a skip signal.
    pub fn parse(key: &str) -> Result<Self, KeyError> {
        let parts: Vec<&str> = key.splitn(Self::MIN_SEGMENTS, '.').collect();
        if parts.len() < Self::MIN_SEGMENTS {
            return Err(KeyError::TooFewSegments {
                key: key.to_string(),
                found: parts.len(),
            });
        }

        if let Some(position) = parts.iter().position(|p| p.trim().is_empty()) {
            return Err(KeyError::EmptySegment {
                key: key.to_string(),
                position,
            });
        }

        Ok(Self {
            datasource_id: parts[0].to_string(),
            database: parts[1].to_string(),
            schema: parts[2].to_string(),
            table: parts[3].to_string(),
            column: parts[4].to_string(),
        })
    }

    /// Uppercase database name used for set comparisons
    pub fn database_upper(&self) -> String {
        self.database.to_uppercase()
    }

    /// `SCHEMA.TABLE`, uppercased, as the protection system expects it
    pub fn table_name(&self) -> String {
        format!("{}.{}", self.schema.to_uppercase(), self.table.to_uppercase())
    }

    /// Case-insensitive comparison against a warehouse column location
    pub fn same_column(&self, database: &str, schema: &str, table: &str, column: &str) -> bool {
        same_upper(&self.database, database)
            && same_upper(&self.schema, schema)
            && same_upper(&self.table, table)
            && same_upper(&self.column, column)
    }
}

/// Full Unicode uppercase comparison, matching the set reconciler
fn same_upper(a: &str, b: &str) -> bool {
    a.to_uppercase() == b.to_uppercase()
}

impl FromStr for QualifiedKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for QualifiedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}.{}",
            self.datasource_id, self.database, self.schema, self.table, self.column
        )
    }
}

/// Reasons a qualified key cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("qualified key '{key}' has {found} segments, expected at least 5")]
    TooFewSegments { key: String, found: usize },

    #[error("qualified key '{key}' has an empty segment at position {position}")]
    EmptySegment { key: String, position: usize },
}

/// A catalog column carrying governance tag values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedColumn {
    /// Dot-delimited qualified key
    pub key: String,

    /// Column display name
    pub name: String,

    /// Catalog datasource the column belongs to
    #[serde(default)]
    pub datasource_id: i64,

    /// Values of the governance tag field
    #[serde(default)]
    pub tag_values: Vec<String>,
}

impl TaggedColumn {
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            datasource_id: 0,
            tag_values: Vec::new(),
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tag_values = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_datasource(mut self, datasource_id: i64) -> Self {
        self.datasource_id = datasource_id;
        self
    }

    /// Parse this column's key
    pub fn qualified_key(&self) -> Result<QualifiedKey, KeyError> {
        QualifiedKey::parse(&self.key)
    }
}

/// A database registered in the protection system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetDatabase {
    pub id: i64,

    /// Warehouse database name
    pub name: String,

    /// Display name in the protection system
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,
}

impl TargetDatabase {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            friendly_name: None,
        }
    }

    pub fn normalized_name(&self) -> String {
        self.name.to_uppercase()
    }

    /// Case-insensitive name match
    pub fn matches(&self, database: &str) -> bool {
        same_upper(&self.name, database)
    }
}

/// Governance mode sent with every column registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtectMode {
    #[default]
    Govern,
}

impl fmt::Display for ProtectMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Govern => write!(f, "govern"),
        }
    }
}

/// Request to govern one column in the protection system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GovernanceRequest {
    pub database_id: i64,

    /// `SCHEMA.TABLE`, uppercase
    pub table_name: String,

    /// Uppercase column name
    pub column_name: String,

    /// Same as `column_name`
    pub nickname: String,

    pub protect_mode: ProtectMode,
}

impl GovernanceRequest {
    pub fn new(database_id: i64, table_name: impl Into<String>, column_name: impl Into<String>) -> Self {
        let column_name = column_name.into().to_uppercase();
        Self {
            database_id,
            table_name: table_name.into().to_uppercase(),
            nickname: column_name.clone(),
            column_name,
            protect_mode: ProtectMode::Govern,
        }
    }
}

/// A catalog datasource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogDatabase {
    pub id: i64,

    /// Engine type, e.g. `snowflake`
    #[serde(default)]
    pub dbtype: String,

    #[serde(default)]
    pub host: String,

    #[serde(default)]
    pub dbname: Option<String>,

    #[serde(default)]
    pub is_gone: bool,

    #[serde(default)]
    pub deleted: bool,
}

impl CatalogDatabase {
    /// Live datasource of the given engine with a database name
    pub fn is_live(&self, engine: &str) -> bool {
        self.dbtype == engine && !self.is_gone && !self.deleted && self.dbname.is_some()
    }

    pub fn is_on_host(&self, host: &str) -> bool {
        same_upper(&self.host, host)
    }
}

/// Catalog custom field that holds the governance tags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagField {
    pub id: i64,

    #[serde(default)]
    pub name_plural: String,

    #[serde(default)]
    pub field_type: String,
}

/// A warehouse column that currently carries the sync tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseColumnTag {
    pub database: String,
    pub schema: String,
    pub table: String,
    pub column: String,
    pub tag_value: String,
}

impl WarehouseColumnTag {
    pub fn fqn(&self) -> String {
        format!("{}.{}.{}.{}", self.database, self.schema, self.table, self.column)
    }
}

/// A table known to exist in a warehouse database
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    pub schema: String,
    pub table: String,
}

impl TableRef {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }

    /// `SCHEMA.TABLE`, uppercase
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.schema.to_uppercase(), self.table.to_uppercase())
    }
}
