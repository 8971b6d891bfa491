//! Capability traits consumed by the sync pipeline

use tagsync_core::{
    CatalogDatabase, GovernanceRequest, QualifiedKey, TableRef, TagField, TaggedColumn,
    TargetDatabase, WarehouseColumnTag,
};

use crate::statements;

/// Errors that can occur when talking to an external system
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Query failed: {0}")]
    QueryError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ApiError {
    /// Map a non-success HTTP status to an error
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            401 => Self::AuthenticationError(body),
            403 => Self::PermissionDenied(body),
            404 => Self::NotFound(body),
            409 => Self::Conflict(body),
            _ => Self::Status { status, body },
        }
    }

    /// Whether a retry could plausibly succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::NetworkError(_) => true,
            Self::Status { status, .. } => crate::http::is_retryable_status(*status),
            _ => false,
        }
    }
}

/// Outcome of a governance request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GovernanceOutcome {
    /// Column is now governed
    Created,

    /// Column was already governed
    Conflict,
}

/// Data catalog holding the governance tags
#[async_trait::async_trait]
pub trait CatalogSource: Send + Sync {
    /// Adapter name for logs
    fn name(&self) -> &'static str;

    /// Probe that the configured operator can read the catalog
    async fn check_access(&self) -> Result<(), ApiError>;

    /// Custom field definitions matching the configured type and name
    async fn fetch_tag_fields(&self) -> Result<Vec<TagField>, ApiError>;

    /// All catalog datasources, unfiltered
    async fn fetch_databases(&self) -> Result<Vec<CatalogDatabase>, ApiError>;

    /// Columns carrying a value in `field`
    ///
    /// Entries may be `None`: the catalog returns null placeholders for
    /// deleted objects.
    async fn fetch_tagged_columns(
        &self,
        field: &TagField,
    ) -> Result<Vec<Option<TaggedColumn>>, ApiError>;
}

/// Data-protection service that governs columns
#[async_trait::async_trait]
pub trait ProtectionTarget: Send + Sync {
    fn name(&self) -> &'static str;

    /// Probe that the configured key has administrator access
    async fn check_access(&self) -> Result<(), ApiError>;

    /// Databases currently registered
    async fn fetch_target_databases(&self) -> Result<Vec<TargetDatabase>, ApiError>;

    /// Register a warehouse database; the returned record carries the new id
    async fn create_target_database(&self, name: &str) -> Result<TargetDatabase, ApiError>;

    /// Govern one column
    async fn submit_governance_request(
        &self,
        request: &GovernanceRequest,
    ) -> Result<GovernanceOutcome, ApiError>;

    /// Ask the service to re-import warehouse tags for a database
    async fn update_target_database(&self, database: &TargetDatabase) -> Result<(), ApiError>;
}

/// Warehouse that mirrors catalog tags as object tags
///
/// Implementations only need [`execute`](WarehouseTagger::execute) and the
/// read queries; tag statements are built by [`statements`].
#[async_trait::async_trait]
pub trait WarehouseTagger: Send + Sync {
    fn name(&self) -> &'static str;

    /// Object tag name used for every column
    fn tag_name(&self) -> &str;

    /// Test the connection to the warehouse
    async fn test_connection(&self) -> Result<(), ApiError>;

    /// Execute one statement, discarding any result rows
    async fn execute(&self, statement: &str) -> Result<(), ApiError>;

    /// Base tables of a database
    async fn list_tables(&self, database: &str) -> Result<Vec<TableRef>, ApiError>;

    /// Columns in `databases` that currently carry the sync tag
    async fn fetch_tagged_columns(
        &self,
        databases: &[String],
    ) -> Result<Vec<WarehouseColumnTag>, ApiError>;

    /// Make sure the tag exists in `database.schema` and accepts `value`
    async fn ensure_allowed_value(
        &self,
        database: &str,
        schema: &str,
        value: &str,
    ) -> Result<(), ApiError> {
        self.execute(&statements::create_tag(database, schema, self.tag_name()))
            .await?;
        self.execute(&statements::add_allowed_value(
            database,
            schema,
            self.tag_name(),
            value,
        ))
        .await
    }

    /// Set the tag on the column identified by `key`
    async fn apply_warehouse_tag(&self, key: &QualifiedKey, value: &str) -> Result<(), ApiError> {
        self.execute(&statements::set_column_tag(
            &key.database,
            &key.schema,
            &key.table,
            &key.column,
            self.tag_name(),
            value,
        ))
        .await
    }

    /// Remove the tag from a warehouse column
    async fn unset_warehouse_tag(&self, column: &WarehouseColumnTag) -> Result<(), ApiError> {
        self.execute(&statements::unset_column_tag(
            &column.database,
            &column.schema,
            &column.table,
            &column.column,
            self.tag_name(),
        ))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert!(matches!(ApiError::from_status(401, "x"), ApiError::AuthenticationError(_)));
        assert!(matches!(ApiError::from_status(403, "x"), ApiError::PermissionDenied(_)));
        assert!(matches!(ApiError::from_status(409, "x"), ApiError::Conflict(_)));
        assert_eq!(
            ApiError::from_status(500, "boom"),
            ApiError::Status { status: 500, body: "boom".to_string() }
        );
    }

    #[test]
    fn transient_classification() {
        assert!(ApiError::NetworkError("reset".to_string()).is_transient());
        assert!(ApiError::from_status(503, "").is_transient());
        assert!(ApiError::from_status(429, "").is_transient());
        assert!(!ApiError::from_status(400, "").is_transient());
        assert!(!ApiError::from_status(409, "").is_transient());
        assert!(!ApiError::InvalidResponse("bad json".to_string()).is_transient());
    }

    #[test]
    fn error_display() {
        let err = ApiError::Status { status: 502, body: "bad gateway".to_string() };
        assert_eq!(err.to_string(), "HTTP 502: bad gateway");
    }
}
