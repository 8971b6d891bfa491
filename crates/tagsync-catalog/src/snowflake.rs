//! Snowflake object-tag writer
//!
//! Mirrors catalog tag values as a Snowflake object tag. The service user
//! needs:
//! - USAGE on each database and schema being tagged
//! - CREATE TAG on those schemas (or ownership of an existing tag)
//! - APPLY TAG on the account, or ownership of the tables
//! - IMPORTED PRIVILEGES on the SNOWFLAKE database for stale-tag cleanup
//!
//! ## Usage
//!
//! ```rust,ignore
//! let tagger = SnowflakeTagger::builder()
//!     .with_password("xy12345.us-east-1", "ALTR_SERVICE_USER", "password")
//!     .with_warehouse("COMPUTE_WH")
//!     .with_role("ALTR_SERVICE_ROLE")
//!     .with_tag_name("ALATION_TAG")
//!     .build()?;
//! ```

use crate::adapter::{ApiError, WarehouseTagger};
use tagsync_core::{TableRef, WarehouseColumnTag};

#[cfg(feature = "snowflake")]
use crate::statements;

#[cfg(feature = "snowflake")]
use snowflake_api::SnowflakeApi;

#[cfg(feature = "snowflake")]
use arrow_array::cast::AsArray;

#[cfg(feature = "snowflake")]
use arrow_array::Array;

const NOT_COMPILED: &str =
    "Snowflake support not compiled. Rebuild with: cargo build --features snowflake";

const DEFAULT_TAG_NAME: &str = "ALATION_TAG";

/// Builder for [`SnowflakeTagger`]
pub struct SnowflakeTaggerBuilder {
    account: String,
    username: String,
    password: String,
    warehouse: Option<String>,
    role: Option<String>,
    tag_name: String,
}

impl SnowflakeTaggerBuilder {
    /// New builder with password authentication
    pub fn with_password(
        account: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            account: account.into(),
            username: username.into(),
            password: password.into(),
            warehouse: None,
            role: None,
            tag_name: DEFAULT_TAG_NAME.to_string(),
        }
    }

    pub fn with_warehouse(mut self, warehouse: impl Into<String>) -> Self {
        self.warehouse = Some(warehouse.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Object tag to write (default `ALATION_TAG`)
    pub fn with_tag_name(mut self, tag_name: impl Into<String>) -> Self {
        self.tag_name = tag_name.into();
        self
    }

    /// Builder seeded from the `[warehouse]` settings
    pub fn from_config(config: &tagsync_core::Config) -> Self {
        let mut builder = Self::with_password(
            config.warehouse.account.clone(),
            config.warehouse.username.clone(),
            config.credentials.warehouse_password.clone(),
        )
        .with_tag_name(config.warehouse.tag_name.clone());

        if let Some(warehouse) = &config.warehouse.warehouse {
            builder = builder.with_warehouse(warehouse.clone());
        }
        if let Some(role) = &config.warehouse.role {
            builder = builder.with_role(role.clone());
        }
        builder
    }

    #[cfg(feature = "snowflake")]
    pub fn build(self) -> Result<SnowflakeTagger, ApiError> {
        let api = SnowflakeApi::with_password_auth(
            &self.account,
            self.warehouse.as_deref(),
            None,
            None,
            &self.username,
            self.role.as_deref(),
            &self.password,
        )
        .map_err(|e| {
            ApiError::AuthenticationError(format!("Failed to authenticate with Snowflake: {}", e))
        })?;

        Ok(SnowflakeTagger {
            api,
            account: self.account,
            tag_name: self.tag_name,
        })
    }

    #[cfg(not(feature = "snowflake"))]
    pub fn build(self) -> Result<SnowflakeTagger, ApiError> {
        Err(ApiError::ConfigError(NOT_COMPILED.to_string()))
    }
}

/// Snowflake implementation of [`WarehouseTagger`]
pub struct SnowflakeTagger {
    #[cfg(feature = "snowflake")]
    api: SnowflakeApi,

    account: String,
    tag_name: String,
}

impl SnowflakeTagger {
    /// Builder entry point
    pub fn builder() -> SnowflakeTaggerBuilderInit {
        SnowflakeTaggerBuilderInit
    }

    /// Run a query and collect the named string columns of every row
    #[cfg(feature = "snowflake")]
    async fn query_strings(&self, sql: &str, columns: &[&str]) -> Result<Vec<Vec<String>>, ApiError> {
        use snowflake_api::QueryResult;

        let result = self.api.exec(sql).await.map_err(|e| classify(e.to_string()))?;

        let mut rows = Vec::new();
        match result {
            QueryResult::Arrow(batches) => {
                for batch in batches {
                    let schema = batch.schema();
                    let mut arrays = Vec::with_capacity(columns.len());
                    for name in columns {
                        let idx = schema.index_of(name).map_err(|_| {
                            ApiError::InvalidResponse(format!("Missing {} column", name))
                        })?;
                        let array = batch.column(idx).as_string_opt::<i32>().ok_or_else(|| {
                            ApiError::InvalidResponse(format!("{} is not a string column", name))
                        })?;
                        arrays.push(array);
                    }

                    for row_idx in 0..batch.num_rows() {
                        let row = arrays
                            .iter()
                            .map(|array| {
                                if array.is_null(row_idx) {
                                    String::new()
                                } else {
                                    array.value(row_idx).to_string()
                                }
                            })
                            .collect();
                        rows.push(row);
                    }
                }
            }
            QueryResult::Json(_) => {
                return Err(ApiError::InvalidResponse(
                    "Unexpected JSON result format".to_string(),
                ));
            }
            QueryResult::Empty => {}
        }

        Ok(rows)
    }
}

/// Empty struct for builder pattern initialization
pub struct SnowflakeTaggerBuilderInit;

impl SnowflakeTaggerBuilderInit {
    pub fn with_password(
        self,
        account: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> SnowflakeTaggerBuilder {
        SnowflakeTaggerBuilder::with_password(account, username, password)
    }
}

/// Map a driver error message onto an [`ApiError`]
#[cfg_attr(not(feature = "snowflake"), allow(dead_code))]
fn classify(message: String) -> ApiError {
    if message.contains("Insufficient privileges") || message.contains("Permission") {
        ApiError::PermissionDenied(message)
    } else if message.contains("does not exist") || message.contains("not found") {
        ApiError::NotFound(message)
    } else {
        ApiError::QueryError(message)
    }
}

/// `(TABLE_SCHEMA, TABLE_NAME)` rows
#[cfg_attr(not(feature = "snowflake"), allow(dead_code))]
fn table_refs(rows: Vec<Vec<String>>) -> Vec<TableRef> {
    rows.into_iter()
        .filter_map(|row| match row.as_slice() {
            [schema, table] if !schema.is_empty() && !table.is_empty() => {
                Some(TableRef::new(schema.clone(), table.clone()))
            }
            _ => None,
        })
        .collect()
}

/// `(OBJECT_DATABASE, OBJECT_SCHEMA, OBJECT_NAME, COLUMN_NAME, TAG_VALUE)` rows
#[cfg_attr(not(feature = "snowflake"), allow(dead_code))]
fn column_tags(rows: Vec<Vec<String>>) -> Vec<WarehouseColumnTag> {
    rows.into_iter()
        .filter_map(|row| match row.as_slice() {
            [database, schema, table, column, tag_value]
                if !column.is_empty() && !tag_value.is_empty() =>
            {
                Some(WarehouseColumnTag {
                    database: database.clone(),
                    schema: schema.clone(),
                    table: table.clone(),
                    column: column.clone(),
                    tag_value: tag_value.clone(),
                })
            }
            _ => None,
        })
        .collect()
}

#[async_trait::async_trait]
impl WarehouseTagger for SnowflakeTagger {
    fn name(&self) -> &'static str {
        "Snowflake"
    }

    fn tag_name(&self) -> &str {
        &self.tag_name
    }

    #[cfg(feature = "snowflake")]
    async fn test_connection(&self) -> Result<(), ApiError> {
        self.api
            .exec("SELECT 1")
            .await
            .map_err(|e| ApiError::QueryError(format!("Connection test failed: {}", e)))?;
        Ok(())
    }

    #[cfg(not(feature = "snowflake"))]
    async fn test_connection(&self) -> Result<(), ApiError> {
        Err(ApiError::ConfigError(NOT_COMPILED.to_string()))
    }

    #[cfg(feature = "snowflake")]
    async fn execute(&self, statement: &str) -> Result<(), ApiError> {
        tracing::debug!(account = %self.account, statement, "Executing");
        self.api
            .exec(statement)
            .await
            .map_err(|e| classify(e.to_string()))?;
        Ok(())
    }

    #[cfg(not(feature = "snowflake"))]
    async fn execute(&self, _statement: &str) -> Result<(), ApiError> {
        Err(ApiError::ConfigError(NOT_COMPILED.to_string()))
    }

    #[cfg(feature = "snowflake")]
    async fn list_tables(&self, database: &str) -> Result<Vec<TableRef>, ApiError> {
        let rows = self
            .query_strings(&statements::list_tables(database), &["TABLE_SCHEMA", "TABLE_NAME"])
            .await?;
        Ok(table_refs(rows))
    }

    #[cfg(not(feature = "snowflake"))]
    async fn list_tables(&self, _database: &str) -> Result<Vec<TableRef>, ApiError> {
        Err(ApiError::ConfigError(NOT_COMPILED.to_string()))
    }

    #[cfg(feature = "snowflake")]
    async fn fetch_tagged_columns(
        &self,
        databases: &[String],
    ) -> Result<Vec<WarehouseColumnTag>, ApiError> {
        if databases.is_empty() {
            return Ok(Vec::new());
        }

        let rows = self
            .query_strings(
                &statements::tag_references(databases, &self.tag_name),
                &["OBJECT_DATABASE", "OBJECT_SCHEMA", "OBJECT_NAME", "COLUMN_NAME", "TAG_VALUE"],
            )
            .await?;
        Ok(column_tags(rows))
    }

    #[cfg(not(feature = "snowflake"))]
    async fn fetch_tagged_columns(
        &self,
        _databases: &[String],
    ) -> Result<Vec<WarehouseColumnTag>, ApiError> {
        Err(ApiError::ConfigError(NOT_COMPILED.to_string()))
    }
}
