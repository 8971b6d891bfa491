//! In-memory adapters for testing
//!
//! Each mock keeps its state behind `Arc<RwLock<..>>`, so a clone handed to
//! the pipeline shares state with the copy kept by the test. Every trait call
//! is appended to a call log, and any operation can be made to fail.
//!
//! ```rust,ignore
//! let catalog = MockCatalog::new()
//!     .with_databases(vec![datasource(1, "SALES")])
//!     .with_columns(vec![Some(column("1.sales.public.orders.amount", &["PCI"]))]);
//!
//! let protection = MockProtection::new().with_databases(vec![TargetDatabase::new(10, "SALES")]);
//! protection.fail_on("update_target_database", ApiError::NetworkError("reset".into())).await;
//! ```

use crate::adapter::{ApiError, CatalogSource, GovernanceOutcome, ProtectionTarget, WarehouseTagger};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tagsync_core::{
    CatalogDatabase, GovernanceRequest, TableRef, TagField, TaggedColumn, TargetDatabase,
    WarehouseColumnTag,
};
use tokio::sync::RwLock;

type Failures = Arc<RwLock<HashMap<&'static str, ApiError>>>;

async fn check_failure(failures: &Failures, op: &'static str) -> Result<(), ApiError> {
    match failures.read().await.get(op) {
        Some(error) => Err(error.clone()),
        None => Ok(()),
    }
}

async fn simulate_latency(latency_ms: u64) {
    if latency_ms > 0 {
        tokio::time::sleep(std::time::Duration::from_millis(latency_ms)).await;
    }
}

/// Default governance tag field served by [`MockCatalog`]
pub fn default_tag_field() -> TagField {
    TagField {
        id: 1,
        name_plural: "ALTR Policy Tags".to_string(),
        field_type: "MULTI_PICKER".to_string(),
    }
}

#[derive(Debug, Default)]
struct CatalogState {
    tag_fields: Vec<TagField>,
    databases: Vec<CatalogDatabase>,
    columns: Vec<Option<TaggedColumn>>,
    calls: Vec<&'static str>,
}

/// Mock data catalog
#[derive(Clone)]
pub struct MockCatalog {
    state: Arc<RwLock<CatalogState>>,
    failures: Failures,
    latency_ms: u64,
}

impl MockCatalog {
    /// Catalog with one governance tag field and no data
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(CatalogState {
                tag_fields: vec![default_tag_field()],
                ..Default::default()
            })),
            failures: Arc::new(RwLock::new(HashMap::new())),
            latency_ms: 0,
        }
    }

    pub fn with_tag_fields(self, tag_fields: Vec<TagField>) -> Self {
        self.update(|state| state.tag_fields = tag_fields)
    }

    pub fn with_databases(self, databases: Vec<CatalogDatabase>) -> Self {
        self.update(|state| state.databases = databases)
    }

    /// Columns returned for any tag field; `None` entries model null placeholders
    pub fn with_columns(self, columns: Vec<Option<TaggedColumn>>) -> Self {
        self.update(|state| state.columns = columns)
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Make the named trait operation fail
    pub async fn fail_on(&self, op: &'static str, error: ApiError) {
        self.failures.write().await.insert(op, error);
    }

    /// Trait operations invoked so far, in order
    pub async fn calls(&self) -> Vec<&'static str> {
        self.state.read().await.calls.clone()
    }

    fn update(self, f: impl FnOnce(&mut CatalogState)) -> Self {
        // Only called while building, before the state is shared
        if let Ok(mut state) = self.state.try_write() {
            f(&mut state);
        }
        self
    }

    async fn enter(&self, op: &'static str) -> Result<(), ApiError> {
        simulate_latency(self.latency_ms).await;
        self.state.write().await.calls.push(op);
        check_failure(&self.failures, op).await
    }
}

impl Default for MockCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CatalogSource for MockCatalog {
    fn name(&self) -> &'static str {
        "MockCatalog"
    }

    async fn check_access(&self) -> Result<(), ApiError> {
        self.enter("check_access").await
    }

    async fn fetch_tag_fields(&self) -> Result<Vec<TagField>, ApiError> {
        self.enter("fetch_tag_fields").await?;
        Ok(self.state.read().await.tag_fields.clone())
    }

    async fn fetch_databases(&self) -> Result<Vec<CatalogDatabase>, ApiError> {
        self.enter("fetch_databases").await?;
        Ok(self.state.read().await.databases.clone())
    }

    async fn fetch_tagged_columns(
        &self,
        _field: &TagField,
    ) -> Result<Vec<Option<TaggedColumn>>, ApiError> {
        self.enter("fetch_tagged_columns").await?;
        Ok(self.state.read().await.columns.clone())
    }
}

#[derive(Debug, Default)]
struct ProtectionState {
    databases: Vec<TargetDatabase>,
    next_id: i64,
    created: Vec<String>,
    requests: Vec<GovernanceRequest>,
    governed: HashSet<(i64, String, String)>,
    updated: Vec<TargetDatabase>,
    calls: Vec<&'static str>,
}

/// Mock protection service
///
/// Created databases get increasing ids starting after the highest
/// pre-registered one. Submitting the same column twice yields
/// [`GovernanceOutcome::Conflict`], as the real service answers 409.
#[derive(Clone)]
pub struct MockProtection {
    state: Arc<RwLock<ProtectionState>>,
    failures: Failures,
    create_failures: Arc<RwLock<HashMap<String, ApiError>>>,
    latency_ms: u64,
}

impl MockProtection {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(ProtectionState {
                next_id: 1,
                ..Default::default()
            })),
            failures: Arc::new(RwLock::new(HashMap::new())),
            create_failures: Arc::new(RwLock::new(HashMap::new())),
            latency_ms: 0,
        }
    }

    /// Pre-registered databases
    pub fn with_databases(self, databases: Vec<TargetDatabase>) -> Self {
        self.update(|state| {
            state.next_id = databases.iter().map(|db| db.id).max().unwrap_or(0) + 1;
            state.databases = databases;
        })
    }

    /// Columns that are already governed, as `(database id, SCHEMA.TABLE, COLUMN)`
    pub fn with_governed(self, columns: &[(i64, &str, &str)]) -> Self {
        self.update(|state| {
            state.governed.extend(
                columns
                    .iter()
                    .map(|(id, table, column)| (*id, table.to_uppercase(), column.to_uppercase())),
            );
        })
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Make the named trait operation fail
    pub async fn fail_on(&self, op: &'static str, error: ApiError) {
        self.failures.write().await.insert(op, error);
    }

    /// Make registration of one database fail
    pub async fn fail_create_for(&self, name: &str, error: ApiError) {
        self.create_failures.write().await.insert(name.to_uppercase(), error);
    }

    pub async fn registered_databases(&self) -> Vec<TargetDatabase> {
        self.state.read().await.databases.clone()
    }

    /// Names passed to `create_target_database`, in order
    pub async fn created_databases(&self) -> Vec<String> {
        self.state.read().await.created.clone()
    }

    /// Every governance request received, conflicts included
    pub async fn governance_requests(&self) -> Vec<GovernanceRequest> {
        self.state.read().await.requests.clone()
    }

    pub async fn updated_databases(&self) -> Vec<TargetDatabase> {
        self.state.read().await.updated.clone()
    }

    pub async fn calls(&self) -> Vec<&'static str> {
        self.state.read().await.calls.clone()
    }

    fn update(self, f: impl FnOnce(&mut ProtectionState)) -> Self {
        if let Ok(mut state) = self.state.try_write() {
            f(&mut state);
        }
        self
    }

    async fn enter(&self, op: &'static str) -> Result<(), ApiError> {
        simulate_latency(self.latency_ms).await;
        self.state.write().await.calls.push(op);
        check_failure(&self.failures, op).await
    }
}

impl Default for MockProtection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ProtectionTarget for MockProtection {
    fn name(&self) -> &'static str {
        "MockProtection"
    }

    async fn check_access(&self) -> Result<(), ApiError> {
        self.enter("check_access").await
    }

    async fn fetch_target_databases(&self) -> Result<Vec<TargetDatabase>, ApiError> {
        self.enter("fetch_target_databases").await?;
        Ok(self.state.read().await.databases.clone())
    }

    async fn create_target_database(&self, name: &str) -> Result<TargetDatabase, ApiError> {
        self.enter("create_target_database").await?;

        let mut state = self.state.write().await;
        state.created.push(name.to_string());

        if let Some(error) = self.create_failures.read().await.get(&name.to_uppercase()) {
            return Err(error.clone());
        }

        let database = TargetDatabase {
            id: state.next_id,
            name: name.to_string(),
            friendly_name: Some(name.to_uppercase()),
        };
        state.next_id += 1;
        state.databases.push(database.clone());
        Ok(database)
    }

    async fn submit_governance_request(
        &self,
        request: &GovernanceRequest,
    ) -> Result<GovernanceOutcome, ApiError> {
        self.enter("submit_governance_request").await?;

        let mut state = self.state.write().await;
        state.requests.push(request.clone());

        let key = (
            request.database_id,
            request.table_name.to_uppercase(),
            request.column_name.to_uppercase(),
        );
        if state.governed.insert(key) {
            Ok(GovernanceOutcome::Created)
        } else {
            Ok(GovernanceOutcome::Conflict)
        }
    }

    async fn update_target_database(&self, database: &TargetDatabase) -> Result<(), ApiError> {
        self.enter("update_target_database").await?;
        self.state.write().await.updated.push(database.clone());
        Ok(())
    }
}

#[derive(Debug, Default)]
struct WarehouseState {
    tables: HashMap<String, Vec<TableRef>>,
    tagged: Vec<WarehouseColumnTag>,
    statements: Vec<String>,
    failing_statements: Vec<(String, ApiError)>,
    calls: Vec<&'static str>,
}

/// Mock warehouse recording every statement it is asked to execute
#[derive(Clone)]
pub struct MockWarehouse {
    state: Arc<RwLock<WarehouseState>>,
    failures: Failures,
    fail_connection: bool,
    tag_name: String,
}

impl MockWarehouse {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(WarehouseState::default())),
            failures: Arc::new(RwLock::new(HashMap::new())),
            fail_connection: false,
            tag_name: "ALATION_TAG".to_string(),
        }
    }

    /// Base tables of one database
    pub fn with_tables(self, database: &str, tables: &[(&str, &str)]) -> Self {
        let database = database.to_uppercase();
        let tables = tables
            .iter()
            .map(|(schema, table)| TableRef::new(*schema, *table))
            .collect();
        self.update(|state| {
            state.tables.insert(database, tables);
        })
    }

    /// Columns that currently carry the sync tag
    pub fn with_tagged_columns(self, tagged: Vec<WarehouseColumnTag>) -> Self {
        self.update(|state| state.tagged = tagged)
    }

    pub fn with_tag_name(mut self, tag_name: impl Into<String>) -> Self {
        self.tag_name = tag_name.into();
        self
    }

    pub fn with_connection_failure(mut self) -> Self {
        self.fail_connection = true;
        self
    }

    pub async fn fail_on(&self, op: &'static str, error: ApiError) {
        self.failures.write().await.insert(op, error);
    }

    /// Fail any statement containing `pattern`
    pub async fn fail_statements_containing(&self, pattern: &str, error: ApiError) {
        self.state
            .write()
            .await
            .failing_statements
            .push((pattern.to_string(), error));
    }

    /// Statements executed so far, failed ones included
    pub async fn statements(&self) -> Vec<String> {
        self.state.read().await.statements.clone()
    }

    pub async fn calls(&self) -> Vec<&'static str> {
        self.state.read().await.calls.clone()
    }

    fn update(self, f: impl FnOnce(&mut WarehouseState)) -> Self {
        if let Ok(mut state) = self.state.try_write() {
            f(&mut state);
        }
        self
    }

    async fn enter(&self, op: &'static str) -> Result<(), ApiError> {
        self.state.write().await.calls.push(op);
        check_failure(&self.failures, op).await
    }
}

impl Default for MockWarehouse {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl WarehouseTagger for MockWarehouse {
    fn name(&self) -> &'static str {
        "MockWarehouse"
    }

    fn tag_name(&self) -> &str {
        &self.tag_name
    }

    async fn test_connection(&self) -> Result<(), ApiError> {
        self.enter("test_connection").await?;
        if self.fail_connection {
            Err(ApiError::NetworkError("Simulated connection failure".to_string()))
        } else {
            Ok(())
        }
    }

    async fn execute(&self, statement: &str) -> Result<(), ApiError> {
        self.enter("execute").await?;

        let mut state = self.state.write().await;
        state.statements.push(statement.to_string());

        match state
            .failing_statements
            .iter()
            .find(|(pattern, _)| statement.contains(pattern.as_str()))
        {
            Some((_, error)) => Err(error.clone()),
            None => Ok(()),
        }
    }

    async fn list_tables(&self, database: &str) -> Result<Vec<TableRef>, ApiError> {
        self.enter("list_tables").await?;
        Ok(self
            .state
            .read()
            .await
            .tables
            .get(&database.to_uppercase())
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_tagged_columns(
        &self,
        databases: &[String],
    ) -> Result<Vec<WarehouseColumnTag>, ApiError> {
        self.enter("fetch_tagged_columns").await?;
        Ok(self
            .state
            .read()
            .await
            .tagged
            .iter()
            .filter(|tag| databases.iter().any(|db| db.to_uppercase() == tag.database.to_uppercase()))
            .cloned()
            .collect())
    }
}
