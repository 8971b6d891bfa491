//! Sync pipeline
//!
//! Runs the fixed sequence of external calls for one sync. Every step is
//! awaited before the next starts, and any error aborts the remaining steps.
//!
//! 1. Probe permissions (catalog, protection service, optionally warehouse)
//! 2. Resolve the governance tag field
//! 3. Fetch and filter catalog datasources
//! 4. Fetch tagged columns; apply warehouse tags; unset stale tags (opt-in)
//! 5. Fetch registered databases
//! 6. Reconcile
//! 7. Register new databases
//! 8. Refresh registered databases
//! 9. Map columns to governance requests
//! 10. Submit governance requests
//! 11. Send update requests
//!
//! A dry run performs the reads of steps 1-6 and 9 and reports what the
//! other steps would do.

use tagsync_catalog::{CatalogSource, GovernanceOutcome, ProtectionTarget, WarehouseTagger};
use tagsync_core::{
    Config, Diagnostic, DiagnosticCode, MatchPolicy, Severity, SyncReport, TagField, TaggedColumn,
    TargetDatabase, WarehouseColumnTag,
};

use crate::column_mapper::{ColumnMapper, TableInventory};
use crate::columns::scan_columns;
use crate::error::SyncError;
use crate::filter::{datasource_names, filter_columns, filter_datasources};
use crate::reconcile::{existing_databases, reconcile, updatable_databases};
use crate::stale::find_stale_tags;
use crate::tag_plan::TagPlan;

/// Run options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Report without mutating anything
    pub dry_run: bool,

    pub match_policy: MatchPolicy,

    /// Unset warehouse tags that no longer match the catalog
    pub cleanup_stale_tags: bool,

    /// Include the warehouse in the permission probes
    pub probe_warehouse: bool,

    /// Catalog engine type of the warehouse datasources
    pub engine: String,

    /// Warehouse host as recorded in the catalog
    pub host: String,
}

impl SyncOptions {
    pub fn from_config(config: &Config, dry_run: bool) -> Self {
        Self {
            dry_run,
            match_policy: config.governance.match_policy,
            cleanup_stale_tags: config.governance.cleanup_stale_tags,
            probe_warehouse: config.warehouse.probe,
            engine: config.warehouse.engine.clone(),
            host: config.warehouse.hostname.clone(),
        }
    }
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self::from_config(&Config::default(), false)
    }
}

/// One sync run over injected adapters
pub struct SyncPipeline<'a> {
    catalog: &'a dyn CatalogSource,
    protection: &'a dyn ProtectionTarget,
    warehouse: &'a dyn WarehouseTagger,
    options: SyncOptions,
}

impl<'a> SyncPipeline<'a> {
    pub fn new(
        catalog: &'a dyn CatalogSource,
        protection: &'a dyn ProtectionTarget,
        warehouse: &'a dyn WarehouseTagger,
        options: SyncOptions,
    ) -> Self {
        Self {
            catalog,
            protection,
            warehouse,
            options,
        }
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Step 1: independent permission probes
    ///
    /// Both service probes always run so the operator sees every failure;
    /// the first one is returned.
    pub async fn check_access(&self, probe_warehouse: bool) -> Result<(), SyncError> {
        let mut failures = Vec::new();

        match self.catalog.check_access().await {
            Ok(()) => tracing::info!(system = self.catalog.name(), "Permission check passed"),
            Err(e) => failures.push((self.catalog.name(), e)),
        }

        match self.protection.check_access().await {
            Ok(()) => tracing::info!(system = self.protection.name(), "Permission check passed"),
            Err(e) => failures.push((self.protection.name(), e)),
        }

        if probe_warehouse {
            match self.warehouse.test_connection().await {
                Ok(()) => tracing::info!(system = self.warehouse.name(), "Connection check passed"),
                Err(e) => failures.push((self.warehouse.name(), e)),
            }
        }

        for (system, error) in &failures {
            tracing::error!(system, error = %error, "Permission check failed");
        }

        match failures.into_iter().next() {
            Some((system, error)) => Err(SyncError::PermissionDenied {
                system,
                reason: error.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Run the whole pipeline
    pub async fn run(&self) -> Result<SyncReport, SyncError> {
        let dry_run = self.options.dry_run;
        let mut report = SyncReport::new(dry_run);

        // 1. Permissions
        self.check_access(self.options.probe_warehouse).await?;

        // 2. Tag field
        let field = self.resolve_tag_field().await?;

        // 3. Datasources
        let databases = self
            .catalog
            .fetch_databases()
            .await
            .map_err(SyncError::api("fetch catalog databases"))?;
        let datasources = filter_datasources(databases, &self.options.engine, &self.options.host);
        tracing::info!(
            count = datasources.len(),
            engine = %self.options.engine,
            host = %self.options.host,
            "Catalog datasources on warehouse host"
        );

        // 4. Tagged columns
        let fetched = self
            .catalog
            .fetch_tagged_columns(&field)
            .await
            .map_err(SyncError::api("fetch tagged columns"))?;
        let columns = filter_columns(fetched, &datasources);

        let scan = scan_columns(&columns);
        report.summary.tagged_columns = columns.iter().flatten().count();
        let nothing_tagged = scan.is_empty();
        report.extend_diagnostics(scan.diagnostics);

        if nothing_tagged {
            tracing::info!("No tagged columns, nothing to do");
            return Ok(report);
        }
        tracing::info!(count = report.summary.tagged_columns, "Fetched tagged columns");

        // 4a. Warehouse tags
        let plan = TagPlan::build(&columns);
        report.extend_diagnostics(plan.diagnostics.iter().cloned());
        if !dry_run {
            report.summary.warehouse_tags_applied = self.apply_tag_plan(&plan).await?;
        }

        // 4b. Stale tags
        let stale = if self.options.cleanup_stale_tags && !dry_run {
            let stale = self.remove_stale_tags(&datasource_names(&datasources), &columns).await?;
            report.summary.stale_tags_removed = stale.len();
            report.extend_diagnostics(stale.iter().map(|tag| {
                Diagnostic::new(
                    DiagnosticCode::StaleWarehouseTag,
                    Severity::Info,
                    format!("Removed stale tag value '{}'", tag.tag_value),
                )
                .with_subject(tag.fqn())
            }));
            stale
        } else {
            Vec::new()
        };

        // 5. Registered databases
        let targets = self.fetch_targets().await?;

        // 6. Reconcile
        let reconciled = reconcile(&columns, &targets);
        tracing::info!(
            new = reconciled.new_names.len(),
            existing = reconciled.existing_names.len(),
            "Reconciled databases"
        );
        report.new_databases = reconciled.new_names.clone();

        // 7-8. Register and refresh
        let targets = if dry_run || reconciled.new_names.is_empty() {
            targets
        } else {
            for name in &reconciled.new_names {
                let created = self
                    .protection
                    .create_target_database(name)
                    .await
                    .map_err(SyncError::api("register database"))?;
                tracing::info!(database = %name, id = created.id, "Registered database");
                report.record_created(created);
            }
            self.fetch_targets().await?
        };

        // 9. Governance requests
        let inventory = self.table_inventory(&columns, &targets).await?;
        let mapping = ColumnMapper::new(self.options.match_policy)
            .with_inventory(&inventory)
            .map(&columns, &targets);
        tracing::info!(
            requests = mapping.requests.len(),
            unmatched = mapping.unmatched.len(),
            "Mapped columns"
        );
        report.extend_diagnostics(mapping.unmatched);
        report.set_governance_requests(mapping.requests);

        // 10. Submit
        if !dry_run {
            for request in &report.governance_requests.clone() {
                let outcome = self
                    .protection
                    .submit_governance_request(request)
                    .await
                    .map_err(SyncError::api("submit governance request"))?;

                match outcome {
                    GovernanceOutcome::Created => report.summary.governed += 1,
                    GovernanceOutcome::Conflict => {
                        report.summary.conflicts += 1;
                        report.add_diagnostic(
                            Diagnostic::new(
                                DiagnosticCode::GovernanceConflict,
                                Severity::Info,
                                "Column already governed",
                            )
                            .with_subject(format!("{}.{}", request.table_name, request.column_name)),
                        );
                    }
                }
            }
            tracing::info!(
                governed = report.summary.governed,
                conflicts = report.summary.conflicts,
                "Submitted governance requests"
            );
        }

        // 11. Updates
        for database in self.update_set(&columns, &targets, &stale) {
            if !dry_run {
                self.protection
                    .update_target_database(&database)
                    .await
                    .map_err(SyncError::api("update database"))?;
            }
            report.record_updated(database);
        }

        tracing::info!(
            dry_run,
            created = report.summary.databases_created,
            updated = report.summary.databases_updated,
            governed = report.summary.governed,
            "Sync finished"
        );
        Ok(report)
    }

    /// Step 2: exactly one governance tag field must exist
    async fn resolve_tag_field(&self) -> Result<TagField, SyncError> {
        let mut fields = self
            .catalog
            .fetch_tag_fields()
            .await
            .map_err(SyncError::api("fetch tag field"))?;

        match fields.len() {
            1 => {
                let field = fields.remove(0);
                tracing::info!(field_id = field.id, name = %field.name_plural, "Resolved tag field");
                Ok(field)
            }
            0 => Err(SyncError::Configuration(
                "governance tag field not found in the catalog".to_string(),
            )),
            n => Err(SyncError::Configuration(format!(
                "{} governance tag fields match, expected exactly one",
                n
            ))),
        }
    }

    async fn fetch_targets(&self) -> Result<Vec<TargetDatabase>, SyncError> {
        let targets = self
            .protection
            .fetch_target_databases()
            .await
            .map_err(SyncError::api("fetch registered databases"))?;
        tracing::info!(count = targets.len(), "Fetched registered databases");
        Ok(targets)
    }

    /// Step 4a; returns the number of column assignments applied
    async fn apply_tag_plan(&self, plan: &TagPlan) -> Result<usize, SyncError> {
        for allowed in &plan.allowed_values {
            self.warehouse
                .ensure_allowed_value(&allowed.database, &allowed.schema, &allowed.value)
                .await
                .map_err(SyncError::api("add allowed tag value"))?;
        }

        for assignment in &plan.assignments {
            self.warehouse
                .apply_warehouse_tag(&assignment.key, &assignment.value)
                .await
                .map_err(SyncError::api("apply warehouse tag"))?;
            tracing::debug!(column = %assignment.key, value = %assignment.value, "Applied warehouse tag");
        }

        tracing::info!(
            allowed_values = plan.allowed_values.len(),
            assignments = plan.assignments.len(),
            "Applied warehouse tags"
        );
        Ok(plan.assignments.len())
    }

    /// Step 4b; returns the tags that were unset
    async fn remove_stale_tags(
        &self,
        databases: &[String],
        columns: &[Option<TaggedColumn>],
    ) -> Result<Vec<WarehouseColumnTag>, SyncError> {
        let tagged = self
            .warehouse
            .fetch_tagged_columns(databases)
            .await
            .map_err(SyncError::api("fetch warehouse tags"))?;

        let stale = find_stale_tags(&tagged, columns);
        for tag in &stale {
            self.warehouse
                .unset_warehouse_tag(tag)
                .await
                .map_err(SyncError::api("unset warehouse tag"))?;
            tracing::info!(column = %tag.fqn(), value = %tag.tag_value, "Removed stale warehouse tag");
        }

        Ok(stale)
    }

    /// Warehouse tables of every registered catalog database, table policy only
    async fn table_inventory(
        &self,
        columns: &[Option<TaggedColumn>],
        targets: &[TargetDatabase],
    ) -> Result<TableInventory, SyncError> {
        let mut inventory = TableInventory::new();
        if self.options.match_policy != MatchPolicy::Table {
            return Ok(inventory);
        }

        let reconciled = reconcile(columns, targets);
        for database in &reconciled.existing_names {
            let tables = self
                .warehouse
                .list_tables(database)
                .await
                .map_err(SyncError::api("list warehouse tables"))?;
            tracing::debug!(database = %database, tables = tables.len(), "Loaded table inventory");
            inventory.insert(database, &tables);
        }

        Ok(inventory)
    }

    /// Step 11 update set
    fn update_set(
        &self,
        columns: &[Option<TaggedColumn>],
        targets: &[TargetDatabase],
        stale: &[WarehouseColumnTag],
    ) -> Vec<TargetDatabase> {
        if self.options.cleanup_stale_tags {
            updatable_databases(columns, targets, stale)
        } else {
            existing_databases(&reconcile(columns, targets), targets)
        }
    }
}
