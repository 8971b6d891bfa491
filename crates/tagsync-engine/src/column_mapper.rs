//! Column mapper: catalog columns to governance requests
//!
//! Each well-formed column is resolved against the registered databases by
//! case-insensitive name. Columns in unregistered databases are dropped; this
//! is expected on the first pass of a run, before new databases exist.

use std::collections::{HashMap, HashSet};
use tagsync_core::{
    Diagnostic, DiagnosticCode, GovernanceRequest, MatchPolicy, Severity, TableRef, TaggedColumn,
    TargetDatabase,
};

use crate::columns::scan_columns;

/// Base tables per warehouse database, used by [`MatchPolicy::Table`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableInventory {
    tables: HashMap<String, HashSet<String>>,
}

impl TableInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the tables of one database
    pub fn insert(&mut self, database: &str, tables: &[TableRef]) {
        self.tables
            .entry(database.to_uppercase())
            .or_default()
            .extend(tables.iter().map(TableRef::qualified));
    }

    pub fn has_database(&self, database: &str) -> bool {
        self.tables.contains_key(&database.to_uppercase())
    }

    /// Whether `SCHEMA.TABLE` exists in `database`
    pub fn contains(&self, database: &str, table_name: &str) -> bool {
        self.tables
            .get(&database.to_uppercase())
            .is_some_and(|tables| tables.contains(&table_name.to_uppercase()))
    }
}

/// Output of a mapping pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappingResult {
    /// Requests in catalog column order
    pub requests: Vec<GovernanceRequest>,

    /// Null and malformed entries
    pub skipped: Vec<Diagnostic>,

    /// Well-formed columns that could not be matched
    pub unmatched: Vec<Diagnostic>,
}

/// Joins columns to registered databases
#[derive(Debug, Clone, Copy)]
pub struct ColumnMapper<'a> {
    policy: MatchPolicy,
    inventory: Option<&'a TableInventory>,
}

impl<'a> ColumnMapper<'a> {
    pub fn new(policy: MatchPolicy) -> Self {
        Self {
            policy,
            inventory: None,
        }
    }

    /// Warehouse tables consulted under [`MatchPolicy::Table`]
    pub fn with_inventory(mut self, inventory: &'a TableInventory) -> Self {
        self.inventory = Some(inventory);
        self
    }

    /// Build one request per matched column
    pub fn map(&self, columns: &[Option<TaggedColumn>], targets: &[TargetDatabase]) -> MappingResult {
        let scan = scan_columns(columns);
        let mut result = MappingResult {
            skipped: scan.diagnostics,
            ..Default::default()
        };

        for parsed in &scan.parsed {
            let key = &parsed.key;

            let Some(target) = targets.iter().find(|db| db.matches(&key.database)) else {
                tracing::debug!(column = %key, "No registered database for column");
                result.unmatched.push(
                    Diagnostic::new(
                        DiagnosticCode::UnregisteredDatabase,
                        Severity::Info,
                        format!("Database '{}' is not registered", key.database_upper()),
                    )
                    .with_subject(parsed.column.key.clone())
                    .at_index(parsed.index),
                );
                continue;
            };

            let table_name = key.table_name();
            if self.policy == MatchPolicy::Table {
                let known = self
                    .inventory
                    .is_some_and(|inventory| inventory.contains(&key.database, &table_name));

                if !known {
                    tracing::warn!(column = %key, table = %table_name, "Table not found in warehouse");
                    result.unmatched.push(
                        Diagnostic::skipped(
                            DiagnosticCode::UnknownTable,
                            format!(
                                "Table '{}' not found in database '{}'",
                                table_name,
                                key.database_upper()
                            ),
                        )
                        .with_subject(parsed.column.key.clone())
                        .at_index(parsed.index),
                    );
                    continue;
                }
            }

            result
                .requests
                .push(GovernanceRequest::new(target.id, table_name, parsed.column_name()));
        }

        result
    }
}

/// Map with [`MatchPolicy::Database`], requests only
pub fn map_columns(columns: &[Option<TaggedColumn>], targets: &[TargetDatabase]) -> Vec<GovernanceRequest> {
    ColumnMapper::new(MatchPolicy::Database).map(columns, targets).requests
}
