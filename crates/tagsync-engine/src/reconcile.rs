//! Set reconciliation of catalog databases against registered databases
//!
//! A = uppercase database segments of the catalog column keys
//! B = uppercase names of the databases registered in the protection system
//!
//! `new = A − B` must be registered; `existing = A ∩ B` gets update requests.
//! Both keep first-seen order from the column listing.

use std::collections::HashSet;
use tagsync_core::{Diagnostic, TaggedColumn, TargetDatabase, WarehouseColumnTag};

use crate::columns::scan_columns;

/// Partition of the catalog database names
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileResult {
    /// Databases to register, uppercase
    pub new_names: Vec<String>,

    /// Databases already registered, uppercase
    pub existing_names: Vec<String>,

    /// Null and malformed entries that were skipped
    pub skipped: Vec<Diagnostic>,
}

impl ReconcileResult {
    /// Every catalog database name, new first
    pub fn all_names(&self) -> impl Iterator<Item = &String> {
        self.new_names.iter().chain(self.existing_names.iter())
    }
}

/// Deduplicated uppercase database names, first-seen order
fn catalog_names(columns: &[Option<TaggedColumn>]) -> (Vec<String>, Vec<Diagnostic>) {
    let scan = scan_columns(columns);
    let mut seen = HashSet::new();
    let names = scan
        .parsed
        .iter()
        .map(|parsed| parsed.key.database_upper())
        .filter(|name| seen.insert(name.clone()))
        .collect();

    (names, scan.diagnostics)
}

fn target_names(targets: &[TargetDatabase]) -> HashSet<String> {
    targets.iter().map(TargetDatabase::normalized_name).collect()
}

/// Split catalog databases into new and existing
pub fn reconcile(columns: &[Option<TaggedColumn>], targets: &[TargetDatabase]) -> ReconcileResult {
    let (names, skipped) = catalog_names(columns);
    let registered = target_names(targets);

    let (existing_names, new_names): (Vec<String>, Vec<String>) = names
        .into_iter()
        .partition(|name| registered.contains(name));

    ReconcileResult {
        new_names,
        existing_names,
        skipped,
    }
}

/// Resolve existing names back to target records, first match per name
pub fn existing_databases(result: &ReconcileResult, targets: &[TargetDatabase]) -> Vec<TargetDatabase> {
    result
        .existing_names
        .iter()
        .filter_map(|name| targets.iter().find(|db| db.matches(name)).cloned())
        .collect()
}

/// Target databases that need an update request
///
/// A database qualifies when the catalog has tagged columns in it, or when a
/// stale warehouse tag was removed from it. Target-list order.
pub fn updatable_databases(
    columns: &[Option<TaggedColumn>],
    targets: &[TargetDatabase],
    stale: &[WarehouseColumnTag],
) -> Vec<TargetDatabase> {
    let (names, _) = catalog_names(columns);
    let mut wanted: HashSet<String> = names.into_iter().collect();
    wanted.extend(stale.iter().map(|tag| tag.database.to_uppercase()));

    let mut seen = HashSet::new();
    targets
        .iter()
        .filter(|db| wanted.contains(&db.normalized_name()))
        .filter(|db| seen.insert(db.normalized_name()))
        .cloned()
        .collect()
}
