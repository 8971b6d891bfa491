//! Catalog filtering by warehouse engine and host

use std::collections::HashSet;
use tagsync_core::{CatalogDatabase, TaggedColumn};

/// Live datasources of `engine` on `host` (host compared case-insensitively)
pub fn filter_datasources(
    databases: Vec<CatalogDatabase>,
    engine: &str,
    host: &str,
) -> Vec<CatalogDatabase> {
    databases
        .into_iter()
        .filter(|db| db.is_live(engine) && db.is_on_host(host))
        .collect()
}

/// Keep columns whose datasource survived filtering
///
/// Null entries are kept so the scan can account for them.
pub fn filter_columns(
    columns: Vec<Option<TaggedColumn>>,
    datasources: &[CatalogDatabase],
) -> Vec<Option<TaggedColumn>> {
    let ids: HashSet<i64> = datasources.iter().map(|db| db.id).collect();

    columns
        .into_iter()
        .filter(|entry| match entry {
            Some(column) => ids.contains(&column.datasource_id),
            None => true,
        })
        .collect()
}

/// Uppercase database names of the datasources, first-seen order
pub fn datasource_names(datasources: &[CatalogDatabase]) -> Vec<String> {
    let mut seen = HashSet::new();
    datasources
        .iter()
        .filter_map(|db| db.dbname.as_deref())
        .map(str::to_uppercase)
        .filter(|name| seen.insert(name.clone()))
        .collect()
}
