//! Stale warehouse tag detection
//!
//! A warehouse column carrying the sync tag is stale when no catalog column at
//! the same location (case-insensitive) still lists that tag value.

use tagsync_core::{TaggedColumn, WarehouseColumnTag};

use crate::columns::scan_columns;

/// Warehouse tags with no matching catalog assignment, in warehouse order
pub fn find_stale_tags(
    warehouse_tags: &[WarehouseColumnTag],
    columns: &[Option<TaggedColumn>],
) -> Vec<WarehouseColumnTag> {
    let scan = scan_columns(columns);

    warehouse_tags
        .iter()
        .filter(|tag| {
            !scan.parsed.iter().any(|parsed| {
                parsed
                    .key
                    .same_column(&tag.database, &tag.schema, &tag.table, &tag.column)
                    && parsed.column.tag_values.iter().any(|value| *value == tag.tag_value)
            })
        })
        .cloned()
        .collect()
}
