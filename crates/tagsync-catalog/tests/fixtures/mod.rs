//! Test fixtures for adapter integration tests
//!
//! A small catalog with two warehouse databases on the same account, one
//! database on another account and one retired datasource.

#![allow(dead_code)]

use tagsync_core::{CatalogDatabase, TaggedColumn, TargetDatabase, WarehouseColumnTag};

pub const HOST: &str = "xy12345.snowflakecomputing.com";

pub fn datasource(id: i64, dbname: &str, host: &str) -> CatalogDatabase {
    CatalogDatabase {
        id,
        dbtype: "snowflake".to_string(),
        host: host.to_string(),
        dbname: Some(dbname.to_string()),
        is_gone: false,
        deleted: false,
    }
}

/// Datasources as the catalog lists them
pub fn datasources() -> Vec<CatalogDatabase> {
    vec![
        datasource(1, "SALES", HOST),
        datasource(2, "HR", "XY12345.SNOWFLAKECOMPUTING.COM"),
        datasource(3, "FINANCE", "other.snowflakecomputing.com"),
        CatalogDatabase {
            is_gone: true,
            ..datasource(4, "ARCHIVE", HOST)
        },
    ]
}

pub fn column(key: &str, tags: &[&str]) -> TaggedColumn {
    let name = key.rsplit('.').next().unwrap_or(key).to_string();
    let datasource_id = key
        .split('.')
        .next()
        .and_then(|id| id.parse().ok())
        .unwrap_or_default();

    TaggedColumn::new(key, name)
        .with_datasource(datasource_id)
        .with_tags(tags.iter().copied())
}

/// Tagged columns with one null placeholder and one malformed key
pub fn tagged_columns() -> Vec<Option<TaggedColumn>> {
    vec![
        Some(column("1.sales.public.orders.amount", &["PCI"])),
        Some(column("1.sales.public.customers.email", &["PII", "GDPR"])),
        None,
        Some(column("2.hr.payroll.salaries.base_pay", &["CONFIDENTIAL"])),
        Some(column("2.hr.employees", &["PII"])),
        Some(column("3.finance.gl.entries.amount", &["SOX"])),
    ]
}

pub fn registered() -> Vec<TargetDatabase> {
    vec![TargetDatabase::new(10, "SALES")]
}

pub fn warehouse_tag(fqn: &str, value: &str) -> WarehouseColumnTag {
    let parts: Vec<&str> = fqn.split('.').collect();
    WarehouseColumnTag {
        database: parts[0].to_string(),
        schema: parts[1].to_string(),
        table: parts[2].to_string(),
        column: parts[3].to_string(),
        tag_value: value.to_string(),
    }
}
