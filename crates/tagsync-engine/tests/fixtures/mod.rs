//! Pipeline fixtures
//!
//! Two warehouse databases on the configured host (SALES registered, HR
//! not), one database on another account, one null placeholder and one
//! malformed key.

#![allow(dead_code)]

use tagsync_catalog::{MockCatalog, MockProtection, MockWarehouse};
use tagsync_core::{CatalogDatabase, MatchPolicy, TaggedColumn, TargetDatabase, WarehouseColumnTag};
use tagsync_engine::SyncOptions;

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

pub fn datasources() -> Vec<CatalogDatabase> {
    vec![
        datasource(1, "SALES", HOST),
        datasource(2, "HR", HOST),
        datasource(3, "FINANCE", "other.snowflakecomputing.com"),
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

pub fn tagged_columns() -> Vec<Option<TaggedColumn>> {
    vec![
        Some(column("1.sales.public.orders.amount", &["PCI"])),
        Some(column("1.sales.public.customers.email", &["PII"])),
        None,
        Some(column("2.hr.payroll.salaries.base_pay", &["CONFIDENTIAL"])),
        Some(column("2.hr.employees", &["PII"])),
        Some(column("3.finance.gl.entries.amount", &["SOX"])),
    ]
}

pub fn catalog() -> MockCatalog {
    MockCatalog::new()
        .with_databases(datasources())
        .with_columns(tagged_columns())
}

pub fn protection() -> MockProtection {
    MockProtection::new().with_databases(vec![TargetDatabase::new(10, "SALES")])
}

pub fn warehouse() -> MockWarehouse {
    MockWarehouse::new()
        .with_tables("SALES", &[("PUBLIC", "ORDERS"), ("PUBLIC", "CUSTOMERS")])
        .with_tables("HR", &[("PAYROLL", "SALARIES")])
}

pub fn options() -> SyncOptions {
    SyncOptions {
        dry_run: false,
        match_policy: MatchPolicy::Database,
        cleanup_stale_tags: false,
        probe_warehouse: false,
        engine: "snowflake".to_string(),
        host: HOST.to_string(),
    }
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
