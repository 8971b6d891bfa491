//! tagsync engine - reconciliation logic
//!
//! This crate decides what a run changes:
//! - Catalog filtering by warehouse engine and host
//! - Set reconciliation of catalog databases against registered ones
//! - Column mapping into governance requests
//! - Warehouse tag planning and stale tag detection
//! - The sequential sync pipeline tying the adapters together

pub mod columns;
pub mod filter;
pub mod reconcile;
pub mod column_mapper;
pub mod tag_plan;
pub mod stale;
pub mod error;
pub mod orchestrator;

pub use columns::{scan_columns, ColumnScan, ParsedColumn};
pub use filter::{datasource_names, filter_columns, filter_datasources};
pub use reconcile::{existing_databases, reconcile, updatable_databases, ReconcileResult};
pub use column_mapper::{map_columns, ColumnMapper, MappingResult, TableInventory};
pub use tag_plan::{AllowedValue, TagAssignment, TagPlan};
pub use stale::find_stale_tags;
pub use error::SyncError;
pub use orchestrator::{SyncOptions, SyncPipeline};
