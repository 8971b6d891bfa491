//! tagsync core
//!
//! Domain model shared by every crate in the workspace: catalog columns and their
//! qualified keys, protection-system databases, governance requests, configuration
//! and the run report. Diagnostic codes are part of the report format; never
//! rename them.

pub mod diagnostic;
pub mod model;
pub mod report;
pub mod config;

pub use diagnostic::{Diagnostic, DiagnosticCode, Severity};
pub use model::{
    CatalogDatabase, GovernanceRequest, KeyError, ProtectMode, QualifiedKey, TableRef, TagField,
    TaggedColumn, TargetDatabase, WarehouseColumnTag,
};
pub use report::{SyncReport, ReportVersion, ReportSummary};
pub use config::{
    CatalogConfig, Config, ConfigError, Credentials, GovernanceConfig, HttpConfig, MatchPolicy,
    ProtectionConfig, Registration, WarehouseConfig,
};
