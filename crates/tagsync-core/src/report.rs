//! Run report schema (stable v1)
//!
//! Breaking changes require a new version.

use serde::{Deserialize, Serialize};
use crate::diagnostic::{Diagnostic, Severity};
use crate::model::{GovernanceRequest, TargetDatabase};

/// Report schema version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportVersion {
    /// Major version (breaking changes)
    pub major: u32,

    /// Minor version (backward-compatible additions)
    pub minor: u32,
}

impl ReportVersion {
    /// Current report schema version
    pub const CURRENT: ReportVersion = ReportVersion { major: 1, minor: 0 };
}

impl std::fmt::Display for ReportVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Counters for a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Non-null catalog columns on the warehouse host
    pub tagged_columns: usize,

    /// Set-tag statements executed on the warehouse
    pub warehouse_tags_applied: usize,

    /// Unset-tag statements executed on the warehouse
    pub stale_tags_removed: usize,

    pub databases_created: usize,
    pub databases_updated: usize,

    /// Governance requests computed by the column mapper
    pub governance_requests: usize,

    /// Requests accepted as new registrations
    pub governed: usize,

    /// Requests answered with a conflict (already governed)
    pub conflicts: usize,

    /// Number of diagnostics
    pub diagnostics: usize,
}

/// Result of one synchronization run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Schema version
    pub version: ReportVersion,

    /// Timestamp (RFC 3339)
    pub timestamp: String,

    /// True when nothing was mutated
    pub dry_run: bool,

    pub summary: ReportSummary,

    /// Databases that were (or, on a dry run, would be) registered
    pub new_databases: Vec<String>,

    /// Databases registered during this run, with their new ids
    pub created_databases: Vec<TargetDatabase>,

    /// Databases that received an update request
    pub updated_databases: Vec<TargetDatabase>,

    /// Governance requests in submission order
    pub governance_requests: Vec<GovernanceRequest>,

    pub diagnostics: Vec<Diagnostic>,
}

impl SyncReport {
    pub fn new(dry_run: bool) -> Self {
        Self {
            version: ReportVersion::CURRENT,
            timestamp: chrono::Utc::now().to_rfc3339(),
            dry_run,
            summary: ReportSummary::default(),
            new_databases: Vec::new(),
            created_databases: Vec::new(),
            updated_databases: Vec::new(),
            governance_requests: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Add a diagnostic to the report
    pub fn add_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.summary.diagnostics += 1;
        self.diagnostics.push(diagnostic);
    }

    pub fn extend_diagnostics(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        for diagnostic in diagnostics {
            self.add_diagnostic(diagnostic);
        }
    }

    pub fn record_created(&mut self, database: TargetDatabase) {
        self.summary.databases_created += 1;
        self.created_databases.push(database);
    }

    pub fn record_updated(&mut self, database: TargetDatabase) {
        self.summary.databases_updated += 1;
        self.updated_databases.push(database);
    }

    pub fn set_governance_requests(&mut self, requests: Vec<GovernanceRequest>) {
        self.summary.governance_requests = requests.len();
        self.governance_requests = requests;
    }

    /// Count diagnostics at or above a severity
    pub fn count_at_least(&self, severity: Severity) -> usize {
        self.diagnostics.iter().filter(|d| d.severity >= severity).count()
    }

    /// Check if the report has any errors
    pub fn has_errors(&self) -> bool {
        self.count_at_least(Severity::Error) > 0
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Save to file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let json = self.to_json()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, json)
    }
}

impl Default for SyncReport {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::DiagnosticCode;

    #[test]
    fn empty_report() {
        let report = SyncReport::new(true);
        assert_eq!(report.version, ReportVersion::CURRENT);
        assert_eq!(report.summary, ReportSummary::default());
        assert!(report.dry_run);
        assert!(!report.has_errors());
    }

    #[test]
    fn recording_updates_summary() {
        let mut report = SyncReport::default();
        report.record_created(TargetDatabase::new(7, "SALES"));
        report.record_updated(TargetDatabase::new(2, "HR"));
        report.set_governance_requests(vec![GovernanceRequest::new(7, "PUBLIC.T", "C")]);
        report.extend_diagnostics(vec![
            Diagnostic::skipped(DiagnosticCode::NullColumn, "null entry"),
            Diagnostic::new(DiagnosticCode::Info, Severity::Info, "note"),
        ]);

        assert_eq!(report.summary.databases_created, 1);
        assert_eq!(report.summary.databases_updated, 1);
        assert_eq!(report.summary.governance_requests, 1);
        assert_eq!(report.summary.diagnostics, 2);
        assert_eq!(report.count_at_least(Severity::Warn), 1);
        assert!(!report.has_errors());
    }

    #[test]
    fn report_serialization() {
        let report = SyncReport::new(false);
        let json = report.to_json().unwrap();
        assert!(json.contains("\"version\""));
        assert!(json.contains("\"governance_requests\""));
        assert!(json.contains("\"dry_run\": false"));
    }
}
