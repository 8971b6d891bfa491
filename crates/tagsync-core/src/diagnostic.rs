//! Diagnostic codes for records skipped or softened during a run
//!
//! Codes are written into the JSON report. Never rename or remove a code;
//! add new ones instead.

use serde::{Deserialize, Serialize};

/// Diagnostic code registry (v1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticCode {
    // Data quality
    /// The catalog returned a null placeholder instead of a column
    NullColumn,

    /// A qualified key could not be parsed
    MalformedKey,

    /// A tagged column has no values in the governance tag field
    MissingTagValues,

    // Reconciliation
    /// Column database is not registered in the protection system yet
    UnregisteredDatabase,

    /// Column table is missing from the warehouse inventory (table match policy)
    UnknownTable,

    /// The column was already governed
    GovernanceConflict,

    /// Warehouse column carries a tag value the catalog no longer has
    StaleWarehouseTag,

    // General
    /// General informational message
    Info,
}

impl DiagnosticCode {
    /// Stable string identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NullColumn => "NULL_COLUMN",
            Self::MalformedKey => "MALFORMED_KEY",
            Self::MissingTagValues => "MISSING_TAG_VALUES",
            Self::UnregisteredDatabase => "UNREGISTERED_DATABASE",
            Self::UnknownTable => "UNKNOWN_TABLE",
            Self::GovernanceConflict => "GOVERNANCE_CONFLICT",
            Self::StaleWarehouseTag => "STALE_WAREHOUSE_TAG",
            Self::Info => "INFO",
        }
    }
}

impl std::fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational message
    Info,

    /// Record was skipped and should be reviewed
    Warn,

    /// Reserved for records that make the report fail
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A diagnostic message with structured metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable diagnostic code
    pub code: DiagnosticCode,

    /// Severity level
    pub severity: Severity,

    /// Human-readable message
    pub message: String,

    /// Qualified key or name of the record the diagnostic is about
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    /// Position of the record in the catalog response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
}

impl Diagnostic {
    /// Create a new diagnostic with minimal fields
    pub fn new(code: DiagnosticCode, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
            subject: None,
            index: None,
        }
    }

    /// Shorthand for a warning about a skipped record
    pub fn skipped(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Warn, message)
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn at_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }
}
