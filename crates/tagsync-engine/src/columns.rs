//! Key parsing over a catalog column listing
//!
//! Every stage starts here: null placeholders and malformed keys are dropped
//! with a diagnostic, and the remaining columns carry their parsed key.

use tagsync_core::{Diagnostic, DiagnosticCode, QualifiedKey, Severity, TaggedColumn};

/// A catalog column whose key parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedColumn<'a> {
    /// Position in the catalog listing
    pub index: usize,
    pub column: &'a TaggedColumn,
    pub key: QualifiedKey,
}

impl ParsedColumn<'_> {
    /// Column name for governance: the display name, or the key's column
    /// segment when the catalog left it blank
    pub fn column_name(&self) -> &str {
        if self.column.name.trim().is_empty() {
            &self.key.column
        } else {
            &self.column.name
        }
    }
}

/// Result of scanning a column listing
#[derive(Debug, Clone, Default)]
pub struct ColumnScan<'a> {
    /// Well-formed columns in input order
    pub parsed: Vec<ParsedColumn<'a>>,

    /// One diagnostic per skipped entry
    pub diagnostics: Vec<Diagnostic>,
}

impl ColumnScan<'_> {
    pub fn is_empty(&self) -> bool {
        self.parsed.is_empty()
    }
}

/// Parse the key of every non-null column
///
/// Nulls are expected (the catalog returns them for deleted objects) and get
/// an info diagnostic. Malformed keys are a catalog data-quality problem and
/// get a warning.
pub fn scan_columns(columns: &[Option<TaggedColumn>]) -> ColumnScan<'_> {
    let mut scan = ColumnScan::default();

    for (index, entry) in columns.iter().enumerate() {
        let Some(column) = entry else {
            tracing::debug!(index, "Skipping null catalog column");
            scan.diagnostics.push(
                Diagnostic::new(DiagnosticCode::NullColumn, Severity::Info, "Null column entry")
                    .at_index(index),
            );
            continue;
        };

        match column.qualified_key() {
            Ok(key) => scan.parsed.push(ParsedColumn { index, column, key }),
            Err(e) => {
                tracing::warn!(column = %column.key, error = %e, "Skipping malformed key");
                scan.diagnostics.push(
                    Diagnostic::skipped(DiagnosticCode::MalformedKey, e.to_string())
                        .with_subject(column.key.clone())
                        .at_index(index),
                );
            }
        }
    }

    scan
}
