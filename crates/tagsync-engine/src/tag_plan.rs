//! Warehouse tag plan
//!
//! The warehouse tag only accepts values from its allowed-values list, and the
//! tag object lives per database and schema. The plan therefore has two
//! phases: register each distinct `(database, schema, value)` once, then set
//! the tag on every column. A column with several values gets one statement
//! per value and keeps the last one, since a column holds a single value per
//! tag.

use serde::Serialize;
use std::collections::HashSet;
use tagsync_core::{Diagnostic, DiagnosticCode, QualifiedKey, TaggedColumn};

use crate::columns::scan_columns;

/// One entry for a tag's allowed values
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AllowedValue {
    pub database: String,
    pub schema: String,
    pub value: String,
}

/// Set the tag on one column
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagAssignment {
    pub key: QualifiedKey,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TagPlan {
    /// Distinct allowed values, first-seen order
    pub allowed_values: Vec<AllowedValue>,

    /// Column assignments, catalog order
    pub assignments: Vec<TagAssignment>,

    /// Columns without tag values
    #[serde(skip)]
    pub diagnostics: Vec<Diagnostic>,
}

impl TagPlan {
    pub fn build(columns: &[Option<TaggedColumn>]) -> Self {
        let scan = scan_columns(columns);
        let mut plan = Self::default();
        let mut seen = HashSet::new();

        for parsed in &scan.parsed {
            let values: Vec<&String> = parsed
                .column
                .tag_values
                .iter()
                .filter(|v| !v.trim().is_empty())
                .collect();

            if values.is_empty() {
                tracing::warn!(column = %parsed.key, "Column has no tag values");
                plan.diagnostics.push(
                    Diagnostic::skipped(DiagnosticCode::MissingTagValues, "No tag values in catalog")
                        .with_subject(parsed.column.key.clone())
                        .at_index(parsed.index),
                );
                continue;
            }

            for value in values {
                let allowed = AllowedValue {
                    database: parsed.key.database_upper(),
                    schema: parsed.key.schema.to_uppercase(),
                    value: value.clone(),
                };
                if seen.insert(allowed.clone()) {
                    plan.allowed_values.push(allowed);
                }

                plan.assignments.push(TagAssignment {
                    key: parsed.key.clone(),
                    value: value.clone(),
                });
            }
        }

        plan
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}
