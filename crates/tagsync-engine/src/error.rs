//! Errors that abort a sync run

use tagsync_catalog::ApiError;
use tagsync_core::ConfigError;

/// Fatal pipeline errors
///
/// Data-quality problems never show up here; they become diagnostics.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// A permission probe failed before anything else ran
    #[error("Permission check failed for {system}: {reason}")]
    PermissionDenied { system: &'static str, reason: String },

    /// Missing or ambiguous configuration, detected before any mutation
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An external call failed after retries
    #[error("{step} failed: {source}")]
    Api {
        step: &'static str,
        #[source]
        source: ApiError,
    },
}

impl SyncError {
    pub fn api(step: &'static str) -> impl FnOnce(ApiError) -> Self {
        move |source| Self::Api { step, source }
    }

    /// Whether the run stopped before mutating anything
    pub fn is_pre_mutation(&self) -> bool {
        matches!(self, Self::PermissionDenied { .. } | Self::Configuration(_))
    }
}

impl From<ConfigError> for SyncError {
    fn from(err: ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}
