//! Spec loading error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading path lists, spec files or configuration.
#[derive(Debug, Error)]
pub enum SpecError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid TOML in {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("unrecognized file extension (expected .json or .toml): {path}")]
    UnrecognizedExtension { path: PathBuf },

    #[error("invalid spec {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },
}

pub type SpecResult<T> = Result<T, SpecError>;

impl SpecError {
    pub(crate) fn invalid(path: &std::path::Path, reason: impl Into<String>) -> Self {
        Self::Invalid {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}
