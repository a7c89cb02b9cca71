//! Spec sources — path-list files and extension-discriminated decoding.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use crate::error::{SpecError, SpecResult};

/// Structured-text formats a spec file may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecFormat {
    Json,
    Toml,
}

impl SpecFormat {
    /// Detect the format from the file extension (case-insensitive).
    pub fn from_path(path: &Path) -> SpecResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("json") => Ok(Self::Json),
            Some("toml") => Ok(Self::Toml),
            _ => Err(SpecError::UnrecognizedExtension {
                path: path.to_path_buf(),
            }),
        }
    }
}

/// Read a path-list file: one path per line, spaces and tabs trimmed, blank
/// lines skipped. Relative entries resolve against the list's directory.
pub fn read_paths(list: &Path) -> SpecResult<Vec<PathBuf>> {
    let content = std::fs::read_to_string(list).map_err(|source| SpecError::Io {
        path: list.to_path_buf(),
        source,
    })?;
    let base = list.parent().unwrap_or_else(|| Path::new(""));
    Ok(parse_paths(&content)
        .map(|entry| {
            let entry = Path::new(entry);
            if entry.is_absolute() {
                entry.to_path_buf()
            } else {
                base.join(entry)
            }
        })
        .collect())
}

/// Non-blank, trimmed lines of a path list.
pub fn parse_paths(content: &str) -> impl Iterator<Item = &str> {
    content
        .lines()
        .map(|line| line.trim_matches(|c| c == ' ' || c == '\t'))
        .filter(|line| !line.is_empty())
}

/// Read and decode a JSON or TOML file.
pub fn decode_file<T: DeserializeOwned>(path: &Path) -> SpecResult<T> {
    let format = SpecFormat::from_path(path)?;
    let content = std::fs::read_to_string(path).map_err(|source| SpecError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    match format {
        SpecFormat::Json => serde_json::from_str(&content).map_err(|source| SpecError::Json {
            path: path.to_path_buf(),
            source,
        }),
        SpecFormat::Toml => toml::from_str(&content).map_err(|source| SpecError::Toml {
            path: path.to_path_buf(),
            source,
        }),
    }
}
