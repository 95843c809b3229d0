//! Error types for spec database operations.
//!
//! Provides a unified error type covering I/O, serialization, spec loading
//! and manifest problems.

use std::path::PathBuf;

use contract_schema_skit::ParseError;
use thiserror::Error;

/// Errors that can occur during database operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON parsing or serialization failure.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// A spec document failed to load.
    #[error("{}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    /// The file extension does not name a known spec format.
    #[error("unsupported spec file: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    /// Two spec files resolve to the same library name.
    #[error("library '{name}' is defined by both {} and {}", .first.display(), .second.display())]
    DuplicateLibrary {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    /// Manifest validation failure.
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    /// No sources were configured.
    #[error("no spec sources configured")]
    NoSourcesAvailable,
}

/// Convenience alias for results with [`DatabaseError`].
pub type Result<T> = std::result::Result<T, DatabaseError>;
