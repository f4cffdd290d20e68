//! Error types for skylog-store.

use std::path::PathBuf;

use skylog_types::ParseError;

/// Result type for skylog-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in skylog-store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Reading or writing an entity's history file failed.
    #[error("Persistence failure at {path}: {source}")]
    Persistence {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An entity's history could not be encoded or decoded.
    #[error("Failed to encode history at {path}: {source}")]
    Encoding {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// The history file was written by a newer layout version.
    #[error("Unsupported history layout version {version} in {path}")]
    UnsupportedLayout { path: PathBuf, version: u32 },

    /// Failed to create the store directory.
    #[error("Failed to create store directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The sample value cannot be stored (NaN or infinite).
    #[error("Invalid sample for {entity}: value {value} is not finite")]
    InvalidSample { entity: String, value: f64 },

    /// The entity has no recorded history.
    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    /// The entity name could not be normalized into a key.
    #[error(transparent)]
    InvalidEntity(#[from] ParseError),
}

impl Error {
    /// Whether this error means the durable medium could not be read or
    /// written. The sample that triggered it was not recorded.
    pub fn is_persistence_failure(&self) -> bool {
        matches!(
            self,
            Error::Persistence { .. } | Error::Encoding { .. } | Error::UnsupportedLayout { .. }
        )
    }
}
