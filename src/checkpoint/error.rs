//! Checkpoint error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while writing, reading, or removing snapshots.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("I/O error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// The snapshot file received fewer bytes than were serialized. The
    /// on-disk state can no longer be trusted, so this is never retried.
    #[error("Short write to snapshot: {written} of {expected} bytes. This is non-recoverable")]
    ShortWrite { written: usize, expected: usize },

    /// Serialization to JSON failed
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    /// Deserialization from JSON failed
    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    /// Checkpoint version is not supported by this version
    #[error("Unsupported checkpoint version {found}, supported: {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    /// The transaction has never been written, so there is nothing to remove
    #[error("Transaction has no durable snapshot yet")]
    NotPersisted,

    #[error("Snapshot not found: {}", .0.display())]
    NotFound(PathBuf),
}

impl CheckpointError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}
