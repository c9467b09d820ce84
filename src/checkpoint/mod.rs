//! Durable snapshots of transaction logs.
//!
//! A snapshot captures the full log (steps, state store, error info,
//! timestamps) so that a fresh process can load it and resume. Handlers are
//! never serialized; steps carry only the function name, and loading binds
//! names back to handlers through a [`FunctionRegistry`].

use crate::effects::{FunctionRegistry, TransactionLog};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;
use uuid::Uuid;

pub mod config;
pub mod error;
mod file;

pub use config::StoreConfig;
pub use error::CheckpointError;
pub use file::FileStore;

/// Version identifier for checkpoint format
pub const CHECKPOINT_VERSION: u32 = 1;

/// Serializable snapshot envelope.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Checkpoint format version
    pub version: u32,

    /// Identifier of the transaction this snapshot belongs to
    pub id: Uuid,

    /// When the snapshot was taken
    pub timestamp: DateTime<Utc>,

    pub transaction: TransactionLog,
}

impl Checkpoint {
    pub fn capture(log: &TransactionLog) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            id: log.id(),
            timestamp: Utc::now(),
            transaction: log.clone(),
        }
    }
}

/// Serialize a log into snapshot bytes.
pub fn encode(log: &TransactionLog) -> Result<Vec<u8>, CheckpointError> {
    serde_json::to_vec_pretty(&Checkpoint::capture(log))
        .map_err(|e| CheckpointError::SerializationFailed(e.to_string()))
}

/// Deserialize snapshot bytes and bind every step against `registry`.
///
/// Steps whose function is not registered stay unresolved; that is reported,
/// not treated as a failure, so inspection still works.
pub fn decode(bytes: &[u8], registry: &FunctionRegistry) -> Result<TransactionLog, CheckpointError> {
    let checkpoint: Checkpoint = serde_json::from_slice(bytes)
        .map_err(|e| CheckpointError::DeserializationFailed(e.to_string()))?;

    if checkpoint.version != CHECKPOINT_VERSION {
        return Err(CheckpointError::UnsupportedVersion {
            found: checkpoint.version,
            supported: CHECKPOINT_VERSION,
        });
    }

    let mut log = checkpoint.transaction;
    let unresolved = log.bind(registry);
    for index in unresolved {
        warn!(
            tx_id = %log.id(),
            step = index,
            function = %log.steps()[index].function(),
            "Step function is not registered; it cannot be executed until it is"
        );
    }
    Ok(log)
}

/// Durable storage for transaction snapshots.
///
/// `save` must never leave a partially written snapshot visible at the
/// log's stable location.
pub trait SnapshotStore {
    /// Write a full snapshot, adopting a stable location on the first write.
    /// Returns the stable location.
    fn save(&self, log: &mut TransactionLog) -> Result<PathBuf, CheckpointError>;

    /// Load a snapshot and bind its steps against `registry`.
    fn load(
        &self,
        location: &Path,
        registry: &FunctionRegistry,
    ) -> Result<TransactionLog, CheckpointError>;

    /// Delete the log's snapshot.
    fn remove(&self, log: &TransactionLog) -> Result<(), CheckpointError>;

    fn config(&self) -> &StoreConfig;
}
