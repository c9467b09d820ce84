//! Snapshot files with an atomic replace protocol.
//!
//! Every save writes the whole snapshot into a fresh temp file in the
//! storage directory, syncs it, and then renames it over the stable
//! location. A crash at any point leaves either the previous snapshot or the
//! new one under the stable name, never a torn file.

use super::{decode, encode, CheckpointError, SnapshotStore, StoreConfig};
use crate::effects::{FunctionRegistry, TransactionLog};
use chrono::Utc;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Snapshot store backed by files in one directory.
#[derive(Debug, Clone, Default)]
pub struct FileStore {
    config: StoreConfig,
}

impl FileStore {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    /// `<prefix>-<YYYYmmdd-HHMMSS>-`; tempfile appends a random suffix.
    fn file_prefix(&self) -> String {
        format!(
            "{}-{}-",
            self.config.prefix,
            Utc::now().format("%Y%m%d-%H%M%S")
        )
    }
}

impl SnapshotStore for FileStore {
    fn save(&self, log: &mut TransactionLog) -> Result<PathBuf, CheckpointError> {
        let bytes = encode(log)?;

        let mut temp = tempfile::Builder::new()
            .prefix(&self.file_prefix())
            .suffix(".json")
            .tempfile_in(&self.config.directory)
            .map_err(|e| CheckpointError::io("creating temporary snapshot", e))?;

        let written = temp
            .as_file_mut()
            .write(&bytes)
            .map_err(|e| CheckpointError::io("writing snapshot", e))?;
        if written != bytes.len() {
            return Err(CheckpointError::ShortWrite {
                written,
                expected: bytes.len(),
            });
        }
        temp.as_file()
            .sync_all()
            .map_err(|e| CheckpointError::io("syncing snapshot", e))?;

        let location = match log.backing_location().map(Path::to_path_buf) {
            Some(stable) => {
                temp.persist(&stable)
                    .map_err(|e| CheckpointError::io("replacing snapshot", e.error))?;
                stable
            }
            None => {
                let (_file, path) = temp
                    .keep()
                    .map_err(|e| CheckpointError::io("keeping snapshot", e.error))?;
                log.set_backing_location(path.clone());
                path
            }
        };

        debug!(
            tx_id = %log.id(),
            path = %location.display(),
            bytes = written,
            "Snapshot written"
        );
        Ok(location)
    }

    fn load(
        &self,
        location: &Path,
        registry: &FunctionRegistry,
    ) -> Result<TransactionLog, CheckpointError> {
        let bytes = fs::read(location).map_err(|e| match e.kind() {
            ErrorKind::NotFound => CheckpointError::NotFound(location.to_path_buf()),
            _ => CheckpointError::io("reading snapshot", e),
        })?;

        let mut log = decode(&bytes, registry)?;
        // A snapshot copied or moved elsewhere keeps being updated where it
        // was loaded from.
        log.set_backing_location(location.to_path_buf());

        debug!(tx_id = %log.id(), path = %location.display(), "Snapshot loaded");
        Ok(log)
    }

    fn remove(&self, log: &TransactionLog) -> Result<(), CheckpointError> {
        let location = log
            .backing_location()
            .ok_or(CheckpointError::NotPersisted)?;
        fs::remove_file(location).map_err(|e| CheckpointError::io("removing snapshot", e))?;
        debug!(tx_id = %log.id(), path = %location.display(), "Snapshot removed");
        Ok(())
    }

    fn config(&self) -> &StoreConfig {
        &self.config
    }
}
