//! Entry points for resuming or inspecting a stored transaction.
//!
//! These are what an embedding binary wires to its own command line, e.g.
//! `myapp resume <path>` and `myapp inspect <path>`. The binary supplies the
//! registry of step functions its transactions were built with.

use crate::checkpoint::SnapshotStore;
use crate::effects::{ExecuteOptions, FunctionRegistry, TransactionLog};
use crate::error::TransactionError;
use crate::inspect::Report;
use std::path::Path;
use tracing::info;

/// Load the snapshot at `location` and execute it with `options`.
///
/// The loaded log keeps `location` as its backing location, so every
/// snapshot written during the run replaces the file it was loaded from.
/// On success the finished log is returned; on failure the error carries the
/// same location again (when verbose errors are enabled).
pub fn resume<S>(
    store: &S,
    location: &Path,
    registry: &FunctionRegistry,
    options: ExecuteOptions,
) -> Result<TransactionLog, TransactionError>
where
    S: SnapshotStore + ?Sized,
{
    let mut log = store.load(location, registry)?;
    info!(
        tx_id = %log.id(),
        path = %location.display(),
        state = %log.state(),
        "Resuming transaction"
    );
    log.execute_with(store, options)?;
    Ok(log)
}

/// Load the snapshot at `location` and render its inspection report without
/// executing anything.
pub fn inspect<S>(
    store: &S,
    location: &Path,
    registry: &FunctionRegistry,
) -> Result<String, TransactionError>
where
    S: SnapshotStore + ?Sized,
{
    let log = store.load(location, registry)?;
    Ok(Report::new(&log).to_string())
}
