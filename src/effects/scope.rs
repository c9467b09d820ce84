//! Scoped construction of a transaction.
//!
//! A scope hands out a pending log for appending and guarantees a snapshot
//! is written however the scope ends: `commit` persists then executes,
//! `abort` persists the failure without executing, and dropping an
//! unsettled scope (early return, `?`, unwinding panic) persists it as
//! aborted.

use crate::builder::StepBuilder;
use crate::checkpoint::SnapshotStore;
use crate::core::StepError;
use crate::effects::registry::FunctionRegistry;
use crate::effects::transaction::{ExecuteOptions, TransactionLog};
use crate::error::TransactionError;
use std::ops::{Deref, DerefMut};
use tracing::{error, warn};

/// A transaction under construction, bound to the store it will be saved to.
///
/// # Example
///
/// ```rust
/// use resumable::builder::StepBuilder;
/// use resumable::checkpoint::{FileStore, StoreConfig};
/// use resumable::effects::{FunctionRegistry, TransactionScope};
/// use serde_json::json;
///
/// let dir = tempfile::tempdir().unwrap();
/// let store = FileStore::new(StoreConfig::new(dir.path()));
/// let registry = FunctionRegistry::new().register("hello", |_, _| Ok(json!("hi")));
///
/// let mut scope = TransactionScope::begin(&store, &registry);
/// scope.append(StepBuilder::call("hello").returns("greeting")).unwrap();
/// let log = scope.commit().unwrap();
///
/// assert_eq!(log.store().get("greeting"), Some(&json!("hi")));
/// ```
pub struct TransactionScope<'s, S: SnapshotStore + ?Sized> {
    log: TransactionLog,
    store: &'s S,
    settled: bool,
}

impl<'s, S: SnapshotStore + ?Sized> TransactionScope<'s, S> {
    pub fn begin(store: &'s S, registry: &FunctionRegistry) -> Self {
        Self {
            log: TransactionLog::new(registry.clone()),
            store,
            settled: false,
        }
    }

    /// Append a step; see [`TransactionLog::append`].
    pub fn append(&mut self, builder: StepBuilder) -> Result<usize, TransactionError> {
        self.log.append(builder)
    }

    /// Persist, then execute with the default options.
    pub fn commit(self) -> Result<TransactionLog, TransactionError> {
        self.commit_with(ExecuteOptions::default())
    }

    /// Persist, then execute. On a step failure the error is returned and
    /// the aborted log is in the snapshot.
    pub fn commit_with(mut self, options: ExecuteOptions) -> Result<TransactionLog, TransactionError> {
        self.settled = true;
        let mut log = std::mem::take(&mut self.log);
        self.store.save(&mut log)?;
        log.execute_with(self.store, options)?;
        Ok(log)
    }

    /// Give up on the transaction: record `error`, mark it aborted, and
    /// persist it without executing anything.
    pub fn abort(mut self, error: StepError) -> Result<TransactionLog, TransactionError> {
        self.settled = true;
        let mut log = std::mem::take(&mut self.log);
        log.abandon(&error)?;
        self.store.save(&mut log)?;
        warn!(
            tx_id = %log.id(),
            kind = %error.kind,
            error = %error.message,
            "Transaction aborted before execution"
        );
        Ok(log)
    }
}

impl<S: SnapshotStore + ?Sized> Deref for TransactionScope<'_, S> {
    type Target = TransactionLog;

    fn deref(&self) -> &Self::Target {
        &self.log
    }
}

impl<S: SnapshotStore + ?Sized> DerefMut for TransactionScope<'_, S> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.log
    }
}

impl<S: SnapshotStore + ?Sized> Drop for TransactionScope<'_, S> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }

        let reason = if std::thread::panicking() {
            StepError::new("Panic", "transaction scope unwound by a panic")
        } else {
            StepError::new("Abandoned", "transaction scope dropped without commit or abort")
        };

        warn!(
            tx_id = %self.log.id(),
            steps = self.log.steps().len(),
            "Transaction scope dropped without commit/abort, saving it as aborted"
        );

        let saved = self
            .log
            .abandon(&reason)
            .and_then(|()| self.store.save(&mut self.log).map_err(Into::into));
        if let Err(e) = saved {
            error!(tx_id = %self.log.id(), error = %e, "Failed to save abandoned transaction");
        }
    }
}
