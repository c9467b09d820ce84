//! Top-level error type.

use crate::builder::BuildError;
use crate::checkpoint::CheckpointError;
use crate::core::{FunctionRef, StepError, StepState, TransactionState};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors surfaced by appending to or executing a transaction.
#[derive(Debug, Error)]
pub enum TransactionError {
    /// A step handler failed. The failure is already durably recorded; the
    /// original error stays reachable through `source`.
    #[error(
        "Transaction failed at step {index} ({function}). It was stored to disk and can be inspected/resumed later.{}",
        stored_under(.location)
    )]
    StepFailed {
        index: usize,
        function: FunctionRef,
        location: Option<PathBuf>,
        #[source]
        source: StepError,
    },

    /// A step selected for execution names a function nobody registered.
    #[error(
        "Step {index} calls '{function}', which is not registered. Register it before executing.{}",
        stored_under(.location)
    )]
    UnresolvedFunction {
        index: usize,
        function: FunctionRef,
        location: Option<PathBuf>,
    },

    #[error("Cannot append steps to a transaction in state '{state}'")]
    AppendAfterStart { state: TransactionState },

    #[error("Illegal transaction transition from '{from}' to '{to}'")]
    IllegalTransition {
        from: TransactionState,
        to: TransactionState,
    },

    #[error("Illegal transition of step {index} from '{from}' to '{to}'")]
    IllegalStepTransition {
        index: usize,
        from: StepState,
        to: StepState,
    },

    #[error("Invalid step: {0}")]
    Build(#[from] BuildError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

impl TransactionError {
    /// Snapshot location carried by the error, if any.
    pub fn location(&self) -> Option<&Path> {
        match self {
            Self::StepFailed { location, .. } | Self::UnresolvedFunction { location, .. } => {
                location.as_deref()
            }
            _ => None,
        }
    }

    /// The handler's own error, when a step failed.
    pub fn step_error(&self) -> Option<&StepError> {
        match self {
            Self::StepFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}

fn stored_under(location: &Option<PathBuf>) -> String {
    match location {
        Some(path) => format!(" It is stored under \"{}\".", path.display()),
        None => String::new(),
    }
}
