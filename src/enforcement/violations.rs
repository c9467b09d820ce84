//! Problems preflight checks can find in a transaction.

use thiserror::Error;

/// A reason the next `execute` call is bound to fail.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ViolationError {
    #[error("Step {index} calls '{function}', which is not registered")]
    UnresolvedFunction { index: usize, function: String },

    #[error("Step {index} reads state['{key}'] for '{argument}', but no earlier step produces it")]
    UnproducedStateKey {
        index: usize,
        argument: String,
        key: String,
    },
}

impl ViolationError {
    /// Index of the offending step.
    pub fn step(&self) -> usize {
        match self {
            Self::UnresolvedFunction { index, .. } | Self::UnproducedStateKey { index, .. } => {
                *index
            }
        }
    }
}
