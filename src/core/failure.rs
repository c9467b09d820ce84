//! Step failures and the error information captured from them.

use serde::{Deserialize, Serialize};
use std::backtrace::{Backtrace, BacktraceStatus};
use thiserror::Error;

/// Error returned by a step handler.
///
/// `kind` is a stable category callers can match on; `message` is the
/// human-readable detail.
///
/// # Example
///
/// ```rust
/// use resumable::core::StepError;
///
/// let err = StepError::new("Timeout", "upstream did not answer");
/// assert_eq!(err.kind, "Timeout");
/// assert_eq!(err.to_string(), "Timeout: upstream did not answer");
///
/// let parse = "x".parse::<u32>().unwrap_err();
/// let err = StepError::from_error(&parse);
/// assert!(err.kind.ends_with("ParseIntError"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct StepError {
    pub kind: String,
    pub message: String,
}

impl StepError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Wrap any error, using its type name as the kind.
    pub fn from_error<E: std::error::Error>(err: &E) -> Self {
        Self::new(std::any::type_name::<E>(), err.to_string())
    }

    /// A state-sourced argument named a key nothing has stored.
    pub fn missing_state_key(argument: &str, key: &str) -> Self {
        Self::new(
            "MissingStateKey",
            format!("argument '{argument}' reads state['{key}'], which is not set"),
        )
    }
}

/// Durable record of why a transaction stopped.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Index of the failing step, if the failure came from one
    pub step: Option<usize>,
    pub kind: String,
    pub message: String,
    /// Executor stack frames captured when the failure was recorded, after
    /// the handler returned; they do not reach into the handler. Empty
    /// unless backtraces are enabled through `RUST_BACKTRACE`/`RUST_LIB_BACKTRACE`.
    pub frames: Vec<String>,
}

impl ErrorInfo {
    /// Capture a step failure, including the current call stack.
    pub fn capture(step: Option<usize>, error: &StepError) -> Self {
        Self {
            step,
            kind: error.kind.clone(),
            message: error.message.clone(),
            frames: capture_frames(),
        }
    }
}

fn capture_frames() -> Vec<String> {
    let backtrace = Backtrace::capture();
    if backtrace.status() != BacktraceStatus::Captured {
        return Vec::new();
    }
    backtrace
        .to_string()
        .lines()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}
