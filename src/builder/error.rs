//! Build errors for step builders.

use thiserror::Error;

/// Errors that can occur when building a step.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
    #[error("Function name is empty. Pass a registered name to StepBuilder::call")]
    EmptyFunctionName,

    #[error("Marked argument '{name}' must name a state key as a string, got {value}")]
    MarkedArgumentNotAKey { name: String, value: String },

    #[error("Marked argument '_' has no name after the marker")]
    EmptyMarkedArgument,
}
