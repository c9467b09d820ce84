//! Lifecycle states for steps and transactions.
//!
//! All methods are pure - no side effects. The legal transition table lives
//! here so the execution loop can reject anything it does not describe.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};

/// Trait for lifecycle states.
///
/// # Example
///
/// ```rust
/// use resumable::core::{State, StepState};
///
/// assert_eq!(StepState::Pending.name(), "pending");
/// assert!(StepState::Finished.is_final());
/// assert!(StepState::Error.is_error());
/// assert!(StepState::Pending.can_transition_to(&StepState::Started));
/// assert!(!StepState::Finished.can_transition_to(&StepState::Pending));
/// ```
pub trait State:
    Clone + PartialEq + Debug + Serialize + for<'de> Deserialize<'de> + Send + Sync
{
    /// Get the state's name for display/logging.
    fn name(&self) -> &str;

    /// Check if this is a final (terminal) state.
    ///
    /// Default implementation returns `false`.
    fn is_final(&self) -> bool {
        false
    }

    /// Check if this is an error state.
    ///
    /// Default implementation returns `false`.
    fn is_error(&self) -> bool {
        false
    }

    /// Check whether moving from this state to `next` is legal.
    fn can_transition_to(&self, next: &Self) -> bool;
}

/// Lifecycle of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepState {
    /// Not yet attempted
    #[default]
    Pending,
    /// Handler invoked, outcome not yet recorded
    Started,
    /// Handler returned successfully
    Finished,
    /// Handler failed
    Error,
}

impl State for StepState {
    fn name(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Started => "started",
            Self::Finished => "finished",
            Self::Error => "error",
        }
    }

    fn is_final(&self) -> bool {
        matches!(self, Self::Finished | Self::Error)
    }

    fn is_error(&self) -> bool {
        matches!(self, Self::Error)
    }

    /// A re-attempt moves a step back to `Started`, never to `Pending`.
    /// `Started -> Started` covers a crash that happened mid-call.
    fn can_transition_to(&self, next: &Self) -> bool {
        matches!(
            (self, next),
            (_, Self::Started) | (Self::Started, Self::Finished) | (Self::Started, Self::Error)
        )
    }
}

impl fmt::Display for StepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lifecycle of a whole transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionState {
    /// Being assembled, nothing executed yet
    #[default]
    Pending,
    /// An `execute` call is in progress (or was, when the process died)
    Started,
    /// Every step finished
    Finished,
    /// A step failed, or the transaction was abandoned while being assembled
    Aborted,
}

impl State for TransactionState {
    fn name(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Started => "started",
            Self::Finished => "finished",
            Self::Aborted => "aborted",
        }
    }

    fn is_final(&self) -> bool {
        matches!(self, Self::Finished | Self::Aborted)
    }

    fn is_error(&self) -> bool {
        matches!(self, Self::Aborted)
    }

    fn can_transition_to(&self, next: &Self) -> bool {
        matches!(
            (self, next),
            (_, Self::Started)
                | (Self::Started, Self::Finished)
                | (Self::Started, Self::Aborted)
                | (Self::Pending, Self::Aborted)
        )
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
