//! A single scheduled call inside a transaction.

use super::state::{State, StepState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Stable name of a function registered with a
/// [`FunctionRegistry`](crate::effects::FunctionRegistry).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FunctionRef(String);

impl FunctionRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FunctionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FunctionRef {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Where a keyword argument's value comes from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgSource {
    /// A value fixed when the step was appended
    Literal(Value),
    /// The value stored under this key when the step runs
    State(String),
}

/// A state transition the lifecycle table does not allow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IllegalTransition {
    pub from: StepState,
    pub to: StepState,
}

/// One scheduled call: what to invoke, with which arguments, where to put
/// the result, and how far it got.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub(crate) state: StepState,
    pub(crate) function: FunctionRef,
    pub(crate) args: Vec<Value>,
    pub(crate) kwargs: BTreeMap<String, ArgSource>,
    pub(crate) result_target: Option<String>,
    pub(crate) started_at: Option<DateTime<Utc>>,
    pub(crate) finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub(crate) attempts: u32,
    /// Whether a handler is bound for `function`. Never persisted: it is
    /// recomputed against the registry whenever a log is loaded.
    #[serde(skip)]
    pub(crate) resolved: bool,
}

impl Step {
    /// A pending, unbound step with no arguments.
    pub fn new(function: impl Into<FunctionRef>) -> Self {
        Self {
            state: StepState::Pending,
            function: function.into(),
            args: Vec::new(),
            kwargs: BTreeMap::new(),
            result_target: None,
            started_at: None,
            finished_at: None,
            attempts: 0,
            resolved: false,
        }
    }

    pub fn state(&self) -> StepState {
        self.state
    }

    pub fn function(&self) -> &FunctionRef {
        &self.function
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// All keyword arguments with their sources.
    pub fn kwargs(&self) -> &BTreeMap<String, ArgSource> {
        &self.kwargs
    }

    /// Keyword arguments with a literal value.
    pub fn keyword_args(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.kwargs.iter().filter_map(|(name, source)| match source {
            ArgSource::Literal(value) => Some((name.as_str(), value)),
            ArgSource::State(_) => None,
        })
    }

    /// Keyword arguments read from the state store, as `(name, key)`.
    pub fn state_keyword_args(&self) -> impl Iterator<Item = (&str, &str)> {
        self.kwargs.iter().filter_map(|(name, source)| match source {
            ArgSource::State(key) => Some((name.as_str(), key.as_str())),
            ArgSource::Literal(_) => None,
        })
    }

    pub fn result_target(&self) -> Option<&str> {
        self.result_target.as_deref()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// How many times the handler has been invoked across all runs.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Whether the function reference is bound to a handler.
    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Move to `Started`, clearing the previous outcome's end time.
    pub(crate) fn start(&mut self, now: DateTime<Utc>) -> Result<(), IllegalTransition> {
        self.transition(StepState::Started)?;
        self.started_at = Some(now);
        self.finished_at = None;
        self.attempts += 1;
        Ok(())
    }

    /// Move to `Finished` or `Error`.
    pub(crate) fn finish(
        &mut self,
        outcome: StepState,
        now: DateTime<Utc>,
    ) -> Result<(), IllegalTransition> {
        self.transition(outcome)?;
        self.finished_at = Some(now);
        Ok(())
    }

    fn transition(&mut self, to: StepState) -> Result<(), IllegalTransition> {
        if !self.state.can_transition_to(&to) {
            return Err(IllegalTransition {
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }
}
