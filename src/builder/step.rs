//! Builder for constructing steps.

use crate::builder::error::BuildError;
use crate::core::{ArgSource, FunctionRef, Step};
use serde_json::Value;

/// Marker prefix for keyword names routed to the state store.
pub const STATE_MARKER: char = '_';

/// Keyword that names the result target in the marker convention.
pub const RETURN_KEYWORD: &str = "_return";

/// Builder for constructing steps with a fluent API.
///
/// # Example
///
/// ```rust
/// use resumable::builder::StepBuilder;
/// use resumable::core::ArgSource;
/// use serde_json::json;
///
/// let step = StepBuilder::call("transfer")
///     .arg(json!("acct-1"))
///     .kwarg("currency", json!("EUR"))
///     .kwarg_from_state("amount", "quote")
///     .returns("receipt")
///     .build()
///     .unwrap();
///
/// assert_eq!(step.function().as_str(), "transfer");
/// assert_eq!(step.kwargs()["amount"], ArgSource::State("quote".into()));
/// assert_eq!(step.result_target(), Some("receipt"));
/// ```
#[derive(Debug, Clone)]
pub struct StepBuilder {
    function: FunctionRef,
    args: Vec<Value>,
    kwargs: Vec<(String, ArgSource)>,
    result_target: Option<String>,
    errors: Vec<BuildError>,
}

impl StepBuilder {
    /// Start a step that calls the function registered as `function`.
    pub fn call(function: impl Into<FunctionRef>) -> Self {
        Self {
            function: function.into(),
            args: Vec::new(),
            kwargs: Vec::new(),
            result_target: None,
            errors: Vec::new(),
        }
    }

    /// Append a positional argument.
    pub fn arg(mut self, value: Value) -> Self {
        self.args.push(value);
        self
    }

    /// Append several positional arguments.
    pub fn args(mut self, values: impl IntoIterator<Item = Value>) -> Self {
        self.args.extend(values);
        self
    }

    /// Set a literal keyword argument.
    pub fn kwarg(mut self, name: impl Into<String>, value: Value) -> Self {
        self.kwargs.push((name.into(), ArgSource::Literal(value)));
        self
    }

    /// Set a keyword argument to whatever is stored under `key` when the
    /// step runs.
    pub fn kwarg_from_state(mut self, name: impl Into<String>, key: impl Into<String>) -> Self {
        self.kwargs.push((name.into(), ArgSource::State(key.into())));
        self
    }

    /// Store the step's return value under `target`.
    pub fn returns(mut self, target: impl Into<String>) -> Self {
        self.result_target = Some(target.into());
        self
    }

    /// Keyword argument using the marker convention: `_return` names the
    /// result target, `_name` reads `name` from the state key given as the
    /// value, and anything else is a literal.
    pub fn marked_kwarg(self, name: &str, value: Value) -> Self {
        let Some(stripped) = name.strip_prefix(STATE_MARKER) else {
            return self.kwarg(name, value);
        };

        let key = match value {
            Value::String(key) => key,
            other => {
                return self.invalid(BuildError::MarkedArgumentNotAKey {
                    name: name.to_string(),
                    value: other.to_string(),
                })
            }
        };

        if name == RETURN_KEYWORD {
            self.returns(key)
        } else if stripped.is_empty() {
            self.invalid(BuildError::EmptyMarkedArgument)
        } else {
            self.kwarg_from_state(stripped, key)
        }
    }

    /// Apply `marked_kwarg` to every pair.
    pub fn marked_kwargs<'a>(self, pairs: impl IntoIterator<Item = (&'a str, Value)>) -> Self {
        pairs
            .into_iter()
            .fold(self, |builder, (name, value)| builder.marked_kwarg(name, value))
    }

    fn invalid(mut self, error: BuildError) -> Self {
        self.errors.push(error);
        self
    }

    /// Build the step.
    /// Returns the first error recorded while building, if any. A keyword
    /// set twice keeps the last value.
    pub fn build(self) -> Result<Step, BuildError> {
        if let Some(error) = self.errors.into_iter().next() {
            return Err(error);
        }
        if self.function.as_str().is_empty() {
            return Err(BuildError::EmptyFunctionName);
        }

        let mut step = Step::new(self.function);
        step.args = self.args;
        step.kwargs = self.kwargs.into_iter().collect();
        step.result_target = self.result_target;
        Ok(step)
    }
}
