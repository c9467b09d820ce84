//! Explicit table of step functions.
//!
//! Steps name their function; the embedding application registers a handler
//! under each name at startup. A snapshot loaded into a process that did not
//! register a name still loads, but that step cannot run.

use crate::core::{FunctionRef, StepError};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Type alias for step handlers: positional args, keyword args.
pub type Handler =
    Arc<dyn Fn(&[Value], &Map<String, Value>) -> Result<Value, StepError> + Send + Sync>;

/// Name to handler table.
///
/// # Example
///
/// ```rust
/// use resumable::effects::FunctionRegistry;
/// use serde_json::{json, Map};
///
/// let registry = FunctionRegistry::new()
///     .register("double", |args, _| Ok(json!(args[0].as_i64().unwrap_or(0) * 2)));
///
/// let handler = registry.get("double").unwrap();
/// assert_eq!(handler(&[json!(21)], &Map::new()).unwrap(), json!(42));
/// assert!(registry.get("triple").is_none());
/// ```
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    handlers: HashMap<String, Handler>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any previous one with the same name.
    pub fn register<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&[Value], &Map<String, Value>) -> Result<Value, StepError> + Send + Sync + 'static,
    {
        self.handlers.insert(name.into(), Arc::new(handler));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Handler> {
        self.handlers.get(name)
    }

    pub fn resolve(&self, function: &FunctionRef) -> Option<&Handler> {
        self.get(function.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("FunctionRegistry")
            .field("functions", &names)
            .finish()
    }
}
