//! Validation-based preflight checks for transactions.
//!
//! This module uses Stillwater's `Validation` type to accumulate ALL
//! problems in a log instead of stopping at the first one. Execution itself
//! stays fail-fast; preflight only tells an operator, before resuming, every
//! reason the next run is bound to fail.
//!
//! # Example
//!
//! ```rust
//! use resumable::builder::StepBuilder;
//! use resumable::effects::{ExecuteOptions, FunctionRegistry, TransactionLog};
//! use resumable::enforcement::{list_violations, preflight};
//! use serde_json::json;
//!
//! let registry = FunctionRegistry::new().register("a", |_, _| Ok(json!(1)));
//! let mut log = TransactionLog::new(registry);
//! log.append(StepBuilder::call("a").kwarg_from_state("n", "missing")).unwrap();
//!
//! let result = preflight(&log, ExecuteOptions::default());
//! assert!(result.is_failure());
//! assert_eq!(list_violations(&result).len(), 1);
//! ```

pub mod rules;
pub mod violations;

pub use rules::{list_violations, preflight};
pub use violations::ViolationError;
