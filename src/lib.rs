//! Resumable: transactions of ordered function calls that survive crashes
//!
//! A transaction is an ordered list of steps, each a call to a registered
//! function. Executing it runs the steps in order and writes a durable
//! snapshot after every state change, so a failed or interrupted transaction
//! can be inspected and resumed later, in a fresh process, from exactly where
//! it stopped.
//!
//! The crate follows a "pure core, imperative shell" layout: `core` holds the
//! data model and its legal transitions, `effects` invokes handlers and
//! writes snapshots.
//!
//! # Core Concepts
//!
//! - **Step**: one call with positional args, literal or state-sourced
//!   keyword args, and an optional result target
//! - **State store**: named results that later steps read from
//! - **Registry**: maps the function names stored in snapshots to handlers
//! - **Snapshot store**: atomic, durable persistence of the whole log
//!
//! # Example
//!
//! ```rust
//! use resumable::{FileStore, FunctionRegistry, StepBuilder, StoreConfig, TransactionLog};
//! use serde_json::json;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let store = FileStore::new(StoreConfig::new(dir.path()));
//!
//! let registry = FunctionRegistry::new()
//!     .register("fetch", |_, _| Ok(json!(20)))
//!     .register("double", |_, kwargs| {
//!         Ok(json!(kwargs["n"].as_i64().unwrap_or(0) * 2))
//!     });
//!
//! let mut log = TransactionLog::new(registry);
//! log.append(StepBuilder::call("fetch").returns("n")).unwrap();
//! log.append(StepBuilder::call("double").kwarg_from_state("n", "n").returns("total"))
//!     .unwrap();
//! log.execute(&store).unwrap();
//!
//! assert_eq!(log.store().get("total"), Some(&json!(40)));
//! ```

pub mod builder;
pub mod checkpoint;
pub mod core;
pub mod driver;
pub mod effects;
pub mod enforcement;
pub mod error;
pub mod inspect;

// Re-export commonly used types
pub use builder::StepBuilder;
pub use checkpoint::{FileStore, SnapshotStore, StoreConfig};
pub use core::{State, StepError, StepState, TransactionState};
pub use effects::{ExecuteOptions, FunctionRegistry, TransactionLog, TransactionScope};
pub use error::TransactionError;
