//! Execution of transactions.
//!
//! This module is the "imperative shell" around the pure core: it invokes
//! user handlers and writes snapshots.
//!
//! # Key Concepts
//!
//! - **Registry**: maps function names stored in steps to handlers
//! - **Transaction log**: appends steps and runs them in order, persisting
//!   after every state change
//! - **Scope**: builds a transaction and guarantees it is persisted on every
//!   exit path

mod registry;
mod scope;
mod transaction;

pub use registry::{FunctionRegistry, Handler};
pub use scope::TransactionScope;
pub use transaction::{ExecuteOptions, TransactionLog};
