//! Core transaction data model.
//!
//! This module contains the pure part of the crate:
//! - Lifecycle states for steps and transactions, with their legal transitions
//! - The `Step` record and its typed argument sources
//! - The `StateStore` of named results
//! - Step failures and captured error information
//!
//! Nothing in here performs I/O or invokes user code.

mod failure;
mod state;
mod step;
mod store;

pub use failure::{ErrorInfo, StepError};
pub use state::{State, StepState, TransactionState};
pub use step::{ArgSource, FunctionRef, IllegalTransition, Step};
pub use store::StateStore;
