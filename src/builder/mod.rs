//! Builder API for ergonomic step construction.
//!
//! Arguments are tagged with their source explicitly: a literal value, or a
//! key to read from the state store when the step runs. The older
//! marker-prefix convention (`_name`, `_return`) is available through
//! [`StepBuilder::marked_kwarg`].

pub mod error;
pub mod step;

pub use error::BuildError;
pub use step::{StepBuilder, RETURN_KEYWORD, STATE_MARKER};
