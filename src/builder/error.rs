//! Build errors for the state manager builder.

use thiserror::Error;

/// Errors that can occur when building a state manager.
#[derive(Debug, Error, PartialEq)]
pub enum BuildError {
    #[error("Initial state not specified. Call .initial(state) before .build()")]
    MissingInitialState,

    #[error("An abort record cannot be used as an initial state")]
    AbortedInitialState,

    #[error("Invalid worker thread name {0:?}: must be non-empty and contain no NUL bytes")]
    InvalidThreadName(String),
}
