//! Builder API for configuring state managers.
//!
//! The builder is the manager's configuration surface: initial state,
//! lifecycle hooks, run identifier and worker thread name.

pub mod error;
pub mod manager;

pub use error::BuildError;
pub use manager::StateManagerBuilder;
