//! State manager errors.

use thiserror::Error;

/// Errors the state manager reports to its callers.
///
/// Step failures are not among them: those are captured into an
/// [`AbortState`](crate::core::AbortState) and never leave `run`.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("State manager has terminated; there is no current state")]
    Terminated,

    #[error("State manager run was already started; run() may be invoked only once")]
    AlreadyStarted,

    #[error("Failed to spawn state manager worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}
