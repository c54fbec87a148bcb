//! Captured step failures and the abort record that carries them.

use super::name::Name;
use super::state::StepError;
use chrono::{DateTime, Utc};
use std::any::Any;
use thiserror::Error;

/// Name every abort record reports.
pub const ABORT_STATE_NAME: &str = "AbortState";

/// Failure raised while a work state was running.
#[derive(Debug, Error)]
pub enum StepFailure {
    /// The state returned an error. The original value is kept untouched.
    #[error(transparent)]
    Error(StepError),

    /// The state panicked.
    #[error("state panicked: {message}")]
    Panicked { message: String },

    /// The state answered with an abort record captured by another run.
    #[error("state answered with an abort record (failed state '{failed_state}')")]
    AbortSuccessor { failed_state: Name },
}

impl StepFailure {
    /// Build a failure from a panic payload caught on the worker.
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&str>() {
            (*text).to_string()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::Panicked { message }
    }

    /// The original error, when the state returned one.
    pub fn error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Self::Error(err) => Some(&**err),
            Self::Panicked { .. } | Self::AbortSuccessor { .. } => None,
        }
    }

    /// Typed access to the original error.
    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        self.error().and_then(|err| err.downcast_ref::<E>())
    }

    pub fn is_panic(&self) -> bool {
        matches!(self, Self::Panicked { .. })
    }
}

/// Terminal record of a failed run.
///
/// Produced only by the state manager, once, for the step that failed. It
/// becomes the manager's last state and is never run.
#[derive(Debug)]
pub struct AbortState {
    failed_state: Name,
    failure: StepFailure,
    captured_at: DateTime<Utc>,
}

impl AbortState {
    pub(crate) fn new(failed_state: Name, failure: StepFailure) -> Self {
        Self {
            failed_state,
            failure,
            captured_at: Utc::now(),
        }
    }

    pub fn name(&self) -> Name {
        Name::from(ABORT_STATE_NAME)
    }

    /// Name of the state whose `run` failed.
    pub fn failed_state(&self) -> &Name {
        &self.failed_state
    }

    pub fn failure(&self) -> &StepFailure {
        &self.failure
    }

    /// Typed access to the error the failed state returned.
    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        self.failure.downcast_ref::<E>()
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }
}
