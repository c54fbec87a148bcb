//! Core state types.
//!
//! This module contains the contract between the state manager and the
//! work it drives:
//! - State names via [`Name`]
//! - Work states via the [`State`] trait and the [`NextState`] answer
//! - The closed [`StateRef`] set occupying the manager's slots
//! - Failure capture via [`StepFailure`] and [`AbortState`]

mod abort;
mod name;
mod state;

pub use abort::{AbortState, StepFailure, ABORT_STATE_NAME};
pub use name::Name;
pub use state::{NextState, State, StateRef, StepError};
