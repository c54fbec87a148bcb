//! The unit of work executed by the state manager and its transition contract.
//!
//! A work state performs its effect in [`State::run`] and answers with the
//! [`NextState`] to execute. Termination is driven only by that answer:
//! [`NextState::Done`] ends the chain normally.

use super::abort::AbortState;
use super::name::Name;
use std::fmt::{self, Debug};
use std::sync::Arc;

/// Error value a work state may fail with.
///
/// Kept as the boxed original so hosts can downcast it back to their own
/// error type once the run has been aborted.
pub type StepError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Trait for work states.
///
/// `name` is a pure accessor and may be called from any thread at any time.
/// `run` is invoked exactly once per activation, only from the worker that
/// drives the [`StateManager`](crate::manager::StateManager), and may block.
///
/// # Example
///
/// ```rust
/// use stepwise::core::{Name, NextState, State, StepError};
///
/// #[derive(Debug)]
/// struct Download {
///     url: String,
/// }
///
/// #[derive(Debug)]
/// struct Verify;
///
/// impl State for Download {
///     fn name(&self) -> Name {
///         Name::from("Download")
///     }
///
///     fn run(&self) -> Result<NextState, StepError> {
///         if self.url.is_empty() {
///             return Err("no url configured".into());
///         }
///         Ok(NextState::to(Verify))
///     }
/// }
///
/// impl State for Verify {
///     fn name(&self) -> Name {
///         Name::from("Verify")
///     }
///
///     fn run(&self) -> Result<NextState, StepError> {
///         Ok(NextState::Done)
///     }
/// }
///
/// let next = Download { url: "https://example.com".into() }.run().unwrap();
/// assert_eq!(next.into_state().unwrap().name(), "Verify");
/// ```
pub trait State: Send + Sync + Debug {
    /// Name used by observers, hooks and logs.
    fn name(&self) -> Name;

    /// Perform this state's effect and yield the state that follows it.
    fn run(&self) -> Result<NextState, StepError>;
}

/// Shared reference to anything that can occupy the manager's state slots.
///
/// The set is closed: user work states, terminal markers, and the
/// [`AbortState`] the manager synthesizes when a step fails. Only the manager
/// can produce the `Aborted` variant's payload.
#[derive(Clone)]
pub enum StateRef {
    /// A user supplied unit of work.
    Work(Arc<dyn State>),

    /// A named end marker. It never executes user code; if it becomes the
    /// current state it completes immediately with no successor.
    Terminal(Name),

    /// The failure record of an aborted run.
    Aborted(Arc<AbortState>),
}

impl StateRef {
    /// Wrap a work state.
    pub fn work(state: impl State + 'static) -> Self {
        Self::Work(Arc::new(state))
    }

    /// Create a named terminal marker.
    pub fn terminal(name: impl Into<Name>) -> Self {
        Self::Terminal(name.into())
    }

    pub fn name(&self) -> Name {
        match self {
            Self::Work(state) => state.name(),
            Self::Terminal(name) => name.clone(),
            Self::Aborted(abort) => abort.name(),
        }
    }

    /// True for terminal markers and abort records.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal(_) | Self::Aborted(_))
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted(_))
    }

    /// Access the abort record, if this is one.
    pub fn as_abort(&self) -> Option<&AbortState> {
        match self {
            Self::Aborted(abort) => Some(abort),
            _ => None,
        }
    }

    /// Access the work state, if this is one.
    pub fn as_work(&self) -> Option<&Arc<dyn State>> {
        match self {
            Self::Work(state) => Some(state),
            _ => None,
        }
    }

    /// Identity comparison: true when both refer to the same instance.
    ///
    /// Terminal markers carry no instance and compare by name.
    pub fn ptr_eq(&self, other: &StateRef) -> bool {
        match (self, other) {
            (Self::Work(a), Self::Work(b)) => Arc::ptr_eq(a, b),
            (Self::Terminal(a), Self::Terminal(b)) => a == b,
            (Self::Aborted(a), Self::Aborted(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<Arc<dyn State>> for StateRef {
    fn from(state: Arc<dyn State>) -> Self {
        Self::Work(state)
    }
}

impl Debug for StateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Work(state) => f.debug_tuple("Work").field(state).finish(),
            Self::Terminal(name) => f.debug_tuple("Terminal").field(name).finish(),
            Self::Aborted(abort) => f.debug_tuple("Aborted").field(abort).finish(),
        }
    }
}

/// Answer of [`State::run`]: continue with a state, or stop normally.
#[derive(Debug, Clone)]
pub enum NextState {
    /// Continue with this state.
    Next(StateRef),

    /// No further state; the chain ends normally.
    Done,
}

impl NextState {
    /// Continue with a work state.
    pub fn to(state: impl State + 'static) -> Self {
        Self::Next(StateRef::work(state))
    }

    /// Continue with a terminal marker.
    pub fn terminal(name: impl Into<Name>) -> Self {
        Self::Next(StateRef::terminal(name))
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    pub fn into_state(self) -> Option<StateRef> {
        match self {
            Self::Next(state) => Some(state),
            Self::Done => None,
        }
    }
}

impl From<Option<StateRef>> for NextState {
    fn from(state: Option<StateRef>) -> Self {
        state.map_or(Self::Done, Self::Next)
    }
}

impl From<StateRef> for NextState {
    fn from(state: StateRef) -> Self {
        Self::Next(state)
    }
}
