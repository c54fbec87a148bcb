//! Builder for constructing state managers.

use crate::builder::error::BuildError;
use crate::core::{State, StateRef, StepFailure};
use crate::manager::{
    FnHooks, HookChain, LifecycleHooks, StateManager, TracingHooks, DEFAULT_THREAD_NAME,
};
use uuid::Uuid;

/// Builder for constructing state managers with a fluent API.
///
/// # Example
///
/// ```rust
/// use stepwise::builder::StateManagerBuilder;
/// use stepwise::core::{Name, NextState, State, StepError};
///
/// #[derive(Debug)]
/// struct Start;
///
/// impl State for Start {
///     fn name(&self) -> Name { Name::from("Start") }
///     fn run(&self) -> Result<NextState, StepError> { Ok(NextState::Done) }
/// }
///
/// let manager = StateManagerBuilder::new()
///     .initial(Start)
///     .on_state_completed(|state, failure| {
///         if let Some(failure) = failure {
///             eprintln!("{} failed: {failure}", state.name());
///         }
///     })
///     .thread_name("importer")
///     .build()
///     .unwrap();
///
/// let summary = manager.run().unwrap();
/// assert_eq!(summary.steps, 1);
/// ```
pub struct StateManagerBuilder {
    initial: Option<StateRef>,
    hooks: HookChain,
    run_id: Option<Uuid>,
    thread_name: String,
}

impl StateManagerBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            initial: None,
            hooks: HookChain::default(),
            run_id: None,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }

    /// Set the initial work state (required).
    pub fn initial(mut self, state: impl State + 'static) -> Self {
        self.initial = Some(StateRef::work(state));
        self
    }

    /// Set the initial state from an existing reference.
    pub fn initial_ref(mut self, state: StateRef) -> Self {
        self.initial = Some(state);
        self
    }

    /// Register a hook set. Sets fire in registration order.
    pub fn hooks(mut self, hooks: impl LifecycleHooks + 'static) -> Self {
        self.hooks.push(Box::new(hooks));
        self
    }

    /// Register a closure fired before each state runs.
    pub fn on_state_started<F>(self, hook: F) -> Self
    where
        F: Fn(&StateRef) + Send + Sync + 'static,
    {
        self.hooks(FnHooks::new().on_started(hook))
    }

    /// Register a closure fired after each state ran.
    pub fn on_state_completed<F>(self, hook: F) -> Self
    where
        F: Fn(&StateRef, Option<&StepFailure>) + Send + Sync + 'static,
    {
        self.hooks(FnHooks::new().on_completed(hook))
    }

    /// Report every step as `tracing` events.
    pub fn trace_steps(self) -> Self {
        self.hooks(TracingHooks)
    }

    /// Use a fixed run identifier instead of a random one.
    pub fn run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = Some(run_id);
        self
    }

    /// Name of the worker thread started by `spawn`.
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Build the state manager.
    /// Returns an error if required fields are missing or invalid.
    pub fn build(self) -> Result<StateManager, BuildError> {
        let initial = self.initial.ok_or(BuildError::MissingInitialState)?;
        if initial.is_aborted() {
            return Err(BuildError::AbortedInitialState);
        }

        if self.thread_name.is_empty() || self.thread_name.contains('\0') {
            return Err(BuildError::InvalidThreadName(self.thread_name));
        }

        Ok(StateManager::from_parts(
            self.run_id.unwrap_or_else(Uuid::new_v4),
            self.thread_name,
            initial,
            self.hooks,
        ))
    }
}

impl Default for StateManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
