//! Lifecycle hooks invoked around every step.
//!
//! Hooks run synchronously on the worker thread, outside the manager's lock,
//! in registration order. They are observability callbacks: a hook that
//! panics is outside the manager's contract.

use crate::core::{StateRef, StepFailure};
use std::sync::Arc;

/// Callbacks fired before and after each executed state.
///
/// Both methods default to no-ops so implementors only override what they
/// need.
///
/// # Example
///
/// ```rust
/// use stepwise::core::{StateRef, StepFailure};
/// use stepwise::manager::LifecycleHooks;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// #[derive(Default)]
/// struct FailureCounter {
///     failures: AtomicUsize,
/// }
///
/// impl LifecycleHooks for FailureCounter {
///     fn on_state_completed(&self, _state: &StateRef, failure: Option<&StepFailure>) {
///         if failure.is_some() {
///             self.failures.fetch_add(1, Ordering::SeqCst);
///         }
///     }
/// }
/// ```
pub trait LifecycleHooks: Send + Sync {
    /// Called immediately before `state` runs.
    fn on_state_started(&self, _state: &StateRef) {}

    /// Called immediately after `state` ran. `failure` is present if and only
    /// if the step failed.
    fn on_state_completed(&self, _state: &StateRef, _failure: Option<&StepFailure>) {}
}

impl<H: LifecycleHooks + ?Sized> LifecycleHooks for Arc<H> {
    fn on_state_started(&self, state: &StateRef) {
        (**self).on_state_started(state)
    }

    fn on_state_completed(&self, state: &StateRef, failure: Option<&StepFailure>) {
        (**self).on_state_completed(state, failure)
    }
}

/// Closure invoked when a state starts.
pub type StartedHook = Box<dyn Fn(&StateRef) + Send + Sync>;

/// Closure invoked when a state completes.
pub type CompletedHook = Box<dyn Fn(&StateRef, Option<&StepFailure>) + Send + Sync>;

/// Hook set assembled from closures.
#[derive(Default)]
pub struct FnHooks {
    started: Option<StartedHook>,
    completed: Option<CompletedHook>,
}

impl FnHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_started<F>(mut self, hook: F) -> Self
    where
        F: Fn(&StateRef) + Send + Sync + 'static,
    {
        self.started = Some(Box::new(hook));
        self
    }

    pub fn on_completed<F>(mut self, hook: F) -> Self
    where
        F: Fn(&StateRef, Option<&StepFailure>) + Send + Sync + 'static,
    {
        self.completed = Some(Box::new(hook));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.started.is_none() && self.completed.is_none()
    }
}

impl LifecycleHooks for FnHooks {
    fn on_state_started(&self, state: &StateRef) {
        if let Some(hook) = &self.started {
            hook(state);
        }
    }

    fn on_state_completed(&self, state: &StateRef, failure: Option<&StepFailure>) {
        if let Some(hook) = &self.completed {
            hook(state, failure);
        }
    }
}

/// Hook set that reports every step as `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingHooks;

impl LifecycleHooks for TracingHooks {
    fn on_state_started(&self, state: &StateRef) {
        tracing::debug!(state = %state.name(), "state started");
    }

    fn on_state_completed(&self, state: &StateRef, failure: Option<&StepFailure>) {
        match failure {
            Some(failure) => {
                tracing::warn!(state = %state.name(), error = %failure, "state failed")
            }
            None => tracing::debug!(state = %state.name(), "state completed"),
        }
    }
}

/// Registered hook sets, dispatched in registration order.
#[derive(Default)]
pub(crate) struct HookChain {
    hooks: Vec<Box<dyn LifecycleHooks>>,
}

impl HookChain {
    pub(crate) fn push(&mut self, hooks: Box<dyn LifecycleHooks>) {
        self.hooks.push(hooks);
    }

    pub(crate) fn len(&self) -> usize {
        self.hooks.len()
    }

    pub(crate) fn started(&self, state: &StateRef) {
        for hooks in &self.hooks {
            hooks.on_state_started(state);
        }
    }

    pub(crate) fn completed(&self, state: &StateRef, failure: Option<&StepFailure>) {
        for hooks in &self.hooks {
            hooks.on_state_completed(state, failure);
        }
    }
}
