//! The synchronized state runner.
//!
//! # Key Concepts
//!
//! - **StateManager**: owns the (current, last) state pair behind one lock
//!   and drives the chain on a single worker
//! - **Observers**: any other thread reading `state_name`, `is_running`,
//!   `last_state` or `snapshot` while the worker runs
//! - **Hooks**: injected [`LifecycleHooks`] fired around every step
//!
//! A failing step is never retried. Its error is captured once into an
//! [`AbortState`](crate::core::AbortState), which becomes the last state,
//! and the run ends in the same critical section.

mod error;
mod hooks;
mod snapshot;
mod state_manager;

pub use error::ManagerError;
pub use hooks::{CompletedHook, FnHooks, LifecycleHooks, StartedHook, TracingHooks};
pub(crate) use hooks::HookChain;
pub use snapshot::{ManagerSnapshot, Phase, RunSummary};
pub use state_manager::{StateManager, DEFAULT_THREAD_NAME};
