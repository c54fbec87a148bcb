//! Stepwise: a cooperative state runner
//!
//! Stepwise executes a chain of discrete, possibly long-running states on a
//! single worker. Each state does its work and answers with the state to
//! run next, or with `Done`. While the worker runs, any number of observer
//! threads can read which state is current, and a failing state is captured
//! into an inspectable abort record instead of crashing the process.
//!
//! # Core Concepts
//!
//! - **State**: a unit of work via the `State` trait
//! - **NextState**: the explicit answer of a state, `Next(state)` or `Done`
//! - **AbortState**: terminal record carrying the captured failure
//! - **StateManager**: the synchronized driver observers read from
//!
//! # Example
//!
//! ```rust
//! use stepwise::core::{Name, NextState, State, StepError};
//! use stepwise::manager::StateManager;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[derive(Debug)]
//! struct Start;
//!
//! #[derive(Debug)]
//! struct Upload;
//!
//! impl State for Start {
//!     fn name(&self) -> Name {
//!         Name::from("Start")
//!     }
//!
//!     fn run(&self) -> Result<NextState, StepError> {
//!         Ok(NextState::to(Upload))
//!     }
//! }
//!
//! impl State for Upload {
//!     fn name(&self) -> Name {
//!         Name::from("Upload")
//!     }
//!
//!     fn run(&self) -> Result<NextState, StepError> {
//!         Err("remote refused the upload".into())
//!     }
//! }
//!
//! let manager = Arc::new(StateManager::new(Start));
//! let worker = manager.spawn().unwrap();
//!
//! let last = manager.observe(Duration::from_millis(5), |name| println!("in {name}"));
//! worker.join().unwrap().unwrap();
//!
//! let abort = last.as_ref().and_then(|s| s.as_abort()).unwrap();
//! assert_eq!(abort.failed_state().as_str(), "Upload");
//! assert_eq!(abort.failure().to_string(), "remote refused the upload");
//! ```

pub mod builder;
pub mod core;
pub mod manager;

// Re-export commonly used types
pub use crate::builder::{BuildError, StateManagerBuilder};
pub use crate::core::{AbortState, Name, NextState, State, StateRef, StepError, StepFailure};
pub use crate::manager::{LifecycleHooks, ManagerError, Phase, RunSummary, StateManager};
