//! State manager that drives a chain of states on a single worker.

use crate::builder::StateManagerBuilder;
use crate::core::{AbortState, Name, NextState, State, StateRef, StepFailure};
use crate::manager::error::ManagerError;
use crate::manager::hooks::HookChain;
use crate::manager::snapshot::{ManagerSnapshot, Phase, RunSummary};
use chrono::Utc;
use parking_lot::Mutex;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use uuid::Uuid;

/// Default name of the worker thread started by [`StateManager::spawn`].
pub const DEFAULT_THREAD_NAME: &str = "state-manager";

/// The (current, last) pair and the bookkeeping updated with it.
///
/// Always read and written under one lock so observers never see a torn pair.
struct Slots {
    current: Option<StateRef>,
    last: Option<StateRef>,
    phase: Phase,
    transitions: u64,
}

/// Synchronized driver of a state chain.
///
/// One worker calls [`run`](Self::run); any number of observer threads may
/// call the read accessors meanwhile. A state's `run` executes outside the
/// lock, so observers are never blocked for the duration of a step.
///
/// # Example
///
/// ```rust
/// use stepwise::core::{Name, NextState, State, StepError};
/// use stepwise::manager::StateManager;
/// use std::sync::Arc;
///
/// #[derive(Debug)]
/// struct A;
///
/// #[derive(Debug)]
/// struct B;
///
/// impl State for A {
///     fn name(&self) -> Name { Name::from("A") }
///     fn run(&self) -> Result<NextState, StepError> { Ok(NextState::to(B)) }
/// }
///
/// impl State for B {
///     fn name(&self) -> Name { Name::from("B") }
///     fn run(&self) -> Result<NextState, StepError> { Ok(NextState::Done) }
/// }
///
/// let manager = Arc::new(StateManager::new(A));
/// assert_eq!(manager.state_name().unwrap(), "A");
///
/// let worker = manager.spawn().unwrap();
/// let summary = worker.join().unwrap().unwrap();
///
/// assert!(!manager.is_running());
/// assert_eq!(manager.last_state().unwrap().name(), "B");
/// assert_eq!(summary.steps, 2);
/// assert!(!summary.aborted());
/// ```
pub struct StateManager {
    run_id: Uuid,
    thread_name: String,
    slots: Mutex<Slots>,
    hooks: HookChain,
}

impl StateManager {
    /// Create a manager with `initial` as the current state and no hooks.
    pub fn new(initial: impl State + 'static) -> Self {
        Self::from_parts(
            Uuid::new_v4(),
            DEFAULT_THREAD_NAME.to_string(),
            StateRef::work(initial),
            HookChain::default(),
        )
    }

    /// Start configuring a manager.
    pub fn builder() -> StateManagerBuilder {
        StateManagerBuilder::new()
    }

    pub(crate) fn from_parts(
        run_id: Uuid,
        thread_name: String,
        initial: StateRef,
        hooks: HookChain,
    ) -> Self {
        Self {
            run_id,
            thread_name,
            slots: Mutex::new(Slots {
                current: Some(initial),
                last: None,
                phase: Phase::Pending,
                transitions: 0,
            }),
            hooks,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Name of the current state.
    ///
    /// Fails with [`ManagerError::Terminated`] once the run has ended rather
    /// than returning a stale name.
    pub fn state_name(&self) -> Result<Name, ManagerError> {
        let slots = self.slots.lock();
        slots
            .current
            .as_ref()
            .map(StateRef::name)
            .ok_or(ManagerError::Terminated)
    }

    /// Whether a current state is present. This is the termination signal
    /// for observers: once false it stays false.
    pub fn is_running(&self) -> bool {
        self.slots.lock().current.is_some()
    }

    /// The most recently superseded state.
    ///
    /// Absent until the first transition. After the run ends this is the
    /// final state on a normal end, or the [`AbortState`] on failure.
    pub fn last_state(&self) -> Option<StateRef> {
        self.slots.lock().last.clone()
    }

    pub fn current_state(&self) -> Option<StateRef> {
        self.slots.lock().current.clone()
    }

    pub fn phase(&self) -> Phase {
        self.slots.lock().phase
    }

    /// Consistent view of both slots, taken in one critical section.
    pub fn snapshot(&self) -> ManagerSnapshot {
        let slots = self.slots.lock();
        ManagerSnapshot {
            run_id: self.run_id,
            phase: slots.phase,
            current: slots.current.as_ref().map(StateRef::name),
            last: slots.last.as_ref().map(StateRef::name),
            transitions: slots.transitions,
            taken_at: Utc::now(),
        }
    }

    /// Drive the chain to completion on the calling thread.
    ///
    /// Step failures and panics are captured into an [`AbortState`] and end
    /// the run; they are never returned from here. The only error is misuse:
    /// a second call fails with [`ManagerError::AlreadyStarted`].
    ///
    /// There is no cancellation or timeout. A state that blocks forever
    /// blocks the run; states that need cancellation must poll for it
    /// themselves.
    pub fn run(&self) -> Result<RunSummary, ManagerError> {
        self.begin()?;
        Ok(self.drive())
    }

    /// The run loop proper. The caller has already moved the phase to
    /// `Running`.
    fn drive(&self) -> RunSummary {
        let span = tracing::info_span!("state_manager", run_id = %self.run_id);
        let _enter = span.enter();

        let started_at = Utc::now();
        let mut steps = 0u64;
        tracing::info!(hooks = self.hooks.len(), "state manager starting");

        while let Some(current) = self.current_state() {
            steps += 1;
            self.hooks.started(&current);

            match execute(&current).and_then(reject_abort_successor) {
                Ok(next) => {
                    self.hooks.completed(&current, None);
                    let next = next.into_state();
                    let to = next.as_ref().map(StateRef::name);
                    tracing::debug!(from = %current.name(), to = ?to, "transition");
                    self.advance(next);
                }
                Err(failure) => {
                    tracing::warn!(
                        state = %current.name(),
                        error = %failure,
                        "state failed, aborting run"
                    );
                    self.hooks.completed(&current, Some(&failure));
                    self.abort(AbortState::new(current.name(), failure));
                }
            }
        }

        let summary = self.summarize(steps, started_at);
        tracing::info!(
            steps = summary.steps,
            aborted = summary.aborted(),
            "state manager terminating"
        );
        summary
    }

    /// Run the chain on a dedicated worker thread.
    ///
    /// Fails fast with [`ManagerError::AlreadyStarted`] if the run already
    /// began: the phase moves to `Running` before the thread is started, so
    /// of two concurrent calls only one gets a handle. If the thread cannot
    /// be started the manager is left `Pending`.
    pub fn spawn(
        self: &Arc<Self>,
    ) -> Result<JoinHandle<Result<RunSummary, ManagerError>>, ManagerError> {
        self.begin()?;

        let manager = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name(self.thread_name.clone())
            .spawn(move || Ok::<_, ManagerError>(manager.drive()));

        match spawned {
            Ok(handle) => Ok(handle),
            Err(err) => {
                self.slots.lock().phase = Phase::Pending;
                Err(ManagerError::Spawn(err))
            }
        }
    }

    /// Poll the current state name every `interval` until the run ends,
    /// then return the last state.
    ///
    /// Meant for progress display from a host thread. Returns only after
    /// some worker has driven the run to its end.
    pub fn observe<F>(&self, interval: Duration, mut on_tick: F) -> Option<StateRef>
    where
        F: FnMut(&Name),
    {
        while let Ok(name) = self.state_name() {
            on_tick(&name);
            thread::sleep(interval);
        }
        self.last_state()
    }

    fn begin(&self) -> Result<(), ManagerError> {
        let mut slots = self.slots.lock();
        if slots.phase != Phase::Pending {
            return Err(ManagerError::AlreadyStarted);
        }
        slots.phase = Phase::Running;
        Ok(())
    }

    fn advance(&self, next: Option<StateRef>) {
        let mut slots = self.slots.lock();
        slots.last = slots.current.take();
        slots.current = next;
        slots.transitions += 1;
        if slots.current.is_none() {
            slots.phase = Phase::Completed;
        }
    }

    fn abort(&self, abort: AbortState) {
        let mut slots = self.slots.lock();
        slots.last = Some(StateRef::Aborted(Arc::new(abort)));
        slots.current = None;
        slots.transitions += 1;
        slots.phase = Phase::Aborted;
    }

    fn summarize(&self, steps: u64, started_at: chrono::DateTime<Utc>) -> RunSummary {
        let slots = self.slots.lock();
        RunSummary {
            run_id: self.run_id,
            steps,
            final_state: slots.last.as_ref().map(StateRef::name),
            failed_state: slots
                .last
                .as_ref()
                .and_then(StateRef::as_abort)
                .map(|abort| abort.failed_state().clone()),
            started_at,
            finished_at: Utc::now(),
        }
    }
}

/// Abort records are produced by the manager that captured them and cannot
/// be continued with. A state answering with one fails instead.
fn reject_abort_successor(next: NextState) -> Result<NextState, StepFailure> {
    match next {
        NextState::Next(StateRef::Aborted(abort)) => Err(StepFailure::AbortSuccessor {
            failed_state: abort.failed_state().clone(),
        }),
        next => Ok(next),
    }
}

/// Execute one activation of `state`, capturing errors and panics.
///
/// Terminal markers complete immediately without running user code.
fn execute(state: &StateRef) -> Result<NextState, StepFailure> {
    match state {
        StateRef::Work(work) => match panic::catch_unwind(AssertUnwindSafe(|| work.run())) {
            Ok(Ok(next)) => Ok(next),
            Ok(Err(err)) => Err(StepFailure::Error(err)),
            Err(payload) => Err(StepFailure::from_panic(payload)),
        },
        StateRef::Terminal(_) | StateRef::Aborted(_) => Ok(NextState::Done),
    }
}

impl fmt::Debug for StateManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self.slots.lock();
        f.debug_struct("StateManager")
            .field("run_id", &self.run_id)
            .field("phase", &slots.phase)
            .field("current", &slots.current)
            .field("last", &slots.last)
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StepError;
    use crate::manager::hooks::FnHooks;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use thiserror::Error;

    #[derive(Debug, Error, PartialEq)]
    #[error("oopsie in {0}")]
    struct Oopsie(&'static str);

    /// Counts activations and moves to a terminal marker.
    #[derive(Debug)]
    struct Step {
        name: &'static str,
        next: Option<&'static str>,
        fail: bool,
        runs: Arc<AtomicUsize>,
    }

    impl Step {
        fn new(
            name: &'static str,
            next: Option<&'static str>,
            fail: bool,
            runs: &Arc<AtomicUsize>,
        ) -> Self {
            Self {
                name,
                next,
                fail,
                runs: Arc::clone(runs),
            }
        }
    }

    /// Chain of named states, each building its successor.
    #[derive(Debug)]
    struct Linked {
        names: Vec<&'static str>,
        index: usize,
        fail_at: Option<usize>,
        runs: Arc<AtomicUsize>,
    }

    impl State for Linked {
        fn name(&self) -> Name {
            Name::from(self.names[self.index])
        }

        fn run(&self) -> Result<NextState, StepError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail_at == Some(self.index) {
                return Err(Box::new(Oopsie(self.names[self.index])));
            }
            if self.index + 1 == self.names.len() {
                return Ok(NextState::Done);
            }
            Ok(NextState::to(Linked {
                names: self.names.clone(),
                index: self.index + 1,
                fail_at: self.fail_at,
                runs: Arc::clone(&self.runs),
            }))
        }
    }

    impl State for Step {
        fn name(&self) -> Name {
            Name::from(self.name)
        }

        fn run(&self) -> Result<NextState, StepError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Box::new(Oopsie(self.name)));
            }
            Ok(match self.next {
                Some(next) => NextState::terminal(next),
                None => NextState::Done,
            })
        }
    }

    fn linked(names: &[&'static str], fail_at: Option<usize>) -> (Linked, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        let state = Linked {
            names: names.to_vec(),
            index: 0,
            fail_at,
            runs: Arc::clone(&runs),
        };
        (state, runs)
    }

    #[derive(Debug)]
    struct Panicky;

    impl State for Panicky {
        fn name(&self) -> Name {
            Name::from("Panicky")
        }

        fn run(&self) -> Result<NextState, StepError> {
            panic!("step exploded");
        }
    }

    #[test]
    fn new_manager_is_pending_with_initial_state() {
        let (initial, _) = linked(&["Start"], None);
        let manager = StateManager::new(initial);

        assert!(manager.is_running());
        assert_eq!(manager.phase(), Phase::Pending);
        assert_eq!(manager.state_name().unwrap(), "Start");
        assert!(manager.last_state().is_none());
    }

    #[test]
    fn linear_chain_runs_each_state_once() {
        let (initial, runs) = linked(&["Start", "Foo", "Bar"], None);
        let manager = StateManager::new(initial);

        let summary = manager.run().unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 3);
        assert_eq!(summary.steps, 3);
        assert!(!manager.is_running());
        assert_eq!(manager.phase(), Phase::Completed);
        assert_eq!(summary.final_state, Some(Name::from("Bar")));
        assert!(!summary.aborted());
    }

    #[test]
    fn last_state_is_final_work_state() {
        let (initial, _) = linked(&["A", "B"], None);
        let manager = StateManager::new(initial);

        manager.run().unwrap();

        let last = manager.last_state().unwrap();
        assert_eq!(last.name(), "B");
        assert!(!last.is_aborted());
        assert_eq!(last.as_work().unwrap().name(), "B");
        assert!(last.as_abort().is_none());
    }

    #[test]
    fn state_name_after_termination_is_an_error() {
        let (initial, _) = linked(&["Only"], None);
        let manager = StateManager::new(initial);

        manager.run().unwrap();

        assert!(matches!(manager.state_name(), Err(ManagerError::Terminated)));
    }

    #[test]
    fn failure_is_captured_in_abort_state() {
        let (initial, runs) = linked(&["Start", "Bar", "End"], Some(1));
        let manager = StateManager::new(initial);

        let summary = manager.run().unwrap();

        assert!(!manager.is_running());
        assert_eq!(manager.phase(), Phase::Aborted);
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        let last = manager.last_state().unwrap();
        let abort = last.as_abort().unwrap();
        assert_eq!(abort.failed_state(), &Name::from("Bar"));
        assert_eq!(abort.downcast_ref::<Oopsie>(), Some(&Oopsie("Bar")));
        assert_eq!(last.name(), crate::core::ABORT_STATE_NAME);

        assert!(summary.aborted());
        assert_eq!(summary.failed_state, Some(Name::from("Bar")));
        assert_eq!(summary.steps, 2);
    }

    #[test]
    fn failing_initial_state_runs_once() {
        let runs = Arc::new(AtomicUsize::new(0));
        let manager = StateManager::new(Step::new("Boom", Some("Never"), true, &runs));

        manager.run().unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(manager.last_state().unwrap().is_aborted());
    }

    #[test]
    fn panics_are_captured_in_abort_state() {
        let manager = StateManager::new(Panicky);

        let summary = manager.run().unwrap();

        let last = manager.last_state().unwrap();
        let failure = last.as_abort().unwrap().failure();
        assert!(failure.is_panic());
        assert_eq!(failure.to_string(), "state panicked: step exploded");
        assert_eq!(summary.failed_state, Some(Name::from("Panicky")));
    }

    #[test]
    fn terminal_marker_ends_chain_without_user_code() {
        let runs = Arc::new(AtomicUsize::new(0));
        let manager = StateManager::new(Step::new("Work", Some("EndState"), false, &runs));

        let summary = manager.run().unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(summary.steps, 2);
        let last = manager.last_state().unwrap();
        assert_eq!(last.name(), "EndState");
        assert!(last.is_terminal());
        assert!(!last.is_aborted());
        assert_eq!(manager.phase(), Phase::Completed);
    }

    #[test]
    fn second_run_is_rejected() {
        let (initial, runs) = linked(&["Once"], None);
        let manager = StateManager::new(initial);

        manager.run().unwrap();

        assert!(matches!(manager.run(), Err(ManagerError::AlreadyStarted)));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    /// Hands back an abort record taken from another manager.
    #[derive(Debug)]
    struct Reroute(StateRef);

    impl State for Reroute {
        fn name(&self) -> Name {
            Name::from("Reroute")
        }

        fn run(&self) -> Result<NextState, StepError> {
            Ok(NextState::Next(self.0.clone()))
        }
    }

    #[test]
    fn abort_record_as_successor_aborts_run() {
        let runs = Arc::new(AtomicUsize::new(0));
        let first = StateManager::new(Step::new("Boom", None, true, &runs));
        first.run().unwrap();
        let record = first.last_state().unwrap();
        assert!(record.is_aborted());

        let completions = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&completions);
        let second = StateManager::builder()
            .initial(Reroute(record))
            .on_state_completed(move |s, failure| {
                sink.lock().push((s.name(), failure.is_some()))
            })
            .build()
            .unwrap();

        let summary = second.run().unwrap();

        assert_eq!(second.phase(), Phase::Aborted);
        assert_eq!(summary.phase(), second.phase());
        assert_eq!(summary.steps, 1);
        assert_eq!(summary.failed_state, Some(Name::from("Reroute")));
        assert_eq!(*completions.lock(), vec![(Name::from("Reroute"), true)]);

        let last = second.last_state().unwrap();
        let failure = last.as_abort().unwrap().failure();
        assert!(matches!(
            failure,
            StepFailure::AbortSuccessor { failed_state } if failed_state == "Boom"
        ));
    }

    #[test]
    fn second_spawn_is_rejected_without_starting_a_thread() {
        let (initial, runs) = linked(&["A", "B"], None);
        let manager = Arc::new(StateManager::new(initial));

        let worker = manager.spawn().unwrap();
        assert!(matches!(manager.spawn(), Err(ManagerError::AlreadyStarted)));

        let summary = worker.join().unwrap().unwrap();
        assert_eq!(summary.steps, 2);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert!(matches!(manager.run(), Err(ManagerError::AlreadyStarted)));
    }

    #[test]
    fn spawn_after_run_is_rejected() {
        let (initial, _) = linked(&["Once"], None);
        let manager = Arc::new(StateManager::new(initial));

        manager.run().unwrap();

        assert!(matches!(manager.spawn(), Err(ManagerError::AlreadyStarted)));
    }

    #[test]
    fn hooks_fire_around_each_step() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let started = Arc::clone(&events);
        let completed = Arc::clone(&events);

        let (initial, _) = linked(&["A", "B", "C"], Some(1));
        let manager = StateManager::builder()
            .initial(initial)
            .hooks(
                FnHooks::new()
                    .on_started(move |s| started.lock().push(format!("+{}", s.name())))
                    .on_completed(move |s, failure| {
                        let mark = if failure.is_some() { "!" } else { "-" };
                        completed.lock().push(format!("{mark}{}", s.name()))
                    }),
            )
            .build()
            .unwrap();

        manager.run().unwrap();

        assert_eq!(*events.lock(), vec!["+A", "-A", "+B", "!B"]);
    }

    #[test]
    fn snapshot_pairs_current_and_last() {
        let (initial, _) = linked(&["A", "B"], None);
        let manager = StateManager::new(initial);

        let before = manager.snapshot();
        assert_eq!(before.phase, Phase::Pending);
        assert_eq!(before.current, Some(Name::from("A")));
        assert_eq!(before.last, None);
        assert_eq!(before.transitions, 0);

        manager.run().unwrap();

        let after = manager.snapshot();
        assert_eq!(after.phase, Phase::Completed);
        assert_eq!(after.current, None);
        assert_eq!(after.last, Some(Name::from("B")));
        assert_eq!(after.transitions, 2);
        assert_eq!(after.run_id, manager.run_id());
    }

    #[test]
    fn observe_reports_until_termination() {
        let (initial, _) = linked(&["A", "B"], None);
        let manager = Arc::new(StateManager::new(initial));

        let worker = manager.spawn().unwrap();
        let last = manager.observe(Duration::from_millis(1), |_| {});
        worker.join().unwrap().unwrap();

        assert_eq!(last.unwrap().name(), "B");
        assert!(!manager.is_running());
    }

    #[test]
    fn debug_output_includes_phase() {
        let (initial, _) = linked(&["A"], None);
        let manager = StateManager::new(initial);

        let debug = format!("{manager:?}");
        assert!(debug.contains("Pending"));
        assert!(debug.contains("run_id"));
    }
}
