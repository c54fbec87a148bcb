//! Serializable views of a state manager for progress reporting.

use crate::core::Name;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a state manager.
///
/// `Pending` and `Running` both have a current state. `Completed` and
/// `Aborted` are absorbing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Constructed, `run` not yet invoked.
    Pending,

    /// The run loop is executing.
    Running,

    /// The chain ended normally.
    Completed,

    /// A step failed; the last state is an abort record.
    Aborted,
}

impl Phase {
    pub fn is_terminated(&self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }
}

/// Point-in-time view of a manager, taken under a single lock acquisition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ManagerSnapshot {
    pub run_id: Uuid,
    pub phase: Phase,
    /// Name of the current state, absent once terminated
    pub current: Option<Name>,
    /// Name of the most recently superseded state
    pub last: Option<Name>,
    /// Number of installed transitions so far
    pub transitions: u64,
    pub taken_at: DateTime<Utc>,
}

/// Outcome of a finished run, returned by `run`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    /// Number of states activated, terminal markers included
    pub steps: u64,
    /// Name of the last state: the final work state, or the abort record
    pub final_state: Option<Name>,
    /// Name of the state that failed, when the run aborted
    pub failed_state: Option<Name>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    pub fn aborted(&self) -> bool {
        self.failed_state.is_some()
    }

    pub fn phase(&self) -> Phase {
        if self.aborted() {
            Phase::Aborted
        } else {
            Phase::Completed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminated_phases_are_absorbing() {
        assert!(!Phase::Pending.is_terminated());
        assert!(!Phase::Running.is_terminated());
        assert!(Phase::Completed.is_terminated());
        assert!(Phase::Aborted.is_terminated());
    }

    #[test]
    fn phase_serializes_in_snake_case() {
        let json = serde_json::to_string(&Phase::Completed).unwrap();
        assert_eq!(json, "\"completed\"");
    }

    #[test]
    fn snapshot_serializes_correctly() {
        let snapshot = ManagerSnapshot {
            run_id: Uuid::new_v4(),
            phase: Phase::Running,
            current: Some(Name::from("Foo")),
            last: Some(Name::from("Start")),
            transitions: 1,
            taken_at: Utc::now(),
        };

        let json = serde_json::to_string(&snapshot).unwrap();
        let deserialized: ManagerSnapshot = serde_json::from_str(&json).unwrap();

        assert_eq!(snapshot, deserialized);
    }

    #[test]
    fn summary_reports_abort() {
        let now = Utc::now();
        let summary = RunSummary {
            run_id: Uuid::new_v4(),
            steps: 2,
            final_state: Some(Name::from("AbortState")),
            failed_state: Some(Name::from("Bar")),
            started_at: now,
            finished_at: now,
        };

        assert!(summary.aborted());
        assert_eq!(summary.phase(), Phase::Aborted);
    }
}
