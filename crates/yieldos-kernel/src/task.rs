//! Task record and lifecycle state machine.
//!
//! A [`Task`] is the durable unit of work the kernel schedules. Its `state`
//! may only change through [`Task::transition`], which validates the move
//! against [`VALID_TRANSITIONS`] before mutating anything — an attempted
//! invalid transition leaves the task byte-for-byte unchanged.
//!
//! ```text
//! PENDING  --> ACTIVE --> COMPLETED
//!   |            |   \--> FAILED
//!   |            |   \--> CANCELLED
//!   |            \--> PAUSED --> ACTIVE
//!   |            \--> PENDING (retry)
//!   \--> CANCELLED
//! ```

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{KernelError, Result};

/// Globally unique task identifier (UUID v7, time-ordered).
pub type TaskId = Uuid;

/// Lifecycle state of a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    /// Submitted, waiting to be promoted to ACTIVE.
    Pending,
    /// Currently the single executing task in the system.
    Active,
    /// Preempted; waiting to resume from its checkpoint.
    Paused,
    /// Finished successfully. Terminal.
    Completed,
    /// Finished with an error, retries exhausted. Terminal.
    Failed,
    /// Cancelled before or during execution. Terminal.
    Cancelled,
}

impl LifecycleState {
    /// The allowed target states for a transition out of `self`.
    fn allowed_targets(self) -> &'static [LifecycleState] {
        use LifecycleState::*;
        match self {
            Pending => &[Active, Cancelled],
            Active => &[Pending, Paused, Completed, Failed, Cancelled],
            Paused => &[Active, Cancelled],
            Completed | Failed | Cancelled => &[],
        }
    }

    /// `true` if no further transition is ever permitted from this state.
    pub fn is_terminal(self) -> bool {
        self.allowed_targets().is_empty()
    }

    /// `true` if a task in this state is eligible for scheduling
    /// (see `Scheduler::pick_next`).
    pub fn is_schedulable(self) -> bool {
        matches!(self, LifecycleState::Pending | LifecycleState::Paused)
    }

    /// Lowercase string form used in HTTP responses and the persisted schema.
    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleState::Pending => "pending",
            LifecycleState::Active => "active",
            LifecycleState::Paused => "paused",
            LifecycleState::Completed => "completed",
            LifecycleState::Failed => "failed",
            LifecycleState::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for LifecycleState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(LifecycleState::Pending),
            "active" => Ok(LifecycleState::Active),
            "paused" => Ok(LifecycleState::Paused),
            "completed" => Ok(LifecycleState::Completed),
            "failed" => Ok(LifecycleState::Failed),
            "cancelled" => Ok(LifecycleState::Cancelled),
            other => Err(format!("unknown lifecycle state: {other}")),
        }
    }
}

/// Validate and apply a transition, returning the new state.
///
/// Pure function over the (current, target) pair — does not touch a `Task`.
/// Kept free-standing (rather than a `Task` method) so the scheduler and
/// tests can validate a hypothetical move without owning a task.
pub fn apply_transition(
    task_id: TaskId,
    current: LifecycleState,
    target: LifecycleState,
) -> Result<LifecycleState> {
    if current.allowed_targets().contains(&target) {
        Ok(target)
    } else {
        Err(KernelError::InvalidTransition {
            task_id,
            current,
            target,
        })
    }
}

/// The durable unit of work scheduled by the kernel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Globally unique, immutable identifier.
    pub id: TaskId,
    /// Skill name; used by the runner to look up the handler.
    pub name: String,
    /// Signed priority; larger is more urgent.
    pub priority: i64,
    /// Current lifecycle state.
    pub state: LifecycleState,
    /// When the task was first submitted.
    pub created_at: DateTime<Utc>,
    /// When `state` last changed.
    pub updated_at: DateTime<Utc>,
    /// Free-form metadata: checkpoint data, retry accounting
    /// (`retry_count`, `max_retries`, `retry_delay`), anything skill-owned.
    pub metadata: serde_json::Map<String, serde_json::Value>,
    /// Task ids that must reach `Completed` before this task is eligible.
    /// Only ever shrinks; never re-populated once an entry is removed.
    pub blocked_by: BTreeSet<TaskId>,
}

impl Task {
    /// Construct a new task in `Pending` state with the current timestamp.
    pub fn new(name: impl Into<String>, priority: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            priority,
            state: LifecycleState::Pending,
            created_at: now,
            updated_at: now,
            metadata: serde_json::Map::new(),
            blocked_by: BTreeSet::new(),
        }
    }

    /// Builder: attach metadata.
    pub fn with_metadata(mut self, metadata: serde_json::Map<String, serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Builder: attach a dependency set.
    pub fn with_blocked_by(mut self, blocked_by: BTreeSet<TaskId>) -> Self {
        self.blocked_by = blocked_by;
        self
    }

    /// Attempt to move this task to `target`. On success, mutates `state`
    /// and bumps `updated_at`. On failure, the task is left byte-for-byte
    /// unchanged.
    pub fn transition(&mut self, target: LifecycleState) -> Result<()> {
        let next = apply_transition(self.id, self.state, target)?;
        self.state = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Read `metadata["retry_count"]` as an integer, defaulting to 0.
    pub fn retry_count(&self) -> i64 {
        self.metadata
            .get("retry_count")
            .and_then(|v| v.as_i64())
            .unwrap_or(0)
    }

    /// Read `metadata["max_retries"]` as an integer, defaulting to 0.
    pub fn max_retries(&self) -> i64 {
        self.metadata
            .get("max_retries")
            .and_then(|v| v.as_i64())
            .unwrap_or(0)
    }

    /// Read `metadata["retry_delay"]` in seconds, defaulting to 0.
    pub fn retry_delay_secs(&self) -> f64 {
        self.metadata
            .get("retry_delay")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_to_active_is_allowed() {
        let mut task = Task::new("pour_water", 3);
        task.transition(LifecycleState::Active).unwrap();
        assert_eq!(task.state, LifecycleState::Active);
    }

    #[test]
    fn invalid_transition_leaves_task_unchanged() {
        let mut task = Task::new("pour_water", 3);
        let before = task.updated_at;
        let err = task.transition(LifecycleState::Completed).unwrap_err();
        assert!(matches!(err, KernelError::InvalidTransition { .. }));
        assert_eq!(task.state, LifecycleState::Pending);
        assert_eq!(task.updated_at, before);
    }

    #[test]
    fn terminal_states_reject_all_transitions() {
        for terminal in [
            LifecycleState::Completed,
            LifecycleState::Failed,
            LifecycleState::Cancelled,
        ] {
            assert!(terminal.is_terminal());
            for target in [
                LifecycleState::Pending,
                LifecycleState::Active,
                LifecycleState::Paused,
                LifecycleState::Completed,
                LifecycleState::Failed,
                LifecycleState::Cancelled,
            ] {
                let task_id = Uuid::now_v7();
                assert!(apply_transition(task_id, terminal, target).is_err());
            }
        }
    }

    #[test]
    fn updated_at_advances_monotonically() {
        let mut task = Task::new("navigate", 5);
        let t0 = task.updated_at;
        std::thread::sleep(std::time::Duration::from_millis(2));
        task.transition(LifecycleState::Active).unwrap();
        assert!(task.updated_at >= t0);
        let t1 = task.updated_at;
        std::thread::sleep(std::time::Duration::from_millis(2));
        task.transition(LifecycleState::Paused).unwrap();
        assert!(task.updated_at >= t1);
    }

    #[test]
    fn active_to_pending_models_retry() {
        let mut task = Task::new("flaky", 1);
        task.transition(LifecycleState::Active).unwrap();
        task.transition(LifecycleState::Pending).unwrap();
        assert_eq!(task.state, LifecycleState::Pending);
    }

    #[test]
    fn retry_accounting_defaults() {
        let task = Task::new("flaky", 1);
        assert_eq!(task.retry_count(), 0);
        assert_eq!(task.max_retries(), 0);
        assert_eq!(task.retry_delay_secs(), 0.0);
    }

    #[test]
    fn lifecycle_state_round_trips_through_str() {
        for s in [
            LifecycleState::Pending,
            LifecycleState::Active,
            LifecycleState::Paused,
            LifecycleState::Completed,
            LifecycleState::Failed,
            LifecycleState::Cancelled,
        ] {
            let parsed: LifecycleState = s.as_str().parse().unwrap();
            assert_eq!(parsed, s);
        }
    }
}
