//! Priority- and dependency-aware task scheduler.
//!
//! The scheduler keeps two structures: a [`DashMap`]-backed by-id index of
//! every task the kernel knows about (the authoritative source for state),
//! and a max-heap of ready entries ordered by `(priority, submission order)`
//! used only to pick the next task to promote. The heap may carry stale or
//! duplicate entries across a task's PAUSED <-> ACTIVE cycles; `pick_next`
//! filters those out lazily rather than trying to keep the heap in exact
//! sync with the index.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Mutex;

use dashmap::DashMap;

use crate::error::Result;
use crate::task::{LifecycleState, Task, TaskId};

/// A ready-structure entry: task id plus the priority/sequence it was
/// enqueued with. Ordered so that higher priority sorts first, and among
/// equal priorities the lower sequence number (submitted earlier) sorts
/// first — giving a deterministic FIFO tie-break.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct ReadyEntry {
    priority: i64,
    seq: u64,
    task_id: TaskId,
}

impl Ord for ReadyEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for ReadyEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// In-memory index of known tasks plus a priority-ordered ready structure.
pub struct Scheduler {
    tasks: DashMap<TaskId, Task>,
    ready: Mutex<BinaryHeap<ReadyEntry>>,
    next_seq: AtomicU64,
}

impl Scheduler {
    /// Create an empty scheduler.
    pub fn new() -> Self {
        Self {
            tasks: DashMap::new(),
            ready: Mutex::new(BinaryHeap::new()),
            next_seq: AtomicU64::new(0),
        }
    }

    fn next_seq(&self) -> u64 {
        self.next_seq.fetch_add(1, AtomicOrdering::Relaxed)
    }

    /// Track `task` in the by-id index without making it schedulable.
    ///
    /// Used so a task is immediately queryable via `get`/`list` before its
    /// `TaskSubmit`/`Interrupt` event has been processed by the loop, and
    /// for tasks recovered in a terminal state on startup.
    pub fn register(&self, task: Task) {
        self.tasks.insert(task.id, task);
    }

    /// Track `task` and enqueue it in the ready structure.
    pub fn add(&self, task: Task) {
        let entry = ReadyEntry {
            priority: task.priority,
            seq: self.next_seq(),
            task_id: task.id,
        };
        self.tasks.insert(task.id, task);
        self.ready.lock().unwrap().push(entry);
    }

    /// Return and remove the highest-priority eligible task, or `None` if
    /// nothing is ready.
    ///
    /// Eligibility: the task still exists, its state is `Pending` or
    /// `Paused`, and `blocked_by` is empty. Entries whose task vanished or
    /// moved to an ineligible state are discarded. Entries that are ready
    /// in state but still blocked are set aside and reinserted once the
    /// scan is done, so they remain candidates on the next call.
    pub fn pick_next(&self) -> Option<Task> {
        let mut ready = self.ready.lock().unwrap();
        let mut deferred = Vec::new();
        let mut result = None;

        while let Some(entry) = ready.pop() {
            let eligible = self
                .tasks
                .get(&entry.task_id)
                .map(|task| (task.state.is_schedulable(), task.blocked_by.is_empty()));

            match eligible {
                None => continue, // stale: task no longer tracked
                Some((false, _)) => continue, // stale: moved on since being enqueued
                Some((true, false)) => {
                    deferred.push(entry);
                    continue;
                }
                Some((true, true)) => {
                    result = self.tasks.get(&entry.task_id).map(|t| t.clone());
                    break;
                }
            }
        }

        for entry in deferred {
            ready.push(entry);
        }

        result
    }

    /// Remove `completed_id` from every known task's `blocked_by`.
    pub fn release_dependents(&self, completed_id: TaskId) {
        for mut entry in self.tasks.iter_mut() {
            entry.blocked_by.remove(&completed_id);
        }
    }

    /// Transition `task_id` to `Paused` and re-enqueue it in the ready
    /// structure. No-op if the task is unknown.
    pub fn suspend(&self, task_id: TaskId) -> Result<()> {
        let priority = {
            let mut entry = match self.tasks.get_mut(&task_id) {
                Some(e) => e,
                None => return Ok(()),
            };
            entry.transition(LifecycleState::Paused)?;
            entry.priority
        };
        let ready_entry = ReadyEntry {
            priority,
            seq: self.next_seq(),
            task_id,
        };
        self.ready.lock().unwrap().push(ready_entry);
        Ok(())
    }

    /// Look up a task by id.
    pub fn get(&self, task_id: TaskId) -> Option<Task> {
        self.tasks.get(&task_id).map(|e| e.clone())
    }

    /// Mutate a tracked task in place via `f`, returning `None` if unknown.
    pub fn with_mut<R>(&self, task_id: TaskId, f: impl FnOnce(&mut Task) -> R) -> Option<R> {
        self.tasks.get_mut(&task_id).map(|mut e| f(&mut e))
    }

    /// Remove a task from tracking. Stale heap entries are discarded lazily
    /// by `pick_next`.
    pub fn remove(&self, task_id: TaskId) -> Option<Task> {
        self.tasks.remove(&task_id).map(|(_, t)| t)
    }

    /// Snapshot of every known task.
    pub fn list(&self) -> Vec<Task> {
        self.tasks.iter().map(|e| e.value().clone()).collect()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
