//! Control events consumed by the kernel loop.
//!
//! [`Event`] is a closed, tagged union — deliberately not a dynamic
//! dictionary or callback registry, so every handler is a single exhaustive
//! `match` arm in [`crate::kernel::Kernel::dispatch`].

use crate::task::{Task, TaskId};

/// A control event submitted to the kernel's event queue.
///
/// Submission order determines dispatch order: the queue is a strict FIFO
/// with a single consumer, the kernel loop.
#[derive(Debug, Clone)]
pub enum Event {
    /// Submit a new task for scheduling.
    TaskSubmit(Task),
    /// The named task's skill finished successfully.
    TaskComplete(TaskId),
    /// The named task's skill failed; `error` is an optional diagnostic.
    TaskFail(TaskId, Option<String>),
    /// Cancel the named task.
    TaskCancel(TaskId),
    /// Re-queue the named task for another attempt (ACTIVE -> PENDING).
    TaskRetry(TaskId),
    /// Preempt the active task (if any) and schedule the interrupting task.
    Interrupt(Task),
}
