//! Kernel error types.
//!
//! All kernel subsystems surface errors through [`KernelError`], which is the
//! single error type returned by every public API in this crate. Each variant
//! carries enough context for callers to decide how to handle the failure
//! without inspecting opaque strings.

use uuid::Uuid;

/// Unified error type for the yieldos scheduling kernel.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    /// The requested lifecycle transition is not in the allowed target set
    /// for the task's current state. The task is left unchanged.
    #[error("invalid transition for {task_id}: {current:?} -> {target:?}")]
    InvalidTransition {
        task_id: Uuid,
        current: crate::task::LifecycleState,
        target: crate::task::LifecycleState,
    },

    /// An event referenced a task id the scheduler does not know about.
    /// Handlers treat this as a silent drop; callers that need to surface
    /// it (e.g. the HTTP boundary mapping to 404) can match on it directly.
    #[error("unknown task: {task_id}")]
    UnknownTask { task_id: Uuid },

    /// The durable store failed to read or write a record.
    #[error("store failure: {0}")]
    Store(#[from] yieldos_store::StoreError),

    /// A persisted task record could not be decoded (bad JSON in
    /// `metadata`/`blocked_by`, or an unrecognized `state` string).
    #[error("failed to decode persisted task: {0}")]
    Decode(String),

    /// Catch-all for unexpected internal errors that don't fit a specific
    /// variant. Prefer a typed variant whenever possible.
    #[error("internal kernel error: {0}")]
    Internal(String),
}

/// Convenience alias used throughout the kernel crate.
pub type Result<T> = std::result::Result<T, KernelError>;
