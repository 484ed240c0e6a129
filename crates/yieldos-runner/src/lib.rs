//! yieldos skill runner.
//!
//! Sits on top of [`yieldos_kernel`]: a [`SkillRunner`] registers skill
//! functions by name and reconciles the kernel's active slot against them,
//! translating a skill's outcome back into kernel events
//! (`TaskComplete`/`TaskRetry`/`TaskFail`) and cancelling a running skill
//! cooperatively on interrupt or explicit cancellation.
//!
//! - **[`runner`]** -- the skill registry and reconciliation loop.
//! - **[`error`]** -- runner-specific error types.

pub mod error;
pub mod runner;

pub use error::{Result, RunnerError};
pub use runner::{SkillFn, SkillFuture, SkillRunner};
