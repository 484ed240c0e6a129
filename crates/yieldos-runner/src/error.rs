//! Error types for the skill runner.

/// Runner-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("no skill registered for '{0}'")]
    SkillNotRegistered(String),

    #[error(transparent)]
    Kernel(#[from] yieldos_kernel::KernelError),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, RunnerError>;
