//! Kernel configuration, loaded from the environment.
//!
//! Mirrors the way `openintent-cli` loads its `.env` file before
//! constructing services: call [`KernelConfig::from_env`] once at process
//! startup, after `dotenvy::dotenv()` has had a chance to populate the
//! environment from a `.env` file if one is present.

use std::str::FromStr;

use crate::error::{KernelError, Result};

/// What to do with a task that was `ACTIVE` when the process last exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrashPolicy {
    /// Transition ACTIVE -> PAUSED and re-add to the scheduler. The skill
    /// re-runs from its last checkpoint when selected again.
    Resume,
    /// Transition ACTIVE -> FAILED and leave it for manual resubmission.
    Fail,
}

impl Default for CrashPolicy {
    fn default() -> Self {
        CrashPolicy::Resume
    }
}

impl FromStr for CrashPolicy {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "resume" => Ok(CrashPolicy::Resume),
            "fail" => Ok(CrashPolicy::Fail),
            other => Err(KernelError::Internal(format!(
                "invalid crash_policy: '{other}' (expected 'resume' or 'fail')"
            ))),
        }
    }
}

/// Runtime configuration for the kernel.
#[derive(Debug, Clone)]
pub struct KernelConfig {
    /// Path to the SQLite database file, or `:memory:` for an ephemeral
    /// in-process store.
    pub db_path: String,
    /// How to treat a task recovered in the ACTIVE state on startup.
    pub crash_policy: CrashPolicy,
    /// Bounded capacity of the event queue.
    pub queue_capacity: usize,
    /// Idle timeout (ms) the control loop waits for an event before
    /// calling `tick()`.
    pub tick_interval_ms: u64,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            db_path: ":memory:".to_string(),
            crash_policy: CrashPolicy::default(),
            queue_capacity: 256,
            tick_interval_ms: 100,
        }
    }
}

impl KernelConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    ///
    /// Recognized variables: `YIELDOS_DB_PATH`, `YIELDOS_CRASH_POLICY`,
    /// `YIELDOS_QUEUE_CAPACITY`, `YIELDOS_TICK_INTERVAL_MS`.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let db_path = std::env::var("YIELDOS_DB_PATH").unwrap_or(defaults.db_path);

        let crash_policy = match std::env::var("YIELDOS_CRASH_POLICY") {
            Ok(raw) => raw.parse()?,
            Err(_) => defaults.crash_policy,
        };

        let queue_capacity = match std::env::var("YIELDOS_QUEUE_CAPACITY") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| KernelError::Internal(format!("invalid YIELDOS_QUEUE_CAPACITY: '{raw}'")))?,
            Err(_) => defaults.queue_capacity,
        };

        let tick_interval_ms = match std::env::var("YIELDOS_TICK_INTERVAL_MS") {
            Ok(raw) => raw.parse().map_err(|_| {
                KernelError::Internal(format!("invalid YIELDOS_TICK_INTERVAL_MS: '{raw}'"))
            })?,
            Err(_) => defaults.tick_interval_ms,
        };

        Ok(Self {
            db_path,
            crash_policy,
            queue_capacity,
            tick_interval_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_in_memory_and_resume() {
        let config = KernelConfig::default();
        assert_eq!(config.db_path, ":memory:");
        assert_eq!(config.crash_policy, CrashPolicy::Resume);
        assert_eq!(config.queue_capacity, 256);
    }

    #[test]
    fn crash_policy_parses_known_strings() {
        assert_eq!("resume".parse::<CrashPolicy>().unwrap(), CrashPolicy::Resume);
        assert_eq!("fail".parse::<CrashPolicy>().unwrap(), CrashPolicy::Fail);
        assert!("bogus".parse::<CrashPolicy>().is_err());
    }
}
