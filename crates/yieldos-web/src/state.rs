//! Shared application state for the web server.

use std::sync::Arc;

use yieldos_runner::SkillRunner;

/// Shared state accessible from every Axum handler.
#[derive(Clone)]
pub struct AppState {
    /// The skill runner — the only thing handlers ever touch. It exposes
    /// `submit`/`interrupt`/`cancel`/`get_task`/`list_tasks`, delegating to
    /// the kernel underneath.
    pub runner: Arc<SkillRunner>,
}
