//! REST API route handlers.
//!
//! Maps directly onto spec.md's external interface table: health, list,
//! submit, get-by-id, cancel, and interrupt.

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use yieldos_kernel::Task;

use crate::error::{Result, WebError};
use crate::state::AppState;

/// Wire representation of a task, matching spec.md's `TaskOut` shape.
#[derive(Debug, Serialize)]
pub struct TaskOut {
    pub id: Uuid,
    pub name: String,
    pub state: &'static str,
    pub priority: i64,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl From<Task> for TaskOut {
    fn from(task: Task) -> Self {
        Self {
            id: task.id,
            name: task.name,
            state: task.state.as_str(),
            priority: task.priority,
            metadata: task.metadata,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthOut {
    pub status: &'static str,
    pub active_task: Option<TaskOut>,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthOut> {
    let active_task = state.runner.kernel().active_task().map(TaskOut::from);
    Json(HealthOut { status: "ok", active_task })
}

pub async fn list_tasks(State(state): State<Arc<AppState>>) -> Json<Vec<TaskOut>> {
    let tasks = state.runner.list_tasks().into_iter().map(TaskOut::from).collect();
    Json(tasks)
}

#[derive(Debug, Deserialize)]
pub struct SubmitBody {
    pub name: String,
    #[serde(default = "default_submit_priority")]
    pub priority: i64,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub blocked_by: BTreeSet<Uuid>,
}

fn default_submit_priority() -> i64 {
    5
}

pub async fn create_task(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SubmitBody>,
) -> (StatusCode, Json<TaskOut>) {
    let task = Task::new(body.name, body.priority)
        .with_metadata(body.metadata)
        .with_blocked_by(body.blocked_by);
    let out = TaskOut::from(task.clone());
    state.runner.submit(task);
    (StatusCode::CREATED, Json(out))
}

pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<TaskOut>> {
    state
        .runner
        .get_task(id)
        .map(|t| Json(TaskOut::from(t)))
        .ok_or(WebError::NotFound(id))
}

pub async fn cancel_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    if state.runner.get_task(id).is_none() {
        return Err(WebError::NotFound(id));
    }
    state.runner.cancel(id).await?;
    Ok(Json(json!({ "cancelled": id })))
}

#[derive(Debug, Deserialize)]
pub struct InterruptBody {
    pub name: String,
    #[serde(default = "default_interrupt_priority")]
    pub priority: i64,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

fn default_interrupt_priority() -> i64 {
    10
}

pub async fn interrupt(
    State(state): State<Arc<AppState>>,
    Json(body): Json<InterruptBody>,
) -> Result<(StatusCode, Json<TaskOut>)> {
    let task = Task::new(body.name, body.priority).with_metadata(body.metadata);
    let out = TaskOut::from(task.clone());
    state.runner.interrupt(task).await?;
    Ok((StatusCode::CREATED, Json(out)))
}
