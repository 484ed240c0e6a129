//! The `Store` trait and its SQLite-backed implementation.
//!
//! [`Store`] operates on the kernel's own [`Task`] type; [`SqliteStore`]
//! adapts `yieldos_store`'s flat [`yieldos_store::TaskRecord`] row to it.
//! Keeping the translation here (rather than in `yieldos-store`) keeps the
//! dependency edge one-directional: the store crate knows nothing about
//! `LifecycleState` or `TaskId`.

use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use uuid::Uuid;
use yieldos_store::{Database, TaskRecord, TaskStore};

use crate::error::{KernelError, Result};
use crate::task::{LifecycleState, Task};

/// Durable, keyed-by-id task persistence.
///
/// Mirrors spec.md's `open`/`close`/`upsert`/`load_all` contract exactly;
/// `upsert` is expected to return only once the write is durable.
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    async fn open(&self) -> Result<()>;
    async fn close(&self) -> Result<()>;
    async fn upsert(&self, task: &Task) -> Result<()>;
    async fn load_all(&self) -> Result<Vec<Task>>;
}

/// `rusqlite`-backed `Store`. `db_path` of `:memory:` selects an ephemeral,
/// in-process database instead of a file — used by tests and by any caller
/// that does not need durability across restarts.
pub struct SqliteStore {
    db_path: String,
    inner: Mutex<Option<TaskStore>>,
}

impl SqliteStore {
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
            inner: Mutex::new(None),
        }
    }

    fn task_store(&self) -> Result<TaskStore> {
        self.inner
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| KernelError::Internal("store used before open()".to_string()))
    }
}

#[async_trait::async_trait]
impl Store for SqliteStore {
    async fn open(&self) -> Result<()> {
        let db = if self.db_path == ":memory:" {
            let db = Database::open_in_memory()?;
            db.run_migrations().await?;
            db
        } else {
            Database::open_and_migrate(self.db_path.clone()).await?
        };
        *self.inner.lock().unwrap() = Some(TaskStore::new(db));
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        *self.inner.lock().unwrap() = None;
        Ok(())
    }

    async fn upsert(&self, task: &Task) -> Result<()> {
        let store = self.task_store()?;
        store.upsert(task_to_record(task)?).await?;
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<Task>> {
        let store = self.task_store()?;
        store
            .load_all()
            .await?
            .into_iter()
            .map(|r| record_to_task(&r))
            .collect()
    }
}

fn task_to_record(task: &Task) -> Result<TaskRecord> {
    let blocked_by: Vec<Uuid> = task.blocked_by.iter().copied().collect();
    Ok(TaskRecord {
        id: task.id.to_string(),
        name: task.name.clone(),
        priority: task.priority,
        state: task.state.as_str().to_string(),
        created_at: task.created_at.to_rfc3339(),
        updated_at: task.updated_at.to_rfc3339(),
        metadata: serde_json::to_string(&task.metadata)
            .map_err(|e| KernelError::Decode(e.to_string()))?,
        blocked_by: serde_json::to_string(&blocked_by)
            .map_err(|e| KernelError::Decode(e.to_string()))?,
    })
}

fn record_to_task(record: &TaskRecord) -> Result<Task> {
    let id = Uuid::parse_str(&record.id).map_err(|e| KernelError::Decode(e.to_string()))?;
    let state = LifecycleState::from_str(&record.state).map_err(KernelError::Decode)?;
    let created_at: DateTime<Utc> = record
        .created_at
        .parse()
        .map_err(|e: chrono::ParseError| KernelError::Decode(e.to_string()))?;
    let updated_at: DateTime<Utc> = record
        .updated_at
        .parse()
        .map_err(|e: chrono::ParseError| KernelError::Decode(e.to_string()))?;
    let metadata: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(&record.metadata).map_err(|e| KernelError::Decode(e.to_string()))?;
    let blocked_by_vec: Vec<Uuid> = serde_json::from_str(&record.blocked_by)
        .map_err(|e| KernelError::Decode(e.to_string()))?;

    Ok(Task {
        id,
        name: record.name.clone(),
        priority: record.priority,
        state,
        created_at,
        updated_at,
        metadata,
        blocked_by: BTreeSet::from_iter(blocked_by_vec),
    })
}
