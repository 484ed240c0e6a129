//! Durable persistence for scheduled tasks.
//!
//! [`TaskStore`] persists [`TaskRecord`]s — a flat, crate-local row
//! representation — rather than depending on the kernel's richer `Task`
//! type. Keeping the dependency one-directional (kernel depends on store,
//! not the reverse) means the translation between the two lives in the
//! kernel crate, alongside the rest of its domain logic.

use rusqlite::{params, OptionalExtension};

use crate::db::Database;
use crate::error::StoreResult;

/// A task exactly as it is stored on disk: every field is a plain string so
/// this crate never needs to know about the kernel's enums or UUID type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRecord {
    pub id: String,
    pub name: String,
    pub priority: i64,
    /// Lowercase lifecycle state name (`"pending"`, `"active"`, ...).
    pub state: String,
    /// RFC 3339 timestamp.
    pub created_at: String,
    /// RFC 3339 timestamp.
    pub updated_at: String,
    /// JSON object, serialized.
    pub metadata: String,
    /// JSON array of task id strings, serialized.
    pub blocked_by: String,
}

/// SQLite-backed store for [`TaskRecord`]s.
#[derive(Clone)]
pub struct TaskStore {
    db: Database,
}

impl TaskStore {
    /// Wrap an already-opened, already-migrated [`Database`].
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert a new row or overwrite the existing row with the same id.
    pub async fn upsert(&self, record: TaskRecord) -> StoreResult<()> {
        self.db
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO tasks (id, name, priority, state, created_at, updated_at, metadata, blocked_by) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
                     ON CONFLICT(id) DO UPDATE SET \
                        name = excluded.name, \
                        priority = excluded.priority, \
                        state = excluded.state, \
                        updated_at = excluded.updated_at, \
                        metadata = excluded.metadata, \
                        blocked_by = excluded.blocked_by",
                    params![
                        record.id,
                        record.name,
                        record.priority,
                        record.state,
                        record.created_at,
                        record.updated_at,
                        record.metadata,
                        record.blocked_by,
                    ],
                )?;
                Ok(())
            })
            .await
    }

    /// Fetch a single task by id.
    pub async fn get(&self, id: String) -> StoreResult<Option<TaskRecord>> {
        self.db
            .execute(move |conn| {
                conn.query_row(
                    "SELECT id, name, priority, state, created_at, updated_at, metadata, blocked_by \
                     FROM tasks WHERE id = ?1",
                    params![id],
                    row_to_record,
                )
                .optional()
                .map_err(Into::into)
            })
            .await
    }

    /// Load every stored task, most recently created first.
    ///
    /// Used on startup to recover scheduler state after a restart.
    pub async fn load_all(&self) -> StoreResult<Vec<TaskRecord>> {
        self.db
            .execute(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, name, priority, state, created_at, updated_at, metadata, blocked_by \
                     FROM tasks ORDER BY created_at ASC",
                )?;
                let rows = stmt
                    .query_map([], row_to_record)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await
    }

    /// Delete a task by id. No-op if it does not exist.
    pub async fn delete(&self, id: String) -> StoreResult<()> {
        self.db
            .execute(move |conn| {
                conn.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
                Ok(())
            })
            .await
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<TaskRecord> {
    Ok(TaskRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        priority: row.get(2)?,
        state: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
        metadata: row.get(6)?,
        blocked_by: row.get(7)?,
    })
}
