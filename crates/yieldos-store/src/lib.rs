//! # yieldos-store
//!
//! Durable persistence for the yieldos scheduling kernel.
//!
//! Provides a SQLite-backed [`Database`] (WAL mode, tuned pragmas,
//! `spawn_blocking`-dispatched access) plus versioned, transactional schema
//! [`migration`]s, and a [`TaskStore`] for the one table this crate owns:
//! scheduled tasks.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │  TaskStore (TaskRecord CRUD)        │
//! ├─────────────────────────────────────┤
//! │  Database (rusqlite WAL)            │
//! │  migration (versioned, transactional)│
//! └─────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```ignore
//! use yieldos_store::{Database, TaskStore};
//!
//! let db = Database::open_and_migrate("data/yieldos.db").await?;
//! let tasks = TaskStore::new(db);
//! ```

pub mod db;
pub mod error;
pub mod migration;
pub mod task_store;

pub use db::Database;
pub use error::{StoreError, StoreResult};
pub use task_store::{TaskRecord, TaskStore};
