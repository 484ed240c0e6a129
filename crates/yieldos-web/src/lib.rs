//! HTTP boundary for yieldos.
//!
//! Exposes the kernel/runner pair over the six endpoints spec.md's external
//! interface table names: `GET /health`, `GET /tasks`, `POST /tasks`,
//! `GET /tasks/{id}`, `DELETE /tasks/{id}`, `POST /interrupt`. Starting the
//! server starts the kernel's control loop and the runner's reconciliation
//! loop as background tasks; [`RunningServer::shutdown`] stops all three.
//!
//! - **[`api`]** -- route handlers and the `TaskOut` wire type.
//! - **[`server`]** -- router assembly and startup/shutdown.
//! - **[`state`]** -- shared `AppState`.
//! - **[`error`]** -- `WebError` and its `IntoResponse` mapping.

pub mod api;
pub mod error;
pub mod server;
pub mod state;

pub use api::TaskOut;
pub use error::{Result, WebError};
pub use server::{RunningServer, WebConfig, WebServer};
pub use state::AppState;
