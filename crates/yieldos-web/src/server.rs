//! Main web server setup and startup.
//!
//! [`WebServer`] composes the Axum router and owns the background tasks
//! driving the kernel's control loop and the runner's reconciliation loop.
//! Per spec.md §4.7, starting the HTTP server must start the kernel loop,
//! and shutting it down must stop it again — both loop tasks are aborted
//! together on `shutdown`.

use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderValue, Method};
use axum::routing::{delete, get, post};
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;

use yieldos_runner::SkillRunner;

use crate::api;
use crate::state::AppState;

/// Bind address and port for the HTTP server.
#[derive(Debug, Clone)]
pub struct WebConfig {
    pub bind_addr: String,
    pub port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".into(),
            port: 3000,
        }
    }
}

/// Holds the two background loop handles so `shutdown` can abort both.
pub struct RunningServer {
    kernel_loop: JoinHandle<()>,
    runner_loop: JoinHandle<()>,
    server: JoinHandle<std::io::Result<()>>,
}

impl RunningServer {
    /// Abort the kernel loop, runner loop, and HTTP listener.
    pub fn shutdown(self) {
        self.kernel_loop.abort();
        self.runner_loop.abort();
        self.server.abort();
    }
}

/// The yieldos HTTP server.
pub struct WebServer {
    config: WebConfig,
    runner: Arc<SkillRunner>,
}

impl WebServer {
    pub fn new(config: WebConfig, runner: Arc<SkillRunner>) -> Self {
        Self { config, runner }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.config.bind_addr, self.config.port)
    }

    fn router(&self, state: Arc<AppState>) -> Router {
        let cors = CorsLayer::new()
            .allow_origin("*".parse::<HeaderValue>().unwrap())
            .allow_methods([Method::GET, Method::POST, Method::DELETE])
            .allow_headers(tower_http::cors::Any);

        Router::new()
            .route("/health", get(api::health))
            .route("/tasks", get(api::list_tasks))
            .route("/tasks", post(api::create_task))
            .route("/tasks/{id}", get(api::get_task))
            .route("/tasks/{id}", delete(api::cancel_task))
            .route("/interrupt", post(api::interrupt))
            .layer(cors)
            .with_state(state)
    }

    /// Start the kernel loop, the runner loop, and the HTTP listener as
    /// background tasks, returning immediately. `kernel.start()` must have
    /// already been called so persisted state is recovered before the
    /// first request is served.
    pub async fn start(self) -> std::io::Result<RunningServer> {
        let kernel = Arc::clone(self.runner.kernel());
        let kernel_loop = tokio::spawn(async move { kernel.run_loop().await });

        let runner_loop_handle = Arc::clone(&self.runner);
        let runner_loop = tokio::spawn(async move { runner_loop_handle.run_loop().await });

        let state = Arc::new(AppState {
            runner: Arc::clone(&self.runner),
        });
        let addr = self.addr();
        let router = self.router(state);

        tracing::info!(addr = %addr, "starting web server");
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        let server = tokio::spawn(async move { axum::serve(listener, router).await });

        Ok(RunningServer {
            kernel_loop,
            runner_loop,
            server,
        })
    }
}
