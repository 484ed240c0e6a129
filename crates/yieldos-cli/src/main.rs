//! CLI entry point for yieldos.
//!
//! Loads configuration from the environment (`.env` if present), opens the
//! durable store, starts the kernel, and serves the HTTP boundary. Skill
//! registration is left to the embedding application — this binary hosts
//! the scheduler, it doesn't ship any particular robot skill.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use yieldos_kernel::{Kernel, KernelConfig, SqliteStore};
use yieldos_runner::SkillRunner;
use yieldos_web::{WebConfig, WebServer};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = KernelConfig::from_env().context("failed to load kernel configuration")?;
    info!(db_path = %config.db_path, crash_policy = ?config.crash_policy, "starting yieldos");

    let store = Arc::new(SqliteStore::new(config.db_path.clone()));
    let kernel = Arc::new(Kernel::new(store, config));
    kernel.start().await.context("failed to start kernel")?;

    let runner = Arc::new(SkillRunner::new(kernel));

    let bind_addr = std::env::var("YIELDOS_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = std::env::var("YIELDOS_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);
    let web_config = WebConfig { bind_addr, port };

    println!();
    println!("  yieldos v{}", env!("CARGO_PKG_VERSION"));
    println!("  Listening: http://{}:{}", web_config.bind_addr, web_config.port);
    println!();

    let server = WebServer::new(web_config, runner);
    let running = server.start().await.context("failed to start web server")?;

    tokio::signal::ctrl_c().await.ok();
    info!("shutting down");
    running.shutdown();
    Ok(())
}
