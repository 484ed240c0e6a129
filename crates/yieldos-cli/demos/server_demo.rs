//! HTTP API demo: three mock skills (`navigate_to`, `pour_water`,
//! `avoid_obstacle`) mounted behind the HTTP boundary, matching the
//! original prototype's `server_demo.py`. Replace the mock `sleep` calls
//! with real hardware control to turn this into an actual deployment.
//!
//! ```text
//! curl -s -X POST http://localhost:8000/tasks \
//!      -H 'Content-Type: application/json' \
//!      -d '{"name": "pour_water", "priority": 5}'
//!
//! curl -s -X POST http://localhost:8000/interrupt \
//!      -H 'Content-Type: application/json' \
//!      -d '{"name": "avoid_obstacle", "priority": 10}'
//!
//! curl -s http://localhost:8000/health
//! curl -s http://localhost:8000/tasks
//! ```

use std::sync::Arc;
use std::time::Duration;

use yieldos_kernel::{Kernel, KernelConfig, SqliteStore};
use yieldos_runner::SkillRunner;
use yieldos_web::{WebConfig, WebServer};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter("warn").init();

    let store = Arc::new(SqliteStore::new(":memory:"));
    let kernel = Arc::new(Kernel::new(store, KernelConfig::default()));
    kernel.start().await.unwrap();

    let runner = Arc::new(SkillRunner::new(kernel));

    runner.register(
        "navigate_to",
        Arc::new(|task, token: tokio_util::sync::CancellationToken| {
            Box::pin(async move {
                let target = task
                    .metadata
                    .get("target")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown")
                    .to_string();
                println!("  [skill] navigate_to  -> '{target}' (5s)");
                tokio::select! {
                    _ = token.cancelled() => Err("navigate_to cancelled".to_string()),
                    _ = tokio::time::sleep(Duration::from_secs(5)) => {
                        println!("  [skill] navigate_to  done, arrived at '{target}'");
                        Ok(task)
                    }
                }
            })
        }),
    );

    runner.register(
        "pour_water",
        Arc::new(|task, token: tokio_util::sync::CancellationToken| {
            Box::pin(async move {
                println!("  [skill] pour_water   -> starting (8s)");
                for i in 1..=4 {
                    tokio::select! {
                        _ = token.cancelled() => return Err("pour_water cancelled".to_string()),
                        _ = tokio::time::sleep(Duration::from_secs(2)) => {
                            println!("  [skill] pour_water   ... {}%", i * 25);
                        }
                    }
                }
                println!("  [skill] pour_water   done");
                Ok(task)
            })
        }),
    );

    runner.register(
        "avoid_obstacle",
        Arc::new(|task, token: tokio_util::sync::CancellationToken| {
            Box::pin(async move {
                println!("  [skill] avoid_obstacle -> evading (1s)");
                tokio::select! {
                    _ = token.cancelled() => Err("avoid_obstacle cancelled".to_string()),
                    _ = tokio::time::sleep(Duration::from_secs(1)) => {
                        println!("  [skill] avoid_obstacle clear");
                        Ok(task)
                    }
                }
            })
        }),
    );

    let web_config = WebConfig {
        bind_addr: "0.0.0.0".to_string(),
        port: 8000,
    };

    let banner = "=".repeat(56);
    println!("\n{banner}");
    println!("  yieldos HTTP API demo");
    println!("  Endpoints : http://localhost:{}", web_config.port);
    println!("{banner}\n");

    let server = WebServer::new(web_config, runner);
    let running = server.start().await.unwrap();

    tokio::signal::ctrl_c().await.ok();
    running.shutdown();
}
