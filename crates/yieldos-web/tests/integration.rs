//! Integration tests for the yieldos-web crate.
//!
//! Drives a real server bound to an ephemeral port on loopback and talks to
//! it with `reqwest`, exercising the HTTP boundary the way an external
//! caller would.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use yieldos_kernel::{Kernel, KernelConfig, SqliteStore};
use yieldos_runner::SkillRunner;
use yieldos_web::{WebConfig, WebServer};

async fn fixed_port_server(port: u16) -> yieldos_web::RunningServer {
    let store = Arc::new(SqliteStore::new(":memory:"));
    let kernel = Arc::new(Kernel::new(
        store,
        KernelConfig {
            tick_interval_ms: 10,
            ..KernelConfig::default()
        },
    ));
    kernel.start().await.unwrap();

    let runner = Arc::new(SkillRunner::new(kernel));
    runner.register(
        "pour_water",
        Arc::new(|task, _token: tokio_util::sync::CancellationToken| Box::pin(async move { Ok(task) })),
    );

    let config = WebConfig {
        bind_addr: "127.0.0.1".into(),
        port,
    };
    let server = WebServer::new(config, runner);
    server.start().await.unwrap()
}

/// Same as [`fixed_port_server`], but `pour_water` sleeps long enough that
/// a caller has time to observe it as the active task before it completes.
async fn slow_skill_server(port: u16) -> yieldos_web::RunningServer {
    let store = Arc::new(SqliteStore::new(":memory:"));
    let kernel = Arc::new(Kernel::new(
        store,
        KernelConfig {
            tick_interval_ms: 10,
            ..KernelConfig::default()
        },
    ));
    kernel.start().await.unwrap();

    let runner = Arc::new(SkillRunner::new(kernel));
    runner.register(
        "pour_water",
        Arc::new(|task, _token: tokio_util::sync::CancellationToken| {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(300)).await;
                Ok(task)
            })
        }),
    );

    let config = WebConfig {
        bind_addr: "127.0.0.1".into(),
        port,
    };
    let server = WebServer::new(config, runner);
    server.start().await.unwrap()
}

#[tokio::test]
async fn health_returns_ok() {
    let running = fixed_port_server(38101).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let resp = reqwest::get("http://127.0.0.1:38101/health").await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert!(body["active_task"].is_null());

    running.shutdown();
}

#[tokio::test]
async fn health_reports_active_task() {
    let running = slow_skill_server(38106).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let client = reqwest::Client::new();
    let created: serde_json::Value = client
        .post("http://127.0.0.1:38106/tasks")
        .json(&json!({ "name": "pour_water", "priority": 7 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = created["id"].as_str().unwrap().to_string();

    tokio::time::sleep(Duration::from_millis(100)).await;

    let resp = reqwest::get("http://127.0.0.1:38106/health").await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["active_task"]["id"], id);

    running.shutdown();
}

#[tokio::test]
async fn submit_then_get_then_list() {
    let running = fixed_port_server(38102).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let client = reqwest::Client::new();
    let resp = client
        .post("http://127.0.0.1:38102/tasks")
        .json(&json!({ "name": "pour_water", "priority": 7 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let created: serde_json::Value = resp.json().await.unwrap();
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["priority"], 7);

    let resp = client
        .get(format!("http://127.0.0.1:38102/tasks/{id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client.get("http://127.0.0.1:38102/tasks").send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let list: Vec<serde_json::Value> = resp.json().await.unwrap();
    assert!(list.iter().any(|t| t["id"] == id));

    running.shutdown();
}

#[tokio::test]
async fn get_unknown_task_is_404() {
    let running = fixed_port_server(38103).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let resp = reqwest::get(format!(
        "http://127.0.0.1:38103/tasks/{}",
        uuid::Uuid::now_v7()
    ))
    .await
    .unwrap();
    assert_eq!(resp.status(), 404);

    running.shutdown();
}

#[tokio::test]
async fn interrupt_creates_task() {
    let running = fixed_port_server(38104).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let client = reqwest::Client::new();
    let resp = client
        .post("http://127.0.0.1:38104/interrupt")
        .json(&json!({ "name": "avoid_obstacle" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let created: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(created["priority"], 10);

    running.shutdown();
}

#[tokio::test]
async fn delete_unknown_task_is_404() {
    let running = fixed_port_server(38105).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let client = reqwest::Client::new();
    let resp = client
        .delete(format!(
            "http://127.0.0.1:38105/tasks/{}",
            uuid::Uuid::now_v7()
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    running.shutdown();
}
