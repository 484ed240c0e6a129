//! Interrupt demo: a `pour_water` task is preempted mid-flight by a
//! higher-priority `avoid_obstacle` interrupt, then resumes once the
//! interrupt completes.
//!
//! Reproduces the scenario from the original prototype's
//! `interrupt_demo.py`, against the real kernel and runner instead of
//! manually draining one event at a time.

use std::sync::Arc;
use std::time::Duration;

use yieldos_kernel::{Kernel, KernelConfig, LifecycleState, SqliteStore, Task};
use yieldos_runner::SkillRunner;

fn sep(title: &str) {
    let width = 52;
    if title.is_empty() {
        println!("{}", "-".repeat(width));
    } else {
        let pad = (width - title.len() - 2) / 2;
        println!("{} {} {}", "-".repeat(pad), title, "-".repeat(width - pad - title.len() - 2));
    }
}

async fn wait_for_state(runner: &SkillRunner, id: yieldos_kernel::TaskId, target: LifecycleState) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        if let Some(task) = runner.get_task(id) {
            if task.state == target {
                return;
            }
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("task {id} did not reach {target:?} in time");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

fn print_status(runner: &SkillRunner, tasks: &[(&str, yieldos_kernel::TaskId)]) {
    let active = runner.kernel().active_task();
    let label = active.as_ref().map(|t| t.name.as_str()).unwrap_or("None");
    println!("  active task : {label}");
    for (name, id) in tasks {
        let state = runner.get_task(*id).map(|t| t.state.as_str().to_string()).unwrap_or_default();
        println!("  {name:<20} state={state}");
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter("warn").init();
    sep("yieldos Interrupt Demo");

    let store = Arc::new(SqliteStore::new(":memory:"));
    let kernel = Arc::new(Kernel::new(
        store,
        KernelConfig {
            tick_interval_ms: 20,
            ..KernelConfig::default()
        },
    ));
    kernel.start().await.unwrap();
    let loop_kernel = Arc::clone(&kernel);
    tokio::spawn(async move { loop_kernel.run_loop().await });

    let runner = Arc::new(SkillRunner::new(kernel));
    runner.register(
        "pour_water",
        Arc::new(|task, _token: tokio_util::sync::CancellationToken| {
            Box::pin(async move {
                println!("  [skill] pour_water: executing...");
                Ok(task)
            })
        }),
    );
    runner.register(
        "avoid_obstacle",
        Arc::new(|task, _token: tokio_util::sync::CancellationToken| {
            Box::pin(async move {
                println!("  [skill] avoid_obstacle: executing...");
                Ok(task)
            })
        }),
    );
    let loop_runner = Arc::clone(&runner);
    tokio::spawn(async move { loop_runner.run_loop().await });

    let pour_water = Task::new("pour_water", 3);
    let pour_water_id = pour_water.id;
    let avoid_obstacle = Task::new("avoid_obstacle", 10);
    let avoid_obstacle_id = avoid_obstacle.id;

    sep("Step 1: submit pour_water");
    runner.submit(pour_water);
    wait_for_state(&runner, pour_water_id, LifecycleState::Active).await;
    print_status(&runner, &[("pour_water", pour_water_id)]);

    sep("Step 2: obstacle detected -> INTERRUPT");
    runner.interrupt(avoid_obstacle).await.unwrap();
    wait_for_state(&runner, pour_water_id, LifecycleState::Paused).await;
    print_status(&runner, &[("pour_water", pour_water_id), ("avoid_obstacle", avoid_obstacle_id)]);

    sep("Step 3: avoid_obstacle activates and completes");
    wait_for_state(&runner, avoid_obstacle_id, LifecycleState::Completed).await;
    print_status(&runner, &[("pour_water", pour_water_id), ("avoid_obstacle", avoid_obstacle_id)]);

    sep("Step 4: pour_water resumes");
    wait_for_state(&runner, pour_water_id, LifecycleState::Completed).await;
    print_status(&runner, &[("pour_water", pour_water_id), ("avoid_obstacle", avoid_obstacle_id)]);

    sep("Done");
}
