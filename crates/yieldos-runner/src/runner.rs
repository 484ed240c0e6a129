//! The skill runner: a skill registry plus a reconciliation loop that
//! drives whichever task currently occupies the kernel's active slot.
//!
//! A skill is `Fn(Task, CancellationToken) -> Future<Output = Result<Task, String>>`,
//! mirroring [`yieldos_kernel`]'s [`SqliteStore`](yieldos_kernel::SqliteStore)-style
//! trait-free callback storage and `BVEnterprisess-Hella_Rusty`'s
//! `ServiceSpawner`: the caller hands the running instance a token and is
//! responsible for cancelling it and awaiting the resulting handle before
//! treating the slot as free. `Ok(task)` carries the skill's final
//! checkpoint state back into the kernel; `Err(message)` is a failure the
//! runner turns into a retry or a terminal `TaskFail` depending on the
//! task's remaining retry budget.
//!
//! Exactly one skill instance runs at a time, mirroring the kernel's single
//! active slot. The reconciliation loop never touches the scheduler
//! directly — it only calls `register`/`emit`/`merge_metadata`/
//! `bump_retry_count` on the [`Kernel`], same as any other caller.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use yieldos_kernel::{Event, Kernel, Task, TaskId};

use crate::error::{Result, RunnerError};

/// A boxed, already-pinned skill future.
pub type SkillFuture = Pin<Box<dyn Future<Output = std::result::Result<Task, String>> + Send>>;

/// A skill handler: given ownership of its task and a token it should poll
/// at its own await points, runs to completion or failure. Checkpoint
/// progress belongs in `task.metadata`, mutated before each `.await` the
/// skill yields at — the runner only sees that metadata once the skill's
/// future resolves (naturally, or because it was cancelled and unwound).
pub type SkillFn = Arc<dyn Fn(Task, CancellationToken) -> SkillFuture + Send + Sync>;

struct RunningSkill {
    task_id: TaskId,
    handle: JoinHandle<std::result::Result<Task, String>>,
    token: CancellationToken,
}

/// Registers skills by name and drives whichever task the kernel promotes
/// to its active slot.
pub struct SkillRunner {
    kernel: Arc<Kernel>,
    skills: DashMap<String, SkillFn>,
    running: Mutex<Option<RunningSkill>>,
}

impl SkillRunner {
    pub fn new(kernel: Arc<Kernel>) -> Self {
        Self {
            kernel,
            skills: DashMap::new(),
            running: Mutex::new(None),
        }
    }

    pub fn kernel(&self) -> &Arc<Kernel> {
        &self.kernel
    }

    /// Register a skill handler under `name`, replacing any prior handler
    /// of the same name.
    pub fn register(&self, name: impl Into<String>, skill: SkillFn) {
        self.skills.insert(name.into(), skill);
    }

    /// Submit a new task: queryable immediately, then scheduled.
    pub fn submit(&self, task: Task) {
        self.kernel.register(task.clone());
        self.kernel.emit(Event::TaskSubmit(task));
    }

    /// Preempt whatever is active (cancelling and awaiting its skill
    /// instance if one is running) and schedule `task` in its place.
    pub async fn interrupt(&self, task: Task) -> Result<()> {
        self.cancel_running_unconditionally().await;
        self.kernel.register(task.clone());
        self.kernel.emit(Event::Interrupt(task));
        Ok(())
    }

    /// Cancel `id`. If it is the currently running skill, cancels and
    /// awaits its instance before emitting the cancellation; otherwise
    /// just emits it — the kernel handles cancellation of a pending or
    /// paused task without any runner involvement.
    pub async fn cancel(&self, id: TaskId) -> Result<()> {
        self.cancel_running_matching(id).await;
        self.kernel.emit(Event::TaskCancel(id));
        Ok(())
    }

    pub fn get_task(&self, id: TaskId) -> Option<Task> {
        self.kernel.get_task(id)
    }

    pub fn list_tasks(&self) -> Vec<Task> {
        self.kernel.list_tasks()
    }

    /// Drive the reconciliation loop until aborted. Intended to run
    /// alongside `kernel.run_loop()` in its own `tokio::spawn`; the caller
    /// aborts the returned `JoinHandle` on shutdown the same way it would
    /// abort the kernel's loop task.
    pub async fn run_loop(&self) {
        let poll = Duration::from_millis(self.kernel.config().tick_interval_ms.max(1));
        loop {
            self.reconcile().await;
            tokio::time::sleep(poll).await;
        }
    }

    async fn reconcile(&self) {
        let already_running = self.running.lock().await.is_some();
        if already_running {
            self.reap_if_finished().await;
            return;
        }
        let Some(active) = self.kernel.active_task() else {
            return;
        };
        self.launch(active).await;
    }

    async fn launch(&self, task: Task) {
        let Some(skill) = self.skills.get(&task.name).map(|e| e.clone()) else {
            let err = RunnerError::SkillNotRegistered(task.name.clone());
            warn!(task_id = %task.id, name = %task.name, "no skill registered");
            self.kernel.emit(Event::TaskFail(task.id, Some(err.to_string())));
            return;
        };
        let token = CancellationToken::new();
        let task_id = task.id;
        debug!(task_id = %task_id, name = %task.name, "launching skill");
        let fut = skill(task, token.clone());
        let handle = tokio::spawn(fut);
        *self.running.lock().await = Some(RunningSkill { task_id, handle, token });
    }

    async fn reap_if_finished(&self) {
        let finished = {
            let guard = self.running.lock().await;
            guard.as_ref().map(|r| r.handle.is_finished()).unwrap_or(false)
        };
        if !finished {
            return;
        }
        let running = self.running.lock().await.take();
        if let Some(running) = running {
            self.finish(running).await;
        }
    }

    async fn finish(&self, running: RunningSkill) {
        let task_id = running.task_id;
        match running.handle.await {
            Ok(Ok(updated)) => {
                self.kernel.merge_metadata(task_id, updated.metadata);
                info!(task_id = %task_id, "skill completed");
                self.kernel.emit(Event::TaskComplete(task_id));
            }
            Ok(Err(message)) => self.handle_skill_failure(task_id, message).await,
            Err(join_err) => {
                self.handle_skill_failure(task_id, format!("skill task panicked: {join_err}"))
                    .await;
            }
        }
    }

    async fn handle_skill_failure(&self, task_id: TaskId, message: String) {
        let (retry_count, max_retries) = self
            .kernel
            .get_task(task_id)
            .map(|t| (t.retry_count(), t.max_retries()))
            .unwrap_or((0, 0));
        if retry_count < max_retries {
            warn!(task_id = %task_id, %message, retry_count, max_retries, "skill failed, retrying");
            self.kernel.bump_retry_count(task_id);
            self.kernel.emit(Event::TaskRetry(task_id));
        } else {
            warn!(task_id = %task_id, %message, "skill failed, retry budget exhausted");
            self.kernel.emit(Event::TaskFail(task_id, Some(message)));
        }
    }

    /// Cancel and await the running skill unconditionally, regardless of
    /// which task it belongs to. Used by `interrupt`, which always
    /// preempts whatever is active.
    async fn cancel_running_unconditionally(&self) {
        let running = self.running.lock().await.take();
        if let Some(running) = running {
            running.token.cancel();
            let _ = running.handle.await;
        }
    }

    async fn cancel_running_matching(&self, id: TaskId) {
        let mut guard = self.running.lock().await;
        if guard.as_ref().map(|r| r.task_id == id).unwrap_or(false) {
            let running = guard.take().expect("checked above");
            drop(guard);
            running.token.cancel();
            let _ = running.handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration as StdDuration;

    use yieldos_kernel::{KernelConfig, LifecycleState, SqliteStore};

    fn fast_config() -> KernelConfig {
        KernelConfig {
            tick_interval_ms: 10,
            ..KernelConfig::default()
        }
    }

    async fn running_pair(config: KernelConfig) -> Arc<SkillRunner> {
        let store = Arc::new(SqliteStore::new(":memory:"));
        let kernel = Arc::new(Kernel::new(store, config));
        kernel.start().await.unwrap();
        let loop_kernel = Arc::clone(&kernel);
        tokio::spawn(async move { loop_kernel.run_loop().await });

        let runner = Arc::new(SkillRunner::new(kernel));
        let loop_runner = Arc::clone(&runner);
        tokio::spawn(async move { loop_runner.run_loop().await });
        runner
    }

    async fn wait_for<T>(bound: StdDuration, mut f: impl FnMut() -> Option<T>) -> T {
        let deadline = tokio::time::Instant::now() + bound;
        loop {
            if let Some(value) = f() {
                return value;
            }
            if tokio::time::Instant::now() >= deadline {
                panic!("condition did not become true within {bound:?}");
            }
            tokio::time::sleep(StdDuration::from_millis(5)).await;
        }
    }

    fn immediate_ok() -> SkillFn {
        Arc::new(|task, _token| Box::pin(async move { Ok(task) }))
    }

    #[tokio::test]
    async fn register_then_submit_runs_skill_to_completion() {
        let runner = running_pair(fast_config()).await;
        runner.register("pour_water", immediate_ok());

        let task = Task::new("pour_water", 5);
        let task_id = task.id;
        runner.submit(task);

        let finished = wait_for(StdDuration::from_secs(1), || {
            runner
                .get_task(task_id)
                .filter(|t| t.state == LifecycleState::Completed)
        })
        .await;
        assert_eq!(finished.state, LifecycleState::Completed);
    }

    #[tokio::test]
    async fn unknown_skill_emits_fail_without_launch() {
        let runner = running_pair(fast_config()).await;
        let task = Task::new("never_registered", 5);
        let task_id = task.id;
        runner.submit(task);

        let failed = wait_for(StdDuration::from_secs(1), || {
            runner
                .get_task(task_id)
                .filter(|t| t.state == LifecycleState::Failed)
        })
        .await;
        assert!(failed.metadata.get("error").is_some());
    }

    // S5: retry then succeed.
    #[tokio::test]
    async fn retry_then_succeed() {
        let runner = running_pair(fast_config()).await;
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_for_skill = Arc::clone(&calls);
        let flaky: SkillFn = Arc::new(move |task, _token| {
            let calls = Arc::clone(&calls_for_skill);
            Box::pin(async move {
                let attempt = calls.fetch_add(1, Ordering::SeqCst);
                if attempt < 2 {
                    Err("actuator jam".to_string())
                } else {
                    Ok(task)
                }
            })
        });
        runner.register("flaky", flaky);

        let mut task = Task::new("flaky", 5);
        task.metadata.insert("max_retries".into(), serde_json::json!(2));
        task.metadata.insert("retry_delay".into(), serde_json::json!(0));
        let task_id = task.id;
        runner.submit(task);

        let finished = wait_for(StdDuration::from_secs(2), || {
            runner
                .get_task(task_id)
                .filter(|t| t.state == LifecycleState::Completed)
        })
        .await;
        assert_eq!(finished.retry_count(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn interrupt_cancels_running_skill_and_preempts() {
        let runner = running_pair(fast_config()).await;
        let long_running: SkillFn = Arc::new(|task, token| {
            Box::pin(async move {
                tokio::select! {
                    _ = token.cancelled() => Err("cancelled".to_string()),
                    _ = tokio::time::sleep(StdDuration::from_secs(30)) => Ok(task),
                }
            })
        });
        runner.register("navigate_to", long_running);
        runner.register("avoid_obstacle", immediate_ok());

        let base = Task::new("navigate_to", 3);
        let base_id = base.id;
        runner.submit(base);

        wait_for(StdDuration::from_secs(1), || {
            runner
                .get_task(base_id)
                .filter(|t| t.state == LifecycleState::Active)
        })
        .await;

        let urgent = Task::new("avoid_obstacle", 10);
        let urgent_id = urgent.id;
        runner.interrupt(urgent).await.unwrap();

        let paused = wait_for(StdDuration::from_secs(1), || {
            runner
                .get_task(base_id)
                .filter(|t| t.state == LifecycleState::Paused)
        })
        .await;
        assert_eq!(paused.state, LifecycleState::Paused);

        wait_for(StdDuration::from_secs(1), || {
            runner
                .get_task(urgent_id)
                .filter(|t| t.state == LifecycleState::Completed)
        })
        .await;

        // The preempted skill must have been cancelled promptly, not left
        // running in the background after the interrupt returned.
        assert!(runner.running.lock().await.is_none());
    }

    #[tokio::test]
    async fn cancel_running_skill_transitions_to_cancelled() {
        let runner = running_pair(fast_config()).await;
        let long_running: SkillFn = Arc::new(|task, token| {
            Box::pin(async move {
                tokio::select! {
                    _ = token.cancelled() => Err("cancelled".to_string()),
                    _ = tokio::time::sleep(StdDuration::from_secs(30)) => Ok(task),
                }
            })
        });
        runner.register("long_task", long_running);

        let task = Task::new("long_task", 5);
        let task_id = task.id;
        runner.submit(task);

        wait_for(StdDuration::from_secs(1), || {
            runner
                .get_task(task_id)
                .filter(|t| t.state == LifecycleState::Active)
        })
        .await;

        runner.cancel(task_id).await.unwrap();

        let cancelled = wait_for(StdDuration::from_secs(1), || {
            runner
                .get_task(task_id)
                .filter(|t| t.state == LifecycleState::Cancelled)
        })
        .await;
        assert_eq!(cancelled.state, LifecycleState::Cancelled);
    }
}
