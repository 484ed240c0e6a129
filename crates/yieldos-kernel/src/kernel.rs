//! The scheduling kernel: control loop, event dispatch, and crash recovery.
//!
//! `Kernel` owns the [`Scheduler`], the [`Store`], the event queue, and the
//! single "active slot". All mutation of that state happens on
//! [`Kernel::run_loop`]'s task; every other caller interacts exclusively
//! through [`Kernel::emit`], matching the single-consumer control loop the
//! teacher's own scheduler drives from a background tokio task.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tracing::{debug, error, info, warn};

use crate::config::{CrashPolicy, KernelConfig};
use crate::error::{KernelError, Result};
use crate::event::Event;
use crate::scheduler::Scheduler;
use crate::store::Store;
use crate::task::{LifecycleState, Task, TaskId};

/// Owns the scheduler, store, event queue, and active slot; drives the
/// single-consumer control loop described in spec.md §4.5.
pub struct Kernel {
    scheduler: Scheduler,
    store: Arc<dyn Store>,
    sender: mpsc::Sender<Event>,
    receiver: AsyncMutex<Option<mpsc::Receiver<Event>>>,
    active: Mutex<Option<TaskId>>,
    config: KernelConfig,
    running: AtomicBool,
}

impl Kernel {
    pub fn new(store: Arc<dyn Store>, config: KernelConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity);
        Self {
            scheduler: Scheduler::new(),
            store,
            sender,
            receiver: AsyncMutex::new(Some(receiver)),
            active: Mutex::new(None),
            config,
            running: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Open the store, recover persisted state, and mark the kernel running.
    /// Call once before `run_loop`.
    pub async fn start(&self) -> Result<()> {
        self.store.open().await?;
        self.recover().await?;
        self.running.store(true, Ordering::SeqCst);
        info!("kernel started");
        Ok(())
    }

    /// Stop the control loop and close the store. Idempotent.
    pub async fn stop(&self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        self.store.close().await?;
        info!("kernel stopped");
        Ok(())
    }

    /// Enqueue an event. Never blocks: if the queue is momentarily full the
    /// event is dropped and logged rather than stalling the caller.
    pub fn emit(&self, event: Event) {
        if let Err(err) = self.sender.try_send(event) {
            warn!(%err, "failed to enqueue event");
        }
    }

    /// Track a task without scheduling it — used so a task is queryable
    /// before its `TaskSubmit`/`Interrupt` event has been dispatched.
    pub fn register(&self, task: Task) {
        self.scheduler.register(task);
    }

    pub fn get_task(&self, id: TaskId) -> Option<Task> {
        self.scheduler.get(id)
    }

    pub fn list_tasks(&self) -> Vec<Task> {
        self.scheduler.list()
    }

    /// The task currently occupying the single active slot, if any.
    pub fn active_task(&self) -> Option<Task> {
        let id = *self.active.lock().unwrap();
        id.and_then(|id| self.scheduler.get(id))
    }

    /// Overwrite a tracked task's metadata in place, without persisting or
    /// transitioning it. A runner calls this with a skill's checkpoint
    /// writes just before emitting the event that will carry the next
    /// transition (and thus the next `store.upsert`) for that task.
    pub fn merge_metadata(&self, id: TaskId, metadata: serde_json::Map<String, serde_json::Value>) {
        self.scheduler.with_mut(id, |t| t.metadata = metadata);
    }

    /// Bump `metadata["retry_count"]` by one. A runner calls this before
    /// emitting `Event::TaskRetry` so the budget check on the next failure
    /// sees the incremented count.
    pub fn bump_retry_count(&self, id: TaskId) {
        self.scheduler.with_mut(id, |t| {
            let count = t.retry_count() + 1;
            t.metadata.insert("retry_count".to_string(), serde_json::json!(count));
        });
    }

    /// Drive the control loop until `stop()` is called. Must be called at
    /// most once per `Kernel` — typically `tokio::spawn`ed by the caller
    /// right after `start()`.
    pub async fn run_loop(&self) {
        let mut receiver = match self.receiver.lock().await.take() {
            Some(r) => r,
            None => {
                error!("run_loop called more than once on the same kernel");
                return;
            }
        };

        let idle = Duration::from_millis(self.config.tick_interval_ms);
        while self.running.load(Ordering::SeqCst) {
            match tokio::time::timeout(idle, receiver.recv()).await {
                Ok(Some(event)) => {
                    if let Err(err) = self.dispatch(event).await {
                        error!(%err, "event handler failed");
                    }
                }
                Ok(None) => {
                    debug!("event queue closed, stopping control loop");
                    break;
                }
                Err(_) => {
                    if let Err(err) = self.tick().await {
                        error!(%err, "tick failed");
                    }
                }
            }
        }
    }

    // ── dispatch ─────────────────────────────────────────────────────

    async fn dispatch(&self, event: Event) -> Result<()> {
        match event {
            Event::TaskSubmit(task) => self.handle_submit(task).await,
            Event::TaskComplete(id) => self.handle_complete(id).await,
            Event::TaskFail(id, error) => self.handle_fail(id, error).await,
            Event::TaskCancel(id) => self.handle_cancel(id).await,
            Event::TaskRetry(id) => self.handle_retry(id).await,
            Event::Interrupt(task) => self.handle_interrupt(task).await,
        }
    }

    /// If the active slot is free, promote the next ready task.
    async fn tick(&self) -> Result<()> {
        if self.active.lock().unwrap().is_some() {
            return Ok(());
        }
        let Some(picked) = self.scheduler.pick_next() else {
            return Ok(());
        };
        let task_id = picked.id;
        match self
            .scheduler
            .with_mut(task_id, |t| t.transition(LifecycleState::Active))
        {
            Some(Ok(())) => {
                *self.active.lock().unwrap() = Some(task_id);
                let task = self
                    .scheduler
                    .get(task_id)
                    .expect("task just transitioned must still be tracked");
                debug!(task_id = %task_id, name = %task.name, "promoted task to active");
                self.store.upsert(&task).await?;
            }
            Some(Err(err)) => return Err(err),
            None => warn!(task_id = %task_id, "picked task vanished before promotion"),
        }
        Ok(())
    }

    async fn handle_submit(&self, task: Task) -> Result<()> {
        debug!(task_id = %task.id, name = %task.name, "task submitted");
        self.scheduler.add(task.clone());
        self.store.upsert(&task).await
    }

    async fn handle_complete(&self, id: TaskId) -> Result<()> {
        match self
            .scheduler
            .with_mut(id, |t| t.transition(LifecycleState::Completed))
        {
            Some(Ok(())) => {
                self.scheduler.release_dependents(id);
                self.clear_active_if_matching(id);
                let task = self.scheduler.get(id).expect("just transitioned");
                info!(task_id = %id, "task completed");
                self.store.upsert(&task).await
            }
            Some(Err(err)) => Err(err),
            None => {
                warn!(error = %KernelError::UnknownTask { task_id: id }, "dropping TaskComplete");
                Ok(())
            }
        }
    }

    async fn handle_fail(&self, id: TaskId, error: Option<String>) -> Result<()> {
        let result = self.scheduler.with_mut(id, |t| {
            if let Some(ref message) = error {
                t.metadata
                    .insert("error".to_string(), serde_json::json!(message));
            }
            t.transition(LifecycleState::Failed)
        });
        match result {
            Some(Ok(())) => {
                self.clear_active_if_matching(id);
                let task = self.scheduler.get(id).expect("just transitioned");
                warn!(task_id = %id, error = ?task.metadata.get("error"), "task failed");
                self.store.upsert(&task).await
            }
            Some(Err(err)) => Err(err),
            None => {
                warn!(error = %KernelError::UnknownTask { task_id: id }, "dropping TaskFail");
                Ok(())
            }
        }
    }

    async fn handle_cancel(&self, id: TaskId) -> Result<()> {
        match self
            .scheduler
            .with_mut(id, |t| t.transition(LifecycleState::Cancelled))
        {
            Some(Ok(())) => {
                self.clear_active_if_matching(id);
                let task = self.scheduler.get(id).expect("just transitioned");
                info!(task_id = %id, "task cancelled");
                self.store.upsert(&task).await
            }
            Some(Err(err)) => Err(err),
            None => {
                warn!(error = %KernelError::UnknownTask { task_id: id }, "dropping TaskCancel");
                Ok(())
            }
        }
    }

    /// ACTIVE -> PENDING, then re-queue immediately or after `retry_delay`.
    async fn handle_retry(&self, id: TaskId) -> Result<()> {
        let task = match self
            .scheduler
            .with_mut(id, |t| t.transition(LifecycleState::Pending))
        {
            Some(Ok(())) => {
                self.clear_active_if_matching(id);
                self.scheduler.get(id).expect("just transitioned")
            }
            Some(Err(err)) => return Err(err),
            None => {
                warn!(error = %KernelError::UnknownTask { task_id: id }, "dropping TaskRetry");
                return Ok(());
            }
        };
        self.store.upsert(&task).await?;

        let delay = task.retry_delay_secs();
        if delay <= 0.0 {
            debug!(task_id = %id, "retrying task immediately");
            self.scheduler.add(task);
        } else {
            debug!(task_id = %id, delay_secs = delay, "scheduling delayed retry");
            let sender = self.sender.clone();
            let delay = Duration::from_secs_f64(delay);
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = sender.send(Event::TaskSubmit(task)).await;
            });
        }
        Ok(())
    }

    async fn handle_interrupt(&self, task: Task) -> Result<()> {
        let active_id = *self.active.lock().unwrap();
        if let Some(active_id) = active_id {
            self.scheduler.suspend(active_id)?;
            *self.active.lock().unwrap() = None;
            if let Some(suspended) = self.scheduler.get(active_id) {
                info!(task_id = %active_id, "task preempted by interrupt");
                self.store.upsert(&suspended).await?;
            }
        }
        info!(task_id = %task.id, name = %task.name, "interrupt scheduled");
        self.scheduler.add(task.clone());
        self.store.upsert(&task).await
    }

    fn clear_active_if_matching(&self, id: TaskId) {
        let mut active = self.active.lock().unwrap();
        if *active == Some(id) {
            *active = None;
        }
    }

    // ── crash recovery ───────────────────────────────────────────────

    async fn recover(&self) -> Result<()> {
        let persisted = self.store.load_all().await?;
        info!(count = persisted.len(), "recovering persisted tasks");

        for task in persisted {
            match task.state {
                LifecycleState::Pending | LifecycleState::Paused => {
                    self.scheduler.add(task);
                }
                LifecycleState::Active => match self.config.crash_policy {
                    CrashPolicy::Resume => {
                        let mut task = task;
                        task.transition(LifecycleState::Paused)?;
                        self.store.upsert(&task).await?;
                        warn!(task_id = %task.id, "recovered active task, resuming as paused");
                        self.scheduler.add(task);
                    }
                    CrashPolicy::Fail => {
                        let mut task = task;
                        task.transition(LifecycleState::Failed)?;
                        self.store.upsert(&task).await?;
                        warn!(task_id = %task.id, "recovered active task, failing per crash policy");
                        self.scheduler.register(task);
                    }
                },
                LifecycleState::Completed | LifecycleState::Failed | LifecycleState::Cancelled => {
                    self.scheduler.register(task);
                }
            }
        }
        Ok(())
    }
}
