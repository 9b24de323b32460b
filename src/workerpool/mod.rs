pub mod scaling;
pub mod stats;
pub mod task;

pub use scaling::{plan_scaling, ScaleAction};
pub use stats::{PoolMetrics, PoolStats};
pub use task::{CancelReason, CancelSignal, Submission, Task, TaskHandle, TaskState};

use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge};
use thiserror::Error;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, Instant};
use uuid::Uuid;

use scaling::cooldown_elapsed;
use task::QueuedTask;

/// How long an idle worker sleeps before re-checking the queue.
const IDLE_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("worker pool is shut down")]
    ShutDown,
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub name: String,
    pub min_workers: usize,
    pub max_workers: usize,
    pub scaling_interval: Duration,
    pub cooldown: Duration,
    /// Applied to tasks that do not set their own timeout.
    pub default_timeout: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            name: "pool".into(),
            min_workers: 4,
            max_workers: 10,
            scaling_interval: Duration::from_secs(5),
            cooldown: Duration::from_secs(10),
            default_timeout: None,
        }
    }
}

struct PoolInner {
    queue: BinaryHeap<QueuedTask>,
    /// Keys of queued and running tasks.
    active_keys: HashSet<String>,
    running: HashMap<Uuid, CancelSignal>,
    workers: Vec<JoinHandle<()>>,
    scaler: Option<JoinHandle<()>>,
    active_workers: usize,
    /// Workers asked to exit after their current task.
    retire_requests: usize,
    next_seq: u64,
    last_scale: Option<Instant>,
    shutting_down: bool,
    stats: PoolStats,
}

struct Shared {
    config: PoolConfig,
    inner: Mutex<PoolInner>,
    work_available: Notify,
    task_finished: Notify,
}

/// Bounded-concurrency priority executor with dynamic worker scaling.
///
/// Workers pull the highest-priority task from a shared heap; equal
/// priorities run in submission order. Timeouts and cancellation are
/// cooperative: the task body receives a [`CancelSignal`] and the pool stops
/// waiting on it once the signal fires, without aborting it.
#[derive(Clone)]
pub struct WorkerPool {
    shared: Arc<Shared>,
}

impl WorkerPool {
    /// Start `min_workers` workers and the scaling loop. Must be called inside a runtime.
    pub fn new(config: PoolConfig) -> Self {
        let min_workers = config.min_workers.max(1);
        let config = PoolConfig {
            min_workers,
            max_workers: config.max_workers.max(min_workers),
            ..config
        };

        let shared = Arc::new(Shared {
            config,
            inner: Mutex::new(PoolInner {
                queue: BinaryHeap::new(),
                active_keys: HashSet::new(),
                running: HashMap::new(),
                workers: Vec::new(),
                scaler: None,
                active_workers: 0,
                retire_requests: 0,
                next_seq: 0,
                last_scale: None,
                shutting_down: false,
                stats: PoolStats::default(),
            }),
            work_available: Notify::new(),
            task_finished: Notify::new(),
        });

        // Nothing else can hold the lock before the first task is spawned.
        if let Ok(mut inner) = shared.inner.try_lock() {
            for _ in 0..shared.config.min_workers {
                spawn_worker(&shared, &mut inner);
            }
            inner.scaler = Some(tokio::spawn(scaling_loop(shared.clone())));
        }
        tracing::info!(
            pool = %shared.config.name,
            min = shared.config.min_workers,
            max = shared.config.max_workers,
            "Worker pool started"
        );

        Self { shared }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    /// Enqueue `task`. A task whose key is already queued or running is dropped.
    pub async fn submit(&self, task: Task) -> Result<Submission, PoolError> {
        let mut inner = self.shared.inner.lock().await;
        if inner.shutting_down {
            return Err(PoolError::ShutDown);
        }
        if inner.active_keys.contains(&task.key) {
            inner.stats.duplicates += 1;
            tracing::debug!(pool = %self.shared.config.name, key = %task.key, "Duplicate task dropped");
            return Ok(Submission::Duplicate);
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        let (queued, handle) = task.into_queued(seq, self.shared.config.default_timeout);

        inner.active_keys.insert(queued.key.clone());
        inner.queue.push(queued);
        inner.stats.submitted += 1;
        gauge!("pool_queue_depth", "pool" => self.shared.config.name.clone()).set(inner.queue.len() as f64);
        drop(inner);

        self.shared.work_available.notify_one();
        tracing::debug!(
            pool = %self.shared.config.name,
            task_id = %handle.id,
            key = %handle.key,
            priority = handle.priority,
            "Task queued"
        );
        Ok(Submission::Accepted(handle))
    }

    /// Cancel a queued or running task. Returns `false` for unknown ids.
    pub async fn cancel(&self, task_id: Uuid) -> bool {
        let mut inner = self.shared.inner.lock().await;

        if let Some(signal) = inner.running.get(&task_id) {
            signal.cancel(CancelReason::Canceled);
            return true;
        }

        let mut found = None;
        let remaining: Vec<QueuedTask> = std::mem::take(&mut inner.queue)
            .into_iter()
            .filter_map(|t| {
                if t.id == task_id {
                    found = Some(t);
                    None
                } else {
                    Some(t)
                }
            })
            .collect();
        inner.queue = remaining.into();

        match found {
            Some(task) => {
                inner.active_keys.remove(&task.key);
                inner.stats.record_finish(TaskState::Canceled, None);
                counter!("pool_tasks_failed", "pool" => self.shared.config.name.clone()).increment(1);
                task.discard(TaskState::Canceled);
                drop(inner);
                self.shared.task_finished.notify_waiters();
                true
            }
            None => false,
        }
    }

    pub async fn metrics(&self) -> PoolMetrics {
        let inner = self.shared.inner.lock().await;
        inner.stats.snapshot(
            inner.active_workers.saturating_sub(inner.retire_requests),
            inner.queue.len(),
            inner.running.len(),
        )
    }

    pub async fn active_workers(&self) -> usize {
        let inner = self.shared.inner.lock().await;
        inner.active_workers.saturating_sub(inner.retire_requests)
    }

    pub async fn queue_depth(&self) -> usize {
        self.shared.inner.lock().await.queue.len()
    }

    /// Block until every submitted task has reached a terminal state.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.shared.task_finished.notified();
            {
                let inner = self.shared.inner.lock().await;
                if inner.stats.finished() >= inner.stats.submitted {
                    return;
                }
            }
            notified.await;
        }
    }

    /// Stop workers after their current task, wait for them, then cancel
    /// whatever is still queued. Later submissions fail with [`PoolError::ShutDown`].
    pub async fn shutdown(&self) {
        let workers = {
            let mut inner = self.shared.inner.lock().await;
            if inner.shutting_down {
                return;
            }
            inner.shutting_down = true;
            if let Some(scaler) = inner.scaler.take() {
                scaler.abort();
            }
            std::mem::take(&mut inner.workers)
        };
        tracing::info!(pool = %self.shared.config.name, "Worker pool shutting down");
        self.shared.work_available.notify_waiters();

        for worker in workers {
            if let Err(e) = worker.await {
                tracing::error!(pool = %self.shared.config.name, error = %e, "Worker exited abnormally");
            }
        }

        let discarded = {
            let mut inner = self.shared.inner.lock().await;
            let queued: Vec<QueuedTask> = std::mem::take(&mut inner.queue).into_vec();
            for task in &queued {
                inner.active_keys.remove(&task.key);
                inner.stats.record_finish(TaskState::Canceled, None);
            }
            queued
        };
        let discarded_count = discarded.len();
        for task in discarded {
            task.discard(TaskState::Canceled);
        }
        self.shared.task_finished.notify_waiters();

        tracing::info!(
            pool = %self.shared.config.name,
            discarded = discarded_count,
            "Worker pool stopped"
        );
    }
}

fn spawn_worker(shared: &Arc<Shared>, inner: &mut PoolInner) {
    inner.workers.retain(|h| !h.is_finished());
    inner.active_workers += 1;
    inner
        .workers
        .push(tokio::spawn(worker_loop(shared.clone())));
    gauge!("pool_active_workers", "pool" => shared.config.name.clone()).set(inner.active_workers as f64);
}

async fn worker_loop(shared: Arc<Shared>) {
    loop {
        let next = {
            let mut inner = shared.inner.lock().await;
            if inner.shutting_down {
                break;
            }
            if inner.retire_requests > 0 {
                inner.retire_requests -= 1;
                break;
            }
            let next = inner.queue.pop();
            gauge!("pool_queue_depth", "pool" => shared.config.name.clone()).set(inner.queue.len() as f64);
            next
        };

        match next {
            Some(task) => run_task(&shared, task).await,
            None => {
                tokio::select! {
                    _ = shared.work_available.notified() => {}
                    _ = sleep(IDLE_POLL) => {}
                }
            }
        }
    }

    let mut inner = shared.inner.lock().await;
    inner.active_workers = inner.active_workers.saturating_sub(1);
    gauge!("pool_active_workers", "pool" => shared.config.name.clone()).set(inner.active_workers as f64);
}

async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn run_task(shared: &Arc<Shared>, task: QueuedTask) {
    let QueuedTask {
        id,
        key,
        deadline,
        submitted_at,
        cancel,
        state,
        work,
        ..
    } = task;

    let expired = deadline.is_some_and(|d| Instant::now() >= d);
    let (outcome, processing) = if let Some(reason) = cancel.reason() {
        (TaskState::from(reason), None)
    } else if expired {
        cancel.cancel(CancelReason::DeadlineExceeded);
        (TaskState::TimedOut, None)
    } else {
        {
            let mut inner = shared.inner.lock().await;
            inner.running.insert(id, cancel.clone());
            inner.stats.record_start(submitted_at.elapsed());
        }
        state.send_replace(TaskState::Running);
        tracing::debug!(pool = %shared.config.name, task_id = %id, key = %key, "Task started");

        let started = Instant::now();
        let mut job = tokio::spawn(work(cancel.clone()));
        let outcome = tokio::select! {
            biased;
            joined = &mut job => match joined {
                Ok(Ok(())) => TaskState::Completed,
                Ok(Err(e)) => {
                    tracing::warn!(pool = %shared.config.name, key = %key, error = %e, "Task failed");
                    TaskState::Failed
                }
                Err(e) => {
                    tracing::error!(pool = %shared.config.name, key = %key, error = %e, "Task panicked");
                    TaskState::Failed
                }
            },
            reason = cancel.cancelled() => TaskState::from(reason),
            _ = until(deadline) => {
                cancel.cancel(CancelReason::DeadlineExceeded);
                TaskState::TimedOut
            }
        };
        (outcome, Some(started.elapsed()))
    };

    match outcome {
        TaskState::TimedOut => tracing::warn!(pool = %shared.config.name, key = %key, "Task timed out"),
        TaskState::Canceled => tracing::info!(pool = %shared.config.name, key = %key, "Task canceled"),
        _ => {}
    }

    {
        let mut inner = shared.inner.lock().await;
        inner.running.remove(&id);
        inner.active_keys.remove(&key);
        inner.stats.record_finish(outcome, processing);
    }
    let pool_label = shared.config.name.clone();
    if outcome == TaskState::Completed {
        counter!("pool_tasks_completed", "pool" => pool_label).increment(1);
    } else {
        counter!("pool_tasks_failed", "pool" => pool_label).increment(1);
    }

    state.send_replace(outcome);
    shared.task_finished.notify_waiters();
}

async fn scaling_loop(shared: Arc<Shared>) {
    let mut ticker = tokio::time::interval(shared.config.scaling_interval);
    // The first tick fires immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        if !rebalance(&shared).await {
            break;
        }
    }
}

/// One scaling decision. Returns `false` once the pool is shutting down.
async fn rebalance(shared: &Arc<Shared>) -> bool {
    let mut inner = shared.inner.lock().await;
    if inner.shutting_down {
        return false;
    }

    let now = Instant::now();
    if !cooldown_elapsed(inner.last_scale, now, shared.config.cooldown) {
        return true;
    }

    let active = inner.active_workers.saturating_sub(inner.retire_requests);
    let queue_depth = inner.queue.len();
    let action = plan_scaling(
        queue_depth,
        active,
        shared.config.min_workers,
        shared.config.max_workers,
    );

    match action {
        ScaleAction::Hold => return true,
        ScaleAction::Up(n) => {
            for _ in 0..n {
                spawn_worker(shared, &mut inner);
            }
        }
        ScaleAction::Down(n) => inner.retire_requests += n,
    }
    inner.last_scale = Some(now);
    drop(inner);

    if matches!(action, ScaleAction::Down(_)) {
        // Wake idle workers so they can retire.
        shared.work_available.notify_waiters();
    }
    tracing::info!(
        pool = %shared.config.name,
        ?action,
        queue_depth,
        active,
        "Worker pool rescaled"
    );
    true
}
