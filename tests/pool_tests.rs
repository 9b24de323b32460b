use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::{sleep, timeout};

use pnlscan::workerpool::{CancelReason, PoolConfig, PoolError, Task, TaskHandle, TaskState, WorkerPool};

fn config(min: usize, max: usize) -> PoolConfig {
    PoolConfig {
        name: "test".into(),
        min_workers: min,
        max_workers: max,
        scaling_interval: Duration::from_millis(20),
        cooldown: Duration::ZERO,
        default_timeout: None,
    }
}

/// Task that blocks until the gate hands out a permit.
fn gated(key: impl Into<String>, gate: Arc<Semaphore>) -> Task {
    Task::new(key, move |_| async move {
        gate.acquire().await?.forget();
        Ok(())
    })
}

async fn submit(pool: &WorkerPool, task: Task) -> TaskHandle {
    pool.submit(task).await.unwrap().handle().expect("task accepted")
}

async fn wait_for_state(handle: &TaskHandle, state: TaskState) {
    for _ in 0..200 {
        if handle.state() == state {
            return;
        }
        sleep(Duration::from_millis(5)).await;
    }
    panic!("task {} never reached {state:?}", handle.key);
}

#[tokio::test]
async fn test_scales_up_to_max_under_load() {
    let pool = WorkerPool::new(config(4, 10));
    let gate = Arc::new(Semaphore::new(0));
    assert_eq!(pool.active_workers().await, 4);

    for i in 0..20 {
        submit(&pool, gated(format!("job-{i}"), gate.clone())).await;
    }

    let mut peak = 0;
    for _ in 0..50 {
        let workers = pool.active_workers().await;
        peak = peak.max(workers);
        if workers == 10 && pool.metrics().await.running == 10 {
            break;
        }
        sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(peak, 10);

    // Stays at the ceiling while the backlog persists.
    sleep(Duration::from_millis(100)).await;
    let metrics = pool.metrics().await;
    assert_eq!(metrics.active_workers, 10);
    assert_eq!(metrics.running, 10);
    assert_eq!(metrics.queue_depth, 10);

    gate.add_permits(20);
    pool.wait_idle().await;
    assert_eq!(pool.metrics().await.completed, 20);
    pool.shutdown().await;
}

#[tokio::test]
async fn test_scales_down_when_idle() {
    let pool = WorkerPool::new(config(2, 8));
    let gate = Arc::new(Semaphore::new(0));
    for i in 0..16 {
        submit(&pool, gated(format!("job-{i}"), gate.clone())).await;
    }
    for _ in 0..50 {
        if pool.active_workers().await == 8 {
            break;
        }
        sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(pool.active_workers().await, 8);

    gate.add_permits(16);
    pool.wait_idle().await;
    for _ in 0..100 {
        if pool.active_workers().await == 2 {
            break;
        }
        sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(pool.active_workers().await, 2);
    pool.shutdown().await;
}

#[tokio::test]
async fn test_duplicate_key_runs_once() {
    let pool = WorkerPool::new(config(2, 2));
    let runs = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Semaphore::new(0));

    let counted = |runs: Arc<AtomicUsize>, gate: Arc<Semaphore>| {
        Task::new("sol:Wallet111:30d", move |_| async move {
            runs.fetch_add(1, Ordering::SeqCst);
            gate.acquire().await?.forget();
            Ok(())
        })
    };

    let first = submit(&pool, counted(runs.clone(), gate.clone())).await;
    let second = pool.submit(counted(runs.clone(), gate.clone())).await.unwrap();
    assert!(second.is_duplicate());

    wait_for_state(&first, TaskState::Running).await;
    assert!(pool.submit(counted(runs.clone(), gate.clone())).await.unwrap().is_duplicate());

    gate.add_permits(1);
    assert_eq!(first.wait().await, TaskState::Completed);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(pool.metrics().await.duplicates, 2);

    // The key is free again once the task is done.
    gate.add_permits(1);
    let again = submit(&pool, counted(runs.clone(), gate.clone())).await;
    assert_eq!(again.wait().await, TaskState::Completed);
    assert_eq!(runs.load(Ordering::SeqCst), 2);
    pool.shutdown().await;
}

#[tokio::test]
async fn test_timeout_signals_task_and_frees_worker() {
    let pool = WorkerPool::new(config(1, 1));
    let observed = Arc::new(Mutex::new(None));

    let seen = observed.clone();
    let slow = Task::new("slow", move |cancel| async move {
        let reason = cancel.cancelled().await;
        *seen.lock().unwrap() = Some(reason);
        Ok(())
    })
    .with_timeout(Duration::from_millis(50));
    let slow = submit(&pool, slow).await;

    // Ignores its signal entirely; the pool still moves on.
    let stubborn = Task::new("stubborn", |_| async {
        sleep(Duration::from_secs(30)).await;
        Ok(())
    })
    .with_timeout(Duration::from_millis(50));
    let stubborn = submit(&pool, stubborn).await;

    let quick = submit(&pool, Task::new("quick", |_| async { Ok(()) })).await;

    let states = timeout(Duration::from_secs(5), async {
        (slow.wait().await, stubborn.wait().await, quick.wait().await)
    })
    .await
    .expect("pool stalled");
    assert_eq!(states, (TaskState::TimedOut, TaskState::TimedOut, TaskState::Completed));

    sleep(Duration::from_millis(20)).await;
    assert_eq!(*observed.lock().unwrap(), Some(CancelReason::DeadlineExceeded));

    let metrics = pool.metrics().await;
    assert_eq!(metrics.timed_out, 2);
    assert_eq!(metrics.failed, 2);
    assert_eq!(metrics.completed, 1);
    pool.shutdown().await;
}

#[tokio::test]
async fn test_deadline_counts_queue_time() {
    let pool = WorkerPool::new(config(1, 1));
    let gate = Arc::new(Semaphore::new(0));
    let blocker = submit(&pool, gated("blocker", gate.clone())).await;
    wait_for_state(&blocker, TaskState::Running).await;

    let ran = Arc::new(AtomicUsize::new(0));
    let counter = ran.clone();
    let waiting = Task::new("waiting", move |_| async move {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
    .with_timeout(Duration::from_millis(30));
    let waiting = submit(&pool, waiting).await;

    sleep(Duration::from_millis(80)).await;
    gate.add_permits(1);

    assert_eq!(waiting.wait().await, TaskState::TimedOut);
    assert_eq!(ran.load(Ordering::SeqCst), 0);
    pool.shutdown().await;
}

#[tokio::test]
async fn test_cancel_running_task() {
    let pool = WorkerPool::new(config(1, 1));
    let running = Task::new("endless", |cancel| async move {
        cancel.cancelled().await;
        Ok(())
    });
    let handle = submit(&pool, running).await;
    wait_for_state(&handle, TaskState::Running).await;

    assert!(pool.cancel(handle.id).await);
    assert_eq!(handle.wait().await, TaskState::Canceled);
    assert_eq!(pool.metrics().await.canceled, 1);
    pool.shutdown().await;
}

#[tokio::test]
async fn test_cancel_queued_task() {
    let pool = WorkerPool::new(config(1, 1));
    let gate = Arc::new(Semaphore::new(0));
    let blocker = submit(&pool, gated("blocker", gate.clone())).await;
    wait_for_state(&blocker, TaskState::Running).await;

    let queued = submit(&pool, gated("queued", gate.clone())).await;
    assert_eq!(pool.queue_depth().await, 1);
    assert!(pool.cancel(queued.id).await);
    assert_eq!(queued.wait().await, TaskState::Canceled);
    assert_eq!(pool.queue_depth().await, 0);

    // Key released with the canceled task.
    let replacement = submit(&pool, gated("queued", gate.clone())).await;

    // Canceled through its handle: dropped without running.
    let via_handle = submit(&pool, gated("via-handle", gate.clone())).await;
    assert!(via_handle.cancel());

    gate.add_permits(2);
    assert_eq!(replacement.wait().await, TaskState::Completed);
    assert_eq!(via_handle.wait().await, TaskState::Canceled);
    assert!(!pool.cancel(uuid::Uuid::new_v4()).await);
    pool.shutdown().await;
}

#[tokio::test]
async fn test_higher_priority_runs_first() {
    let pool = WorkerPool::new(config(1, 1));
    let gate = Arc::new(Semaphore::new(0));
    let blocker = submit(&pool, gated("blocker", gate.clone())).await;
    wait_for_state(&blocker, TaskState::Running).await;

    let order = Arc::new(Mutex::new(Vec::new()));
    let mut handles = Vec::new();
    for (name, priority) in [("low", 1), ("high", 10), ("mid-a", 5), ("mid-b", 5)] {
        let order = order.clone();
        let task = Task::new(name, move |_| async move {
            order.lock().unwrap().push(name);
            Ok(())
        })
        .with_priority(priority);
        handles.push(submit(&pool, task).await);
    }

    gate.add_permits(1);
    for handle in &handles {
        assert_eq!(handle.wait().await, TaskState::Completed);
    }
    assert_eq!(*order.lock().unwrap(), vec!["high", "mid-a", "mid-b", "low"]);
    pool.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_drains_running_and_cancels_queued() {
    let pool = WorkerPool::new(config(1, 1));
    let gate = Arc::new(Semaphore::new(0));
    let running = submit(&pool, gated("running", gate.clone())).await;
    wait_for_state(&running, TaskState::Running).await;
    let queued = submit(&pool, gated("queued", gate.clone())).await;

    let closing = pool.clone();
    let shutdown = tokio::spawn(async move { closing.shutdown().await });
    sleep(Duration::from_millis(30)).await;

    let late = pool.submit(Task::new("late", |_| async { Ok(()) })).await;
    assert!(matches!(late, Err(PoolError::ShutDown)));

    gate.add_permits(2);
    timeout(Duration::from_secs(5), shutdown)
        .await
        .expect("shutdown stalled")
        .unwrap();

    assert_eq!(running.state(), TaskState::Completed);
    assert_eq!(queued.state(), TaskState::Canceled);

    // Everything submitted has settled.
    timeout(Duration::from_secs(1), pool.wait_idle()).await.expect("pool not idle");
}

#[tokio::test]
async fn test_metrics_track_wait_and_processing() {
    let pool = WorkerPool::new(config(1, 1));
    let gate = Arc::new(Semaphore::new(0));
    let first = submit(&pool, gated("first", gate.clone())).await;
    wait_for_state(&first, TaskState::Running).await;
    submit(&pool, Task::new("second", |_| async { anyhow::bail!("no data") })).await;

    sleep(Duration::from_millis(20)).await;
    gate.add_permits(1);
    pool.wait_idle().await;

    let metrics = pool.metrics().await;
    assert_eq!(metrics.submitted, 2);
    assert_eq!(metrics.completed, 1);
    assert_eq!(metrics.failed, 1);
    assert_eq!(metrics.queue_depth, 0);
    assert_eq!(metrics.running, 0);
    assert!(metrics.avg_wait_ms > 0.0);
    assert!(metrics.avg_processing_ms > 0.0);
    pool.shutdown().await;
}
