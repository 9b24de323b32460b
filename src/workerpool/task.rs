use std::cmp::Ordering;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::time::Instant;
use uuid::Uuid;

pub type TaskFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;
type TaskFn = Box<dyn FnOnce(CancelSignal) -> TaskFuture + Send>;

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    Canceled,
    DeadlineExceeded,
}

/// Cooperative cancellation flag shared between the pool and a task body.
///
/// The first reason delivered sticks. Task bodies poll [`CancelSignal::is_canceled`]
/// between steps or await [`CancelSignal::cancelled`] inside a `select!`.
#[derive(Clone)]
pub struct CancelSignal {
    tx: Arc<watch::Sender<Option<CancelReason>>>,
}

impl CancelSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Deliver `reason`. Returns `false` if the signal had already fired.
    pub fn cancel(&self, reason: CancelReason) -> bool {
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        })
    }

    pub fn reason(&self) -> Option<CancelReason> {
        *self.tx.borrow()
    }

    pub fn is_canceled(&self) -> bool {
        self.reason().is_some()
    }

    /// Resolves once the signal fires.
    pub async fn cancelled(&self) -> CancelReason {
        let mut rx = self.tx.subscribe();
        let reason = match rx.wait_for(Option::is_some).await {
            Ok(reason) => *reason,
            Err(_) => None,
        };
        reason.unwrap_or(CancelReason::Canceled)
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancelSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelSignal").field("reason", &self.reason()).finish()
    }
}

// ---------------------------------------------------------------------------
// Task lifecycle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Queued,
    Running,
    Completed,
    Failed,
    TimedOut,
    Canceled,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskState::Queued | TaskState::Running)
    }
}

impl From<CancelReason> for TaskState {
    fn from(reason: CancelReason) -> Self {
        match reason {
            CancelReason::Canceled => TaskState::Canceled,
            CancelReason::DeadlineExceeded => TaskState::TimedOut,
        }
    }
}

/// A unit of work for the pool.
///
/// `key` identifies the work itself (e.g. `sol:<wallet>:30d`); a task whose
/// key matches one already queued or running is dropped as a duplicate.
pub struct Task {
    pub key: String,
    /// Higher runs first.
    pub priority: i32,
    /// Overrides the pool's default timeout.
    pub timeout: Option<Duration>,
    work: TaskFn,
}

impl Task {
    pub fn new<F, Fut>(key: impl Into<String>, work: F) -> Self
    where
        F: FnOnce(CancelSignal) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            key: key.into(),
            priority: 0,
            timeout: None,
            work: Box::new(move |cancel| Box::pin(work(cancel))),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub(crate) fn into_queued(
        self,
        seq: u64,
        default_timeout: Option<Duration>,
    ) -> (QueuedTask, TaskHandle) {
        let id = Uuid::new_v4();
        let now = Instant::now();
        let cancel = CancelSignal::new();
        let (state_tx, state_rx) = watch::channel(TaskState::Queued);
        let timeout = self.timeout.or(default_timeout);

        let handle = TaskHandle {
            id,
            key: self.key.clone(),
            priority: self.priority,
            timeout,
            cancel: cancel.clone(),
            state: state_rx,
        };
        let queued = QueuedTask {
            id,
            key: self.key,
            priority: self.priority,
            seq,
            submitted_at: now,
            deadline: timeout.map(|t| now + t),
            cancel,
            state: state_tx,
            work: self.work,
        };
        (queued, handle)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("key", &self.key)
            .field("priority", &self.priority)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Submitter's view of an accepted task.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    pub id: Uuid,
    pub key: String,
    pub priority: i32,
    pub timeout: Option<Duration>,
    cancel: CancelSignal,
    state: watch::Receiver<TaskState>,
}

impl TaskHandle {
    pub fn state(&self) -> TaskState {
        *self.state.borrow()
    }

    /// Signal the task body to stop. A task still queued is dropped when dequeued.
    pub fn cancel(&self) -> bool {
        self.cancel.cancel(CancelReason::Canceled)
    }

    /// Wait for a terminal state.
    pub async fn wait(&self) -> TaskState {
        let mut rx = self.state.clone();
        // The sender only goes away with the pool; report the last state seen.
        let _ = rx.wait_for(TaskState::is_terminal).await;
        let state = *rx.borrow();
        state
    }
}

/// Result of [`super::WorkerPool::submit`].
#[derive(Debug)]
pub enum Submission {
    Accepted(TaskHandle),
    /// A task with the same key is already queued or running.
    Duplicate,
}

impl Submission {
    pub fn handle(self) -> Option<TaskHandle> {
        match self {
            Submission::Accepted(handle) => Some(handle),
            Submission::Duplicate => None,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Submission::Duplicate)
    }
}

// ---------------------------------------------------------------------------
// Queue entry
// ---------------------------------------------------------------------------

pub(crate) struct QueuedTask {
    pub id: Uuid,
    pub key: String,
    pub priority: i32,
    pub seq: u64,
    pub submitted_at: Instant,
    pub deadline: Option<Instant>,
    pub cancel: CancelSignal,
    pub state: watch::Sender<TaskState>,
    pub work: TaskFn,
}

impl QueuedTask {
    /// Mark a task that never ran as finished with `state`.
    pub fn discard(self, state: TaskState) {
        if let Some(reason) = match state {
            TaskState::Canceled => Some(CancelReason::Canceled),
            TaskState::TimedOut => Some(CancelReason::DeadlineExceeded),
            _ => None,
        } {
            self.cancel.cancel(reason);
        }
        self.state.send_replace(state);
    }
}

// Max-heap order: higher priority first, then lower sequence number (FIFO).
impl Ord for QueuedTask {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for QueuedTask {}
