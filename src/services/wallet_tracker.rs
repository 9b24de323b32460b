use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};

use crate::models::{format_timestamp, ScanScope};
use crate::sources::TradeEventSource;
use crate::workerpool::{CancelSignal, PoolError, PoolMetrics, Submission, Task, TaskHandle, TaskState, WorkerPool};

/// A token showed up in a tracked wallet's activity for the first time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackerEvent {
    pub wallet: String,
    pub chain: String,
    pub token_address: String,
    pub token_symbol: String,
    pub last_active: i64,
    pub datetime: String,
}

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("wallet {0} is already tracked")]
    AlreadyTracked(String),

    #[error(transparent)]
    Pool(#[from] PoolError),
}

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub poll_interval: Duration,
    pub task_timeout: Option<Duration>,
    pub priority: i32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            task_timeout: Some(Duration::from_secs(3600)),
            priority: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedWallet {
    pub task_id: String,
    pub priority: i32,
    pub timeout_secs: Option<u64>,
    pub state: TaskState,
}

impl From<&TaskHandle> for TrackedWallet {
    fn from(handle: &TaskHandle) -> Self {
        Self {
            task_id: wallet_of(&handle.key).to_string(),
            priority: handle.priority,
            timeout_secs: handle.timeout.map(|t| t.as_secs()),
            state: handle.state(),
        }
    }
}

fn tracker_key(chain: &str, wallet: &str) -> String {
    format!("tracker:{chain}:{wallet}")
}

fn wallet_of(key: &str) -> &str {
    key.rsplit(':').next().unwrap_or(key)
}

/// Runs one polling task per tracked wallet on its own worker pool.
///
/// Task ids exposed to callers are the wallet addresses.
pub struct WalletTrackerManager {
    chain: String,
    source: Arc<dyn TradeEventSource>,
    pool: WorkerPool,
    config: TrackerConfig,
    tasks: Mutex<HashMap<String, TaskHandle>>,
    events: broadcast::Sender<TrackerEvent>,
}

impl WalletTrackerManager {
    pub fn new(
        chain: impl Into<String>,
        source: Arc<dyn TradeEventSource>,
        pool: WorkerPool,
        config: TrackerConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            chain: chain.into(),
            source,
            pool,
            config,
            tasks: Mutex::new(HashMap::new()),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.events.subscribe()
    }

    pub async fn track(&self, wallet: &str) -> Result<TrackedWallet, TrackerError> {
        let mut tasks = self.tasks.lock().await;
        if tasks.get(wallet).is_some_and(|h| !h.state().is_terminal()) {
            return Err(TrackerError::AlreadyTracked(wallet.to_string()));
        }

        let source = self.source.clone();
        let events = self.events.clone();
        let chain = self.chain.clone();
        let owned_wallet = wallet.to_string();
        let interval = self.config.poll_interval;

        let mut task = Task::new(tracker_key(&self.chain, wallet), move |cancel| {
            poll_wallet(source, chain, owned_wallet, interval, events, cancel)
        })
        .with_priority(self.config.priority);
        if let Some(timeout) = self.config.task_timeout {
            task = task.with_timeout(timeout);
        }

        match self.pool.submit(task).await? {
            Submission::Accepted(handle) => {
                let tracked = TrackedWallet::from(&handle);
                tasks.insert(wallet.to_string(), handle);
                tracing::info!(wallet = %wallet, chain = %self.chain, "Wallet tracker added");
                Ok(tracked)
            }
            Submission::Duplicate => Err(TrackerError::AlreadyTracked(wallet.to_string())),
        }
    }

    /// Stop tracking `wallet`. Returns `false` if it was not tracked.
    pub async fn untrack(&self, wallet: &str) -> bool {
        let Some(handle) = self.tasks.lock().await.remove(wallet) else {
            return false;
        };
        if !self.pool.cancel(handle.id).await {
            handle.cancel();
        }
        tracing::info!(wallet = %wallet, "Wallet tracker removed");
        true
    }

    pub async fn list(&self) -> Vec<TrackedWallet> {
        let tasks = self.tasks.lock().await;
        let mut list: Vec<TrackedWallet> = tasks.values().map(TrackedWallet::from).collect();
        list.sort_by(|a, b| a.task_id.cmp(&b.task_id));
        list
    }

    pub async fn metrics(&self) -> PoolMetrics {
        self.pool.metrics().await
    }

    /// Cancel every tracker and drain the pool.
    pub async fn shutdown(&self) {
        let handles: Vec<TaskHandle> = self.tasks.lock().await.drain().map(|(_, h)| h).collect();
        for handle in &handles {
            handle.cancel();
        }
        self.pool.shutdown().await;
        tracing::info!(trackers = handles.len(), "Wallet tracker shut down");
    }
}

/// Poll the wallet's recent tokens until canceled. The first poll only
/// records a baseline; later polls report tokens not seen before.
async fn poll_wallet(
    source: Arc<dyn TradeEventSource>,
    chain: String,
    wallet: String,
    every: Duration,
    events: broadcast::Sender<TrackerEvent>,
    cancel: CancelSignal,
) -> anyhow::Result<()> {
    let mut ticker = tokio::time::interval(every);
    let mut seen: HashSet<String> = HashSet::new();
    let mut primed = false;

    loop {
        tokio::select! {
            reason = cancel.cancelled() => {
                tracing::info!(wallet = %wallet, ?reason, "Wallet tracker stopped");
                return Ok(());
            }
            _ = ticker.tick() => {}
        }

        let tokens = match source.list_touched_tokens(&wallet, ScanScope::LastNDays(1)).await {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::warn!(wallet = %wallet, error = %e, "Wallet tracker poll failed");
                continue;
            }
        };

        for token in tokens {
            if !seen.insert(token.token_address.clone()) || !primed {
                continue;
            }
            let event = TrackerEvent {
                wallet: wallet.clone(),
                chain: chain.clone(),
                datetime: format_timestamp(token.last_active),
                token_address: token.token_address,
                token_symbol: token.token_symbol,
                last_active: token.last_active,
            };
            tracing::info!(
                wallet = %event.wallet,
                token = %event.token_address,
                symbol = %event.token_symbol,
                "Tracked wallet touched a new token"
            );
            // No subscribers is fine.
            let _ = events.send(event);
        }
        primed = true;
    }
}
