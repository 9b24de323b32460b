pub mod discovery;
pub mod rescan;
pub mod wallet_tracker;

use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::models::{ScanRequest, WalletPnl};
use crate::pnl::{ScanOutcome, WalletScanner};
use crate::workerpool::{PoolError, Submission, Task, TaskState, WorkerPool};

/// Counts of one fan-out of wallet scans through the pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub submitted: usize,
    pub duplicates: usize,
    pub completed: usize,
    pub already_scanned: usize,
    pub failed: usize,
}

/// Pool task running one wallet scan. Every successful outcome is sent on
/// `outcomes`. The pool key uses the chain-normalized wallet.
pub fn scan_task(
    scanner: WalletScanner,
    mut request: ScanRequest,
    priority: i32,
    outcomes: mpsc::UnboundedSender<ScanOutcome>,
) -> Task {
    request.wallet = scanner.profile().normalize(&request.wallet);
    let key = request.dedup_key(scanner.chain());
    Task::new(key, move |cancel| async move {
        let outcome = scanner.scan_wallet(&request, &cancel).await?;
        let _ = outcomes.send(outcome);
        Ok(())
    })
    .with_priority(priority)
}

/// Submit every request, wait for all accepted ones, and return the
/// completed scan results. `submitted == completed + already_scanned + failed`.
pub async fn run_scan_batch(
    scanner: &WalletScanner,
    pool: &WorkerPool,
    requests: Vec<ScanRequest>,
    priority: i32,
) -> Result<(BatchSummary, Vec<WalletPnl>), PoolError> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut summary = BatchSummary::default();
    let mut handles = Vec::with_capacity(requests.len());

    for request in requests {
        let task = scan_task(scanner.clone(), request, priority, tx.clone());
        match pool.submit(task).await? {
            Submission::Accepted(handle) => {
                summary.submitted += 1;
                handles.push(handle);
            }
            Submission::Duplicate => summary.duplicates += 1,
        }
    }
    drop(tx);

    let states = join_all(handles.iter().map(|h| h.wait())).await;
    summary.failed = states
        .iter()
        .filter(|state| **state != TaskState::Completed)
        .count();

    let mut results = Vec::new();
    while let Ok(outcome) = rx.try_recv() {
        match outcome {
            ScanOutcome::Completed(pnl) => results.push(*pnl),
            ScanOutcome::AlreadyScanned => summary.already_scanned += 1,
        }
    }
    summary.completed = results.len();

    Ok((summary, results))
}
