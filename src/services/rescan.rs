use super::{run_scan_batch, BatchSummary};
use crate::db::wallet_repo;
use crate::models::{ScanRequest, ScanScope};
use crate::pnl::WalletScanner;
use crate::workerpool::WorkerPool;

/// Re-run the all-time scan of every wallet already in the all-time
/// collection, bypassing the dedup guard.
pub async fn rescan_all_time(scanner: &WalletScanner, pool: &WorkerPool) -> anyhow::Result<BatchSummary> {
    let wallets = wallet_repo::list_wallet_addresses(
        scanner.store().as_ref(),
        scanner.chain(),
        ScanScope::AllTime,
        None,
    )
    .await?;

    tracing::info!(chain = %scanner.chain(), wallets = wallets.len(), "Rescanning all-time wallets");

    let requests = wallets.into_iter().map(ScanRequest::all_time_rescan).collect();
    let (summary, _) = run_scan_batch(scanner, pool, requests, 0).await?;

    tracing::info!(
        chain = %scanner.chain(),
        completed = summary.completed,
        already_scanned = summary.already_scanned,
        failed = summary.failed,
        "All-time rescan finished"
    );
    Ok(summary)
}
