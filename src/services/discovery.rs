use std::fmt;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;

use super::{run_scan_batch, BatchSummary};
use crate::db::wallet_repo;
use crate::models::{ScanRequest, ScanScope};
use crate::pnl::WalletScanner;
use crate::sources::HolderSource;
use crate::workerpool::WorkerPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanType {
    TopHolders,
    TopTraders,
}

impl ScanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanType::TopHolders => "topholders",
            ScanType::TopTraders => "toptraders",
        }
    }
}

impl fmt::Display for ScanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Window scanned for every discovered wallet.
    pub scope: ScanScope,
    /// Wallets whose big-xPNL rate exceeds this are recorded.
    pub interesting_rate: Decimal,
    pub priority: i32,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            scope: ScanScope::LastNDays(30),
            interesting_rate: Decimal::from(51),
            priority: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryReport {
    pub token_address: String,
    pub scan_type: ScanType,
    /// The token had already been scanned for this list.
    pub skipped: bool,
    pub wallets: usize,
    pub batch: BatchSummary,
    pub interesting: Vec<String>,
}

/// Finds wallets worth following by scanning a token's top holders or traders.
pub struct DiscoveryService {
    scanner: WalletScanner,
    holders: Arc<dyn HolderSource>,
    pool: WorkerPool,
    config: DiscoveryConfig,
}

impl DiscoveryService {
    pub fn new(
        scanner: WalletScanner,
        holders: Arc<dyn HolderSource>,
        pool: WorkerPool,
        config: DiscoveryConfig,
    ) -> Self {
        Self {
            scanner,
            holders,
            pool,
            config,
        }
    }

    pub async fn scan_top_holders(&self, token_address: &str) -> anyhow::Result<DiscoveryReport> {
        self.scan_token(token_address, ScanType::TopHolders).await
    }

    pub async fn scan_top_traders(&self, token_address: &str) -> anyhow::Result<DiscoveryReport> {
        self.scan_token(token_address, ScanType::TopTraders).await
    }

    async fn scan_token(&self, token_address: &str, scan_type: ScanType) -> anyhow::Result<DiscoveryReport> {
        let store = self.scanner.store().as_ref();
        let chain = self.scanner.chain();

        let mut report = DiscoveryReport {
            token_address: token_address.to_string(),
            scan_type,
            skipped: false,
            wallets: 0,
            batch: BatchSummary::default(),
            interesting: Vec::new(),
        };

        if wallet_repo::scan_marker_exists(store, chain, token_address, scan_type.as_str()).await? {
            tracing::info!(token = %token_address, scan_type = %scan_type, "Token already scanned, skipping");
            report.skipped = true;
            return Ok(report);
        }

        let wallets = match scan_type {
            ScanType::TopHolders => self.holders.top_holders(token_address).await?,
            ScanType::TopTraders => self.holders.top_traders(token_address).await?,
        };
        report.wallets = wallets.len();
        tracing::info!(
            token = %token_address,
            scan_type = %scan_type,
            wallets = wallets.len(),
            "Scanning token wallets"
        );

        let requests = wallets
            .into_iter()
            .map(|w| ScanRequest::new(w.address, self.config.scope))
            .collect();
        let (batch, results) =
            run_scan_batch(&self.scanner, &self.pool, requests, self.config.priority).await?;
        report.batch = batch;

        for pnl in results
            .iter()
            .filter(|p| p.summary_review.big_xpnl_rate > self.config.interesting_rate)
        {
            wallet_repo::upsert_interesting_wallet(store, pnl).await?;
            tracing::info!(
                wallet = %pnl.wallet_address,
                big_xpnl_rate = %pnl.summary_review.big_xpnl_rate,
                "Interesting wallet found"
            );
            report.interesting.push(pnl.wallet_address.clone());
        }

        wallet_repo::insert_scan_marker(store, chain, token_address, scan_type.as_str()).await?;
        tracing::info!(
            token = %token_address,
            scan_type = %scan_type,
            completed = report.batch.completed,
            already_scanned = report.batch.already_scanned,
            failed = report.batch.failed,
            interesting = report.interesting.len(),
            "Token wallet scan finished"
        );
        Ok(report)
    }
}
