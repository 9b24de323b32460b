use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use metrics::{counter, histogram};
use thiserror::Error;

use super::replay::{replay, Replay};
use super::report;
use crate::db::{wallet_repo, DocumentStore, StoreError};
use crate::models::{ScanRequest, TouchedToken, TradeHistory, WalletPnl};
use crate::sources::{ChainProfile, SourceError, TradeEventSource};
use crate::workerpool::{CancelReason, CancelSignal};

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to list tokens for wallet {wallet}: {source}")]
    FatalFetch {
        wallet: String,
        #[source]
        source: SourceError,
    },

    #[error("scan of wallet {wallet} stopped: {reason:?}")]
    Canceled { wallet: String, reason: CancelReason },

    /// The scan finished but could not be stored; the result is kept so the
    /// caller can retry the write.
    #[error("failed to persist scan of wallet {}: {source}", report.wallet_address)]
    Persist {
        report: Box<WalletPnl>,
        #[source]
        source: StoreError,
    },

    #[error("scan ledger lookup failed: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    Completed(Box<WalletPnl>),
    /// A result for this wallet and scope is already stored.
    AlreadyScanned,
}

/// Fold one token's replay result into the running wallet result.
pub fn fold_replay(pnl: &mut WalletPnl, outcome: Replay) {
    let summary = &mut pnl.summary_review;
    match outcome {
        Replay::Win(record) => {
            summary.total_win += 1;
            summary.total_pnl += record.profit;
            summary.total_pnl_actual += record.profit_actual;
            if record.is_big() {
                summary.big_xpnl += 1;
            }
            pnl.xpnls.push(record);
        }
        Replay::Loss(record) => {
            summary.total_loss += 1;
            summary.total_pnl += record.profit;
            summary.total_pnl_actual += record.profit_actual;
            if record.is_big() {
                summary.big_xpnl += 1;
            }
            pnl.lost_xpnls.push(record);
        }
        Replay::Skipped => {}
    }
}

/// Reconstructs a wallet's per-token PNL on one chain and records it in the scan ledger.
#[derive(Clone)]
pub struct WalletScanner {
    source: Arc<dyn TradeEventSource>,
    store: Arc<dyn DocumentStore>,
    profile: ChainProfile,
}

impl WalletScanner {
    pub fn new(
        source: Arc<dyn TradeEventSource>,
        store: Arc<dyn DocumentStore>,
        profile: ChainProfile,
    ) -> Self {
        Self {
            source,
            store,
            profile,
        }
    }

    pub fn chain(&self) -> &str {
        &self.profile.chain
    }

    pub fn profile(&self) -> &ChainProfile {
        &self.profile
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub async fn scan_wallet(
        &self,
        request: &ScanRequest,
        cancel: &CancelSignal,
    ) -> Result<ScanOutcome, ScanError> {
        let chain = self.chain();
        let wallet = self.profile.normalize(&request.wallet);

        if !request.bypasses_dedup()
            && wallet_repo::wallet_pnl_exists(self.store.as_ref(), chain, request.scope, &wallet).await?
        {
            tracing::info!(wallet = %wallet, scope = %request.scope, "Wallet already scanned, skipping");
            return Ok(ScanOutcome::AlreadyScanned);
        }

        let started = Instant::now();
        let tokens = self
            .source
            .list_touched_tokens(&wallet, request.scope)
            .await
            .map_err(|source| ScanError::FatalFetch {
                wallet: wallet.clone(),
                source,
            })?;

        tracing::info!(
            wallet = %wallet,
            chain = %chain,
            scope = %request.scope,
            tokens = tokens.len(),
            "Scanning wallet"
        );

        let mut pnl = WalletPnl::new(wallet.clone(), chain, request.scope);
        let mut seen = HashSet::with_capacity(tokens.len());
        for (idx, token) in tokens.iter().enumerate() {
            if let Some(reason) = cancel.reason() {
                tracing::warn!(wallet = %wallet, processed = idx, ?reason, "Wallet scan stopped");
                return Err(ScanError::Canceled { wallet, reason });
            }
            // first listing of an address wins
            if !seen.insert(self.profile.normalize(&token.token_address)) {
                continue;
            }
            if self.profile.is_excluded(&token.token_address) {
                tracing::debug!(token = %token.token_address, "Excluded token skipped");
                continue;
            }
            self.scan_token(&mut pnl, &wallet, token).await;
        }

        pnl.summary_review.finalize_rates();
        pnl.scanned_at = Utc::now();

        counter!("wallet_scans_total").increment(1);
        histogram!("wallet_scan_seconds").record(started.elapsed().as_secs_f64());
        tracing::info!(wallet = %wallet, "\n{}", report::render(&pnl, &self.profile.counter_asset_symbol));

        if let Err(source) = wallet_repo::save_wallet_pnl(self.store.as_ref(), &pnl).await {
            tracing::error!(wallet = %wallet, error = %source, "Failed to persist wallet scan");
            return Err(ScanError::Persist {
                report: Box::new(pnl),
                source,
            });
        }

        Ok(ScanOutcome::Completed(Box::new(pnl)))
    }

    /// Fetch, replay and fold one token. Fetch errors only drop this token.
    async fn scan_token(&self, pnl: &mut WalletPnl, wallet: &str, token: &TouchedToken) {
        let mut events = match self.source.list_trade_events(wallet, &token.token_address).await {
            Ok(events) => events,
            Err(e) => {
                tracing::warn!(
                    wallet = %wallet,
                    token = %token.token_address,
                    error = %e,
                    "Failed to fetch token events, skipping token"
                );
                return;
            }
        };

        // Sources return newest first.
        events.reverse();
        events.retain(|e| self.profile.accepts_quote(e.quote_address.as_deref()));

        let outcome = replay(&token.token_address, &token.token_symbol, &events, token.mark_price);
        counter!("token_replays_total").increment(1);

        let Some(record) = outcome.record() else {
            tracing::debug!(token = %token.token_address, "No replayable events");
            return;
        };
        tracing::debug!(
            wallet = %wallet,
            token = %token.token_address,
            profit = %record.profit,
            multiplier = %record.multiplier,
            "Token replayed"
        );

        pnl.trade_history.push(TradeHistory {
            token_address: token.token_address.clone(),
            token_symbol: token.token_symbol.clone(),
            start_time: record.start_time.clone(),
            end_time: record.end_time.clone(),
            event_trades: events,
        });
        fold_replay(pnl, outcome);
    }
}
