use serde_json::json;

use super::store::{filter_eq, DocumentStore, Filter, SortBy, StoreError};
use crate::models::{ScanScope, WalletPnl};

pub fn token_scan_collection(chain: &str) -> String {
    format!("token_scan_{chain}")
}

pub fn interesting_wallets_collection(chain: &str) -> String {
    format!("interesting_wallets_{chain}")
}

/// Stored scan result for `wallet` in `scope`, if any.
pub async fn find_wallet_pnl(
    store: &dyn DocumentStore,
    chain: &str,
    scope: ScanScope,
    wallet: &str,
) -> Result<Option<WalletPnl>, StoreError> {
    let doc = store
        .find_one(&scope.collection(chain), &filter_eq("wallet_address", wallet))
        .await?;
    match doc {
        Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
        None => Ok(None),
    }
}

pub async fn wallet_pnl_exists(
    store: &dyn DocumentStore,
    chain: &str,
    scope: ScanScope,
    wallet: &str,
) -> Result<bool, StoreError> {
    let doc = store
        .find_one(&scope.collection(chain), &filter_eq("wallet_address", wallet))
        .await?;
    Ok(doc.is_some())
}

/// Upsert a scan result on `wallet_address` in its scope collection.
pub async fn save_wallet_pnl(store: &dyn DocumentStore, pnl: &WalletPnl) -> Result<(), StoreError> {
    let body = serde_json::to_value(pnl)?;
    store
        .upsert(
            &pnl.scope.collection(&pnl.chain),
            &filter_eq("wallet_address", pnl.wallet_address.as_str()),
            body,
        )
        .await
}

fn scan_marker(token_address: &str, scan_type: &str) -> Filter {
    let mut filter = filter_eq("token_address", token_address);
    filter.insert("scan_type".into(), scan_type.into());
    filter
}

pub async fn scan_marker_exists(
    store: &dyn DocumentStore,
    chain: &str,
    token_address: &str,
    scan_type: &str,
) -> Result<bool, StoreError> {
    let found = store
        .find_one(&token_scan_collection(chain), &scan_marker(token_address, scan_type))
        .await?;
    Ok(found.is_some())
}

pub async fn insert_scan_marker(
    store: &dyn DocumentStore,
    chain: &str,
    token_address: &str,
    scan_type: &str,
) -> Result<String, StoreError> {
    let doc = json!({
        "token_address": token_address,
        "scan_type": scan_type,
        "scanned_at": chrono::Utc::now(),
    });
    store.insert_one(&token_scan_collection(chain), doc).await
}

pub async fn upsert_interesting_wallet(store: &dyn DocumentStore, pnl: &WalletPnl) -> Result<(), StoreError> {
    let doc = json!({
        "chain": pnl.chain,
        "scope": pnl.scope.to_string(),
        "summary_review": pnl.summary_review,
        "found_at": chrono::Utc::now(),
    });
    store
        .upsert(
            &interesting_wallets_collection(&pnl.chain),
            &filter_eq("wallet_address", pnl.wallet_address.as_str()),
            doc,
        )
        .await
}

/// Wallet addresses stored for `scope`, most recently scanned first.
pub async fn list_wallet_addresses(
    store: &dyn DocumentStore,
    chain: &str,
    scope: ScanScope,
    limit: Option<i64>,
) -> Result<Vec<String>, StoreError> {
    let docs = store
        .find_many(
            &scope.collection(chain),
            &Filter::new(),
            limit,
            Some(SortBy::desc("scanned_at")),
        )
        .await?;

    Ok(docs
        .iter()
        .filter_map(|d| d.get("wallet_address").and_then(|v| v.as_str()))
        .map(str::to_string)
        .collect())
}
