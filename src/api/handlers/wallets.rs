use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use super::ApiResponse;
use crate::db::wallet_repo;
use crate::errors::AppError;
use crate::models::{ScanScope, WalletPnl};
use crate::sources::ChainProfile;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ChainQuery {
    pub chain: Option<String>,
}

pub async fn detail(
    State(state): State<AppState>,
    Path((scope, address)): Path<(String, String)>,
    Query(query): Query<ChainQuery>,
) -> Result<Json<ApiResponse<WalletPnl>>, AppError> {
    let scope = ScanScope::parse(&scope)
        .ok_or_else(|| AppError::BadRequest(format!("invalid scope {scope}, expected all_time or <n>d")))?;
    let chain = query.chain.unwrap_or_else(|| "sol".into());
    let profile = ChainProfile::from_chain(&chain)
        .ok_or_else(|| AppError::BadRequest(format!("unsupported chain {chain}")))?;
    let address = profile.normalize(&address);
    let chain = profile.chain;

    match wallet_repo::find_wallet_pnl(state.store.as_ref(), &chain, scope, &address).await? {
        Some(pnl) => Ok(Json(ApiResponse::ok(pnl))),
        None => Err(AppError::NotFound(format!("no {scope} scan for wallet {address} on {chain}"))),
    }
}
