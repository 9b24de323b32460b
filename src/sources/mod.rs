pub mod activity_client;
pub mod chain;
pub mod types;

pub use activity_client::{ActivityClient, ActivityClientConfig};
pub use chain::ChainProfile;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{ScanScope, TokenHolder, TouchedToken, TradeEvent};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid request URL: {0}")]
    Url(String),

    #[error("upstream returned code {code}: {msg}")]
    Api { code: i64, msg: String },

    #[error("unexpected response: {0}")]
    Unexpected(String),
}

/// Supplies a wallet's trade activity.
#[async_trait]
pub trait TradeEventSource: Send + Sync {
    /// Tokens the wallet traded within `scope`, newest activity first.
    /// Repeated addresses are allowed; the scanner replays each token once.
    /// Implementations follow the upstream cursor until it is exhausted or
    /// the scope's day window is crossed.
    async fn list_touched_tokens(
        &self,
        wallet: &str,
        scope: ScanScope,
    ) -> Result<Vec<TouchedToken>, SourceError>;

    /// The wallet's trade events in one token, in source order (newest first).
    async fn list_trade_events(
        &self,
        wallet: &str,
        token_address: &str,
    ) -> Result<Vec<TradeEvent>, SourceError>;
}

/// Supplies wallets worth scanning for a token.
#[async_trait]
pub trait HolderSource: Send + Sync {
    async fn top_holders(&self, token_address: &str) -> Result<Vec<TokenHolder>, SourceError>;

    async fn top_traders(&self, token_address: &str) -> Result<Vec<TokenHolder>, SourceError>;
}
