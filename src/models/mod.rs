pub mod pnl;
pub mod scope;

pub use pnl::{TradeHistory, WalletPnl, WalletSummary, XpnlRecord};
pub use scope::{ScanRequest, ScanScope};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Side
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn from_api_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "buy" => Some(Side::Buy),
            "sell" => Some(Side::Sell),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

// ---------------------------------------------------------------------------
// TradeEvent: one observed leg of a wallet's trading in one token market
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEvent {
    pub side: Side,
    /// Token price in the counter asset at event time.
    pub price: Decimal,
    /// Counter-asset amount transacted.
    pub counter_amount: Decimal,
    /// Token amount transacted.
    pub token_amount: Decimal,
    /// Unix seconds.
    pub timestamp: i64,
    pub datetime: String,
    /// Quote asset address as reported by the source, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote_address: Option<String>,
}

impl TradeEvent {
    pub fn new(
        side: Side,
        price: Decimal,
        counter_amount: Decimal,
        token_amount: Decimal,
        timestamp: i64,
    ) -> Self {
        Self {
            side,
            price,
            counter_amount: counter_amount.abs(),
            token_amount: token_amount.abs(),
            timestamp,
            datetime: format_timestamp(timestamp),
            quote_address: None,
        }
    }

    pub fn with_quote(mut self, quote_address: impl Into<String>) -> Self {
        self.quote_address = Some(quote_address.into());
        self
    }
}

impl fmt::Display for TradeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} tokens={} counter={} price={} at {}",
            self.side, self.token_amount, self.counter_amount, self.price, self.datetime,
        )
    }
}

/// Render unix seconds as `YYYY-MM-DD HH:MM:SS` (UTC).
pub fn format_timestamp(ts: i64) -> String {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Source listings
// ---------------------------------------------------------------------------

/// A token the wallet has traded, as listed by the activity feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TouchedToken {
    pub token_address: String,
    pub token_symbol: String,
    /// Current token price in the counter asset, used to value held balances.
    pub mark_price: Decimal,
    /// Timestamp of the activity that surfaced this token.
    pub last_active: i64,
}

/// A wallet surfaced by a top-holder or top-trader listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenHolder {
    pub address: String,
    #[serde(default)]
    pub balance: Option<Decimal>,
}
