use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    pub data: Option<T>,
}

// ---------------------------------------------------------------------------
// Wallet activity feed
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ActivityPage {
    #[serde(default)]
    pub activities: Vec<ApiActivity>,
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiToken {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    /// USD price.
    #[serde(default)]
    pub price: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiActivity {
    #[serde(default)]
    pub tx_hash: Option<String>,
    pub timestamp: i64,
    pub event_type: String,
    pub token_address: String,
    #[serde(default)]
    pub token: Option<ApiToken>,
    #[serde(default)]
    pub token_amount: Option<String>,
    #[serde(default)]
    pub quote_amount: Option<String>,
    /// Token price in the quote asset.
    #[serde(default)]
    pub price: Option<Decimal>,
    /// Token price in USD at event time.
    #[serde(default)]
    pub price_usd: Option<Decimal>,
    #[serde(default)]
    pub quote_address: Option<String>,
}

impl ApiActivity {
    pub fn symbol(&self) -> String {
        self.token
            .as_ref()
            .and_then(|t| t.symbol.clone())
            .unwrap_or_default()
    }

    /// Current token price expressed in the quote asset:
    /// `current_usd * (price / price_usd)`.
    pub fn mark_price(&self) -> Decimal {
        let current_usd = self.token.as_ref().and_then(|t| t.price);
        match (current_usd, self.price, self.price_usd) {
            (Some(usd), Some(price), Some(price_usd)) if !price_usd.is_zero() => {
                usd * (price / price_usd)
            }
            (_, Some(price), _) => price,
            _ => Decimal::ZERO,
        }
    }
}

// ---------------------------------------------------------------------------
// Top holders / top traders
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiWallet {
    pub address: String,
    #[serde(default)]
    pub balance: Option<String>,
}

/// Parse an upstream amount string; accepts plain and scientific notation.
pub fn parse_amount(raw: Option<&str>) -> Option<Decimal> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount(Some("12.5")), Some(Decimal::new(125, 1)));
        assert_eq!(parse_amount(Some("1e-3")), Some(Decimal::new(1, 3)));
        assert_eq!(parse_amount(Some("")), None);
        assert_eq!(parse_amount(None), None);
    }

    #[test]
    fn test_activity_deserializes() {
        let raw = r#"{
            "timestamp": 1700000000,
            "event_type": "buy",
            "token_address": "Mint111",
            "token": {"address": "Mint111", "symbol": "MEME", "price": 0.002},
            "token_amount": "1000",
            "quote_amount": "0.5",
            "price": 0.0005,
            "price_usd": 0.001,
            "quote_address": "So11111111111111111111111111111111111111112"
        }"#;
        let activity: ApiActivity = serde_json::from_str(raw).unwrap();
        assert_eq!(activity.symbol(), "MEME");
        // 0.002 USD now, 0.0005 SOL per 0.001 USD at the time
        assert_eq!(activity.mark_price(), Decimal::new(1, 3));
    }

    #[test]
    fn test_mark_price_keeps_precision_for_tiny_prices() {
        let activity = ApiActivity {
            tx_hash: None,
            timestamp: 1_700_000_000,
            event_type: "buy".into(),
            token_address: "Mint111".into(),
            token: Some(ApiToken {
                address: None,
                symbol: None,
                price: Some(Decimal::new(1234, 12)),
            }),
            token_amount: None,
            quote_amount: None,
            price: Some(Decimal::new(123, 21)),
            price_usd: Some(Decimal::new(123, 18)),
            quote_address: None,
        };
        // quote/usd ratio is exactly 0.001
        assert_eq!(activity.mark_price(), Decimal::new(1234, 15));
    }
}
