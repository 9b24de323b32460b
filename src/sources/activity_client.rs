use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;

use super::types::{parse_amount, ActivityPage, ApiActivity, ApiEnvelope, ApiWallet};
use super::{HolderSource, SourceError, TradeEventSource};
use crate::models::{ScanScope, Side, TokenHolder, TouchedToken, TradeEvent};

const DEFAULT_API_BASE: &str = "https://gmgn.ai/defi/quotation/v1";

/// Explicit client configuration, built once at startup.
#[derive(Debug, Clone)]
pub struct ActivityClientConfig {
    pub base_url: String,
    pub chain: String,
    /// Extra request headers sent with every call.
    pub headers: HashMap<String, String>,
    pub page_limit: u32,
    pub max_events_per_token: usize,
    pub request_timeout: Duration,
}

impl ActivityClientConfig {
    pub fn new(chain: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_API_BASE.into(),
            chain: chain.into(),
            headers: HashMap::new(),
            page_limit: 100,
            max_events_per_token: 500,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// HTTP adapter over a DEX-analytics wallet activity feed.
#[derive(Debug, Clone)]
pub struct ActivityClient {
    http: Client,
    config: ActivityClientConfig,
}

impl ActivityClient {
    pub fn new(config: ActivityClientConfig) -> Result<Self, SourceError> {
        let mut headers = HeaderMap::new();
        headers.insert("accept", HeaderValue::from_static("application/json"));
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| SourceError::Unexpected(format!("bad header name {name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| SourceError::Unexpected(format!("bad header value: {e}")))?;
            headers.insert(name, value);
        }

        let http = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self { http, config })
    }

    pub fn chain(&self) -> &str {
        &self.config.chain
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, SourceError> {
        tracing::debug!(url = %url, "Activity API request");
        let envelope: ApiEnvelope<T> = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if envelope.code != 0 {
            return Err(SourceError::Api {
                code: envelope.code,
                msg: envelope.msg,
            });
        }
        envelope
            .data
            .ok_or_else(|| SourceError::Unexpected("response has no data".into()))
    }

    async fn activity_page(
        &self,
        wallet: &str,
        token: Option<&str>,
        cursor: Option<&str>,
    ) -> Result<ActivityPage, SourceError> {
        let limit = self.config.page_limit.to_string();
        let mut params: Vec<(&str, &str)> = vec![
            ("type", "buy"),
            ("type", "sell"),
            ("wallet", wallet),
            ("limit", limit.as_str()),
        ];
        if let Some(token) = token {
            params.push(("token", token));
        }
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor));
        }

        let base = format!("{}/wallet_activity/{}", self.config.base_url, self.config.chain);
        let url = Url::parse_with_params(&base, &params).map_err(|e| SourceError::Url(e.to_string()))?;
        self.get(url).await
    }

    async fn wallet_list(&self, path: &str, token: &str, orderby: &str) -> Result<Vec<TokenHolder>, SourceError> {
        let base = format!("{}/tokens/{}/{}/{}", self.config.base_url, path, self.config.chain, token);
        let limit = self.config.page_limit.to_string();
        let params = [
            ("limit", limit.as_str()),
            ("tag", "All"),
            ("orderby", orderby),
            ("direction", "desc"),
        ];
        let url = Url::parse_with_params(&base, &params).map_err(|e| SourceError::Url(e.to_string()))?;
        let wallets: Vec<ApiWallet> = self.get(url).await?;

        Ok(wallets
            .into_iter()
            .map(|w| TokenHolder {
                balance: parse_amount(w.balance.as_deref()),
                address: w.address,
            })
            .collect())
    }
}

fn to_trade_event(activity: &ApiActivity) -> Option<TradeEvent> {
    let side = Side::from_api_str(&activity.event_type)?;
    let event = TradeEvent::new(
        side,
        activity.price.unwrap_or_default(),
        parse_amount(activity.quote_amount.as_deref()).unwrap_or_default(),
        parse_amount(activity.token_amount.as_deref()).unwrap_or_default(),
        activity.timestamp,
    );
    Some(match &activity.quote_address {
        Some(quote) => event.with_quote(quote.clone()),
        None => event,
    })
}

#[async_trait]
impl TradeEventSource for ActivityClient {
    async fn list_touched_tokens(
        &self,
        wallet: &str,
        scope: ScanScope,
    ) -> Result<Vec<TouchedToken>, SourceError> {
        let cutoff = match scope {
            ScanScope::AllTime => None,
            ScanScope::LastNDays(n) => Some(Utc::now().timestamp() - i64::from(n) * 86_400),
        };

        let mut seen = HashSet::new();
        let mut tokens = Vec::new();
        let mut cursor: Option<String> = None;

        'pages: loop {
            let page = self.activity_page(wallet, None, cursor.as_deref()).await?;

            for activity in &page.activities {
                if cutoff.is_some_and(|c| activity.timestamp < c) {
                    break 'pages;
                }
                if seen.insert(activity.token_address.clone()) {
                    tokens.push(TouchedToken {
                        token_address: activity.token_address.clone(),
                        token_symbol: activity.symbol(),
                        mark_price: activity.mark_price(),
                        last_active: activity.timestamp,
                    });
                }
            }

            match page.next {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        tracing::debug!(wallet = %wallet, scope = %scope, tokens = tokens.len(), "Listed touched tokens");
        Ok(tokens)
    }

    async fn list_trade_events(
        &self,
        wallet: &str,
        token_address: &str,
    ) -> Result<Vec<TradeEvent>, SourceError> {
        let cap = self.config.max_events_per_token;
        let mut events = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = self.activity_page(wallet, Some(token_address), cursor.as_deref()).await?;
            events.extend(page.activities.iter().filter_map(to_trade_event));

            if events.len() >= cap {
                events.truncate(cap);
                break;
            }
            match page.next {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        Ok(events)
    }
}

#[async_trait]
impl HolderSource for ActivityClient {
    async fn top_holders(&self, token_address: &str) -> Result<Vec<TokenHolder>, SourceError> {
        self.wallet_list("top_holders", token_address, "amount_percentage").await
    }

    async fn top_traders(&self, token_address: &str) -> Result<Vec<TokenHolder>, SourceError> {
        self.wallet_list("top_traders", token_address, "realized_profit").await
    }
}
