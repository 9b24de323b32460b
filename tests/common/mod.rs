#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;

use pnlscan::db::{DocumentStore, MemoryStore};
use pnlscan::models::{ScanScope, Side, TokenHolder, TouchedToken, TradeEvent};
use pnlscan::pnl::WalletScanner;
use pnlscan::sources::{ChainProfile, HolderSource, SourceError, TradeEventSource};

pub const BASE_TS: i64 = 1_700_000_000;
pub const WSOL: &str = "So11111111111111111111111111111111111111112";
pub const USDC: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

/// Canned activity of one wallet. Events are written oldest first and
/// served newest first, like the real feed.
#[derive(Debug, Clone, Default)]
pub struct WalletScript {
    pub tokens: Vec<TouchedToken>,
    pub events: HashMap<String, Vec<TradeEvent>>,
    pub failing_tokens: HashSet<String>,
    pub fail_listing: bool,
}

impl WalletScript {
    pub fn token(mut self, address: &str, symbol: &str, mark_price: i64, events: Vec<TradeEvent>) -> Self {
        self.tokens.push(touched(address, symbol, mark_price));
        self.events.insert(address.to_string(), events);
        self
    }

    pub fn failing_token(mut self, address: &str) -> Self {
        self.tokens.push(touched(address, "BAD", 0));
        self.failing_tokens.insert(address.to_string());
        self
    }

    pub fn failing_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }
}

/// Scripted trade-event and holder source.
#[derive(Default)]
pub struct ScriptedSource {
    wallets: Mutex<HashMap<String, WalletScript>>,
    holders: Vec<TokenHolder>,
    event_delay: Option<Duration>,
    pub token_list_calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_wallet(self, wallet: &str, script: WalletScript) -> Self {
        self.set_wallet(wallet, script);
        self
    }

    pub fn with_holders(mut self, wallets: &[&str]) -> Self {
        self.holders = wallets
            .iter()
            .map(|w| TokenHolder {
                address: w.to_string(),
                balance: None,
            })
            .collect();
        self
    }

    pub fn with_event_delay(mut self, delay: Duration) -> Self {
        self.event_delay = Some(delay);
        self
    }

    pub fn set_wallet(&self, wallet: &str, script: WalletScript) {
        self.wallets.lock().unwrap().insert(wallet.to_string(), script);
    }

    pub fn list_calls(&self) -> usize {
        self.token_list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TradeEventSource for ScriptedSource {
    async fn list_touched_tokens(&self, wallet: &str, _scope: ScanScope) -> Result<Vec<TouchedToken>, SourceError> {
        self.token_list_calls.fetch_add(1, Ordering::SeqCst);
        let wallets = self.wallets.lock().unwrap();
        match wallets.get(wallet) {
            Some(script) if script.fail_listing => Err(SourceError::Unexpected("listing unavailable".into())),
            Some(script) => Ok(script.tokens.clone()),
            None => Ok(Vec::new()),
        }
    }

    async fn list_trade_events(&self, wallet: &str, token_address: &str) -> Result<Vec<TradeEvent>, SourceError> {
        if let Some(delay) = self.event_delay {
            tokio::time::sleep(delay).await;
        }
        let wallets = self.wallets.lock().unwrap();
        let Some(script) = wallets.get(wallet) else {
            return Ok(Vec::new());
        };
        if script.failing_tokens.contains(token_address) {
            return Err(SourceError::Unexpected(format!("no events for {token_address}")));
        }
        let mut events = script.events.get(token_address).cloned().unwrap_or_default();
        events.reverse();
        Ok(events)
    }
}

#[async_trait]
impl HolderSource for ScriptedSource {
    async fn top_holders(&self, _token_address: &str) -> Result<Vec<TokenHolder>, SourceError> {
        Ok(self.holders.clone())
    }

    async fn top_traders(&self, _token_address: &str) -> Result<Vec<TokenHolder>, SourceError> {
        Ok(self.holders.iter().rev().cloned().collect())
    }
}

pub fn touched(address: &str, symbol: &str, mark_price: i64) -> TouchedToken {
    TouchedToken {
        token_address: address.to_string(),
        token_symbol: symbol.to_string(),
        mark_price: Decimal::from(mark_price),
        last_active: BASE_TS,
    }
}

pub fn buy(tokens: i64, price: i64, step: i64) -> TradeEvent {
    TradeEvent::new(
        Side::Buy,
        Decimal::from(price),
        Decimal::from(tokens * price),
        Decimal::from(tokens),
        BASE_TS + step,
    )
    .with_quote(WSOL)
}

pub fn sell(tokens: i64, price: i64, step: i64) -> TradeEvent {
    TradeEvent::new(
        Side::Sell,
        Decimal::from(price),
        Decimal::from(tokens * price),
        Decimal::from(tokens),
        BASE_TS + step,
    )
    .with_quote(WSOL)
}

/// Doubles its money: multiplier 2.0.
pub fn big_win() -> Vec<TradeEvent> {
    vec![buy(10, 1, 0), sell(10, 2, 1)]
}

/// Profit of 10 on 20 spent: multiplier 1.5.
pub fn small_win() -> Vec<TradeEvent> {
    vec![buy(10, 2, 0), sell(10, 3, 1)]
}

/// Half the money lost.
pub fn loss() -> Vec<TradeEvent> {
    vec![buy(10, 2, 0), sell(10, 1, 1)]
}

pub fn scanner(source: Arc<ScriptedSource>, store: Arc<dyn DocumentStore>) -> WalletScanner {
    WalletScanner::new(source, store, ChainProfile::solana())
}

pub fn memory_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new())
}
