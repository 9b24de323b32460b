use rust_decimal::Decimal;
use std::collections::HashMap;
use std::env;
use std::time::Duration;

use crate::services::discovery::DiscoveryConfig;
use crate::services::wallet_tracker::TrackerConfig;
use crate::sources::ActivityClientConfig;
use crate::workerpool::PoolConfig;

const DEFAULT_ACTIVITY_API: &str = "https://gmgn.ai/defi/quotation/v1";

pub const SCAN_POOL: &str = "scan";
pub const TRACKER_POOL: &str = "tracker";

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Unset means scan results live in memory only.
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,
    pub api_token: Option<String>,

    // Activity feed
    pub activity_api_base: String,
    pub activity_api_headers: HashMap<String, String>,
    pub request_timeout_secs: u64,
    pub activity_page_limit: u32,
    pub max_events_per_token: usize,

    // Worker pool
    pub pool_min_workers: usize,
    pub pool_max_workers: usize,
    pub pool_scaling_interval_ms: u64,
    pub pool_cooldown_ms: u64,
    pub scan_task_timeout_secs: u64,

    // Wallet tracker
    pub tracker_chain: String,
    pub tracker_poll_interval_secs: u64,
    pub tracker_task_timeout_secs: u64,

    // Discovery
    pub big_xpnl_discovery_rate: Decimal,
    pub extra_excluded_tokens: Vec<String>,
}

fn var_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let activity_api_headers = match non_empty("ACTIVITY_API_HEADERS") {
            Some(raw) => serde_json::from_str(&raw)
                .map_err(|e| anyhow::anyhow!("ACTIVITY_API_HEADERS must be a JSON object of strings: {e}"))?,
            None => HashMap::new(),
        };

        let extra_excluded_tokens: Vec<String> = env::var("EXTRA_EXCLUDED_TOKENS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            database_url: non_empty("DATABASE_URL"),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()?,
            api_token: non_empty("API_TOKEN"),

            activity_api_base: env::var("ACTIVITY_API_BASE")
                .unwrap_or_else(|_| DEFAULT_ACTIVITY_API.into()),
            activity_api_headers,
            request_timeout_secs: var_or("REQUEST_TIMEOUT_SECS", 30),
            activity_page_limit: var_or("ACTIVITY_PAGE_LIMIT", 100),
            max_events_per_token: var_or("MAX_EVENTS_PER_TOKEN", 500),

            pool_min_workers: var_or("POOL_MIN_WORKERS", 4),
            pool_max_workers: var_or("POOL_MAX_WORKERS", 10),
            pool_scaling_interval_ms: var_or("POOL_SCALING_INTERVAL_MS", 5_000),
            pool_cooldown_ms: var_or("POOL_COOLDOWN_MS", 10_000),
            scan_task_timeout_secs: var_or("SCAN_TASK_TIMEOUT_SECS", 600),

            tracker_chain: env::var("TRACKER_CHAIN").unwrap_or_else(|_| "sol".into()),
            tracker_poll_interval_secs: var_or("TRACKER_POLL_INTERVAL_SECS", 30),
            tracker_task_timeout_secs: var_or("TRACKER_TASK_TIMEOUT_SECS", 3_600),

            big_xpnl_discovery_rate: var_or("BIG_XPNL_DISCOVERY_RATE", Decimal::from(51)),
            extra_excluded_tokens,
        })
    }

    /// Timeouts of zero disable the deadline.
    fn timeout(secs: u64) -> Option<Duration> {
        (secs > 0).then(|| Duration::from_secs(secs))
    }

    pub fn activity_client(&self, chain: &str) -> ActivityClientConfig {
        ActivityClientConfig {
            base_url: self.activity_api_base.trim_end_matches('/').to_string(),
            chain: chain.to_string(),
            headers: self.activity_api_headers.clone(),
            page_limit: self.activity_page_limit,
            max_events_per_token: self.max_events_per_token,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    pub fn scan_pool(&self) -> PoolConfig {
        PoolConfig {
            name: SCAN_POOL.into(),
            min_workers: self.pool_min_workers,
            max_workers: self.pool_max_workers,
            scaling_interval: Duration::from_millis(self.pool_scaling_interval_ms),
            cooldown: Duration::from_millis(self.pool_cooldown_ms),
            default_timeout: Self::timeout(self.scan_task_timeout_secs),
        }
    }

    pub fn tracker_pool(&self) -> PoolConfig {
        PoolConfig {
            name: TRACKER_POOL.into(),
            default_timeout: Self::timeout(self.tracker_task_timeout_secs),
            ..self.scan_pool()
        }
    }

    pub fn tracker(&self) -> TrackerConfig {
        TrackerConfig {
            poll_interval: Duration::from_secs(self.tracker_poll_interval_secs.max(1)),
            task_timeout: Self::timeout(self.tracker_task_timeout_secs),
            priority: 1,
        }
    }

    pub fn discovery(&self) -> DiscoveryConfig {
        DiscoveryConfig {
            interesting_rate: self.big_xpnl_discovery_rate,
            ..DiscoveryConfig::default()
        }
    }
}
