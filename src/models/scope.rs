use std::fmt;

use serde::{Deserialize, Serialize};

/// Time window covered by a wallet scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanScope {
    AllTime,
    LastNDays(u32),
}

impl ScanScope {
    /// `0` means all-time, anything else a trailing window of that many days.
    pub fn from_days(days: u32) -> Self {
        if days == 0 {
            ScanScope::AllTime
        } else {
            ScanScope::LastNDays(days)
        }
    }

    /// Collection holding summaries for this scope on `chain`.
    pub fn collection(&self, chain: &str) -> String {
        match self {
            ScanScope::AllTime => format!("all_time_pnl_wallet_{chain}"),
            ScanScope::LastNDays(n) => format!("{n}_day_pnl_wallet_{chain}"),
        }
    }

    /// Parse the path form used by the HTTP API: `all_time` or `<n>d`.
    pub fn parse(s: &str) -> Option<Self> {
        if s == "all_time" {
            return Some(ScanScope::AllTime);
        }
        s.strip_suffix('d')
            .and_then(|n| n.parse::<u32>().ok())
            .filter(|n| *n > 0)
            .map(ScanScope::LastNDays)
    }
}

impl fmt::Display for ScanScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanScope::AllTime => f.write_str("all_time"),
            ScanScope::LastNDays(n) => write!(f, "{n}d"),
        }
    }
}

/// One wallet scan invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    pub wallet: String,
    pub scope: ScanScope,
    /// Only honoured for [`ScanScope::AllTime`].
    pub force_rescan: bool,
}

impl ScanRequest {
    pub fn new(wallet: impl Into<String>, scope: ScanScope) -> Self {
        Self {
            wallet: wallet.into(),
            scope,
            force_rescan: false,
        }
    }

    pub fn all_time_rescan(wallet: impl Into<String>) -> Self {
        Self {
            wallet: wallet.into(),
            scope: ScanScope::AllTime,
            force_rescan: true,
        }
    }

    /// CLI request for a `days` window. An all-time scan (`days == 0`)
    /// always refreshes the stored record.
    pub fn for_days(wallet: impl Into<String>, days: u32) -> Self {
        match ScanScope::from_days(days) {
            ScanScope::AllTime => Self::all_time_rescan(wallet),
            scope => Self::new(wallet, scope),
        }
    }

    pub fn bypasses_dedup(&self) -> bool {
        self.force_rescan && self.scope == ScanScope::AllTime
    }

    /// Stable identity for worker-pool duplicate suppression.
    pub fn dedup_key(&self, chain: &str) -> String {
        format!("{chain}:{}:{}", self.wallet, self.scope)
    }
}
