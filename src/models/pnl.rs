use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{ScanScope, TradeEvent};

/// Multiplier at or above which a token outcome counts as a big win.
pub const BIG_XPNL_THRESHOLD: Decimal = Decimal::TWO;

/// Finalized outcome for one (wallet, token) pair.
///
/// Winning tokens land in `WalletPnl::xpnls`, losing ones in
/// `WalletPnl::lost_xpnls`; the record shape is the same for both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct XpnlRecord {
    pub token_address: String,
    pub token_symbol: String,
    pub count_buy: u32,
    /// Sells that consumed a non-zero tracked balance.
    pub count_sell: u32,
    /// Every sell event, including oversells against an empty balance.
    pub count_sell_actual: u32,
    pub total_token_buy: Decimal,
    pub total_token_sell: Decimal,
    pub total_token_sell_actual: Decimal,
    pub total_counter_buy: Decimal,
    pub total_counter_sell: Decimal,
    pub total_counter_sell_actual: Decimal,
    pub held_amount: Decimal,
    pub held_value: Decimal,
    /// Realized + unrealized profit with sells capped at the tracked balance.
    pub profit: Decimal,
    /// Same as `profit` but using the raw reported sell totals.
    pub profit_actual: Decimal,
    pub multiplier: Decimal,
    pub multiplier_rate: Decimal,
    pub first_buy_price: Decimal,
    pub best_sell_price: Decimal,
    pub trade_multiplier: Decimal,
    pub trade_multiplier_rate: Decimal,
    pub start_time: String,
    pub end_time: String,
}

impl XpnlRecord {
    /// Value-based or price-based multiplier reached the big-win threshold.
    pub fn is_big(&self) -> bool {
        self.multiplier >= BIG_XPNL_THRESHOLD || self.trade_multiplier >= BIG_XPNL_THRESHOLD
    }
}

/// Chronological event log of one token, kept alongside the outcome records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeHistory {
    pub token_address: String,
    pub token_symbol: String,
    pub event_trades: Vec<TradeEvent>,
    pub start_time: String,
    pub end_time: String,
}

/// Aggregate win/loss statistics across all tokens of one wallet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WalletSummary {
    pub total_win: u32,
    pub total_loss: u32,
    pub win_rate: Decimal,
    pub total_pnl: Decimal,
    pub total_pnl_actual: Decimal,
    pub big_xpnl: u32,
    pub big_xpnl_rate: Decimal,
}

impl WalletSummary {
    pub fn total_tokens(&self) -> u32 {
        self.total_win + self.total_loss
    }

    /// Recompute `win_rate` and `big_xpnl_rate` from the counters.
    /// Both stay at zero when no token has been classified.
    pub fn finalize_rates(&mut self) {
        let total = self.total_tokens();
        if total == 0 {
            self.win_rate = Decimal::ZERO;
            self.big_xpnl_rate = Decimal::ZERO;
            return;
        }
        let total = Decimal::from(total);
        self.win_rate = Decimal::from(self.total_win) / total * Decimal::ONE_HUNDRED;
        self.big_xpnl_rate = Decimal::from(self.big_xpnl) / total * Decimal::ONE_HUNDRED;
    }
}

/// Full result of one wallet scan; this is the persisted document body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletPnl {
    pub wallet_address: String,
    pub chain: String,
    pub scope: ScanScope,
    pub trade_history: Vec<TradeHistory>,
    pub xpnls: Vec<XpnlRecord>,
    pub lost_xpnls: Vec<XpnlRecord>,
    pub summary_review: WalletSummary,
    pub scanned_at: DateTime<Utc>,
}

impl WalletPnl {
    pub fn new(wallet_address: impl Into<String>, chain: impl Into<String>, scope: ScanScope) -> Self {
        Self {
            wallet_address: wallet_address.into(),
            chain: chain.into(),
            scope,
            trade_history: Vec::new(),
            xpnls: Vec::new(),
            lost_xpnls: Vec::new(),
            summary_review: WalletSummary::default(),
            scanned_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_win_rate_three_of_four() {
        let mut summary = WalletSummary {
            total_win: 3,
            total_loss: 1,
            ..Default::default()
        };
        summary.finalize_rates();
        assert_eq!(summary.win_rate, Decimal::from(75));
    }

    #[test]
    fn test_rates_zero_without_tokens() {
        let mut summary = WalletSummary::default();
        summary.finalize_rates();
        assert_eq!(summary.win_rate, Decimal::ZERO);
        assert_eq!(summary.big_xpnl_rate, Decimal::ZERO);
    }

    #[test]
    fn test_big_rate() {
        let mut summary = WalletSummary {
            total_win: 1,
            total_loss: 3,
            big_xpnl: 1,
            ..Default::default()
        };
        summary.finalize_rates();
        assert_eq!(summary.big_xpnl_rate, Decimal::from(25));
    }
}
