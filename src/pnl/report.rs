use std::fmt::Write;

use crate::models::{WalletPnl, XpnlRecord};

fn write_record(out: &mut String, record: &XpnlRecord, asset: &str) {
    let _ = writeln!(
        out,
        "{} - {}x | Trade: {}x",
        record.token_symbol,
        record.multiplier.round_dp(2),
        record.trade_multiplier.round_dp(2),
    );
    let _ = writeln!(
        out,
        "  Buys: {} | Sells: {} | Start: {} | End: {}",
        record.count_buy, record.count_sell, record.start_time, record.end_time,
    );
    let _ = writeln!(
        out,
        "  Bought: {} {asset} | Sold: {} {asset} | Sold (actual): {} {asset}",
        record.total_counter_buy.round_dp(2),
        record.total_counter_sell.round_dp(2),
        record.total_counter_sell_actual.round_dp(2),
    );
    let _ = writeln!(
        out,
        "  Profit: {} {asset} | Profit (actual): {} {asset}",
        record.profit.round_dp(2),
        record.profit_actual.round_dp(2),
    );
    let _ = writeln!(
        out,
        "  xPNL rate: {}% | Trade rate: {}%",
        record.multiplier_rate.round_dp(2),
        record.trade_multiplier_rate.round_dp(2),
    );
}

/// Human-readable win/loss report of one wallet scan.
pub fn render(pnl: &WalletPnl, counter_asset: &str) -> String {
    let mut out = String::new();
    let summary = &pnl.summary_review;

    let _ = writeln!(out, "Wallet {} ({}, {})", pnl.wallet_address, pnl.chain, pnl.scope);

    let _ = writeln!(out, "WIN ..............................................");
    for record in &pnl.xpnls {
        write_record(&mut out, record, counter_asset);
    }
    let _ = writeln!(out, "LOST ..............................................");
    for record in &pnl.lost_xpnls {
        write_record(&mut out, record, counter_asset);
    }

    let _ = writeln!(
        out,
        "Total win: {} | Total lost: {} | Win rate: {}%",
        summary.total_win,
        summary.total_loss,
        summary.win_rate.round_dp(2),
    );
    let _ = writeln!(
        out,
        "PNL: {} {counter_asset} | PNL (actual): {} {counter_asset}",
        summary.total_pnl.round_dp(2),
        summary.total_pnl_actual.round_dp(2),
    );
    let _ = write!(
        out,
        "Big xPNL: {} | Big xPNL rate: {}%",
        summary.big_xpnl,
        summary.big_xpnl_rate.round_dp(2),
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScanScope;
    use rust_decimal::Decimal;

    #[test]
    fn test_render_lists_wins_and_summary() {
        let mut pnl = WalletPnl::new("Wallet111", "sol", ScanScope::LastNDays(30));
        pnl.xpnls.push(XpnlRecord {
            token_symbol: "MEME".into(),
            multiplier: Decimal::new(2500, 3),
            profit: Decimal::new(15, 1),
            ..Default::default()
        });
        pnl.summary_review.total_win = 1;
        pnl.summary_review.big_xpnl = 1;
        pnl.summary_review.finalize_rates();

        let text = render(&pnl, "SOL");
        assert!(text.starts_with("Wallet Wallet111 (sol, 30d)"));
        assert!(text.contains("MEME - 2.50x"));
        assert!(text.contains("Profit: 1.5 SOL"));
        assert!(text.contains("Win rate: 100%"));
    }
}
