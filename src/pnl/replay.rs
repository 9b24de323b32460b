use rust_decimal::Decimal;

use crate::models::{Side, TradeEvent, XpnlRecord};

/// Float-noise guard around zero profit (1e-9).
pub const EPSILON: Decimal = Decimal::from_parts(1, 0, 0, false, 9);

/// Result of replaying one token's event stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Replay {
    Win(XpnlRecord),
    Loss(XpnlRecord),
    /// No replayable events; contributes nothing to the wallet summary.
    Skipped,
}

impl Replay {
    pub fn record(&self) -> Option<&XpnlRecord> {
        match self {
            Replay::Win(r) | Replay::Loss(r) => Some(r),
            Replay::Skipped => None,
        }
    }
}

/// Win iff capped profit clears epsilon, or capped profit does not but the
/// uncapped profit does. The capped figure is always consulted first.
pub fn is_win(profit: Decimal, profit_actual: Decimal) -> bool {
    profit > EPSILON || (profit <= EPSILON && profit_actual > EPSILON)
}

/// `num / den`, or zero when the denominator is zero.
pub fn ratio(num: Decimal, den: Decimal) -> Decimal {
    if den.is_zero() {
        return Decimal::ZERO;
    }
    num.checked_div(den).unwrap_or(Decimal::ZERO)
}

/// Running state of one token during replay. Never escapes [`replay`].
#[derive(Debug, Default)]
struct Position {
    held: Decimal,
    count_buy: u32,
    count_sell: u32,
    count_sell_actual: u32,
    token_buy: Decimal,
    token_sell: Decimal,
    token_sell_actual: Decimal,
    counter_buy: Decimal,
    counter_sell: Decimal,
    counter_sell_actual: Decimal,
    first_buy_price: Decimal,
    best_sell_price: Decimal,
}

impl Position {
    fn apply(&mut self, event: &TradeEvent) {
        match event.side {
            Side::Buy => {
                if self.first_buy_price.is_zero() {
                    self.first_buy_price = event.price;
                }
                self.token_buy += event.token_amount;
                self.held += event.token_amount;
                self.counter_buy += event.counter_amount;
                self.count_buy += 1;
            }
            Side::Sell => {
                if event.price > self.best_sell_price {
                    self.best_sell_price = event.price;
                }

                if event.token_amount > self.held {
                    // Oversell: only the tracked balance is realized, valued at the event price.
                    self.counter_sell += self.held * event.price;
                    self.token_sell += self.held;
                    if !self.held.is_zero() {
                        self.count_sell += 1;
                    }
                    self.held = Decimal::ZERO;
                } else {
                    self.counter_sell += event.counter_amount;
                    self.token_sell += event.token_amount;
                    self.held -= event.token_amount;
                    self.count_sell += 1;
                }

                self.counter_sell_actual += event.counter_amount;
                self.token_sell_actual += event.token_amount;
                self.count_sell_actual += 1;
            }
        }
    }
}

/// Replay a token's events (oldest first) and classify the outcome.
///
/// `mark_price` values whatever balance is still held after the last event.
pub fn replay(
    token_address: &str,
    token_symbol: &str,
    events: &[TradeEvent],
    mark_price: Decimal,
) -> Replay {
    let (Some(first), Some(last)) = (events.first(), events.last()) else {
        return Replay::Skipped;
    };

    let mut position = Position::default();
    for event in events {
        position.apply(event);
    }

    let held_value = mark_price * position.held;
    let profit = position.counter_sell - position.counter_buy + held_value;
    let profit_actual = position.counter_sell_actual - position.counter_buy + held_value;

    let record = XpnlRecord {
        token_address: token_address.to_string(),
        token_symbol: token_symbol.to_string(),
        count_buy: position.count_buy,
        count_sell: position.count_sell,
        count_sell_actual: position.count_sell_actual,
        total_token_buy: position.token_buy,
        total_token_sell: position.token_sell,
        total_token_sell_actual: position.token_sell_actual,
        total_counter_buy: position.counter_buy,
        total_counter_sell: position.counter_sell,
        total_counter_sell_actual: position.counter_sell_actual,
        held_amount: position.held,
        held_value,
        profit,
        profit_actual,
        multiplier: ratio(position.counter_sell + held_value, position.counter_buy),
        multiplier_rate: ratio(profit, position.counter_buy) * Decimal::ONE_HUNDRED,
        first_buy_price: position.first_buy_price,
        best_sell_price: position.best_sell_price,
        trade_multiplier: ratio(position.best_sell_price, position.first_buy_price),
        trade_multiplier_rate: ratio(
            position.best_sell_price - position.first_buy_price,
            position.first_buy_price,
        ) * Decimal::ONE_HUNDRED,
        start_time: first.datetime.clone(),
        end_time: last.datetime.clone(),
    };

    if is_win(profit, profit_actual) {
        Replay::Win(record)
    } else {
        Replay::Loss(record)
    }
}
