use council_models::analysts::{display_name, sort_by_priority};
use council_models::{
    Action, AnalystSignal, Decision, Direction, Portfolio, Position, RiskLimits, Signal,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, warn};

/// Confidence-weighted tally of validated signals.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Tally {
    bullish: Decimal,
    bearish: Decimal,
    total: Decimal,
}

impl Tally {
    fn of(signals: &[Signal]) -> Self {
        let mut tally = Tally {
            bullish: Decimal::ZERO,
            bearish: Decimal::ZERO,
            total: Decimal::ZERO,
        };
        for signal in signals {
            match signal.direction() {
                Direction::Bullish => tally.bullish += signal.confidence(),
                Direction::Bearish => tally.bearish += signal.confidence(),
                Direction::Neutral => {}
            }
            tally.total += signal.confidence();
        }
        tally
    }

    /// The strictly heavier side, or `None` on a tie.
    fn winner(&self) -> Option<(Direction, Decimal)> {
        if self.bullish > self.bearish {
            Some((Direction::Bullish, self.bullish))
        } else if self.bearish > self.bullish {
            Some((Direction::Bearish, self.bearish))
        } else {
            None
        }
    }

    /// Winning weight as a percentage of all weight cast.
    fn confidence(&self, winning: Decimal) -> Decimal {
        if self.total.is_zero() {
            return Decimal::ZERO;
        }
        (winning / self.total * Decimal::ONE_HUNDRED).round_dp(1)
    }
}

/// Turn the analyst signals for one ticker into a single decision.
///
/// Pure: the same signals, portfolio and limits always produce the same
/// decision. Signals that fail validation are left out of the vote and listed
/// in `Decision::diagnostics`; they never change action, quantity, confidence
/// or reasoning.
pub fn aggregate(
    ticker: &str,
    signals: &[AnalystSignal],
    portfolio: &Portfolio,
    limits: &RiskLimits,
) -> Decision {
    let (mut valid, diagnostics) = validate(ticker, signals);

    if valid.is_empty() {
        let mut decision = Decision::hold(ticker, format!("No analyst signals available for {ticker}"));
        decision.diagnostics = diagnostics;
        return decision;
    }

    sort_by_priority(&mut valid, |s| s.agent_id());
    let mut reasoning: Vec<String> = valid.iter().map(attribute).collect();

    let tally = Tally::of(&valid);
    let Some((direction, weight)) = tally.winner() else {
        reasoning.push(format!(
            "Bullish and bearish weight tied at {}; holding.",
            tally.bullish.normalize()
        ));
        return Decision {
            ticker: ticker.to_string(),
            action: Action::Hold,
            quantity: 0,
            confidence: Decimal::ZERO,
            reasoning: reasoning.join("\n"),
            diagnostics,
        };
    };

    let confidence = tally.confidence(weight);
    let sized = size_order(direction, &portfolio.position(ticker), portfolio, limits);
    reasoning.extend(sized.notes);

    debug!(
        ticker,
        direction = %direction,
        bullish = %tally.bullish,
        bearish = %tally.bearish,
        action = %sized.action,
        quantity = sized.quantity,
        "Aggregated signals"
    );

    Decision {
        ticker: ticker.to_string(),
        action: sized.action,
        quantity: sized.quantity,
        confidence,
        reasoning: reasoning.join("\n"),
        diagnostics,
    }
}

fn validate(ticker: &str, signals: &[AnalystSignal]) -> (Vec<Signal>, Vec<String>) {
    let mut valid = Vec::with_capacity(signals.len());
    let mut diagnostics = Vec::new();
    for raw in signals {
        if raw.ticker != ticker {
            diagnostics.push(format!(
                "Dropped signal from {}: ticker {:?} does not match {ticker}",
                raw.agent_id, raw.ticker
            ));
            continue;
        }
        match Signal::try_from(raw) {
            Ok(signal) => valid.push(signal),
            Err(e) => {
                warn!(ticker, agent = %raw.agent_id, error = %e, "Dropping malformed signal");
                diagnostics.push(format!("Dropped signal from {}: {e}", raw.agent_id));
            }
        }
    }
    (valid, diagnostics)
}

fn attribute(signal: &Signal) -> String {
    format!(
        "{} ({}, {}%): {}",
        display_name(signal.agent_id()),
        signal.direction(),
        signal.confidence().normalize(),
        signal.reasoning()
    )
}

struct SizedOrder {
    action: Action,
    quantity: u64,
    notes: Vec<String>,
}

/// Pick the action for the winning direction and bound its size.
///
/// An existing opposite position is closed before a new one is opened, so a
/// bullish ticker with a short covers and a bearish ticker with a long sells.
fn size_order(
    direction: Direction,
    position: &Position,
    portfolio: &Portfolio,
    limits: &RiskLimits,
) -> SizedOrder {
    match direction {
        Direction::Bullish if position.short > 0 => {
            let by_cash = if limits.current_price > Decimal::ZERO {
                shares_affordable(portfolio.cash, limits.current_price)
            } else {
                u64::MAX
            };
            close_position(Action::Cover, position.short, by_cash, limits)
        }
        Direction::Bullish => {
            let ceiling = share_ceiling(limits);
            let by_cash = shares_affordable(portfolio.cash, limits.current_price);
            open_position(Action::Buy, ceiling, by_cash, "cash", limits)
        }
        Direction::Bearish if position.long > 0 => {
            close_position(Action::Sell, position.long, u64::MAX, limits)
        }
        Direction::Bearish => {
            let ceiling = share_ceiling(limits);
            let by_margin = if portfolio.margin_requirement.is_zero() {
                u64::MAX
            } else {
                shares_affordable(
                    portfolio.cash,
                    limits.current_price * portfolio.margin_requirement,
                )
            };
            open_position(Action::Short, ceiling, by_margin, "margin", limits)
        }
        Direction::Neutral => SizedOrder {
            action: Action::Hold,
            quantity: 0,
            notes: Vec::new(),
        },
    }
}

/// Size a cover or sell of an existing position.
///
/// Closing only shrinks exposure, so the position ceiling does not apply.
/// The order is bounded by the shares held and by `affordable`: a cover has
/// to buy shares back with cash, a sell raises cash and passes `u64::MAX`.
fn close_position(action: Action, held: u64, affordable: u64, limits: &RiskLimits) -> SizedOrder {
    let mut notes = Vec::new();
    let mut quantity = match limits.requested_quantity {
        Some(requested) if requested > held => {
            let opens = if action == Action::Cover { "buy" } else { "short" };
            notes.push(format!(
                "Requested {requested} shares; {action} limited to the {held} shares held, \
                 the remaining {} share {opens} is deferred.",
                requested - held
            ));
            held
        }
        Some(requested) => requested,
        None => held,
    };
    if quantity > affordable {
        notes.push(format!(
            "Clamped {action} from {quantity} to {affordable} shares (cash allows {affordable} at {}).",
            limits.current_price.normalize()
        ));
        quantity = affordable;
    }
    if quantity == 0 {
        notes.push(format!("No shares to {action}; holding."));
        return SizedOrder {
            action: Action::Hold,
            quantity: 0,
            notes,
        };
    }
    SizedOrder {
        action,
        quantity,
        notes,
    }
}

fn open_position(
    action: Action,
    ceiling: u64,
    affordable: u64,
    funding: &str,
    limits: &RiskLimits,
) -> SizedOrder {
    let capacity = ceiling.min(affordable);
    let mut notes = Vec::new();

    let quantity = match limits.requested_quantity {
        Some(requested) if requested > capacity => {
            notes.push(format!(
                "Clamped {action} from {requested} to {capacity} shares (position limit {ceiling}, {funding} allows {}).",
                describe_bound(affordable)
            ));
            capacity
        }
        Some(requested) => requested,
        None => capacity,
    };

    if quantity == 0 {
        notes.push(format!(
            "No capacity to {action} at {}: position limit {ceiling}, {funding} allows {}; holding.",
            limits.current_price.normalize(),
            describe_bound(affordable)
        ));
        return SizedOrder {
            action: Action::Hold,
            quantity: 0,
            notes,
        };
    }

    SizedOrder {
        action,
        quantity,
        notes,
    }
}

fn describe_bound(shares: u64) -> String {
    if shares == u64::MAX {
        "any size".to_string()
    } else {
        shares.to_string()
    }
}

/// Whole shares of a position worth at most `max_position_value`.
fn share_ceiling(limits: &RiskLimits) -> u64 {
    shares_affordable(limits.max_position_value, limits.current_price)
}

/// Whole units of `unit_cost` that fit in `budget`; zero for a non-positive
/// unit cost or budget.
fn shares_affordable(budget: Decimal, unit_cost: Decimal) -> u64 {
    if unit_cost <= Decimal::ZERO || budget <= Decimal::ZERO {
        return 0;
    }
    budget
        .checked_div(unit_cost)
        .and_then(|shares| shares.floor().to_u64())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn signal(agent: &str, direction: &str, confidence: Decimal) -> AnalystSignal {
        AnalystSignal {
            agent_id: agent.to_string(),
            ticker: "AAPL".to_string(),
            direction: Some(direction.to_string()),
            confidence,
            reasoning: serde_json::Value::String(format!("{agent} says {direction}")),
        }
    }

    fn portfolio(cash: Decimal) -> Portfolio {
        Portfolio::new(cash, dec!(0.5)).unwrap()
    }

    fn roomy_limits() -> RiskLimits {
        RiskLimits::new(dec!(100), dec!(1_000_000))
    }

    #[test]
    fn tie_holds_with_zero_confidence() {
        let decision = aggregate(
            "AAPL",
            &[
                signal("ben_graham", "bullish", dec!(50)),
                signal("cathie_wood", "bearish", dec!(50)),
            ],
            &portfolio(dec!(100_000)),
            &roomy_limits(),
        );
        assert_eq!(decision.action, Action::Hold);
        assert_eq!(decision.quantity, 0);
        assert_eq!(decision.confidence, Decimal::ZERO);
    }

    #[test]
    fn all_neutral_holds() {
        let decision = aggregate(
            "AAPL",
            &[
                signal("ben_graham", "neutral", dec!(70)),
                signal("cathie_wood", "neutral", dec!(30)),
            ],
            &portfolio(dec!(100_000)),
            &roomy_limits(),
        );
        assert_eq!(decision.action, Action::Hold);
        assert_eq!(decision.confidence, Decimal::ZERO);
    }

    #[test]
    fn weighted_confidence() {
        let decision = aggregate(
            "AAPL",
            &[
                signal("ben_graham", "bullish", dec!(80)),
                signal("bill_ackman", "bullish", dec!(20)),
                signal("cathie_wood", "bearish", dec!(10)),
            ],
            &portfolio(dec!(100_000)),
            &roomy_limits(),
        );
        assert_eq!(decision.action, Action::Buy);
        assert_eq!(decision.confidence, dec!(90.9));
    }

    #[test]
    fn neutral_weight_dilutes_confidence() {
        let decision = aggregate(
            "AAPL",
            &[
                signal("ben_graham", "bearish", dec!(60)),
                signal("bill_ackman", "neutral", dec!(40)),
            ],
            &portfolio(dec!(100_000)),
            &roomy_limits(),
        );
        assert_eq!(decision.action, Action::Short);
        assert_eq!(decision.confidence, dec!(60));
    }

    #[test]
    fn empty_signals_hold_with_reason() {
        let decision = aggregate("AAPL", &[], &portfolio(dec!(100_000)), &roomy_limits());
        assert_eq!(decision.action, Action::Hold);
        assert_eq!(decision.confidence, Decimal::ZERO);
        assert!(decision.reasoning.contains("No analyst signals"));
    }

    #[test]
    fn buy_is_clamped_to_position_limit() {
        let limits = RiskLimits::new(dec!(100), dec!(10_000)).with_requested_quantity(500);
        let decision = aggregate(
            "AAPL",
            &[signal("ben_graham", "bullish", dec!(80))],
            &portfolio(dec!(1_000_000)),
            &limits,
        );
        assert_eq!(decision.action, Action::Buy);
        assert_eq!(decision.quantity, 100);
        assert_eq!(decision.confidence, dec!(100));
        assert!(decision.reasoning.contains("Clamped buy from 500 to 100"));
    }

    #[test]
    fn buy_is_clamped_to_cash() {
        let limits = RiskLimits::new(dec!(100), dec!(1_000_000)).with_requested_quantity(500);
        let decision = aggregate(
            "AAPL",
            &[signal("ben_graham", "bullish", dec!(80))],
            &portfolio(dec!(2_550)),
            &limits,
        );
        assert_eq!(decision.quantity, 25);
    }

    #[test]
    fn request_within_capacity_is_untouched() {
        let limits = RiskLimits::new(dec!(100), dec!(1_000_000)).with_requested_quantity(10);
        let decision = aggregate(
            "AAPL",
            &[signal("ben_graham", "bullish", dec!(80))],
            &portfolio(dec!(100_000)),
            &limits,
        );
        assert_eq!(decision.quantity, 10);
        assert!(!decision.reasoning.contains("Clamped"));
    }

    #[test]
    fn no_request_takes_full_allowance() {
        let limits = RiskLimits::new(dec!(150), dec!(20_000));
        let decision = aggregate(
            "AAPL",
            &[signal("ben_graham", "bullish", dec!(80))],
            &portfolio(dec!(100_000)),
            &limits,
        );
        assert_eq!(decision.quantity, 133);
    }

    #[test]
    fn zero_capacity_buy_becomes_hold() {
        let decision = aggregate(
            "AAPL",
            &[signal("ben_graham", "bullish", dec!(80))],
            &portfolio(dec!(50)),
            &roomy_limits(),
        );
        assert_eq!(decision.action, Action::Hold);
        assert_eq!(decision.quantity, 0);
        assert_eq!(decision.confidence, dec!(100));
        assert!(decision.reasoning.contains("No capacity to buy"));
    }

    #[test]
    fn non_positive_price_has_no_capacity() {
        let limits = RiskLimits::new(Decimal::ZERO, dec!(10_000));
        let decision = aggregate(
            "AAPL",
            &[signal("ben_graham", "bullish", dec!(80))],
            &portfolio(dec!(100_000)),
            &limits,
        );
        assert_eq!(decision.action, Action::Hold);
    }

    #[test]
    fn bullish_with_short_covers_first() {
        let mut book = portfolio(dec!(100_000));
        book.positions.insert(
            "AAPL".to_string(),
            Position {
                short: 40,
                ..Position::default()
            },
        );
        let limits = roomy_limits().with_requested_quantity(100);
        let decision = aggregate(
            "AAPL",
            &[signal("ben_graham", "bullish", dec!(80))],
            &book,
            &limits,
        );
        assert_eq!(decision.action, Action::Cover);
        assert_eq!(decision.quantity, 40);
        assert!(decision.reasoning.contains("remaining 60 share buy is deferred"));
    }

    #[test]
    fn cover_is_bounded_by_cash() {
        let mut book = portfolio(dec!(2_550));
        book.positions.insert(
            "AAPL".to_string(),
            Position {
                short: 40,
                ..Position::default()
            },
        );
        let decision = aggregate(
            "AAPL",
            &[signal("ben_graham", "bullish", dec!(80))],
            &book,
            &roomy_limits(),
        );
        assert_eq!(decision.action, Action::Cover);
        // 2_550 cash at 100 buys back 25 of the 40 shares
        assert_eq!(decision.quantity, 25);
        assert!(decision.reasoning.contains("Clamped cover from 40 to 25 shares"));
    }

    #[test]
    fn cover_without_cash_holds() {
        let mut book = portfolio(Decimal::ZERO);
        book.positions.insert(
            "AAPL".to_string(),
            Position {
                short: 40,
                ..Position::default()
            },
        );
        let decision = aggregate(
            "AAPL",
            &[signal("ben_graham", "bullish", dec!(80))],
            &book,
            &roomy_limits(),
        );
        assert_eq!(decision.action, Action::Hold);
        assert_eq!(decision.quantity, 0);
    }

    #[test]
    fn sell_ignores_position_ceiling() {
        let mut book = portfolio(Decimal::ZERO);
        book.positions.insert(
            "AAPL".to_string(),
            Position {
                long: 500,
                ..Position::default()
            },
        );
        let tight = RiskLimits::new(dec!(100), dec!(1_000));
        let decision = aggregate(
            "AAPL",
            &[signal("ben_graham", "bearish", dec!(80))],
            &book,
            &tight,
        );
        assert_eq!(decision.action, Action::Sell);
        assert_eq!(decision.quantity, 500);
    }

    #[test]
    fn bearish_with_long_sells() {
        let mut book = portfolio(dec!(100_000));
        book.positions.insert(
            "AAPL".to_string(),
            Position {
                long: 25,
                ..Position::default()
            },
        );
        let decision = aggregate(
            "AAPL",
            &[signal("ben_graham", "bearish", dec!(80))],
            &book,
            &roomy_limits(),
        );
        assert_eq!(decision.action, Action::Sell);
        assert_eq!(decision.quantity, 25);
    }

    #[test]
    fn short_is_bounded_by_margin() {
        // 10_000 cash at 50% margin on a 100 price: 200 shares.
        let decision = aggregate(
            "AAPL",
            &[signal("ben_graham", "bearish", dec!(80))],
            &portfolio(dec!(10_000)),
            &roomy_limits(),
        );
        assert_eq!(decision.action, Action::Short);
        assert_eq!(decision.quantity, 200);
    }

    #[test]
    fn zero_margin_short_uses_ceiling_only() {
        let book = Portfolio::new(dec!(10), Decimal::ZERO).unwrap();
        let limits = RiskLimits::new(dec!(100), dec!(5_000));
        let decision = aggregate(
            "AAPL",
            &[signal("ben_graham", "bearish", dec!(80))],
            &book,
            &limits,
        );
        assert_eq!(decision.action, Action::Short);
        assert_eq!(decision.quantity, 50);
    }

    #[test]
    fn malformed_signal_is_isolated() {
        let valid = vec![
            signal("ben_graham", "bullish", dec!(80)),
            signal("cathie_wood", "bearish", dec!(10)),
        ];
        let mut with_bad = valid.clone();
        with_bad.insert(1, signal("bill_ackman", "sideways", dec!(90)));

        let book = portfolio(dec!(100_000));
        let clean = aggregate("AAPL", &valid, &book, &roomy_limits());
        let noisy = aggregate("AAPL", &with_bad, &book, &roomy_limits());

        assert_eq!(noisy.action, clean.action);
        assert_eq!(noisy.quantity, clean.quantity);
        assert_eq!(noisy.confidence, clean.confidence);
        assert_eq!(noisy.reasoning, clean.reasoning);
        assert_eq!(noisy.diagnostics.len(), 1);
        assert!(noisy.diagnostics[0].contains("bill_ackman"));
    }

    #[test]
    fn missing_direction_and_bad_confidence_are_dropped() {
        let mut missing = signal("ben_graham", "bullish", dec!(80));
        missing.direction = None;
        let out_of_range = signal("cathie_wood", "bearish", dec!(150));

        let decision = aggregate(
            "AAPL",
            &[missing, out_of_range],
            &portfolio(dec!(100_000)),
            &roomy_limits(),
        );
        assert_eq!(decision.action, Action::Hold);
        assert_eq!(decision.diagnostics.len(), 2);
    }

    #[test]
    fn foreign_ticker_signal_is_dropped() {
        let mut other = signal("ben_graham", "bullish", dec!(80));
        other.ticker = "MSFT".to_string();
        let decision = aggregate("AAPL", &[other], &portfolio(dec!(100_000)), &roomy_limits());
        assert_eq!(decision.action, Action::Hold);
        assert!(decision.diagnostics[0].contains("MSFT"));
    }

    #[test]
    fn default_sentinel_counts_as_neutral_zero() {
        let decision = aggregate(
            "AAPL",
            &[
                signal("ben_graham", "bullish", dec!(40)),
                AnalystSignal::default_for("cathie_wood", "AAPL"),
            ],
            &portfolio(dec!(100_000)),
            &roomy_limits(),
        );
        assert_eq!(decision.action, Action::Buy);
        assert_eq!(decision.confidence, dec!(100));
        assert!(decision.diagnostics.is_empty());
    }

    #[test]
    fn reasoning_follows_analyst_priority() {
        let decision = aggregate(
            "AAPL",
            &[
                signal("some_new_analyst", "neutral", dec!(10)),
                signal("valuation_analyst", "bullish", dec!(60)),
                signal("ben_graham", "bullish", dec!(70)),
            ],
            &portfolio(dec!(100_000)),
            &roomy_limits(),
        );
        let lines: Vec<&str> = decision.reasoning.lines().collect();
        assert!(lines[0].starts_with("Ben Graham (bullish, 70%)"));
        assert!(lines[1].starts_with("Valuation Analyst"));
        assert!(lines[2].starts_with("Some New Analyst"));
    }

    #[test]
    fn vote_ignores_signal_order() {
        let forward = vec![
            signal("ben_graham", "bullish", dec!(30)),
            signal("cathie_wood", "bearish", dec!(45)),
            signal("phil_fisher", "bullish", dec!(20)),
        ];
        let mut reversed = forward.clone();
        reversed.reverse();

        let book = portfolio(dec!(100_000));
        let a = aggregate("AAPL", &forward, &book, &roomy_limits());
        let b = aggregate("AAPL", &reversed, &book, &roomy_limits());
        assert_eq!(a, b);
        assert_eq!(a.action, Action::Buy);
    }

    #[test]
    fn shares_affordable_floors() {
        assert_eq!(shares_affordable(dec!(999), dec!(100)), 9);
        assert_eq!(shares_affordable(dec!(1000), dec!(100)), 10);
        assert_eq!(shares_affordable(dec!(-5), dec!(100)), 0);
        assert_eq!(shares_affordable(dec!(1000), Decimal::ZERO), 0);
    }
}
