//! Canonical analyst ordering.
//!
//! The order decides how analyst output is listed (reasoning text, display).
//! It never influences the vote.

/// (display name, id) in priority order.
pub const ANALYST_ORDER: &[(&str, &str)] = &[
    ("Ben Graham", "ben_graham"),
    ("Bill Ackman", "bill_ackman"),
    ("Cathie Wood", "cathie_wood"),
    ("Charlie Munger", "charlie_munger"),
    ("Phil Fisher", "phil_fisher"),
    ("Stanley Druckenmiller", "stanley_druckenmiller"),
    ("Warren Buffett", "warren_buffett"),
    ("Technical Analyst", "technical_analyst"),
    ("Fundamentals Analyst", "fundamentals_analyst"),
    ("Sentiment Analyst", "sentiment_analyst"),
    ("Valuation Analyst", "valuation_analyst"),
];

pub const RISK_MANAGEMENT: &str = "Risk Management";

/// Rank of an analyst by display name or id.
///
/// Known analysts rank by their position in `ANALYST_ORDER`, risk management
/// right after them, and anything else after all of those.
pub fn analyst_rank(name: &str) -> usize {
    if let Some(idx) = ANALYST_ORDER
        .iter()
        .position(|(display, id)| *display == name || *id == name)
    {
        return idx;
    }
    if name == RISK_MANAGEMENT || name == "risk_management" {
        return ANALYST_ORDER.len();
    }
    ANALYST_ORDER.len() + 1
}

/// Display name for an analyst id, falling back to a title-cased id.
pub fn display_name(agent_id: &str) -> String {
    if let Some((display, _)) = ANALYST_ORDER.iter().find(|(_, id)| *id == agent_id) {
        return (*display).to_string();
    }
    agent_id
        .trim_end_matches("_agent")
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Stable sort by analyst rank; ties (including unknown analysts) keep their
/// encounter order.
pub fn sort_by_priority<T>(items: &mut [T], name_of: impl Fn(&T) -> &str) {
    items.sort_by_key(|item| analyst_rank(name_of(item)));
}
