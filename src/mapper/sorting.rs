//! Display order of outcomes within a market.

use std::cmp::Ordering;

use crate::events::types::Outcome;

/// Rank given to keys outside the lookup table.
pub const UNRANKED: u32 = 1000;

/// Rank of a semantic outcome key. Lower sorts first; matching ignores case.
pub fn outcome_rank(key: &str) -> u32 {
    match key.trim().to_lowercase().as_str() {
        "yes" | "oui" => 10,
        "no" | "non" => 20,

        "home" | "domicile" | "1" => 10,
        "draw" | "nul" | "x" => 20,
        "none" => 21,
        "" => 22,
        "away" | "extérieur" | "exterieur" | "2" => 30,

        "home_draw" | "1x" => 10,
        "home_away" | "12" => 20,
        "away_draw" | "x2" => 30,

        "over" | "plus" => 10,
        "under" | "moins" => 20,

        "odd" | "impair" => 10,
        "even" | "pair" => 20,

        "exact" => 10,
        "range" => 20,
        "more_than" => 30,

        "in_90_minutes" => 10,
        "in_extra_time" => 20,
        "on_penalties" => 30,

        "home-true" | "home_draw-true" | "over-true" | "odd-true" | "yes-true" => 10,
        "home-false" | "home_draw-false" | "over-false" | "odd-false" | "yes-false" => 15,
        "-true" | "draw-true" | "home_away-true" | "under-true" | "even-true" | "no-true" => 20,
        "-false" | "draw-false" | "home_away-false" | "under-false" | "even-false"
        | "no-false" => 25,
        "away-true" | "away_draw-true" => 30,
        "away-false" | "away_draw-false" => 35,

        "true" => 10,
        "false" => 20,

        "h" => 10,
        "d" => 20,
        "a" => 30,

        _ => UNRANKED,
    }
}

/// Numeric comparison when both ids are numbers, lexical otherwise.
pub fn compare_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}

/// Sort outcomes by semantic rank, ties and unknown keys by id.
pub fn sort_outcomes(outcomes: &mut [Outcome]) {
    outcomes.sort_by(|a, b| {
        let rank_a = a.order_key.as_deref().map_or(UNRANKED, outcome_rank);
        let rank_b = b.order_key.as_deref().map_or(UNRANKED, outcome_rank);
        rank_a.cmp(&rank_b).then_with(|| compare_ids(&a.id, &b.id))
    });
}
