//! Translation from provider wire DTOs to domain values.
//!
//! Every function here is total: absent or malformed wire fields degrade to
//! defaults instead of failing the whole payload.

pub mod sorting;
pub mod wire;

use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::debug;

use crate::events::types::{Event, EventStatus, Market, OddFormat, Outcome, SportType};
use sorting::{compare_ids, sort_outcomes};
use wire::{WireMarket, WireMatch, WireOutcome, WireSport};

/// Map a provider status label to an [`EventStatus`].
pub fn map_event_status(raw: &str) -> EventStatus {
    let trimmed = raw.trim();
    match trimmed.to_lowercase().as_str() {
        "" => EventStatus::Unknown,
        "pending" | "not started" | "not_started" | "notstarted" => EventStatus::NotStarted,
        "finished" | "ended" => EventStatus::Ended(trimmed.to_string()),
        _ => EventStatus::InProgress(trimmed.to_string()),
    }
}

/// Parse a price component such as `"5"` or `"5.0"`.
pub fn parse_price_component(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    raw.parse::<u32>().ok().or_else(|| {
        Decimal::from_str(raw)
            .ok()
            .filter(|d| !d.is_sign_negative())
            .and_then(|d| d.trunc().to_u32())
    })
}

/// Parse a provider start timestamp.
pub fn parse_start_date(raw: &str) -> Option<OffsetDateTime> {
    let with_millis = format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond][offset_hour sign:mandatory][offset_minute]"
    );
    let without_millis = format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second][offset_hour sign:mandatory][offset_minute]"
    );

    OffsetDateTime::parse(raw, &Rfc3339)
        .or_else(|_| OffsetDateTime::parse(raw, &with_millis))
        .or_else(|_| OffsetDateTime::parse(raw, &without_millis))
        .ok()
}

fn map_odd(wire: &WireOutcome) -> OddFormat {
    let numerator = wire.price_numerator.as_deref().and_then(parse_price_component);
    let denominator = wire
        .price_denominator
        .as_deref()
        .and_then(parse_price_component);

    if let (Some(n), Some(d)) = (numerator, denominator) {
        if let Some(odd) = OddFormat::fraction(n, d) {
            return odd;
        }
    }

    wire.decimal_odd
        .map(OddFormat::fraction_from_decimal)
        .unwrap_or_default()
}

fn order_key(wire: &WireOutcome) -> Option<String> {
    if let Some(key) = &wire.header_name_key {
        return Some(key.clone());
    }

    let had = wire.had_value.clone()?;
    if !wire.is_over_under.unwrap_or(false) {
        return Some(had);
    }

    // Over/under lines flag "over" with the away marker.
    let swapped = match had.to_lowercase().as_str() {
        "h" => "a".to_string(),
        "a" => "h".to_string(),
        _ => had,
    };
    Some(swapped)
}

/// Map a wire selection.
pub fn map_outcome(wire: &WireOutcome) -> Outcome {
    Outcome {
        id: wire.id.clone().unwrap_or_default(),
        name: wire.name.clone().unwrap_or_default(),
        odd: map_odd(wire),
        market_id: wire.market_id.clone(),
        order_key: order_key(wire),
        is_tradable: wire.is_tradable.unwrap_or(true),
        is_terminated: wire.is_terminated.unwrap_or(false),
    }
}

/// Map a wire market, ordering its outcomes for display.
pub fn map_market(wire: &WireMarket) -> Market {
    let id = wire.id.clone().unwrap_or_default();
    let mut outcomes: Vec<Outcome> = wire
        .outcomes
        .iter()
        .map(|o| {
            let mut outcome = map_outcome(o);
            if outcome.market_id.is_none() && !id.is_empty() {
                outcome.market_id = Some(id.clone());
            }
            outcome
        })
        .collect();
    sort_outcomes(&mut outcomes);

    Market {
        id,
        name: wire.name.clone().unwrap_or_default(),
        outcomes,
        market_type_id: wire.market_type_id.clone(),
        market_type_name: wire.market_type_name.clone(),
        event_id: wire.event_id.clone(),
        is_tradable: wire.is_tradable.unwrap_or(true),
        is_main_market: wire.is_main_market.unwrap_or(false),
    }
}

/// Map a wire sport.
pub fn map_sport(wire: &WireSport) -> SportType {
    SportType {
        id: wire
            .id
            .clone()
            .or_else(|| wire.alpha_id.clone())
            .unwrap_or_default(),
        name: wire.name.clone().unwrap_or_default(),
        alpha_id: wire.alpha_id.clone(),
        numeric_id: wire.id.clone(),
        icon_id: wire.icon_id.clone(),
        show_event_category: wire.show_event_category.unwrap_or(false),
        number_events: wire.number_events.unwrap_or(0),
        number_live_events: wire.number_live_events.unwrap_or(0),
    }
}

fn sport_of(wire: &WireMatch) -> SportType {
    map_sport(&WireSport {
        id: wire.sport_id.clone(),
        alpha_id: wire.sport_alpha_id.clone(),
        name: wire.sport_name.clone(),
        ..WireSport::default()
    })
}

/// Map a wire event with its markets.
pub fn map_event(wire: &WireMatch) -> Event {
    let id = wire.id.clone().unwrap_or_default();

    let mut markets: Vec<Market> = wire
        .markets
        .iter()
        .map(|m| {
            let mut market = map_market(m);
            if market.event_id.is_none() && !id.is_empty() {
                market.event_id = Some(id.clone());
            }
            market
        })
        .collect();
    markets.sort_by(|a, b| compare_ids(&a.id, &b.id));

    let live = wire.live_data.as_ref();
    let score = live.and_then(|l| l.scores.as_ref()).and_then(|s| s.best());
    let start_date = wire
        .start_date
        .as_deref()
        .and_then(parse_start_date)
        .unwrap_or(OffsetDateTime::UNIX_EPOCH);

    Event {
        id,
        name: wire.name.clone(),
        home_team_name: wire.home_name.clone().unwrap_or_default(),
        away_team_name: wire.away_name.clone().unwrap_or_default(),
        home_team_score: score.and_then(|s| s.home),
        away_team_score: score.and_then(|s| s.away),
        competition_id: wire.competition_id.clone().unwrap_or_default(),
        competition_name: wire.competition_name.clone().unwrap_or_default(),
        sport: sport_of(wire),
        start_date,
        markets,
        status: live
            .and_then(|l| l.status.as_deref())
            .map(map_event_status)
            .unwrap_or(EventStatus::Unknown),
        match_time: live.and_then(|l| l.match_time.clone()),
        number_markets: wire.number_markets,
    }
}

/// Map a snapshot list, skipping entries without an id.
pub fn map_events(wire: &[WireMatch]) -> Vec<Event> {
    wire.iter()
        .filter(|m| {
            let has_id = m.id.as_deref().is_some_and(|id| !id.is_empty());
            if !has_id {
                debug!("Skipping wire event without id");
            }
            has_id
        })
        .map(map_event)
        .collect()
}
