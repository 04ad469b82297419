//! Domain value types for sports events, markets and outcomes.
//!
//! All types are immutable values. Storage replaces an entry with a freshly
//! built value and republishes it instead of mutating shared references.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Price of an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "format")]
pub enum OddFormat {
    /// Fractional odd, e.g. 5/2.
    Fraction {
        /// Numerator.
        numerator: u32,
        /// Denominator, never below 1.
        denominator: u32,
    },
    /// Decimal odd, e.g. 3.50.
    Decimal {
        /// Decimal odd including the stake.
        odd: Decimal,
    },
}

impl Default for OddFormat {
    fn default() -> Self {
        OddFormat::Fraction {
            numerator: 1,
            denominator: 1,
        }
    }
}

impl OddFormat {
    /// Build a fractional odd, rejecting a zero denominator.
    pub fn fraction(numerator: u32, denominator: u32) -> Option<Self> {
        if denominator == 0 {
            return None;
        }
        Some(OddFormat::Fraction {
            numerator,
            denominator,
        })
    }

    /// Convert a decimal odd into its reduced fraction (2.50 -> 3/2).
    ///
    /// Precision is limited to hundredths; odds below 1.00 clamp to 0/1.
    pub fn fraction_from_decimal(odd: Decimal) -> Self {
        let profit = (odd - Decimal::ONE).max(Decimal::ZERO);
        let numerator = (profit * Decimal::ONE_HUNDRED)
            .round()
            .to_u32()
            .unwrap_or(0);
        let divisor = gcd(numerator, 100);
        OddFormat::Fraction {
            numerator: numerator / divisor,
            denominator: 100 / divisor,
        }
    }

    /// Numerator and denominator, converting decimal odds when needed.
    pub fn fraction_parts(&self) -> (u32, u32) {
        match *self {
            OddFormat::Fraction {
                numerator,
                denominator,
            } => (numerator, denominator),
            OddFormat::Decimal { odd } => Self::fraction_from_decimal(odd).fraction_parts(),
        }
    }

    /// Decimal representation including the stake (5/2 -> 3.5).
    pub fn decimal_odd(&self) -> Decimal {
        match *self {
            OddFormat::Fraction {
                numerator,
                denominator,
            } => {
                let denominator = Decimal::from(denominator.max(1));
                Decimal::ONE + Decimal::from(numerator) / denominator
            }
            OddFormat::Decimal { odd } => odd,
        }
    }
}

fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 {
        a.max(1)
    } else {
        gcd(b, a % b)
    }
}

/// Match status of an event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "state", content = "detail")]
pub enum EventStatus {
    /// Status not reported.
    Unknown,
    /// Scheduled, not started.
    NotStarted,
    /// Running; carries the provider's phase label.
    InProgress(String),
    /// Finished; carries the provider's final label.
    Ended(String),
}

impl EventStatus {
    /// Whether the event is currently being played.
    pub fn is_live(&self) -> bool {
        matches!(self, EventStatus::InProgress(_))
    }
}

/// Sport metadata.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SportType {
    /// Provider sport id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Short alphabetic code used in content routes (e.g. `FBL`).
    pub alpha_id: Option<String>,
    /// Numeric provider id.
    pub numeric_id: Option<String>,
    /// Icon identifier.
    pub icon_id: Option<String>,
    /// Whether the sport groups its events by category.
    pub show_event_category: bool,
    /// Number of scheduled events.
    pub number_events: u32,
    /// Number of live events.
    pub number_live_events: u32,
}

/// A selectable outcome of a market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    /// Outcome id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Current price.
    pub odd: OddFormat,
    /// Parent market id.
    pub market_id: Option<String>,
    /// Semantic key used for ordering (home/draw/away, over/under...).
    pub order_key: Option<String>,
    /// Whether bets are accepted.
    pub is_tradable: bool,
    /// Whether the outcome is settled.
    pub is_terminated: bool,
}

/// A betting market of an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Market {
    /// Market id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Outcomes in display order.
    pub outcomes: Vec<Outcome>,
    /// Betting type id.
    pub market_type_id: Option<String>,
    /// Betting type name.
    pub market_type_name: Option<String>,
    /// Parent event id.
    pub event_id: Option<String>,
    /// Whether bets are accepted.
    pub is_tradable: bool,
    /// Whether this is the event's main line.
    pub is_main_market: bool,
}

/// A sports event with its markets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Event id.
    pub id: String,
    /// Event name, when provided separately from team names.
    pub name: Option<String>,
    /// Home participant.
    pub home_team_name: String,
    /// Away participant.
    pub away_team_name: String,
    /// Home score while live.
    pub home_team_score: Option<u32>,
    /// Away score while live.
    pub away_team_score: Option<u32>,
    /// Competition id.
    pub competition_id: String,
    /// Competition name.
    pub competition_name: String,
    /// Sport.
    pub sport: SportType,
    /// Scheduled start.
    pub start_date: OffsetDateTime,
    /// Markets in display order.
    pub markets: Vec<Market>,
    /// Match status.
    pub status: EventStatus,
    /// Match clock as reported by the provider.
    pub match_time: Option<String>,
    /// Total number of markets offered for the event.
    pub number_markets: Option<u32>,
}

/// A titled list of events delivered to list screens.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EventsGroup {
    /// Events in list order.
    pub events: Vec<Event>,
    /// Market group the list was built for.
    pub market_group_id: Option<String>,
}

impl EventsGroup {
    /// Group without a market group.
    pub fn new(events: Vec<Event>) -> Self {
        Self {
            events,
            market_group_id: None,
        }
    }
}
