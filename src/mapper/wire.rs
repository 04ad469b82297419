//! Provider wire DTOs as they arrive in push snapshots and deltas.
//!
//! Every field is optional or defaulted so a partial payload still decodes.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Accept `3`, `"3"` or nothing for counters the provider sends either way.
fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_as_u32))
}

/// Accept `"3.1"` or `3` for ids and prices.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Read a non-negative integer from a JSON number or numeric string.
pub fn value_as_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Sport as listed by the provider.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WireSport {
    /// Provider sport id.
    #[serde(rename = "idfosport", default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    /// Alphabetic sport code used in routes.
    #[serde(rename = "idfosporttype", default)]
    pub alpha_id: Option<String>,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Icon identifier.
    #[serde(rename = "iconid", default)]
    pub icon_id: Option<String>,
    /// Whether the sport groups events by category.
    #[serde(rename = "showeventcategory", default)]
    pub show_event_category: Option<bool>,
    /// Scheduled events.
    #[serde(rename = "numevents", default, deserialize_with = "lenient_u32")]
    pub number_events: Option<u32>,
    /// Live events.
    #[serde(rename = "numliveevents", default, deserialize_with = "lenient_u32")]
    pub number_live_events: Option<u32>,
}

/// A selection of a market.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WireOutcome {
    /// Selection id.
    #[serde(rename = "idfoselection", default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Fractional price numerator.
    #[serde(rename = "currentpriceup", default, deserialize_with = "lenient_string")]
    pub price_numerator: Option<String>,
    /// Fractional price denominator.
    #[serde(rename = "currentpricedown", default, deserialize_with = "lenient_string")]
    pub price_denominator: Option<String>,
    /// Decimal price, used when no fraction is sent.
    #[serde(rename = "odds", default)]
    pub decimal_odd: Option<Decimal>,
    /// Parent market id.
    #[serde(rename = "idfomarket", default, deserialize_with = "lenient_string")]
    pub market_id: Option<String>,
    /// Short home/draw/away marker.
    #[serde(rename = "hadvalue", default)]
    pub had_value: Option<String>,
    /// Semantic header key (home, over, yes...).
    #[serde(rename = "headerNameKey", default)]
    pub header_name_key: Option<String>,
    /// Whether bets are accepted.
    #[serde(rename = "istradable", default)]
    pub is_tradable: Option<bool>,
    /// Whether the outcome is settled.
    #[serde(rename = "isterminated", default)]
    pub is_terminated: Option<bool>,
    /// Whether the market is an over/under line.
    #[serde(rename = "isunderover", default)]
    pub is_over_under: Option<bool>,
}

/// A market of an event.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WireMarket {
    /// Market id.
    #[serde(rename = "idfomarket", default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Selections.
    #[serde(rename = "selections", default)]
    pub outcomes: Vec<WireOutcome>,
    /// Betting type id.
    #[serde(rename = "idefmarkettype", default)]
    pub market_type_id: Option<String>,
    /// Betting type name.
    #[serde(rename = "markettypename", default)]
    pub market_type_name: Option<String>,
    /// Parent event id.
    #[serde(rename = "idfoevent", default, deserialize_with = "lenient_string")]
    pub event_id: Option<String>,
    /// Whether bets are accepted.
    #[serde(rename = "istradable", default)]
    pub is_tradable: Option<bool>,
    /// Whether this is the event's main line.
    #[serde(rename = "isMainMarket", default)]
    pub is_main_market: Option<bool>,
}

/// Home and away score pair.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WireScore {
    /// Home score.
    #[serde(default, deserialize_with = "lenient_u32")]
    pub home: Option<u32>,
    /// Away score.
    #[serde(default, deserialize_with = "lenient_u32")]
    pub away: Option<u32>,
}

/// Score breakdown of a live event.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WireScores {
    /// Score of the running period or game.
    #[serde(rename = "CURRENT_SCORE", default)]
    pub current: Option<WireScore>,
    /// Overall match score.
    #[serde(rename = "MATCH_SCORE", default)]
    pub matched: Option<WireScore>,
}

impl WireScores {
    /// Current score, falling back to the match score.
    pub fn best(&self) -> Option<&WireScore> {
        self.current.as_ref().or(self.matched.as_ref())
    }
}

/// Scoreboard attached to live events.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WireLiveData {
    /// Match clock.
    #[serde(rename = "matchTime", default)]
    pub match_time: Option<String>,
    /// Raw status label.
    #[serde(default)]
    pub status: Option<String>,
    /// Scores.
    #[serde(default)]
    pub scores: Option<WireScores>,
}

/// An event with its markets.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WireMatch {
    /// Event id.
    #[serde(rename = "idfoevent", default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    /// Event name.
    #[serde(default)]
    pub name: Option<String>,
    /// Home participant.
    #[serde(rename = "participantname_home", default)]
    pub home_name: Option<String>,
    /// Away participant.
    #[serde(rename = "participantname_away", default)]
    pub away_name: Option<String>,
    /// Competition id.
    #[serde(rename = "idfotournament", default)]
    pub competition_id: Option<String>,
    /// Competition name.
    #[serde(rename = "tournamentname", default)]
    pub competition_name: Option<String>,
    /// Sport name.
    #[serde(rename = "sporttypename", default)]
    pub sport_name: Option<String>,
    /// Alphabetic sport code.
    #[serde(rename = "idfosporttype", default)]
    pub sport_alpha_id: Option<String>,
    /// Provider sport id.
    #[serde(rename = "idfosport", default, deserialize_with = "lenient_string")]
    pub sport_id: Option<String>,
    /// Start timestamp, ISO 8601.
    #[serde(rename = "tsstart", default)]
    pub start_date: Option<String>,
    /// Markets.
    #[serde(default)]
    pub markets: Vec<WireMarket>,
    /// Total markets offered.
    #[serde(rename = "numMarkets", default, deserialize_with = "lenient_u32")]
    pub number_markets: Option<u32>,
    /// Live scoreboard.
    #[serde(rename = "liveDataSummary", default)]
    pub live_data: Option<WireLiveData>,
}
