//! Decoding of push frames into [`ContentContainer`]s.
//!
//! A frame is a JSON object or an array of objects shaped like
//! `{changeType, contentId: {type, id}, path, change}`. The change type picks
//! the family (snapshot, update, addition, removal); the path picks the case.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::events::content::{
    ContentContainer, ContentIdentifier, ContentRoute, ContentType, EventLiveDataExtended,
};
use crate::mapper::wire::{value_as_u32, WireLiveData, WireMarket, WireMatch, WireScore};

static EVENT_ID: Lazy<Regex> = Lazy::new(|| id_pattern("idfoevent"));
static MARKET_ID: Lazy<Regex> = Lazy::new(|| id_pattern("idfomarket"));
static SELECTION_ID: Lazy<Regex> = Lazy::new(|| id_pattern("idfoselection"));

fn id_pattern(key: &str) -> Regex {
    // Matches `[key=123]`, `key:123` and `key/123`, optionally quoted.
    let pattern = format!(r#"{}[=:/]['"]?([^\]/\s'"]+)"#, key);
    Regex::new(&pattern).expect("valid regex")
}

/// Something the push channel announced.
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    /// The server assigned a session token.
    Session(String),
    /// Content for a subscribed topic.
    Content(ContentContainer),
}

/// Event id referenced by a push path.
pub fn extract_event_id(path: &str) -> Option<String> {
    capture(&EVENT_ID, path)
}

/// Market id referenced by a push path.
pub fn extract_market_id(path: &str) -> Option<String> {
    capture(&MARKET_ID, path)
}

/// Selection id referenced by a push path.
pub fn extract_selection_id(path: &str) -> Option<String> {
    capture(&SELECTION_ID, path)
}

fn capture(regex: &Regex, path: &str) -> Option<String> {
    regex
        .captures(path)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Minutes part of a match clock (`"67:12"` -> `"67"`).
pub fn extract_match_minutes(match_time: &str) -> Option<String> {
    let minutes = match_time.split(':').next()?.trim();
    if minutes.is_empty() {
        None
    } else {
        Some(minutes.to_string())
    }
}

/// Decode a raw text frame. Unparsable frames decode to nothing.
pub fn decode_message(text: &str) -> Vec<PushEvent> {
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "Unparsable push frame");
            return Vec::new();
        }
    };

    let mut events = Vec::new();
    collect_events(&value, &mut events);
    events
}

fn collect_events(value: &Value, out: &mut Vec<PushEvent>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect_events(item, out);
            }
        }
        Value::Object(object) => {
            if object.contains_key("contentId") {
                out.push(PushEvent::Content(decode_container(value)));
            } else if let Some(data) = object.get("data") {
                collect_events(data, out);
            } else if let Some(token) = object.get("subscriberId").and_then(Value::as_str) {
                out.push(PushEvent::Session(token.to_string()));
            } else {
                debug!("Push frame without content id");
                out.push(PushEvent::Content(ContentContainer::Unknown));
            }
        }
        _ => out.push(PushEvent::Content(ContentContainer::Unknown)),
    }
}

/// Decode one `{changeType, contentId, path, change}` object.
pub fn decode_container(value: &Value) -> ContentContainer {
    let Some(content_identifier) = content_identifier(value) else {
        debug!("Push content with unknown content id");
        return ContentContainer::Unknown;
    };
    let path = value.get("path").and_then(Value::as_str).unwrap_or_default();
    let change = value.get("change").unwrap_or(&Value::Null);
    let change_type = value
        .get("changeType")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_lowercase();

    let container = match change_type.as_str() {
        "updated" => decode_updated(content_identifier, path, change),
        "added" => decode_added(content_identifier, path, change),
        "removed" => decode_removed(content_identifier, path),
        _ => decode_refreshed(content_identifier, change),
    };

    if container == ContentContainer::Unknown {
        debug!(path, change_type = %change_type, "Ignored push content");
    }
    container
}

fn content_identifier(value: &Value) -> Option<ContentIdentifier> {
    let content = value.get("contentId")?;
    let content_type = content.get("type")?.as_str()?;
    let id = match content.get("id")? {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    ContentIdentifier::parse(content_type, &id)
}

/// Decode an array element by element, skipping entries that fail.
fn decode_list<T: DeserializeOwned>(change: &Value) -> Vec<T> {
    change
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

fn decode_refreshed(content_identifier: ContentIdentifier, change: &Value) -> ContentContainer {
    match content_identifier.content_type {
        ContentType::LiveEvents => ContentContainer::LiveEvents {
            events: decode_list::<WireMatch>(change),
            content_identifier,
        },
        ContentType::PreLiveEvents => ContentContainer::PreLiveEvents {
            events: decode_list::<WireMatch>(change),
            content_identifier,
        },
        _ => ContentContainer::Unknown,
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn live_data_from(event_id: &str, change: &Value) -> Option<EventLiveDataExtended> {
    if !change.is_object() {
        return None;
    }
    let live: WireLiveData = serde_json::from_value(change.clone()).ok()?;
    let score = live.scores.as_ref().and_then(|s| s.best()).cloned();
    Some(EventLiveDataExtended {
        id: event_id.to_string(),
        home_score: score.as_ref().and_then(|s| s.home),
        away_score: score.as_ref().and_then(|s| s.away),
        match_time: live.match_time,
        status: live.status,
    })
}

fn decode_updated(
    content_identifier: ContentIdentifier,
    path: &str,
    change: &Value,
) -> ContentContainer {
    if let ContentRoute::EventDetailsLiveData { event_id } = &content_identifier.content_route {
        let event_id = event_id.clone();
        if let Some(live_data) = live_data_from(&event_id, change) {
            return ContentContainer::UpdateEventLiveDataExtended {
                content_identifier,
                event_id,
                live_data,
            };
        }
        if path.to_lowercase().contains("matchtime") {
            if let Some(match_time) = change.as_str() {
                let live_data = EventLiveDataExtended {
                    id: event_id.clone(),
                    match_time: Some(match_time.to_string()),
                    ..EventLiveDataExtended::default()
                };
                return ContentContainer::UpdateEventLiveDataExtended {
                    content_identifier,
                    event_id,
                    live_data,
                };
            }
        }
        return ContentContainer::Unknown;
    }

    if path.contains("idfomarket") && path.contains("istradable") {
        if let (Some(market_id), Some(is_tradable)) = (extract_market_id(path), change.as_bool()) {
            return ContentContainer::UpdateMarketTradability {
                content_identifier,
                market_id,
                is_tradable,
            };
        }
        return ContentContainer::Unknown;
    }

    if path.contains("idfoselection") {
        return decode_selection_update(content_identifier, path, change);
    }

    if path.contains("idfoevent") && path.contains("numMarkets") {
        if let (Some(event_id), Some(new_market_count)) =
            (extract_event_id(path), value_as_u32(change))
        {
            return ContentContainer::UpdateEventMarketCount {
                content_identifier,
                event_id,
                new_market_count,
            };
        }
        return ContentContainer::Unknown;
    }

    if path.contains("attributes") && path.contains("COMPLETE") && path.contains("CURRENT_SCORE")
    {
        let score: Option<WireScore> = change
            .get("COMPETITOR")
            .and_then(|c| serde_json::from_value(c.clone()).ok());
        let event_id = content_identifier.full_route();
        if let Some(score) = score {
            return ContentContainer::UpdateEventScore {
                content_identifier,
                event_id,
                home_score: score.home,
                away_score: score.away,
            };
        }
        return ContentContainer::Unknown;
    }

    if path.contains("liveDataSummary") {
        if let Some(event_id) = extract_event_id(path) {
            let is_score = path.contains("MATCH_SCORE") || path.contains("CURRENT_SCORE");
            if path.contains("scores") && is_score {
                if let Ok(score) = serde_json::from_value::<WireScore>(change.clone()) {
                    return ContentContainer::UpdateEventScore {
                        content_identifier,
                        event_id,
                        home_score: score.home,
                        away_score: score.away,
                    };
                }
            } else if path.contains("matchTime") {
                if let Some(new_time) = change.as_str().and_then(extract_match_minutes) {
                    return ContentContainer::UpdateEventTime {
                        content_identifier,
                        event_id,
                        new_time,
                    };
                }
            } else if path.contains("status") {
                if let Some(state) = change.as_str() {
                    return ContentContainer::UpdateEventState {
                        content_identifier,
                        event_id,
                        state: state.to_string(),
                    };
                }
            }
        }
        return ContentContainer::Unknown;
    }

    if path.contains("istradable") {
        if let (ContentRoute::Market { market_id }, Some(is_tradable)) =
            (&content_identifier.content_route, change.as_bool())
        {
            let market_id = market_id.clone();
            return if is_tradable {
                ContentContainer::EnableMarket {
                    content_identifier,
                    market_id,
                }
            } else {
                ContentContainer::RemoveMarket {
                    content_identifier,
                    market_id,
                }
            };
        }
    }

    ContentContainer::Unknown
}

fn decode_selection_update(
    content_identifier: ContentIdentifier,
    path: &str,
    change: &Value,
) -> ContentContainer {
    let Some(selection_id) = change
        .get("idfoselection")
        .and_then(as_text)
        .or_else(|| extract_selection_id(path))
    else {
        return ContentContainer::Unknown;
    };

    let numerator = change.get("currentpriceup").and_then(as_text);
    let denominator = change.get("currentpricedown").and_then(as_text);

    if numerator.is_some() || denominator.is_some() {
        return ContentContainer::UpdateOutcomeOdd {
            content_identifier,
            selection_id,
            numerator,
            denominator,
        };
    }

    match change.get("idfoselectionsuspensiontype") {
        Some(suspension) => ContentContainer::UpdateOutcomeTradability {
            content_identifier,
            selection_id,
            is_tradable: suspension.as_str() != Some("N/O"),
        },
        None => ContentContainer::Unknown,
    }
}

fn decode_added(
    content_identifier: ContentIdentifier,
    path: &str,
    change: &Value,
) -> ContentContainer {
    if path.contains("idfomarket") {
        if let Ok(market) = serde_json::from_value::<WireMarket>(change.clone()) {
            return ContentContainer::AddMarket {
                content_identifier,
                market,
            };
        }
    } else if path.contains("idfoevent") {
        if let Ok(event) = serde_json::from_value::<WireMatch>(change.clone()) {
            return ContentContainer::AddEvent {
                content_identifier,
                event,
            };
        }
    }
    ContentContainer::Unknown
}

fn decode_removed(content_identifier: ContentIdentifier, path: &str) -> ContentContainer {
    if let ContentRoute::Market { market_id } = &content_identifier.content_route {
        let market_id = market_id.clone();
        return ContentContainer::RemoveMarket {
            content_identifier,
            market_id,
        };
    }

    if path.contains("idfoselection") {
        if let Some(selection_id) = extract_selection_id(path) {
            return ContentContainer::RemoveSelection {
                content_identifier,
                selection_id,
            };
        }
    } else if path.contains("idfomarket") {
        if let Some(market_id) = extract_market_id(path) {
            return ContentContainer::RemoveMarket {
                content_identifier,
                market_id,
            };
        }
    } else if path.contains("idfoevent") {
        if let Some(event_id) = extract_event_id(path) {
            return ContentContainer::RemoveEvent {
                content_identifier,
                event_id,
            };
        }
    }
    ContentContainer::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const LIVE_TYPE: &str = "liveDataSummaryAdvancedListBySportType";

    fn live_identifier() -> ContentIdentifier {
        ContentIdentifier::parse(LIVE_TYPE, "FBL/0").unwrap()
    }

    fn single(frame: Value) -> ContentContainer {
        match decode_message(&frame.to_string()).as_slice() {
            [PushEvent::Content(container)] => container.clone(),
            other => panic!("unexpected decode result: {other:?}"),
        }
    }

    #[test]
    fn id_extraction_forms() {
        assert_eq!(
            extract_event_id("events[idfoevent=123.1].numMarkets"),
            Some("123.1".to_string())
        );
        assert_eq!(
            extract_market_id("markets/idfomarket:55/istradable"),
            Some("55".to_string())
        );
        assert_eq!(
            extract_selection_id("selections/idfoselection/77"),
            Some("77".to_string())
        );
        assert_eq!(extract_event_id("markets[idfomarket=1]"), None);
    }

    #[test]
    fn match_minutes() {
        assert_eq!(extract_match_minutes("67:12"), Some("67".to_string()));
        assert_eq!(extract_match_minutes("90"), Some("90".to_string()));
        assert_eq!(extract_match_minutes(""), None);
    }

    #[test]
    fn refreshed_live_list_skips_bad_entries() {
        let container = single(json!({
            "changeType": "refreshed",
            "contentId": {"type": LIVE_TYPE, "id": "FBL/0"},
            "change": [{"idfoevent": "e1"}, 42, {"idfoevent": "e2"}]
        }));

        match container {
            ContentContainer::LiveEvents {
                content_identifier,
                events,
            } => {
                assert_eq!(content_identifier, live_identifier());
                assert_eq!(events.len(), 2);
            }
            other => panic!("unexpected container: {other:?}"),
        }
    }

    #[test]
    fn missing_change_type_is_a_snapshot() {
        let container = single(json!({
            "contentId": {"type": "eventListBySportTypeDate", "id": "FBL///0/20/T"}
        }));
        assert!(matches!(
            container,
            ContentContainer::PreLiveEvents { ref events, .. } if events.is_empty()
        ));
    }

    #[test]
    fn selection_price_update() {
        let container = single(json!({
            "changeType": "updated",
            "contentId": {"type": LIVE_TYPE, "id": "FBL/0"},
            "path": "events[idfoevent=1].markets[idfomarket=2].selections[idfoselection=3]",
            "change": {"idfoselection": "3", "currentpriceup": "5", "currentpricedown": 2}
        }));
        assert_eq!(
            container,
            ContentContainer::UpdateOutcomeOdd {
                content_identifier: live_identifier(),
                selection_id: "3".to_string(),
                numerator: Some("5".to_string()),
                denominator: Some("2".to_string()),
            }
        );
    }

    #[test]
    fn selection_suspension() {
        let frame = |suspension: &str| {
            json!({
                "changeType": "updated",
                "contentId": {"type": LIVE_TYPE, "id": "FBL/0"},
                "path": "selections[idfoselection=3]",
                "change": {"idfoselectionsuspensiontype": suspension}
            })
        };
        assert!(matches!(
            single(frame("N/O")),
            ContentContainer::UpdateOutcomeTradability { is_tradable: false, .. }
        ));
        assert!(matches!(
            single(frame("")),
            ContentContainer::UpdateOutcomeTradability { is_tradable: true, .. }
        ));
    }

    #[test]
    fn market_tradability_and_market_count() {
        assert!(matches!(
            single(json!({
                "changeType": "updated",
                "contentId": {"type": LIVE_TYPE, "id": "FBL/0"},
                "path": "markets[idfomarket=9].istradable",
                "change": false
            })),
            ContentContainer::UpdateMarketTradability { ref market_id, is_tradable: false, .. }
                if market_id == "9"
        ));
        assert!(matches!(
            single(json!({
                "changeType": "updated",
                "contentId": {"type": LIVE_TYPE, "id": "FBL/0"},
                "path": "[idfoevent=4].numMarkets",
                "change": "17"
            })),
            ContentContainer::UpdateEventMarketCount { new_market_count: 17, .. }
        ));
    }

    #[test]
    fn live_data_summary_updates() {
        let base = |path: &str, change: Value| {
            json!({
                "changeType": "updated",
                "contentId": {"type": LIVE_TYPE, "id": "FBL/0"},
                "path": path,
                "change": change
            })
        };

        assert_eq!(
            single(base(
                "[idfoevent=4].liveDataSummary.scores.CURRENT_SCORE",
                json!({"home": 2, "away": 1})
            )),
            ContentContainer::UpdateEventScore {
                content_identifier: live_identifier(),
                event_id: "4".to_string(),
                home_score: Some(2),
                away_score: Some(1),
            }
        );
        assert_eq!(
            single(base("[idfoevent=4].liveDataSummary.matchTime", json!("67:12"))),
            ContentContainer::UpdateEventTime {
                content_identifier: live_identifier(),
                event_id: "4".to_string(),
                new_time: "67".to_string(),
            }
        );
        assert_eq!(
            single(base("[idfoevent=4].liveDataSummary.status", json!("Ended"))),
            ContentContainer::UpdateEventState {
                content_identifier: live_identifier(),
                event_id: "4".to_string(),
                state: "Ended".to_string(),
            }
        );
    }

    #[test]
    fn event_live_data_route_builds_extended_update() {
        let container = single(json!({
            "changeType": "updated",
            "contentId": {"type": "liveDataSummaryAdvanced", "id": "e7"},
            "path": "",
            "change": {"status": "1st Half", "matchTime": "10:00",
                       "scores": {"CURRENT_SCORE": {"home": 0, "away": 1}}}
        }));
        match container {
            ContentContainer::UpdateEventLiveDataExtended {
                event_id, live_data, ..
            } => {
                assert_eq!(event_id, "e7");
                assert_eq!(live_data.away_score, Some(1));
                assert_eq!(live_data.status.as_deref(), Some("1st Half"));
            }
            other => panic!("unexpected container: {other:?}"),
        }
    }

    #[test]
    fn added_and_removed() {
        assert!(matches!(
            single(json!({
                "changeType": "added",
                "contentId": {"type": LIVE_TYPE, "id": "FBL/0"},
                "path": "[idfoevent=4].markets[idfomarket=8]",
                "change": {"idfomarket": "8", "istradable": true, "selections": []}
            })),
            ContentContainer::AddMarket { .. }
        ));
        assert!(matches!(
            single(json!({
                "changeType": "added",
                "contentId": {"type": LIVE_TYPE, "id": "FBL/0"},
                "path": "[idfoevent=5]",
                "change": {"idfoevent": "5"}
            })),
            ContentContainer::AddEvent { .. }
        ));
        assert!(matches!(
            single(json!({
                "changeType": "removed",
                "contentId": {"type": LIVE_TYPE, "id": "FBL/0"},
                "path": "[idfoevent=5]"
            })),
            ContentContainer::RemoveEvent { ref event_id, .. } if event_id == "5"
        ));
        assert!(matches!(
            single(json!({
                "changeType": "removed",
                "contentId": {"type": "market", "id": "m3"},
                "path": "whatever"
            })),
            ContentContainer::RemoveMarket { ref market_id, .. } if market_id == "m3"
        ));
    }

    #[test]
    fn market_route_tradability_toggles() {
        assert!(matches!(
            single(json!({
                "changeType": "updated",
                "contentId": {"type": "market", "id": "m3"},
                "path": "istradable",
                "change": true
            })),
            ContentContainer::EnableMarket { ref market_id, .. } if market_id == "m3"
        ));
    }

    #[test]
    fn session_frames_and_arrays() {
        let events = decode_message(
            &json!([
                {"subscriberId": "abc"},
                {"data": [{"contentId": {"type": "nope", "id": "x"}}]}
            ])
            .to_string(),
        );
        assert_eq!(
            events,
            vec![
                PushEvent::Session("abc".to_string()),
                PushEvent::Content(ContentContainer::Unknown),
            ]
        );
    }

    #[test]
    fn garbage_decodes_to_nothing() {
        assert!(decode_message("not json").is_empty());
    }
}
