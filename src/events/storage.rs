//! Keyed in-memory cache of events, markets and outcomes.
//!
//! Every entity lives behind a `watch` channel: a receiver created at any time
//! sees the latest value immediately and every replacement after that.
//! Updates never mutate a stored value; they build a new one and replace it.

use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::trace;

use super::types::{Event, Market, OddFormat, Outcome};
use crate::mapper::{map_event_status, parse_price_component};

/// Cache of events with per-entity update channels.
#[derive(Default)]
pub struct EventsStorage {
    /// Event id -> current event.
    events: DashMap<String, watch::Sender<Event>>,
    /// Market id -> current market.
    markets: DashMap<String, watch::Sender<Market>>,
    /// Outcome id -> current outcome.
    outcomes: DashMap<String, watch::Sender<Outcome>>,
    /// Event ids in the order they were first stored.
    event_order: RwLock<Vec<String>>,
    /// Set by the first `store_events` after creation or `reset`.
    has_stored: AtomicBool,
}

impl EventsStorage {
    /// Create an empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert events and their nested markets and outcomes.
    ///
    /// New ids are appended to the list order; known ids keep their position
    /// and have their value replaced. Markets and outcomes the replaced value
    /// had and the new one lacks are dropped.
    pub fn store_events(&self, events: Vec<Event>) {
        self.has_stored.store(true, Ordering::SeqCst);

        for event in events {
            let previous = self.events.get(&event.id).map(|s| s.borrow().clone());
            if let Some(previous) = previous {
                self.drop_missing_children(&previous, &event);
            }

            for market in &event.markets {
                for outcome in &market.outcomes {
                    upsert(&self.outcomes, &outcome.id, outcome.clone());
                }
                upsert(&self.markets, &market.id, market.clone());
            }

            let id = event.id.clone();
            let is_new = upsert(&self.events, &id, event);
            if is_new {
                self.event_order.write().push(id);
            }
        }
    }

    /// Append or replace a single event.
    pub fn add_event(&self, event: Event) {
        self.store_events(vec![event]);
    }

    /// Drop an event with its markets and outcomes. Returns whether it existed.
    pub fn remove_event(&self, id: &str) -> bool {
        let Some((_, sender)) = self.events.remove(id) else {
            return false;
        };

        let event = sender.borrow().clone();
        for market in &event.markets {
            for outcome in &market.outcomes {
                self.outcomes.remove(&outcome.id);
            }
            self.markets.remove(&market.id);
        }
        self.event_order.write().retain(|stored| stored != id);
        true
    }

    /// Current events in list order, each reflecting every applied update.
    pub fn stored_events(&self) -> Vec<Event> {
        let order = self.event_order.read().clone();
        order
            .iter()
            .filter_map(|id| {
                let event = self.events.get(id)?.borrow().clone();
                Some(self.assemble_event(event))
            })
            .collect()
    }

    /// Whether `store_events` ran since creation or the last reset.
    pub fn has_stored_events(&self) -> bool {
        self.has_stored.load(Ordering::SeqCst)
    }

    /// Number of stored events.
    pub fn len(&self) -> usize {
        self.event_order.read().len()
    }

    /// Whether no event is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replace an outcome's price.
    ///
    /// A missing component keeps its previous value. If a provided component
    /// is non-numeric, or the denominator is zero, the whole previous odd is
    /// kept. Known outcomes are republished even when nothing changed.
    pub fn update_outcome_odd(
        &self,
        id: &str,
        numerator: Option<&str>,
        denominator: Option<&str>,
    ) -> bool {
        let Some(sender) = self.outcomes.get(id) else {
            trace!(outcome_id = %id, "Odd update for unknown outcome");
            return false;
        };

        let mut outcome = sender.borrow().clone();
        let (previous_numerator, previous_denominator) = outcome.odd.fraction_parts();
        let numerator = match numerator {
            Some(raw) => parse_price_component(raw),
            None => Some(previous_numerator),
        };
        let denominator = match denominator {
            Some(raw) => parse_price_component(raw),
            None => Some(previous_denominator),
        };

        if let Some(odd) = numerator
            .zip(denominator)
            .and_then(|(n, d)| OddFormat::fraction(n, d))
        {
            outcome.odd = odd;
        }
        sender.send_replace(outcome);
        true
    }

    /// Open or suspend an outcome.
    pub fn update_outcome_tradability(&self, id: &str, is_tradable: bool) -> bool {
        let Some(sender) = self.outcomes.get(id) else {
            return false;
        };
        let mut outcome = sender.borrow().clone();
        outcome.is_tradable = is_tradable;
        sender.send_replace(outcome);
        true
    }

    /// Open or suspend a market.
    pub fn update_market_tradability(&self, id: &str, is_tradable: bool) -> bool {
        let Some(sender) = self.markets.get(id) else {
            trace!(market_id = %id, "Tradability update for unknown market");
            return false;
        };
        let mut market = self.assemble_market(sender.borrow().clone());
        market.is_tradable = is_tradable;
        sender.send_replace(market);
        true
    }

    /// Replace an event's status from a raw provider label.
    pub fn update_event_status(&self, id: &str, new_status: &str) -> bool {
        let status = map_event_status(new_status);
        self.modify_event(id, |event| event.status = status)
    }

    /// Replace an event's match clock.
    pub fn update_event_time(&self, id: &str, new_time: &str) -> bool {
        let new_time = new_time.to_string();
        self.modify_event(id, |event| event.match_time = Some(new_time))
    }

    /// Replace an event's score. A missing side keeps its previous value.
    pub fn update_event_score(&self, id: &str, home: Option<u32>, away: Option<u32>) -> bool {
        self.modify_event(id, |event| {
            if home.is_some() {
                event.home_team_score = home;
            }
            if away.is_some() {
                event.away_team_score = away;
            }
        })
    }

    /// Replace an event's market count.
    pub fn update_event_market_count(&self, id: &str, count: u32) -> bool {
        self.modify_event(id, |event| event.number_markets = Some(count))
    }

    /// Live updates of an event, `None` if it was never stored.
    pub fn subscribe_to_event_updates(&self, id: &str) -> Option<watch::Receiver<Event>> {
        self.events.get(id).map(|sender| sender.subscribe())
    }

    /// Live updates of a market, `None` if it was never stored.
    pub fn subscribe_to_market_updates(&self, id: &str) -> Option<watch::Receiver<Market>> {
        self.markets.get(id).map(|sender| sender.subscribe())
    }

    /// Live updates of an outcome, `None` if it was never stored.
    pub fn subscribe_to_outcome_updates(&self, id: &str) -> Option<watch::Receiver<Outcome>> {
        self.outcomes.get(id).map(|sender| sender.subscribe())
    }

    /// Drop every entity. Held receivers see their channel close.
    pub fn reset(&self) {
        self.event_order.write().clear();
        self.events.clear();
        self.markets.clear();
        self.outcomes.clear();
        self.has_stored.store(false, Ordering::SeqCst);
    }

    /// Whether an event id is stored.
    pub fn contains_event(&self, id: &str) -> bool {
        self.events.contains_key(id)
    }

    /// Whether a market id is stored.
    pub fn contains_market(&self, id: &str) -> bool {
        self.markets.contains_key(id)
    }

    /// Whether an outcome id is stored.
    pub fn contains_outcome(&self, id: &str) -> bool {
        self.outcomes.contains_key(id)
    }

    fn drop_missing_children(&self, previous: &Event, current: &Event) {
        for market in &previous.markets {
            for outcome in &market.outcomes {
                let still_listed = current
                    .markets
                    .iter()
                    .flat_map(|m| &m.outcomes)
                    .any(|o| o.id == outcome.id);
                if !still_listed {
                    self.outcomes.remove(&outcome.id);
                }
            }
            if !current.markets.iter().any(|m| m.id == market.id) {
                self.markets.remove(&market.id);
            }
        }
    }

    fn modify_event(&self, id: &str, apply: impl FnOnce(&mut Event)) -> bool {
        let Some(sender) = self.events.get(id) else {
            trace!(event_id = %id, "Update for unknown event");
            return false;
        };
        let mut event = self.assemble_event(sender.borrow().clone());
        apply(&mut event);
        sender.send_replace(event);
        true
    }

    fn assemble_market(&self, mut market: Market) -> Market {
        for outcome in market.outcomes.iter_mut() {
            if let Some(current) = self.outcomes.get(&outcome.id) {
                *outcome = current.borrow().clone();
            }
        }
        market
    }

    fn assemble_event(&self, mut event: Event) -> Event {
        event.markets = event
            .markets
            .into_iter()
            .map(|market| {
                let current = self
                    .markets
                    .get(&market.id)
                    .map(|m| m.borrow().clone())
                    .unwrap_or(market);
                self.assemble_market(current)
            })
            .collect();
        event
    }
}

/// Replace the value behind `id`, creating the channel if needed.
/// Returns whether the id was new.
fn upsert<T>(map: &DashMap<String, watch::Sender<T>>, id: &str, value: T) -> bool {
    if let Some(sender) = map.get(id) {
        sender.send_replace(value);
        return false;
    }
    let (sender, _) = watch::channel(value);
    map.insert(id.to_string(), sender);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::types::{EventStatus, SportType};
    use pretty_assertions::assert_eq;
    use time::OffsetDateTime;

    fn outcome(id: &str, numerator: u32, denominator: u32) -> Outcome {
        Outcome {
            id: id.to_string(),
            name: id.to_string(),
            odd: OddFormat::Fraction {
                numerator,
                denominator,
            },
            market_id: None,
            order_key: None,
            is_tradable: true,
            is_terminated: false,
        }
    }

    fn market(id: &str, outcomes: Vec<Outcome>) -> Market {
        Market {
            id: id.to_string(),
            name: id.to_string(),
            outcomes,
            market_type_id: None,
            market_type_name: None,
            event_id: None,
            is_tradable: true,
            is_main_market: false,
        }
    }

    fn event(id: &str, markets: Vec<Market>) -> Event {
        Event {
            id: id.to_string(),
            name: None,
            home_team_name: "Home".to_string(),
            away_team_name: "Away".to_string(),
            home_team_score: None,
            away_team_score: None,
            competition_id: "c1".to_string(),
            competition_name: "League".to_string(),
            sport: SportType::default(),
            start_date: OffsetDateTime::UNIX_EPOCH,
            markets,
            status: EventStatus::NotStarted,
            match_time: None,
            number_markets: None,
        }
    }

    fn ids(events: &[Event]) -> Vec<&str> {
        events.iter().map(|e| e.id.as_str()).collect()
    }

    #[test]
    fn stored_events_concatenate_in_call_order() {
        let storage = EventsStorage::new();
        storage.store_events(vec![event("e1", vec![]), event("e2", vec![])]);
        storage.store_events(vec![event("e3", vec![])]);

        assert_eq!(ids(&storage.stored_events()), vec!["e1", "e2", "e3"]);
        assert!(storage.has_stored_events());
    }

    #[test]
    fn restoring_known_id_keeps_position() {
        let storage = EventsStorage::new();
        storage.store_events(vec![event("e1", vec![]), event("e2", vec![])]);
        let mut replacement = event("e1", vec![]);
        replacement.home_team_name = "Renamed".to_string();
        storage.store_events(vec![replacement]);

        let stored = storage.stored_events();
        assert_eq!(ids(&stored), vec!["e1", "e2"]);
        assert_eq!(stored[0].home_team_name, "Renamed");
    }

    #[test]
    fn subscribe_returns_none_for_unknown_ids() {
        let storage = EventsStorage::new();
        assert!(storage.subscribe_to_event_updates("e1").is_none());
        assert!(storage.subscribe_to_market_updates("m1").is_none());
        assert!(storage.subscribe_to_outcome_updates("o1").is_none());
    }

    #[test]
    fn late_subscriber_sees_current_value() {
        let storage = EventsStorage::new();
        storage.store_events(vec![event(
            "e1",
            vec![market("m1", vec![outcome("o1", 5, 2)])],
        )]);
        storage.update_outcome_odd("o1", Some("7"), Some("4"));

        let receiver = storage.subscribe_to_outcome_updates("o1").unwrap();
        assert_eq!(receiver.borrow().odd.fraction_parts(), (7, 4));
    }

    #[test]
    fn non_numeric_numerator_keeps_previous_and_republishes() {
        let storage = EventsStorage::new();
        storage.store_events(vec![event(
            "e1",
            vec![market("m1", vec![outcome("o1", 5, 2)])],
        )]);
        let mut receiver = storage.subscribe_to_outcome_updates("o1").unwrap();

        assert!(storage.update_outcome_odd("o1", Some("abc"), Some("3")));

        assert!(receiver.has_changed().unwrap());
        assert_eq!(receiver.borrow_and_update().odd.fraction_parts(), (5, 2));
    }

    #[test]
    fn zero_denominator_keeps_previous_odd() {
        let storage = EventsStorage::new();
        storage.store_events(vec![event(
            "e1",
            vec![market("m1", vec![outcome("o1", 5, 2)])],
        )]);

        storage.update_outcome_odd("o1", Some("4"), Some("0"));

        let receiver = storage.subscribe_to_outcome_updates("o1").unwrap();
        assert_eq!(receiver.borrow().odd.fraction_parts(), (5, 2));
    }

    #[test]
    fn missing_component_keeps_only_that_part() {
        let storage = EventsStorage::new();
        storage.store_events(vec![event(
            "e1",
            vec![market("m1", vec![outcome("o1", 5, 2)])],
        )]);

        storage.update_outcome_odd("o1", Some("9"), None);

        let receiver = storage.subscribe_to_outcome_updates("o1").unwrap();
        assert_eq!(receiver.borrow().odd.fraction_parts(), (9, 2));
    }

    #[test]
    fn updates_on_unknown_ids_are_noops() {
        let storage = EventsStorage::new();
        assert!(!storage.update_outcome_odd("o1", Some("1"), Some("2")));
        assert!(!storage.update_market_tradability("m1", false));
        assert!(!storage.update_event_status("e1", "ended"));
        assert!(!storage.update_event_time("e1", "10:00"));
        assert!(!storage.update_event_score("e1", Some(1), Some(0)));
        assert!(!storage.contains_event("e1"));
        assert!(storage.subscribe_to_event_updates("e1").is_none());
    }

    #[test]
    fn stored_events_reflect_nested_updates() {
        let storage = EventsStorage::new();
        storage.store_events(vec![event(
            "e1",
            vec![market("m1", vec![outcome("o1", 5, 2)])],
        )]);
        storage.update_outcome_odd("o1", Some("11"), Some("10"));
        storage.update_market_tradability("m1", false);
        storage.update_event_score("e1", Some(2), None);

        let stored = storage.stored_events();
        let market = &stored[0].markets[0];
        assert!(!market.is_tradable);
        assert_eq!(market.outcomes[0].odd.fraction_parts(), (11, 10));
        assert_eq!(stored[0].home_team_score, Some(2));
        assert_eq!(stored[0].away_team_score, None);
    }

    #[test]
    fn market_update_carries_current_outcomes() {
        let storage = EventsStorage::new();
        storage.store_events(vec![event(
            "e1",
            vec![market("m1", vec![outcome("o1", 5, 2)])],
        )]);
        let receiver = storage.subscribe_to_market_updates("m1").unwrap();

        storage.update_outcome_odd("o1", Some("1"), Some("3"));
        storage.update_market_tradability("m1", false);

        let market = receiver.borrow().clone();
        assert!(!market.is_tradable);
        assert_eq!(market.outcomes[0].odd.fraction_parts(), (1, 3));
    }

    #[test]
    fn event_status_uses_status_vocabulary() {
        let storage = EventsStorage::new();
        storage.store_events(vec![event("e1", vec![])]);
        storage.update_event_status("e1", "Finished");
        storage.update_event_time("e1", "90:00");

        let receiver = storage.subscribe_to_event_updates("e1").unwrap();
        let current = receiver.borrow().clone();
        assert_eq!(current.status, EventStatus::Ended("Finished".to_string()));
        assert_eq!(current.match_time.as_deref(), Some("90:00"));
    }

    #[test]
    fn remove_event_drops_children() {
        let storage = EventsStorage::new();
        storage.store_events(vec![
            event("e1", vec![market("m1", vec![outcome("o1", 1, 1)])]),
            event("e2", vec![]),
        ]);

        assert!(storage.remove_event("e1"));
        assert!(!storage.remove_event("e1"));
        assert!(!storage.contains_market("m1"));
        assert!(!storage.contains_outcome("o1"));
        assert_eq!(ids(&storage.stored_events()), vec!["e2"]);
    }

    #[test]
    fn restoring_with_fewer_children_drops_them() {
        let storage = EventsStorage::new();
        storage.store_events(vec![event(
            "e1",
            vec![
                market("m1", vec![outcome("o1", 1, 1), outcome("o2", 2, 1)]),
                market("m2", vec![outcome("o3", 3, 1)]),
            ],
        )]);

        storage.store_events(vec![event(
            "e1",
            vec![market("m1", vec![outcome("o1", 1, 1)])],
        )]);

        assert!(storage.contains_market("m1"));
        assert!(storage.contains_outcome("o1"));
        assert!(!storage.contains_outcome("o2"));
        assert!(!storage.contains_market("m2"));
        assert!(!storage.contains_outcome("o3"));
        assert!(storage.subscribe_to_market_updates("m2").is_none());

        let stored = storage.stored_events();
        assert_eq!(stored[0].markets.len(), 1);
        assert_eq!(stored[0].markets[0].outcomes.len(), 1);
    }

    #[test]
    fn reset_clears_everything() {
        let storage = EventsStorage::new();
        storage.store_events(vec![event(
            "e1",
            vec![market("m1", vec![outcome("o1", 1, 1)])],
        )]);

        storage.reset();

        assert!(!storage.contains_event("e1"));
        assert!(!storage.contains_market("m1"));
        assert!(!storage.contains_outcome("o1"));
        assert!(storage.stored_events().is_empty());
        assert!(!storage.has_stored_events());
        assert!(storage.subscribe_to_event_updates("e1").is_none());
    }
}
