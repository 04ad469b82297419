//! Subscription topics, subscription handles and push content containers.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

use crate::mapper::wire::{WireMarket, WireMatch};

/// Kind of content a subscription targets.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
pub enum ContentType {
    /// Paged list of live events for a sport.
    #[strum(serialize = "liveDataSummaryAdvancedListBySportType")]
    LiveEvents,
    /// Paged list of upcoming events for a sport and date range.
    #[strum(serialize = "eventListBySportTypeDate")]
    PreLiveEvents,
    /// A single event with its markets.
    #[strum(serialize = "event")]
    EventDetails,
    /// Live scoreboard of a single event.
    #[strum(serialize = "liveDataSummaryAdvanced")]
    EventDetailsLiveData,
    /// A single market.
    #[strum(serialize = "market")]
    Market,
}

/// Ordering requested for pre-live event lists.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
pub enum EventListSort {
    /// By scheduled start.
    #[default]
    #[strum(serialize = "T")]
    StartTime,
    /// By popularity.
    #[strum(serialize = "P")]
    Popular,
}

/// What a subscription is for: sport, date window and page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContentRoute {
    /// Upcoming events of a sport.
    PreLiveEvents {
        /// Sport code (e.g. `FBL`).
        sport_alpha_id: String,
        /// Window start.
        start_date: Option<OffsetDateTime>,
        /// Window end.
        end_date: Option<OffsetDateTime>,
        /// Zero-based page.
        page_index: usize,
        /// Events per page; `None` means unbounded.
        event_count: Option<usize>,
        /// List ordering.
        sort_type: EventListSort,
    },
    /// Live events of a sport.
    LiveEvents {
        /// Sport code (e.g. `FBL`).
        sport_alpha_id: String,
        /// Zero-based page.
        page_index: usize,
    },
    /// One event.
    EventDetails {
        /// Event id.
        event_id: String,
    },
    /// Live data of one event.
    EventDetailsLiveData {
        /// Event id.
        event_id: String,
    },
    /// One market.
    Market {
        /// Market id.
        market_id: String,
    },
}

fn format_route_date(date: Option<OffsetDateTime>) -> String {
    let format = format_description!("[year][month][day][hour][minute]");
    date.and_then(|d| d.format(&format).ok()).unwrap_or_default()
}

fn parse_route_date(segment: &str) -> Option<OffsetDateTime> {
    let format = format_description!("[year][month][day][hour][minute]");
    PrimitiveDateTime::parse(segment, &format)
        .ok()
        .map(PrimitiveDateTime::assume_utc)
}

impl ContentRoute {
    /// Wire id of the route, e.g. `FBL/202210210000/202210212359/0/20/T`.
    pub fn full_route(&self) -> String {
        match self {
            ContentRoute::PreLiveEvents {
                sport_alpha_id,
                start_date,
                end_date,
                page_index,
                event_count,
                sort_type,
            } => format!(
                "{}/{}/{}/{}/{}/{}",
                sport_alpha_id,
                format_route_date(*start_date),
                format_route_date(*end_date),
                page_index,
                event_count.map(|c| c.to_string()).unwrap_or_default(),
                sort_type
            ),
            ContentRoute::LiveEvents {
                sport_alpha_id,
                page_index,
            } => format!("{}/{}", sport_alpha_id, page_index),
            ContentRoute::EventDetails { event_id } => event_id.clone(),
            ContentRoute::EventDetailsLiveData { event_id } => event_id.clone(),
            ContentRoute::Market { market_id } => market_id.clone(),
        }
    }

    /// Route identity shared by every page of the same list.
    pub fn pageable_route(&self) -> String {
        match self {
            ContentRoute::PreLiveEvents {
                sport_alpha_id,
                start_date,
                end_date,
                event_count,
                sort_type,
                ..
            } => format!(
                "{}/{}/{}/{}/{}",
                sport_alpha_id,
                format_route_date(*start_date),
                format_route_date(*end_date),
                event_count.map(|c| c.to_string()).unwrap_or_default(),
                sort_type
            ),
            ContentRoute::LiveEvents { sport_alpha_id, .. } => sport_alpha_id.clone(),
            other => other.full_route(),
        }
    }

    /// Page index for paged routes.
    pub fn page_index(&self) -> Option<usize> {
        match self {
            ContentRoute::PreLiveEvents { page_index, .. }
            | ContentRoute::LiveEvents { page_index, .. } => Some(*page_index),
            _ => None,
        }
    }

    /// Requested events per page, if bounded.
    pub fn event_count(&self) -> Option<usize> {
        match self {
            ContentRoute::PreLiveEvents { event_count, .. } => *event_count,
            _ => None,
        }
    }

    /// Same route pointed at another page. `None` for routes that do not page.
    pub fn with_page(&self, page: usize) -> Option<ContentRoute> {
        match self {
            ContentRoute::PreLiveEvents {
                sport_alpha_id,
                start_date,
                end_date,
                event_count,
                sort_type,
                ..
            } => Some(ContentRoute::PreLiveEvents {
                sport_alpha_id: sport_alpha_id.clone(),
                start_date: *start_date,
                end_date: *end_date,
                page_index: page,
                event_count: *event_count,
                sort_type: *sort_type,
            }),
            ContentRoute::LiveEvents { sport_alpha_id, .. } => Some(ContentRoute::LiveEvents {
                sport_alpha_id: sport_alpha_id.clone(),
                page_index: page,
            }),
            _ => None,
        }
    }

    fn parse(content_type: ContentType, id: &str) -> Option<Self> {
        match content_type {
            ContentType::PreLiveEvents => {
                let parts: Vec<&str> = id.split('/').collect();
                if parts.len() != 6 || parts[0].is_empty() {
                    return None;
                }
                Some(ContentRoute::PreLiveEvents {
                    sport_alpha_id: parts[0].to_string(),
                    start_date: parse_route_date(parts[1]),
                    end_date: parse_route_date(parts[2]),
                    page_index: parts[3].parse().ok()?,
                    event_count: parts[4].parse().ok(),
                    sort_type: EventListSort::from_str(parts[5]).unwrap_or_default(),
                })
            }
            ContentType::LiveEvents => {
                let (sport, page) = id.split_once('/')?;
                if sport.is_empty() {
                    return None;
                }
                Some(ContentRoute::LiveEvents {
                    sport_alpha_id: sport.to_string(),
                    page_index: page.parse().ok()?,
                })
            }
            ContentType::EventDetails => Some(ContentRoute::EventDetails {
                event_id: id.to_string(),
            }),
            ContentType::EventDetailsLiveData => Some(ContentRoute::EventDetailsLiveData {
                event_id: id.to_string(),
            }),
            ContentType::Market => Some(ContentRoute::Market {
                market_id: id.to_string(),
            }),
        }
    }
}

/// Topic of a subscription: content type plus route.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentIdentifier {
    /// Content type.
    pub content_type: ContentType,
    /// Route within the content type.
    pub content_route: ContentRoute,
}

impl ContentIdentifier {
    /// Create a new identifier.
    pub fn new(content_type: ContentType, content_route: ContentRoute) -> Self {
        Self {
            content_type,
            content_route,
        }
    }

    /// Parse the `{type, id}` pair found in subscribe bodies and push frames.
    pub fn parse(content_type: &str, id: &str) -> Option<Self> {
        let content_type = ContentType::from_str(content_type).ok()?;
        let content_route = ContentRoute::parse(content_type, id)?;
        Some(Self::new(content_type, content_route))
    }

    /// Wire id of the route.
    pub fn full_route(&self) -> String {
        self.content_route.full_route()
    }

    /// Key shared by every page of the same list.
    pub fn pageable_id(&self) -> String {
        format!("{}/{}", self.content_type, self.content_route.pageable_route())
    }

    /// Whether `other` targets the same list as `self`, ignoring the page.
    pub fn same_pageable_content(&self, other: &ContentIdentifier) -> bool {
        self.content_type == other.content_type
            && self.content_route.pageable_route() == other.content_route.pageable_route()
    }
}

impl std::fmt::Display for ContentIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.content_type, self.full_route())
    }
}

#[derive(Debug)]
struct SubscriptionInner {
    content_identifier: ContentIdentifier,
    session_token: String,
    associated: Mutex<Vec<Subscription>>,
}

/// Handle for an acknowledged subscription.
///
/// Clones share the same list of associated (paged) subscriptions.
#[derive(Debug, Clone)]
pub struct Subscription {
    inner: Arc<SubscriptionInner>,
}

impl Subscription {
    /// Create a subscription handle.
    pub fn new(content_identifier: ContentIdentifier, session_token: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(SubscriptionInner {
                content_identifier,
                session_token: session_token.into(),
                associated: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Subscribed topic.
    pub fn content_identifier(&self) -> &ContentIdentifier {
        &self.inner.content_identifier
    }

    /// Session token the subscription was made with.
    pub fn session_token(&self) -> &str {
        &self.inner.session_token
    }

    /// Chain a child subscription (e.g. a further page) to this one.
    pub fn associate_subscription(&self, subscription: Subscription) {
        self.inner.associated.lock().push(subscription);
    }

    /// Children chained to this subscription, in association order.
    pub fn associated_subscriptions(&self) -> Vec<Subscription> {
        self.inner.associated.lock().clone()
    }
}

impl PartialEq for Subscription {
    fn eq(&self, other: &Self) -> bool {
        self.content_identifier() == other.content_identifier()
            && self.session_token() == other.session_token()
    }
}

impl Eq for Subscription {}

/// Releases subscriptions on the remote side.
#[async_trait]
pub trait UnsubscriptionController: Send + Sync {
    /// Unsubscribe; failures are logged, never surfaced.
    async fn unsubscribe(&self, subscription: &Subscription);
}

/// State of a subscribable stream as seen by consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscribableContent<T> {
    /// Subscription acknowledged.
    Connected {
        /// The acknowledged subscription.
        subscription: Subscription,
    },
    /// New content.
    ContentUpdate {
        /// Full current content.
        content: T,
    },
    /// Not subscribed.
    Disconnected,
}

/// Live scoreboard delta.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EventLiveDataExtended {
    /// Event id.
    pub id: String,
    /// Home score.
    pub home_score: Option<u32>,
    /// Away score.
    pub away_score: Option<u32>,
    /// Match clock.
    pub match_time: Option<String>,
    /// Raw status label.
    pub status: Option<String>,
}

/// Decoded push payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentContainer {
    /// Full snapshot of a live list page.
    LiveEvents {
        /// Topic.
        content_identifier: ContentIdentifier,
        /// Events.
        events: Vec<WireMatch>,
    },
    /// Full snapshot of a pre-live list page.
    PreLiveEvents {
        /// Topic.
        content_identifier: ContentIdentifier,
        /// Events.
        events: Vec<WireMatch>,
    },
    /// Event appended to a list.
    AddEvent {
        /// Topic.
        content_identifier: ContentIdentifier,
        /// New event.
        event: WireMatch,
    },
    /// Market (re)published with current prices.
    AddMarket {
        /// Topic.
        content_identifier: ContentIdentifier,
        /// Market.
        market: WireMarket,
    },
    /// Event removed from a list.
    RemoveEvent {
        /// Topic.
        content_identifier: ContentIdentifier,
        /// Event id.
        event_id: String,
    },
    /// Market suspended.
    RemoveMarket {
        /// Topic.
        content_identifier: ContentIdentifier,
        /// Market id.
        market_id: String,
    },
    /// Selection withdrawn.
    RemoveSelection {
        /// Topic.
        content_identifier: ContentIdentifier,
        /// Selection id.
        selection_id: String,
    },
    /// Market reopened.
    EnableMarket {
        /// Topic.
        content_identifier: ContentIdentifier,
        /// Market id.
        market_id: String,
    },
    /// Clock, status and score in one delta.
    UpdateEventLiveDataExtended {
        /// Topic.
        content_identifier: ContentIdentifier,
        /// Event id.
        event_id: String,
        /// Live data.
        live_data: EventLiveDataExtended,
    },
    /// Status label changed.
    UpdateEventState {
        /// Topic.
        content_identifier: ContentIdentifier,
        /// Event id.
        event_id: String,
        /// Raw status label.
        state: String,
    },
    /// Match clock changed.
    UpdateEventTime {
        /// Topic.
        content_identifier: ContentIdentifier,
        /// Event id.
        event_id: String,
        /// New clock value.
        new_time: String,
    },
    /// Score changed.
    UpdateEventScore {
        /// Topic.
        content_identifier: ContentIdentifier,
        /// Event id.
        event_id: String,
        /// Home score.
        home_score: Option<u32>,
        /// Away score.
        away_score: Option<u32>,
    },
    /// Market opened or suspended.
    UpdateMarketTradability {
        /// Topic.
        content_identifier: ContentIdentifier,
        /// Market id.
        market_id: String,
        /// New flag.
        is_tradable: bool,
    },
    /// Number of markets of an event changed.
    UpdateEventMarketCount {
        /// Topic.
        content_identifier: ContentIdentifier,
        /// Event id.
        event_id: String,
        /// New count.
        new_market_count: u32,
    },
    /// Price moved.
    UpdateOutcomeOdd {
        /// Topic.
        content_identifier: ContentIdentifier,
        /// Selection id.
        selection_id: String,
        /// Raw numerator.
        numerator: Option<String>,
        /// Raw denominator.
        denominator: Option<String>,
    },
    /// Selection opened or suspended.
    UpdateOutcomeTradability {
        /// Topic.
        content_identifier: ContentIdentifier,
        /// Selection id.
        selection_id: String,
        /// New flag.
        is_tradable: bool,
    },
    /// Anything the decoder did not recognise.
    Unknown,
}

impl ContentContainer {
    /// Topic the payload belongs to.
    pub fn content_identifier(&self) -> Option<&ContentIdentifier> {
        match self {
            ContentContainer::LiveEvents { content_identifier, .. }
            | ContentContainer::PreLiveEvents { content_identifier, .. }
            | ContentContainer::AddEvent { content_identifier, .. }
            | ContentContainer::AddMarket { content_identifier, .. }
            | ContentContainer::RemoveEvent { content_identifier, .. }
            | ContentContainer::RemoveMarket { content_identifier, .. }
            | ContentContainer::RemoveSelection { content_identifier, .. }
            | ContentContainer::EnableMarket { content_identifier, .. }
            | ContentContainer::UpdateEventLiveDataExtended { content_identifier, .. }
            | ContentContainer::UpdateEventState { content_identifier, .. }
            | ContentContainer::UpdateEventTime { content_identifier, .. }
            | ContentContainer::UpdateEventScore { content_identifier, .. }
            | ContentContainer::UpdateMarketTradability { content_identifier, .. }
            | ContentContainer::UpdateEventMarketCount { content_identifier, .. }
            | ContentContainer::UpdateOutcomeOdd { content_identifier, .. }
            | ContentContainer::UpdateOutcomeTradability { content_identifier, .. } => {
                Some(content_identifier)
            }
            ContentContainer::Unknown => None,
        }
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ContentContainer::LiveEvents { .. } => "live_events",
            ContentContainer::PreLiveEvents { .. } => "pre_live_events",
            ContentContainer::AddEvent { .. } => "add_event",
            ContentContainer::AddMarket { .. } => "add_market",
            ContentContainer::RemoveEvent { .. } => "remove_event",
            ContentContainer::RemoveMarket { .. } => "remove_market",
            ContentContainer::RemoveSelection { .. } => "remove_selection",
            ContentContainer::EnableMarket { .. } => "enable_market",
            ContentContainer::UpdateEventLiveDataExtended { .. } => "update_event_live_data",
            ContentContainer::UpdateEventState { .. } => "update_event_state",
            ContentContainer::UpdateEventTime { .. } => "update_event_time",
            ContentContainer::UpdateEventScore { .. } => "update_event_score",
            ContentContainer::UpdateMarketTradability { .. } => "update_market_tradability",
            ContentContainer::UpdateEventMarketCount { .. } => "update_event_market_count",
            ContentContainer::UpdateOutcomeOdd { .. } => "update_outcome_odd",
            ContentContainer::UpdateOutcomeTradability { .. } => "update_outcome_tradability",
            ContentContainer::Unknown => "unknown",
        }
    }
}
