//! Paged, pushable subscription to a list of events.
//!
//! A paginator owns one [`EventsStorage`], subscribes its first page on
//! request, chains further pages to that subscription and routes push deltas
//! for its list into the storage. Consumers follow it through
//! [`EventsPaginator::events_stream`].

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use super::content::{
    ContentContainer, ContentIdentifier, SubscribableContent, Subscription,
    UnsubscriptionController,
};
use super::storage::EventsStorage;
use super::types::{Event, EventsGroup};
use crate::error::SubscriptionError;
use crate::mapper::{map_event, map_events, map_market};
use crate::metrics;
use crate::transport::SubscriptionTransport;

/// What list consumers receive.
pub type EventsContent = SubscribableContent<Vec<EventsGroup>>;

/// Current-value state of a paginator. An `Err` is terminal for streams.
pub type PaginatorState = Result<EventsContent, SubscriptionError>;

/// Clears the in-flight flag when a next-page request finishes.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Manages the subscription lifecycle of one paged event list.
pub struct EventsPaginator {
    /// Topic of the first page.
    content_identifier: ContentIdentifier,
    /// Subscribe/unsubscribe calls.
    transport: Arc<dyn SubscriptionTransport>,
    /// Events of every subscribed page.
    storage: Arc<EventsStorage>,
    /// Push session the subscriptions belong to.
    session_token: RwLock<String>,
    /// Acknowledged first-page subscription; later pages hang off it.
    subscription: RwLock<Option<Subscription>>,
    /// Page index of the first page.
    start_page_index: usize,
    /// Highest page requested so far.
    current_page: AtomicUsize,
    /// Whether the last snapshot filled a page. False until one arrives.
    has_next_page: AtomicBool,
    /// Set while a next-page subscribe is pending.
    next_page_in_flight: AtomicBool,
    /// Page size, `usize::MAX` when the route does not bound it.
    events_per_page: usize,
    /// Latest state, replayed to every new stream.
    state: watch::Sender<PaginatorState>,
    /// Cleared by `unsubscribe_all`.
    active: AtomicBool,
}

impl EventsPaginator {
    /// Create a paginator for the page described by `content_identifier`.
    pub fn new(
        content_identifier: ContentIdentifier,
        session_token: impl Into<String>,
        transport: Arc<dyn SubscriptionTransport>,
    ) -> Self {
        let start_page_index = content_identifier.content_route.page_index().unwrap_or(0);
        let events_per_page = content_identifier
            .content_route
            .event_count()
            .unwrap_or(usize::MAX);
        let (state, _) = watch::channel(Ok(SubscribableContent::Disconnected));

        Self {
            content_identifier,
            transport,
            storage: Arc::new(EventsStorage::new()),
            session_token: RwLock::new(session_token.into()),
            subscription: RwLock::new(None),
            start_page_index,
            current_page: AtomicUsize::new(start_page_index),
            has_next_page: AtomicBool::new(false),
            next_page_in_flight: AtomicBool::new(false),
            events_per_page,
            state,
            active: AtomicBool::new(true),
        }
    }

    /// Topic of the first page.
    pub fn content_identifier(&self) -> &ContentIdentifier {
        &self.content_identifier
    }

    /// Registry key shared by every page of this list.
    pub fn pageable_id(&self) -> String {
        self.content_identifier.pageable_id()
    }

    /// Storage holding the list's events.
    pub fn storage(&self) -> &Arc<EventsStorage> {
        &self.storage
    }

    /// Session token currently used for subscriptions.
    pub fn session_token(&self) -> String {
        self.session_token.read().clone()
    }

    /// Acknowledged first-page subscription.
    pub fn subscription(&self) -> Option<Subscription> {
        self.subscription.read().clone()
    }

    /// Page index of the first page.
    pub fn start_page_index(&self) -> usize {
        self.start_page_index
    }

    /// Highest page requested so far.
    pub fn current_page(&self) -> usize {
        self.current_page.load(Ordering::SeqCst)
    }

    /// Whether another page may exist.
    pub fn has_next_page(&self) -> bool {
        self.has_next_page.load(Ordering::SeqCst)
    }

    /// Page size.
    pub fn events_per_page(&self) -> usize {
        self.events_per_page
    }

    /// Whether the paginator has not been torn down.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Latest published state.
    pub fn state(&self) -> PaginatorState {
        self.state.borrow().clone()
    }

    /// Subscribe the first page.
    ///
    /// Resolves after the server answered. On success the state becomes
    /// `Connected`, followed by the stored list if a snapshot already arrived.
    /// On failure the error is also published, ending open streams.
    #[instrument(skip(self), fields(content = %self.content_identifier))]
    pub async fn request_initial_page(&self) -> Result<Subscription, SubscriptionError> {
        let token = self.session_token();

        match self
            .transport
            .subscribe(&token, &self.content_identifier)
            .await
        {
            Ok(()) => {
                let subscription = Subscription::new(self.content_identifier.clone(), token);
                *self.subscription.write() = Some(subscription.clone());
                self.set_state(Ok(SubscribableContent::Connected {
                    subscription: subscription.clone(),
                }));
                info!("Initial page subscribed");

                if self.storage.has_stored_events() {
                    self.publish_stored_events();
                }
                Ok(subscription)
            }
            Err(e) => {
                warn!(error = %e, "Initial page subscribe failed");
                self.set_state(Err(e.clone()));
                Err(e)
            }
        }
    }

    /// Subscribe the page after the current one.
    ///
    /// Returns `Ok(false)` without any network call when no next page exists
    /// or the route does not page. No page is known to follow until a
    /// snapshot fills the current one. A call made while another is pending fails
    /// with [`SubscriptionError::NextPageInFlight`]. A refused subscribe rolls
    /// the page counter back so a retry asks for the same page.
    #[instrument(skip(self), fields(content = %self.content_identifier))]
    pub async fn request_next_page(&self) -> Result<bool, SubscriptionError> {
        if !self.has_next_page() {
            return Ok(false);
        }

        if self.next_page_in_flight.swap(true, Ordering::SeqCst) {
            return Err(SubscriptionError::NextPageInFlight);
        }
        let _guard = InFlightGuard(&self.next_page_in_flight);

        let previous_page = self.current_page();
        let next_page = previous_page + 1;
        let Some(route) = self.content_identifier.content_route.with_page(next_page) else {
            return Ok(false);
        };
        let Some(parent) = self.subscription() else {
            return Err(SubscriptionError::SubscriptionNotFound);
        };

        self.current_page.store(next_page, Ordering::SeqCst);
        metrics::inc_pages_requested();

        let page_identifier = ContentIdentifier::new(self.content_identifier.content_type, route);
        let token = self.session_token();
        match self.transport.subscribe(&token, &page_identifier).await {
            Ok(()) => {
                debug!(page = next_page, "Next page subscribed");
                parent.associate_subscription(Subscription::new(page_identifier, token));
                Ok(true)
            }
            Err(e) => {
                warn!(page = next_page, error = %e, "Next page subscribe failed");
                self.current_page.store(previous_page, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    /// Store a page snapshot and republish the whole accumulated list.
    pub fn update_events_list(&self, events: Vec<Event>) {
        self.has_next_page
            .store(events.len() >= self.events_per_page, Ordering::SeqCst);
        self.storage.store_events(events);
        self.publish_stored_events();
    }

    /// Stream of states, starting with the current one.
    ///
    /// If the list already has content, a `Connected` item is emitted first
    /// so consumers always see the connection before content. A current
    /// `Connected` state is yielded once, not replayed twice. The stream ends
    /// after an error or when the paginator is dropped.
    pub fn events_stream(&self) -> BoxStream<'static, PaginatorState> {
        let mut receiver = self.state.subscribe();
        let subscription = self.subscription();

        async_stream::stream! {
            let current = receiver.borrow_and_update().clone();
            if let (Ok(SubscribableContent::ContentUpdate { .. }), Some(subscription)) =
                (&current, &subscription)
            {
                yield Ok(SubscribableContent::Connected {
                    subscription: subscription.clone(),
                });
            }

            let mut failed = current.is_err();
            yield current;

            while !failed && receiver.changed().await.is_ok() {
                let next = receiver.borrow_and_update().clone();
                failed = next.is_err();
                yield next;
            }
        }
        .boxed()
    }

    /// Apply a decoded push payload. Returns whether it changed the storage.
    ///
    /// Payloads for another list, deltas for unknown ids and anything arriving
    /// after `unsubscribe_all` are dropped.
    pub fn handle_content_update(&self, container: &ContentContainer) -> bool {
        if !self.is_active() {
            return false;
        }
        let Some(identifier) = container.content_identifier() else {
            return false;
        };
        if !self.content_identifier.same_pageable_content(identifier) {
            return false;
        }

        let kind = container.kind();
        let applied = self.apply_content(container);
        if applied {
            metrics::inc_updates_applied(kind);
        } else {
            metrics::inc_updates_dropped(kind);
            debug!(kind, "Dropped content update");
        }
        applied
    }

    fn apply_content(&self, container: &ContentContainer) -> bool {
        let storage = &self.storage;
        match container {
            ContentContainer::LiveEvents { events, .. }
            | ContentContainer::PreLiveEvents { events, .. } => {
                self.update_events_list(map_events(events));
                true
            }
            ContentContainer::AddEvent { event, .. } => {
                let event = map_event(event);
                if event.id.is_empty() {
                    return false;
                }
                storage.add_event(event);
                self.publish_stored_events();
                true
            }
            ContentContainer::RemoveEvent { event_id, .. } => {
                let removed = storage.remove_event(event_id);
                if removed {
                    self.publish_stored_events();
                }
                removed
            }
            ContentContainer::AddMarket { market, .. } => {
                let market = map_market(market);
                for outcome in &market.outcomes {
                    let (numerator, denominator) = outcome.odd.fraction_parts();
                    storage.update_outcome_odd(
                        &outcome.id,
                        Some(&numerator.to_string()),
                        Some(&denominator.to_string()),
                    );
                }
                storage.update_market_tradability(&market.id, market.is_tradable)
            }
            ContentContainer::EnableMarket { market_id, .. } => {
                storage.update_market_tradability(market_id, true)
            }
            ContentContainer::RemoveMarket { market_id, .. } => {
                storage.update_market_tradability(market_id, false)
            }
            ContentContainer::UpdateMarketTradability {
                market_id,
                is_tradable,
                ..
            } => storage.update_market_tradability(market_id, *is_tradable),
            ContentContainer::UpdateOutcomeOdd {
                selection_id,
                numerator,
                denominator,
                ..
            } => storage.update_outcome_odd(
                selection_id,
                numerator.as_deref(),
                denominator.as_deref(),
            ),
            ContentContainer::UpdateOutcomeTradability {
                selection_id,
                is_tradable,
                ..
            } => storage.update_outcome_tradability(selection_id, *is_tradable),
            ContentContainer::UpdateEventState {
                event_id, state, ..
            } => storage.update_event_status(event_id, state),
            ContentContainer::UpdateEventTime {
                event_id, new_time, ..
            } => storage.update_event_time(event_id, new_time),
            ContentContainer::UpdateEventScore {
                event_id,
                home_score,
                away_score,
                ..
            } => storage.update_event_score(event_id, *home_score, *away_score),
            ContentContainer::UpdateEventMarketCount {
                event_id,
                new_market_count,
                ..
            } => storage.update_event_market_count(event_id, *new_market_count),
            ContentContainer::UpdateEventLiveDataExtended {
                event_id, live_data, ..
            } => {
                if !storage.contains_event(event_id) {
                    return false;
                }
                if let Some(match_time) = &live_data.match_time {
                    storage.update_event_time(event_id, match_time);
                }
                if let Some(status) = &live_data.status {
                    storage.update_event_status(event_id, status);
                }
                if live_data.home_score.is_some() || live_data.away_score.is_some() {
                    storage.update_event_score(
                        event_id,
                        live_data.home_score,
                        live_data.away_score,
                    );
                }
                true
            }
            ContentContainer::RemoveSelection { .. } | ContentContainer::Unknown => false,
        }
    }

    /// Switch to a new push session.
    ///
    /// Without an acknowledged subscription only the token changes. Otherwise
    /// the storage is cleared and the first page plus every chained page are
    /// subscribed again with the new token. All attempts run; the first
    /// failure is returned. A refused first page is also published.
    #[instrument(skip(self, new_session_token), fields(content = %self.content_identifier))]
    pub async fn reconnect(&self, new_session_token: &str) -> Result<(), SubscriptionError> {
        *self.session_token.write() = new_session_token.to_string();

        let Some(previous) = self.subscription() else {
            debug!("No subscription to restore");
            return Ok(());
        };

        self.storage.reset();

        let primary = self
            .transport
            .subscribe(new_session_token, previous.content_identifier())
            .await;
        let restored = Subscription::new(previous.content_identifier().clone(), new_session_token);

        let mut first_error = None;
        for child in previous.associated_subscriptions() {
            if let Err(e) = self
                .transport
                .subscribe(new_session_token, child.content_identifier())
                .await
            {
                warn!(page = %child.content_identifier(), error = %e, "Page resubscribe failed");
                first_error.get_or_insert(e);
            }
            restored.associate_subscription(Subscription::new(
                child.content_identifier().clone(),
                new_session_token,
            ));
        }

        match primary {
            Ok(()) => {
                info!("Resubscribed after session change");
                *self.subscription.write() = Some(restored.clone());
                self.set_state(Ok(SubscribableContent::Connected {
                    subscription: restored,
                }));
            }
            Err(e) => {
                warn!(error = %e, "Resubscribe failed");
                *self.subscription.write() = None;
                self.set_state(Err(e.clone()));
                return Err(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Release every subscription of this list. Terminal.
    #[instrument(skip(self), fields(content = %self.content_identifier))]
    pub async fn unsubscribe_all(&self) {
        self.active.store(false, Ordering::SeqCst);
        let subscription = self.subscription.write().take();

        if let Some(subscription) = subscription {
            for child in subscription.associated_subscriptions() {
                self.unsubscribe(&child).await;
            }
            self.unsubscribe(&subscription).await;
        }

        self.storage.reset();
        self.has_next_page.store(false, Ordering::SeqCst);
        self.set_state(Ok(SubscribableContent::Disconnected));
    }

    fn publish_stored_events(&self) {
        let connected = matches!(
            *self.state.borrow(),
            Ok(SubscribableContent::Connected { .. } | SubscribableContent::ContentUpdate { .. })
        );
        if !connected {
            return;
        }

        let content = vec![EventsGroup::new(self.storage.stored_events())];
        self.set_state(Ok(SubscribableContent::ContentUpdate { content }));
    }

    fn set_state(&self, state: PaginatorState) {
        let _previous = self.state.send_replace(state);
    }
}

#[async_trait]
impl UnsubscriptionController for EventsPaginator {
    async fn unsubscribe(&self, subscription: &Subscription) {
        if let Err(e) = self
            .transport
            .unsubscribe(subscription.session_token(), subscription.content_identifier())
            .await
        {
            metrics::inc_unsubscribe_failures();
            warn!(content = %subscription.content_identifier(), error = %e, "Unsubscribe failed");
        }
    }
}
