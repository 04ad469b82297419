//! Entry point for list subscriptions.
//!
//! The provider keeps one [`EventsPaginator`] per pageable list, hands out
//! their streams, routes push content to them and moves them to a new push
//! session when the server rotates it.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::stream::BoxStream;
use parking_lot::RwLock;
use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, instrument, warn};

use crate::error::SubscriptionError;
use crate::events::content::{
    ContentContainer, ContentIdentifier, ContentRoute, ContentType, EventListSort,
};
use crate::events::paginator::{EventsPaginator, PaginatorState};
use crate::events::types::{Event, Market, Outcome, SportType};
use crate::push::PushEvent;
use crate::transport::SubscriptionTransport;

/// Snapshot of one registered paginator, served by the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaginatorStatus {
    /// Registry key.
    pub pageable_id: String,
    /// Content type wire name.
    pub content_type: String,
    /// Whether the paginator still serves its list.
    pub active: bool,
    /// Whether the first page is acknowledged.
    pub subscribed: bool,
    /// Highest page requested.
    pub current_page: usize,
    /// Whether another page may exist.
    pub has_next_page: bool,
    /// Events currently cached.
    pub stored_events: usize,
}

/// Registry of paginated list subscriptions bound to one push session.
pub struct EventsProvider {
    transport: Arc<dyn SubscriptionTransport>,
    paginators: DashMap<String, Arc<EventsPaginator>>,
    session_token: RwLock<Option<String>>,
    default_event_count: usize,
}

impl EventsProvider {
    /// Create a provider without a session.
    pub fn new(transport: Arc<dyn SubscriptionTransport>, default_event_count: usize) -> Self {
        Self {
            transport,
            paginators: DashMap::new(),
            session_token: RwLock::new(None),
            default_event_count,
        }
    }

    /// Current push session token.
    pub fn session_token(&self) -> Option<String> {
        self.session_token.read().clone()
    }

    /// Whether a push session has been assigned.
    pub fn has_session(&self) -> bool {
        self.session_token.read().is_some()
    }

    /// Number of registered paginators.
    pub fn paginator_count(&self) -> usize {
        self.paginators.len()
    }

    /// Registered paginator for a pageable id.
    pub fn paginator(&self, pageable_id: &str) -> Option<Arc<EventsPaginator>> {
        self.paginators.get(pageable_id).map(|p| Arc::clone(p.value()))
    }

    /// Subscribe the scheduled events of a sport.
    ///
    /// `event_count` defaults to the configured page size.
    pub async fn subscribe_pre_live_matches(
        &self,
        sport: &SportType,
        start_date: Option<OffsetDateTime>,
        end_date: Option<OffsetDateTime>,
        event_count: Option<usize>,
        sort_type: EventListSort,
    ) -> Result<BoxStream<'static, PaginatorState>, SubscriptionError> {
        let identifier =
            self.pre_live_identifier(sport, start_date, end_date, event_count, sort_type)?;
        self.subscribe_list(identifier).await
    }

    /// Subscribe the in-play events of a sport.
    pub async fn subscribe_live_matches(
        &self,
        sport: &SportType,
    ) -> Result<BoxStream<'static, PaginatorState>, SubscriptionError> {
        let identifier = Self::live_identifier(sport)?;
        self.subscribe_list(identifier).await
    }

    /// Request the next page of a scheduled-events list.
    pub async fn request_pre_live_next_page(
        &self,
        sport: &SportType,
        start_date: Option<OffsetDateTime>,
        end_date: Option<OffsetDateTime>,
        event_count: Option<usize>,
        sort_type: EventListSort,
    ) -> Result<bool, SubscriptionError> {
        let identifier =
            self.pre_live_identifier(sport, start_date, end_date, event_count, sort_type)?;
        self.request_next_page(&identifier.pageable_id()).await
    }

    /// Request the next page of an in-play list.
    pub async fn request_live_next_page(
        &self,
        sport: &SportType,
    ) -> Result<bool, SubscriptionError> {
        let identifier = Self::live_identifier(sport)?;
        self.request_next_page(&identifier.pageable_id()).await
    }

    /// Request the next page of a registered list.
    pub async fn request_next_page(&self, pageable_id: &str) -> Result<bool, SubscriptionError> {
        let paginator = self
            .paginator(pageable_id)
            .ok_or(SubscriptionError::SubscriptionNotFound)?;
        paginator.request_next_page().await
    }

    /// Route decoded push content to every paginator. Returns whether any
    /// storage changed.
    pub fn handle_content_update(&self, container: &ContentContainer) -> bool {
        if matches!(container, ContentContainer::Unknown) {
            return false;
        }

        let mut applied = false;
        for paginator in self.snapshot() {
            applied |= paginator.handle_content_update(container);
        }
        applied
    }

    /// Adopt a push session token.
    ///
    /// When the token changes, every paginator resubscribes with it. All
    /// paginators are attempted; the first failure is returned.
    #[instrument(skip(self, token))]
    pub async fn set_session_token(&self, token: &str) -> Result<(), SubscriptionError> {
        let previous = self.session_token.write().replace(token.to_string());
        if previous.as_deref() == Some(token) {
            debug!("Session token unchanged");
            return Ok(());
        }

        info!(paginators = self.paginators.len(), "Push session changed");

        let mut first_error = None;
        for paginator in self.snapshot() {
            if let Err(e) = paginator.reconnect(token).await {
                warn!(pageable_id = %paginator.pageable_id(), error = %e, "Reconnect failed");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Apply one push event.
    pub async fn handle_push_event(&self, event: PushEvent) {
        match event {
            PushEvent::Session(token) => {
                if let Err(e) = self.set_session_token(&token).await {
                    warn!(error = %e, "Session rotation incomplete");
                }
            }
            PushEvent::Content(container) => {
                self.handle_content_update(&container);
            }
        }
    }

    /// Drain push events until the sender side closes.
    pub async fn consume_push_events(&self, mut receiver: mpsc::Receiver<PushEvent>) {
        while let Some(event) = receiver.recv().await {
            self.handle_push_event(event).await;
        }
        info!("Push event channel closed");
    }

    /// Tear down one list. Returns whether it was registered.
    pub async fn unsubscribe(&self, pageable_id: &str) -> bool {
        match self.paginators.remove(pageable_id) {
            Some((_, paginator)) => {
                paginator.unsubscribe_all().await;
                info!(pageable_id, "List unsubscribed");
                true
            }
            None => false,
        }
    }

    /// Tear down every list.
    pub async fn unsubscribe_all(&self) {
        let ids: Vec<String> = self.paginators.iter().map(|p| p.key().clone()).collect();
        for id in ids {
            self.unsubscribe(&id).await;
        }
    }

    /// Follow one event across every list.
    pub fn subscribe_to_event_updates(&self, id: &str) -> Option<watch::Receiver<Event>> {
        self.snapshot()
            .iter()
            .find_map(|p| p.storage().subscribe_to_event_updates(id))
    }

    /// Follow one market across every list.
    pub fn subscribe_to_market_updates(&self, id: &str) -> Option<watch::Receiver<Market>> {
        self.snapshot()
            .iter()
            .find_map(|p| p.storage().subscribe_to_market_updates(id))
    }

    /// Follow one outcome across every list.
    pub fn subscribe_to_outcome_updates(&self, id: &str) -> Option<watch::Receiver<Outcome>> {
        self.snapshot()
            .iter()
            .find_map(|p| p.storage().subscribe_to_outcome_updates(id))
    }

    /// Status of every paginator, ordered by pageable id.
    pub fn statuses(&self) -> Vec<PaginatorStatus> {
        let mut statuses: Vec<PaginatorStatus> = self
            .snapshot()
            .iter()
            .map(|p| PaginatorStatus {
                pageable_id: p.pageable_id(),
                content_type: p.content_identifier().content_type.to_string(),
                active: p.is_active(),
                subscribed: p.subscription().is_some(),
                current_page: p.current_page(),
                has_next_page: p.has_next_page(),
                stored_events: p.storage().len(),
            })
            .collect();
        statuses.sort_by(|a, b| a.pageable_id.cmp(&b.pageable_id));
        statuses
    }

    async fn subscribe_list(
        &self,
        identifier: ContentIdentifier,
    ) -> Result<BoxStream<'static, PaginatorState>, SubscriptionError> {
        let token = self
            .session_token()
            .ok_or(SubscriptionError::UserSessionNotFound)?;
        let pageable_id = identifier.pageable_id();

        let paginator = match self.paginators.entry(pageable_id.clone()) {
            Entry::Occupied(entry) if entry.get().is_active() => {
                debug!(pageable_id = %pageable_id, "Reusing list subscription");
                return Ok(entry.get().events_stream());
            }
            Entry::Occupied(mut entry) => {
                let paginator = Arc::new(EventsPaginator::new(
                    identifier,
                    token,
                    Arc::clone(&self.transport),
                ));
                entry.insert(Arc::clone(&paginator));
                paginator
            }
            Entry::Vacant(entry) => {
                let paginator = Arc::new(EventsPaginator::new(
                    identifier,
                    token,
                    Arc::clone(&self.transport),
                ));
                entry.insert(Arc::clone(&paginator));
                paginator
            }
        };

        if let Err(e) = paginator.request_initial_page().await {
            self.paginators
                .remove_if(&pageable_id, |_, p| Arc::ptr_eq(p, &paginator));
            return Err(e);
        }
        Ok(paginator.events_stream())
    }

    fn pre_live_identifier(
        &self,
        sport: &SportType,
        start_date: Option<OffsetDateTime>,
        end_date: Option<OffsetDateTime>,
        event_count: Option<usize>,
        sort_type: EventListSort,
    ) -> Result<ContentIdentifier, SubscriptionError> {
        Ok(ContentIdentifier::new(
            ContentType::PreLiveEvents,
            ContentRoute::PreLiveEvents {
                sport_alpha_id: sport_alpha_id(sport)?,
                start_date,
                end_date,
                page_index: 0,
                event_count: Some(event_count.unwrap_or(self.default_event_count)),
                sort_type,
            },
        ))
    }

    fn live_identifier(sport: &SportType) -> Result<ContentIdentifier, SubscriptionError> {
        Ok(ContentIdentifier::new(
            ContentType::LiveEvents,
            ContentRoute::LiveEvents {
                sport_alpha_id: sport_alpha_id(sport)?,
                page_index: 0,
            },
        ))
    }

    fn snapshot(&self) -> Vec<Arc<EventsPaginator>> {
        self.paginators.iter().map(|p| Arc::clone(p.value())).collect()
    }
}

fn sport_alpha_id(sport: &SportType) -> Result<String, SubscriptionError> {
    sport
        .alpha_id
        .clone()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| SubscriptionError::IncompleteSportData(sport.name.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::content::SubscribableContent;
    use crate::transport::MockTransport;
    use futures::StreamExt;
    use pretty_assertions::assert_eq;

    fn football() -> SportType {
        SportType {
            id: "1".to_string(),
            name: "Football".to_string(),
            alpha_id: Some("FBL".to_string()),
            ..SportType::default()
        }
    }

    fn provider(mock: &MockTransport) -> EventsProvider {
        EventsProvider::new(Arc::new(mock.clone()), 20)
    }

    async fn with_session(mock: &MockTransport) -> EventsProvider {
        let provider = provider(mock);
        provider.set_session_token("token-1").await.unwrap();
        provider
    }

    #[tokio::test]
    async fn subscribe_requires_session() {
        let mock = MockTransport::new();
        let provider = provider(&mock);

        let result = provider.subscribe_live_matches(&football()).await;
        assert!(matches!(result, Err(SubscriptionError::UserSessionNotFound)));
        assert_eq!(mock.subscribe_count(), 0);
    }

    #[tokio::test]
    async fn subscribe_requires_alpha_id() {
        let mock = MockTransport::new();
        let provider = with_session(&mock).await;
        let sport = SportType {
            name: "Curling".to_string(),
            ..SportType::default()
        };

        let result = provider.subscribe_live_matches(&sport).await;
        assert_eq!(
            result.err(),
            Some(SubscriptionError::IncompleteSportData("Curling".to_string()))
        );
    }

    #[tokio::test]
    async fn pre_live_uses_default_page_size() {
        let mock = MockTransport::new();
        let provider = with_session(&mock).await;

        provider
            .subscribe_pre_live_matches(&football(), None, None, None, EventListSort::Popular)
            .await
            .unwrap();

        assert_eq!(mock.subscribed_routes(), vec!["FBL///0/20/P".to_string()]);
        assert_eq!(provider.paginator_count(), 1);
    }

    #[tokio::test]
    async fn second_subscribe_reuses_paginator() {
        let mock = MockTransport::new();
        let provider = with_session(&mock).await;

        let _first = provider.subscribe_live_matches(&football()).await.unwrap();
        let mut second = provider.subscribe_live_matches(&football()).await.unwrap();

        assert_eq!(mock.subscribe_count(), 1);
        assert!(matches!(
            second.next().await,
            Some(Ok(SubscribableContent::Connected { .. }))
        ));
    }

    #[tokio::test]
    async fn failed_subscribe_is_not_registered() {
        let mock = MockTransport::new();
        let provider = with_session(&mock).await;
        mock.set_fail_subscribe(true);

        assert!(provider.subscribe_live_matches(&football()).await.is_err());
        assert_eq!(provider.paginator_count(), 0);

        mock.set_fail_subscribe(false);
        assert!(provider.subscribe_live_matches(&football()).await.is_ok());
        assert_eq!(mock.subscribe_count(), 2);
    }

    #[tokio::test]
    async fn next_page_without_list_is_not_found() {
        let mock = MockTransport::new();
        let provider = with_session(&mock).await;

        let result = provider.request_live_next_page(&football()).await;
        assert_eq!(result, Err(SubscriptionError::SubscriptionNotFound));
    }

    #[tokio::test]
    async fn session_change_resubscribes_lists() {
        let mock = MockTransport::new();
        let provider = with_session(&mock).await;
        provider.subscribe_live_matches(&football()).await.unwrap();

        provider.set_session_token("token-1").await.unwrap();
        assert_eq!(mock.subscribe_count(), 1);

        provider.set_session_token("token-2").await.unwrap();
        assert_eq!(mock.subscribe_count(), 2);

        let paginator = provider.paginator("liveDataSummaryAdvancedListBySportType/FBL").unwrap();
        assert_eq!(paginator.session_token(), "token-2");
    }

    #[tokio::test]
    async fn unsubscribe_removes_and_releases() {
        let mock = MockTransport::new();
        let provider = with_session(&mock).await;
        provider.subscribe_live_matches(&football()).await.unwrap();

        let statuses = provider.statuses();
        assert_eq!(statuses.len(), 1);
        assert!(statuses[0].subscribed);

        assert!(provider.unsubscribe(&statuses[0].pageable_id).await);
        assert!(!provider.unsubscribe(&statuses[0].pageable_id).await);
        assert_eq!(mock.unsubscribe_count(), 1);
        assert_eq!(provider.paginator_count(), 0);
    }

    #[tokio::test]
    async fn session_push_event_sets_token() {
        let mock = MockTransport::new();
        let provider = provider(&mock);
        let (tx, rx) = mpsc::channel(4);

        tx.send(PushEvent::Session("abc".to_string())).await.unwrap();
        drop(tx);
        provider.consume_push_events(rx).await;

        assert_eq!(provider.session_token().as_deref(), Some("abc"));
        assert!(provider.has_session());
    }

    #[test]
    fn unknown_content_is_ignored() {
        let provider = provider(&MockTransport::new());
        assert!(!provider.handle_content_update(&ContentContainer::Unknown));
    }
}
