//! End-to-end tests: push frames flow through the decoder and provider into
//! paginator storages, with subscriptions recorded by the mock transport.

use std::sync::Arc;

use futures::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use live_odds::error::SubscriptionError;
use live_odds::events::{EventListSort, EventStatus, OddFormat, SportType, SubscribableContent};
use live_odds::provider::EventsProvider;
use live_odds::push::decode_message;
use live_odds::transport::{MockTransport, RecordedCall};

const PRE_LIVE_TYPE: &str = "eventListBySportTypeDate";
const LIVE_TYPE: &str = "liveDataSummaryAdvancedListBySportType";
const PRE_LIVE_ID: &str = "eventListBySportTypeDate/FBL///2/T";
const LIVE_ID: &str = "liveDataSummaryAdvancedListBySportType/FBL";

fn football() -> SportType {
    SportType {
        id: "1".to_string(),
        name: "Football".to_string(),
        alpha_id: Some("FBL".to_string()),
        ..SportType::default()
    }
}

fn wire_event(id: &str) -> Value {
    json!({
        "idfoevent": id,
        "participantname_home": format!("{id} Home"),
        "participantname_away": format!("{id} Away"),
        "idfotournament": "t1",
        "tournamentname": "Ligue 1",
        "idfosporttype": "FBL",
        "tsstart": "2026-10-16T18:00:00Z",
        "numMarkets": 12,
        "markets": [{
            "idfomarket": format!("{id}-m"),
            "name": "Match Result",
            "istradable": true,
            "selections": [
                {"idfoselection": format!("{id}-away"), "name": "Away", "headerNameKey": "away",
                 "currentpriceup": "3", "currentpricedown": "1"},
                {"idfoselection": format!("{id}-home"), "name": "Home", "headerNameKey": "home",
                 "currentpriceup": 5, "currentpricedown": 2}
            ]
        }]
    })
}

fn live_wire_event(id: &str) -> Value {
    let mut event = wire_event(id);
    event["liveDataSummary"] = json!({
        "status": "1st Half",
        "matchTime": "12:30",
        "scores": {"CURRENT_SCORE": {"home": 0, "away": 0}}
    });
    event
}

async fn feed(provider: &EventsProvider, frame: Value) {
    for event in decode_message(&frame.to_string()) {
        provider.handle_push_event(event).await;
    }
}

async fn provider_with_session(mock: &MockTransport) -> EventsProvider {
    let provider = EventsProvider::new(Arc::new(mock.clone()), 2);
    feed(&provider, json!({"subscriberId": "session-1"})).await;
    provider
}

fn stored_ids(provider: &EventsProvider, pageable_id: &str) -> Vec<String> {
    provider
        .paginator(pageable_id)
        .map(|p| p.storage().stored_events())
        .unwrap_or_default()
        .into_iter()
        .map(|e| e.id)
        .collect()
}

#[tokio::test]
async fn pre_live_snapshot_and_price_update() {
    let mock = MockTransport::new();
    let provider = provider_with_session(&mock).await;

    let mut list = provider
        .subscribe_pre_live_matches(&football(), None, None, None, EventListSort::StartTime)
        .await
        .unwrap();
    assert!(matches!(
        list.next().await,
        Some(Ok(SubscribableContent::Connected { .. }))
    ));
    assert_eq!(mock.subscribed_routes(), vec!["FBL///0/2/T".to_string()]);

    feed(
        &provider,
        json!({
            "changeType": "refreshed",
            "contentId": {"type": PRE_LIVE_TYPE, "id": "FBL///0/2/T"},
            "change": [wire_event("e1"), wire_event("e2")]
        }),
    )
    .await;

    match list.next().await {
        Some(Ok(SubscribableContent::ContentUpdate { content })) => {
            let ids: Vec<&str> = content[0].events.iter().map(|e| e.id.as_str()).collect();
            assert_eq!(ids, vec!["e1", "e2"]);
            let outcomes: Vec<&str> = content[0].events[0].markets[0]
                .outcomes
                .iter()
                .map(|o| o.id.as_str())
                .collect();
            assert_eq!(outcomes, vec!["e1-home", "e1-away"]);
        }
        other => panic!("unexpected list item: {other:?}"),
    }

    let outcome = provider.subscribe_to_outcome_updates("e1-home").unwrap();
    assert_eq!(
        outcome.borrow().odd,
        OddFormat::Fraction {
            numerator: 5,
            denominator: 2
        }
    );

    feed(
        &provider,
        json!({
            "changeType": "updated",
            "contentId": {"type": PRE_LIVE_TYPE, "id": "FBL///0/2/T"},
            "path": "[idfoevent=e1].markets[idfomarket=e1-m].selections[idfoselection=e1-home]",
            "change": {"currentpriceup": "7", "currentpricedown": "4"}
        }),
    )
    .await;

    assert_eq!(
        outcome.borrow().odd,
        OddFormat::Fraction {
            numerator: 7,
            denominator: 4
        }
    );

    let paginator = provider.paginator(PRE_LIVE_ID).unwrap();
    let events = paginator.storage().stored_events();
    let home = &events[0].markets[0].outcomes[0];
    assert_eq!(home.odd.fraction_parts(), (7, 4));
}

#[tokio::test]
async fn unparsable_price_keeps_previous_odd() {
    let mock = MockTransport::new();
    let provider = provider_with_session(&mock).await;
    provider
        .subscribe_pre_live_matches(&football(), None, None, None, EventListSort::StartTime)
        .await
        .unwrap();
    feed(
        &provider,
        json!({
            "contentId": {"type": PRE_LIVE_TYPE, "id": "FBL///0/2/T"},
            "change": [wire_event("e1")]
        }),
    )
    .await;

    feed(
        &provider,
        json!({
            "changeType": "updated",
            "contentId": {"type": PRE_LIVE_TYPE, "id": "FBL///0/2/T"},
            "path": "selections[idfoselection=e1-home]",
            "change": {"currentpriceup": "abc", "currentpricedown": "3"}
        }),
    )
    .await;

    let outcome = provider.subscribe_to_outcome_updates("e1-home").unwrap();
    assert_eq!(outcome.borrow().odd.fraction_parts(), (5, 2));
}

#[tokio::test]
async fn next_page_then_session_rotation() {
    let mock = MockTransport::new();
    let provider = provider_with_session(&mock).await;
    provider
        .subscribe_pre_live_matches(&football(), None, None, None, EventListSort::StartTime)
        .await
        .unwrap();

    feed(
        &provider,
        json!({
            "contentId": {"type": PRE_LIVE_TYPE, "id": "FBL///0/2/T"},
            "change": [wire_event("e1"), wire_event("e2")]
        }),
    )
    .await;

    let requested = provider
        .request_pre_live_next_page(&football(), None, None, None, EventListSort::StartTime)
        .await
        .unwrap();
    assert!(requested);

    feed(
        &provider,
        json!({
            "contentId": {"type": PRE_LIVE_TYPE, "id": "FBL///1/2/T"},
            "change": [wire_event("e3")]
        }),
    )
    .await;
    assert_eq!(stored_ids(&provider, PRE_LIVE_ID), vec!["e1", "e2", "e3"]);

    let paginator = provider.paginator(PRE_LIVE_ID).unwrap();
    assert!(!paginator.has_next_page());
    assert_eq!(
        provider
            .request_pre_live_next_page(&football(), None, None, None, EventListSort::StartTime)
            .await,
        Ok(false)
    );

    mock.clear();
    feed(&provider, json!({"subscriberId": "session-2"})).await;

    let resubscribed: Vec<(String, String)> = mock
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            RecordedCall::Subscribe {
                session_token,
                content,
            } => Some((session_token, content.full_route())),
            RecordedCall::Unsubscribe { .. } => None,
        })
        .collect();
    assert_eq!(
        resubscribed,
        vec![
            ("session-2".to_string(), "FBL///0/2/T".to_string()),
            ("session-2".to_string(), "FBL///1/2/T".to_string()),
        ]
    );
    assert!(paginator.storage().is_empty());
    assert!(matches!(
        paginator.state(),
        Ok(SubscribableContent::Connected { .. })
    ));
}

#[tokio::test]
async fn live_scoreboard_updates() {
    let mock = MockTransport::new();
    let provider = provider_with_session(&mock).await;
    provider.subscribe_live_matches(&football()).await.unwrap();

    feed(
        &provider,
        json!({
            "changeType": "refreshed",
            "contentId": {"type": LIVE_TYPE, "id": "FBL/0"},
            "change": [live_wire_event("e9")]
        }),
    )
    .await;

    let event = provider.subscribe_to_event_updates("e9").unwrap();
    assert_eq!(event.borrow().status, EventStatus::InProgress("1st Half".to_string()));

    let updates = json!([
        {
            "changeType": "updated",
            "contentId": {"type": LIVE_TYPE, "id": "FBL/0"},
            "path": "[idfoevent=e9].liveDataSummary.matchTime",
            "change": "67:12"
        },
        {
            "changeType": "updated",
            "contentId": {"type": LIVE_TYPE, "id": "FBL/0"},
            "path": "[idfoevent=e9].liveDataSummary.scores.CURRENT_SCORE",
            "change": {"home": 2, "away": 1}
        },
        {
            "changeType": "updated",
            "contentId": {"type": LIVE_TYPE, "id": "FBL/0"},
            "path": "[idfoevent=e9].liveDataSummary.status",
            "change": "Ended"
        },
        {
            "changeType": "updated",
            "contentId": {"type": LIVE_TYPE, "id": "FBL/0"},
            "path": "[idfoevent=e9].numMarkets",
            "change": 3
        }
    ]);
    feed(&provider, updates).await;

    let current = event.borrow().clone();
    assert_eq!(current.match_time.as_deref(), Some("67"));
    assert_eq!(current.home_team_score, Some(2));
    assert_eq!(current.away_team_score, Some(1));
    assert_eq!(current.status, EventStatus::Ended("Ended".to_string()));
    assert_eq!(current.number_markets, Some(3));
}

#[tokio::test]
async fn market_suspension_and_event_removal() {
    let mock = MockTransport::new();
    let provider = provider_with_session(&mock).await;
    provider.subscribe_live_matches(&football()).await.unwrap();
    feed(
        &provider,
        json!({
            "contentId": {"type": LIVE_TYPE, "id": "FBL/0"},
            "change": [live_wire_event("e1"), live_wire_event("e2")]
        }),
    )
    .await;

    let market = provider.subscribe_to_market_updates("e1-m").unwrap();
    feed(
        &provider,
        json!({
            "changeType": "updated",
            "contentId": {"type": LIVE_TYPE, "id": "FBL/0"},
            "path": "[idfoevent=e1].markets[idfomarket=e1-m].istradable",
            "change": false
        }),
    )
    .await;
    assert!(!market.borrow().is_tradable);

    feed(
        &provider,
        json!({
            "changeType": "removed",
            "contentId": {"type": LIVE_TYPE, "id": "FBL/0"},
            "path": "[idfoevent=e1]"
        }),
    )
    .await;

    assert_eq!(stored_ids(&provider, LIVE_ID), vec!["e2"]);
    assert!(provider.subscribe_to_event_updates("e1").is_none());
    assert!(provider.subscribe_to_outcome_updates("e1-home").is_none());
}

#[tokio::test]
async fn content_for_other_lists_is_ignored() {
    let mock = MockTransport::new();
    let provider = provider_with_session(&mock).await;
    provider.subscribe_live_matches(&football()).await.unwrap();

    feed(
        &provider,
        json!({
            "contentId": {"type": LIVE_TYPE, "id": "BSK/0"},
            "change": [live_wire_event("b1")]
        }),
    )
    .await;

    assert!(stored_ids(&provider, LIVE_ID).is_empty());
    assert!(provider.subscribe_to_event_updates("b1").is_none());
}

#[tokio::test]
async fn refused_subscription_and_teardown() {
    let mock = MockTransport::new();
    let provider = provider_with_session(&mock).await;

    mock.fail_route("FBL/0");
    let refused = provider.subscribe_live_matches(&football()).await;
    assert!(matches!(refused, Err(SubscriptionError::OnSubscribe { .. })));
    assert!(provider.paginator(LIVE_ID).is_none());

    let _list = provider
        .subscribe_pre_live_matches(&football(), None, None, None, EventListSort::StartTime)
        .await
        .unwrap();
    provider.unsubscribe_all().await;

    assert_eq!(mock.unsubscribe_count(), 1);
    assert_eq!(provider.paginator_count(), 0);
}
