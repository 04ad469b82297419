//! HTTP API route definitions.

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use super::handlers::{health, ready, status, AppState};

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/api/v1/status", get(status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::types::SportType;
    use crate::provider::EventsProvider;
    use crate::transport::MockTransport;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn state() -> AppState {
        AppState::new(Arc::new(EventsProvider::new(
            Arc::new(MockTransport::new()),
            20,
        )))
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let response = create_router(state()).oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn ready_endpoint_returns_503_without_session() {
        let response = create_router(state()).oneshot(get("/ready")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn ready_endpoint_returns_200_with_session() {
        let state = state();
        state.provider.set_session_token("abc").await.unwrap();

        let response = create_router(state).oneshot(get("/ready")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn status_lists_paginators() {
        let state = state();
        state.provider.set_session_token("abc").await.unwrap();
        let sport = SportType {
            alpha_id: Some("TNS".to_string()),
            ..SportType::default()
        };
        state.provider.subscribe_live_matches(&sport).await.unwrap();

        let response = create_router(state)
            .oneshot(get("/api/v1/status"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "running");
        assert_eq!(
            json["paginators"][0]["pageable_id"],
            "liveDataSummaryAdvancedListBySportType/TNS"
        );
        assert_eq!(json["paginators"][0]["subscribed"], true);
    }
}
