//! HTTP API handlers.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::provider::{EventsProvider, PaginatorStatus};
use crate::push::{ConnectionState, PushChannel};

/// Application state shared with handlers.
#[derive(Clone)]
pub struct AppState {
    /// List subscriptions.
    pub provider: Arc<EventsProvider>,
    /// Push connection, absent when running without one.
    pub push: Option<Arc<PushChannel>>,
}

impl AppState {
    /// Create app state over a provider.
    pub fn new(provider: Arc<EventsProvider>) -> Self {
        Self {
            provider,
            push: None,
        }
    }

    /// Attach the push channel reported by the status endpoint.
    pub fn with_push(mut self, push: Arc<PushChannel>) -> Self {
        self.push = Some(push);
        self
    }

    /// Ready once the push server assigned a session.
    pub fn is_ready(&self) -> bool {
        self.provider.has_session()
    }

    fn push_state(&self) -> &'static str {
        match self.push.as_ref().map(|p| p.state()) {
            None => "none",
            Some(ConnectionState::Disconnected) => "disconnected",
            Some(ConnectionState::Connecting) => "connecting",
            Some(ConnectionState::Connected) => "connected",
            Some(ConnectionState::Reconnecting) => "reconnecting",
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Status: "ok".
    pub status: &'static str,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    /// Whether a push session exists.
    pub ready: bool,
    /// Number of registered lists.
    pub subscriptions: usize,
}

/// Status response.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Service status.
    pub status: &'static str,
    /// Push connection state.
    pub push: &'static str,
    /// Whether the push connection looks stale.
    pub push_stale: bool,
    /// Registered lists.
    pub paginators: Vec<PaginatorStatus>,
}

/// Health check handler - always returns 200.
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

/// Readiness check handler - returns 200 with a session, 503 otherwise.
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let is_ready = state.is_ready();
    let response = ReadyResponse {
        ready: is_ready,
        subscriptions: state.provider.paginator_count(),
    };

    if is_ready {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

/// Status handler - returns push state and every list.
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let status = if state.is_ready() { "running" } else { "starting" };

    Json(StatusResponse {
        status,
        push: state.push_state(),
        push_stale: state.push.as_ref().is_some_and(|p| p.is_stale()),
        paginators: state.provider.statuses(),
    })
}
