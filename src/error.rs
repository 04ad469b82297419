//! Unified error types for the live odds feed.

use thiserror::Error;

/// Unified error type for the live odds feed.
#[derive(Error, Debug)]
pub enum FeedError {
    /// Configuration loading error.
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    /// Subscription lifecycle error.
    #[error("subscription error: {0}")]
    Subscription(#[from] SubscriptionError),

    /// Push channel error.
    #[error("push channel error: {0}")]
    Push(#[from] PushError),

    /// HTTP request error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by subscribe, next-page and reconnect requests.
///
/// Cloneable so a failure can be replayed to late subscribers of a paginator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The endpoint URL could not be built.
    #[error("invalid request format: {0}")]
    InvalidRequestFormat(String),

    /// Transport failure or non-2xx status on subscribe.
    #[error("subscribe to {content_id} failed: {reason}")]
    OnSubscribe {
        /// Full wire id of the content.
        content_id: String,
        /// Reason for failure.
        reason: String,
    },

    /// Transport failure or non-2xx status on unsubscribe.
    #[error("unsubscribe from {content_id} failed: {reason}")]
    OnUnsubscribe {
        /// Full wire id of the content.
        content_id: String,
        /// Reason for failure.
        reason: String,
    },

    /// No paginator registered for the requested content.
    #[error("subscription not found")]
    SubscriptionNotFound,

    /// No push session token is available yet.
    #[error("user session not found")]
    UserSessionNotFound,

    /// The sport lacks the alpha id used in content routes.
    #[error("incomplete sport data: {0}")]
    IncompleteSportData(String),

    /// A next-page request for this paginator is still pending.
    #[error("next page request already in flight")]
    NextPageInFlight,
}

/// Push channel connection and message errors.
#[derive(Error, Debug)]
pub enum PushError {
    /// Connection failed.
    #[error("websocket connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection closed unexpectedly.
    #[error("websocket connection closed: code={code:?}, reason={reason}")]
    ConnectionClosed {
        /// Close code.
        code: Option<u16>,
        /// Close reason.
        reason: String,
    },

    /// Message parsing failed.
    #[error("failed to parse push message: {0}")]
    ParseError(String),

    /// Tungstenite error.
    #[error("tungstenite error: {0}")]
    Tungstenite(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, FeedError>;
