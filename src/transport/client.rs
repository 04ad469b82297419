//! REST client for the content subscription endpoints.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::Config;
use crate::error::{FeedError, SubscriptionError};
use crate::events::content::ContentIdentifier;
use crate::metrics;

use super::SubscriptionTransport;

const SUBSCRIBE_PATH: &str = "services/content/subscribe";
const UNSUBSCRIBE_PATH: &str = "services/content/unsubscribe";

/// Topic part of a subscribe body.
#[derive(Debug, Clone, Serialize)]
pub struct ContentIdBody {
    /// Content type wire name.
    #[serde(rename = "type")]
    pub content_type: String,
    /// Full route.
    pub id: String,
}

/// Client description sent with every request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientContext {
    /// Display language.
    pub language: String,
    /// Reported client address.
    pub ip_address: String,
}

/// Body of subscribe and unsubscribe requests.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeRequest {
    /// Push session token.
    pub subscriber_id: String,
    /// Requested content.
    pub content_id: ContentIdBody,
    /// Client description.
    pub client_context: ClientContext,
}

impl SubscribeRequest {
    /// Build the body for a session and topic.
    pub fn new(session_token: &str, content: &ContentIdentifier, language: &str) -> Self {
        Self {
            subscriber_id: session_token.to_string(),
            content_id: ContentIdBody {
                content_type: content.content_type.to_string(),
                id: content.full_route(),
            },
            client_context: ClientContext {
                language: language.to_string(),
                ip_address: "127.0.0.1".to_string(),
            },
        }
    }
}

/// HTTP implementation of [`SubscriptionTransport`].
#[derive(Debug, Clone)]
pub struct ContentClient {
    /// HTTP client for API requests.
    http: reqwest::Client,
    /// Service host, always ending with `/`.
    base_url: String,
    /// Language sent in the client context.
    language: String,
    /// Timeout applied to subscribe requests.
    subscribe_timeout: Duration,
}

impl ContentClient {
    /// Create a client from config.
    pub fn new(config: &Config) -> Result<Self, FeedError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.http_timeout_ms))
            .connect_timeout(Duration::from_secs(5))
            .tcp_keepalive(Duration::from_secs(30))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        let mut base_url = config.subscribe_url.clone();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Ok(Self {
            http,
            base_url,
            language: config.language_code.clone(),
            subscribe_timeout: Duration::from_millis(config.subscribe_timeout_ms),
        })
    }

    /// Get the service base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve an endpoint path against the base URL.
    pub fn endpoint(&self, path: &str) -> Result<Url, SubscriptionError> {
        Url::parse(&self.base_url)
            .and_then(|base| base.join(path))
            .map_err(|e| SubscriptionError::InvalidRequestFormat(format!("{}: {}", path, e)))
    }
}

#[async_trait]
impl SubscriptionTransport for ContentClient {
    #[instrument(skip(self, session_token), fields(content = %content))]
    async fn subscribe(
        &self,
        session_token: &str,
        content: &ContentIdentifier,
    ) -> Result<(), SubscriptionError> {
        let url = self.endpoint(SUBSCRIBE_PATH)?;
        let body = SubscribeRequest::new(session_token, content, &self.language);
        let content_id = content.full_route();

        metrics::inc_subscribe_requests();
        let _timer = metrics::timer_subscribe();

        let response = self
            .http
            .post(url)
            .timeout(self.subscribe_timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                metrics::inc_subscribe_failures();
                SubscriptionError::OnSubscribe {
                    content_id: content_id.clone(),
                    reason: e.to_string(),
                }
            })?;

        if !response.status().is_success() {
            metrics::inc_subscribe_failures();
            warn!(status = %response.status(), "Subscribe refused");
            return Err(SubscriptionError::OnSubscribe {
                content_id,
                reason: format!("HTTP {}", response.status()),
            });
        }

        debug!("Subscribed");
        Ok(())
    }

    #[instrument(skip(self, session_token), fields(content = %content))]
    async fn unsubscribe(
        &self,
        session_token: &str,
        content: &ContentIdentifier,
    ) -> Result<(), SubscriptionError> {
        let url = self.endpoint(UNSUBSCRIBE_PATH)?;
        let body = SubscribeRequest::new(session_token, content, &self.language);
        let content_id = content.full_route();

        let response = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| SubscriptionError::OnUnsubscribe {
                content_id: content_id.clone(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(SubscriptionError::OnUnsubscribe {
                content_id,
                reason: format!("HTTP {}", response.status()),
            });
        }

        debug!("Unsubscribed");
        Ok(())
    }
}
