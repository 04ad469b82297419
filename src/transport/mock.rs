//! Mock transport for unit and integration testing.
//!
//! Records every call and can be told to fail or delay without touching the
//! network.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::SubscriptionError;
use crate::events::content::ContentIdentifier;

use super::SubscriptionTransport;

/// Configuration for mock transport behavior.
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// Whether subscribe requests fail.
    pub fail_subscribe: bool,
    /// Whether unsubscribe requests fail.
    pub fail_unsubscribe: bool,
    /// Full routes whose subscribe requests fail.
    pub fail_routes: HashSet<String>,
    /// Simulated latency in milliseconds.
    pub latency_ms: u64,
}

/// A call seen by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    /// Subscribe request.
    Subscribe {
        /// Session token used.
        session_token: String,
        /// Requested topic.
        content: ContentIdentifier,
    },
    /// Unsubscribe request.
    Unsubscribe {
        /// Session token used.
        session_token: String,
        /// Released topic.
        content: ContentIdentifier,
    },
}

/// Mock transport for testing.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    /// Mock configuration.
    config: Arc<Mutex<MockConfig>>,
    /// Calls in arrival order.
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl MockTransport {
    /// Create a mock that acknowledges everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock with custom configuration.
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            config: Arc::new(Mutex::new(config)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Toggle subscribe failures.
    pub fn set_fail_subscribe(&self, fail: bool) {
        self.config.lock().fail_subscribe = fail;
    }

    /// Toggle unsubscribe failures.
    pub fn set_fail_unsubscribe(&self, fail: bool) {
        self.config.lock().fail_unsubscribe = fail;
    }

    /// Fail subscribe requests for one full route.
    pub fn fail_route(&self, full_route: impl Into<String>) {
        self.config.lock().fail_routes.insert(full_route.into());
    }

    /// Change simulated latency.
    pub fn set_latency_ms(&self, latency_ms: u64) {
        self.config.lock().latency_ms = latency_ms;
    }

    /// All recorded calls.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Full routes of recorded subscribe calls.
    pub fn subscribed_routes(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                RecordedCall::Subscribe { content, .. } => Some(content.full_route()),
                RecordedCall::Unsubscribe { .. } => None,
            })
            .collect()
    }

    /// Number of recorded subscribe calls.
    pub fn subscribe_count(&self) -> usize {
        self.subscribed_routes().len()
    }

    /// Number of recorded unsubscribe calls.
    pub fn unsubscribe_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, RecordedCall::Unsubscribe { .. }))
            .count()
    }

    /// Forget recorded calls.
    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    async fn simulate_latency(&self) {
        let latency_ms = self.config.lock().latency_ms;
        if latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(latency_ms)).await;
        }
    }
}

#[async_trait]
impl SubscriptionTransport for MockTransport {
    async fn subscribe(
        &self,
        session_token: &str,
        content: &ContentIdentifier,
    ) -> Result<(), SubscriptionError> {
        self.calls.lock().push(RecordedCall::Subscribe {
            session_token: session_token.to_string(),
            content: content.clone(),
        });
        self.simulate_latency().await;

        let full_route = content.full_route();
        let fail = {
            let config = self.config.lock();
            config.fail_subscribe || config.fail_routes.contains(&full_route)
        };
        if fail {
            return Err(SubscriptionError::OnSubscribe {
                content_id: full_route,
                reason: "Mock subscribe failure".to_string(),
            });
        }
        Ok(())
    }

    async fn unsubscribe(
        &self,
        session_token: &str,
        content: &ContentIdentifier,
    ) -> Result<(), SubscriptionError> {
        self.calls.lock().push(RecordedCall::Unsubscribe {
            session_token: session_token.to_string(),
            content: content.clone(),
        });
        self.simulate_latency().await;

        if self.config.lock().fail_unsubscribe {
            return Err(SubscriptionError::OnUnsubscribe {
                content_id: content.full_route(),
                reason: "Mock unsubscribe failure".to_string(),
            });
        }
        Ok(())
    }
}
