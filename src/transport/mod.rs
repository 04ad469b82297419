//! Subscribe/unsubscribe transport for push content.

pub mod client;
pub mod mock;

use async_trait::async_trait;

use crate::error::SubscriptionError;
use crate::events::content::ContentIdentifier;

pub use client::ContentClient;
pub use mock::{MockConfig, MockTransport, RecordedCall};

/// Registers interest in push content for a session.
///
/// Both calls resolve once the server acknowledged (2xx) or refused.
#[async_trait]
pub trait SubscriptionTransport: Send + Sync {
    /// Start receiving pushes for `content`.
    async fn subscribe(
        &self,
        session_token: &str,
        content: &ContentIdentifier,
    ) -> Result<(), SubscriptionError>;

    /// Stop receiving pushes for `content`.
    async fn unsubscribe(
        &self,
        session_token: &str,
        content: &ContentIdentifier,
    ) -> Result<(), SubscriptionError>;
}
