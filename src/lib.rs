//! Real-time sports odds subscription and caching layer.
//!
//! Clients subscribe to paged lists of sports events. Each list is served by an
//! [`events::EventsPaginator`] that owns an [`events::EventsStorage`]: a cache
//! of events, markets and outcomes where every entity has its own current-value
//! publisher. Push deltas decoded by [`push`] are routed into the storages, so a
//! consumer can follow a whole list or a single outcome's price.
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from environment
//! - [`error`]: Unified error types
//! - [`events`]: Domain types, content topics, storage and paginator
//! - [`mapper`]: Wire DTOs and their mapping to domain types
//! - [`transport`]: Subscribe/unsubscribe requests
//! - [`push`]: Push frame decoding and the websocket client
//! - [`provider`]: Registry of list subscriptions
//! - [`api`]: HTTP API for health/status
//! - [`metrics`]: Prometheus metrics
//! - [`utils`]: Utility functions

pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod mapper;
pub mod metrics;
pub mod provider;
pub mod push;
pub mod transport;
pub mod utils;

pub use config::Config;
pub use error::{FeedError, Result};
