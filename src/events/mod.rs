//! Event cache, subscription topics and paged event lists.

pub mod content;
pub mod paginator;
pub mod storage;
pub mod types;

pub use content::{
    ContentContainer, ContentIdentifier, ContentRoute, ContentType, EventListSort,
    SubscribableContent, Subscription, UnsubscriptionController,
};
pub use paginator::{EventsContent, EventsPaginator, PaginatorState};
pub use storage::EventsStorage;
pub use types::{Event, EventStatus, EventsGroup, Market, OddFormat, Outcome, SportType};
