pub mod error;
pub mod event;
pub mod memory;
pub mod notification;
pub mod store;

pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{EventEnvelope, EventEnvelopeBuilder, EventId, Version};
pub use memory::InMemoryEventStore;
pub use notification::{Notification, Position};
pub use store::{AppendOptions, EventStore, NotificationStream};
