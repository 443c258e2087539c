//! Durable storage for BA document streams.
//!
//! Every document (and every integration job) is an append-only stream of
//! events. Appends are conditional on the stream version, which is the
//! compare-and-swap the workflow engine relies on to serialize decisions on a
//! single document. The store also hands out the monotonically increasing
//! sequences used for human-readable document numbers.

pub mod error;
pub mod event;
pub mod memory;
pub mod postgres;
pub mod store;

pub use common::{AggregateId, UserId};
pub use error::{EventStoreError, Result};
pub use event::{EventEnvelope, EventEnvelopeBuilder, EventId, Version};
pub use memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use store::{AppendOptions, EventStore, EventStoreExt, EventStream};
