//! Identifier types shared by every crate of the BA document workflow.

mod types;

pub use types::{AggregateId, UserId};
