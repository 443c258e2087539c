//! Read models for BA documents.
//!
//! This crate provides the query side over the document event streams:
//! - [`Projection`] trait for processing events into read models
//! - [`ReadModel`] trait for query access to denormalized data
//! - [`ProjectionProcessor`] for feeding events from the store to projections
//! - Two views: the document board and the cross-document audit log

pub mod error;
pub mod processor;
pub mod projection;
pub mod read_model;
pub mod views;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{ProjectionError, Result};
pub use processor::ProjectionProcessor;
pub use projection::{Projection, ProjectionPosition};
pub use read_model::ReadModel;
pub use views::{AuditLogView, DocumentBoardView, DocumentSummary};
