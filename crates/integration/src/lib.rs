//! Delivery of approved handovers to downstream systems.
//!
//! Final approval of a handover stores an outbox with two requests inside the
//! approval event:
//! 1. Create a goods receipt in the ERP
//! 2. Move the purchase order to its next monitoring stage
//!
//! The [`IntegrationDispatcher`] finds those outboxes in the event log and
//! delivers each request as an event-sourced [`IntegrationJob`], retrying
//! failures on later drains until the job runs out of attempts. Each attempt
//! is claimed in the job stream before the downstream call. Outcomes are
//! written back onto the document; its approval is never undone.

pub mod aggregate;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod services;
pub mod state;

pub use aggregate::{CLAIM_TIMEOUT_SECS, DEFAULT_MAX_RETRIES, IntegrationJob};
pub use dispatcher::{DrainReport, IntegrationDispatcher, PendingRequest};
pub use error::IntegrationError;
pub use events::JobEvent;
pub use services::{
    ErpService, GoodsReceiptResult, InMemoryErpService, InMemoryOrderMonitoringService,
    OrderMonitoringService,
};
pub use state::JobState;
