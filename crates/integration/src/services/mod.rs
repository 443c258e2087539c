//! Downstream service traits and in-memory implementations.

pub mod erp;
pub mod monitoring;

pub use erp::{ErpService, GoodsReceiptResult, InMemoryErpService};
pub use monitoring::{InMemoryOrderMonitoringService, OrderMonitoringService};
