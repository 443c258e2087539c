//! Integration requests carried by the final approval of a handover.
//!
//! The requests are stored inside the approval event itself, so they exist if
//! and only if the approval was persisted. A separate worker delivers them.

use common::AggregateId;
use serde::{Deserialize, Serialize};

use super::value_objects::{GoodsReceiptStatus, HandoverDetail, MonitoringSyncStatus};

/// Monitoring stage of an order whose goods passed inspection.
pub const STAGE_INSPECTED: &str = "INSPECTED";
/// Monitoring stage of an order delivered without a linked inspection.
pub const STAGE_DELIVERED: &str = "DELIVERED";
/// Monitoring stage once the handover is approved.
pub const STAGE_HANDED_OVER: &str = "HANDED_OVER";

/// Request to create a goods receipt in the ERP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoodsReceiptRequest {
    pub document_id: AggregateId,
    pub document_number: String,
    pub purchase_order_number: String,
    pub vendor_id: String,
    pub details: Vec<HandoverDetail>,
}

/// Request to move the order to its next monitoring stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoringSyncRequest {
    pub document_id: AggregateId,
    pub purchase_order_number: String,
    pub previous_stage: String,
    pub new_stage: String,
    pub sync_status: MonitoringSyncStatus,
}

/// Both requests emitted on final approval of a handover.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationOutbox {
    pub goods_receipt: GoodsReceiptRequest,
    pub monitoring_sync: MonitoringSyncRequest,
}

/// Which downstream system a result is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntegrationKind {
    GoodsReceipt,
    MonitoringSync,
}

impl IntegrationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntegrationKind::GoodsReceipt => "GOODS_RECEIPT",
            IntegrationKind::MonitoringSync => "MONITORING_SYNC",
        }
    }
}

impl std::fmt::Display for IntegrationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Final result of delivering one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntegrationOutcome {
    Succeeded,
    Failed,
}

impl IntegrationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntegrationOutcome::Succeeded => "SUCCEEDED",
            IntegrationOutcome::Failed => "FAILED",
        }
    }

    pub fn goods_receipt_status(&self) -> GoodsReceiptStatus {
        match self {
            IntegrationOutcome::Succeeded => GoodsReceiptStatus::Success,
            IntegrationOutcome::Failed => GoodsReceiptStatus::Failed,
        }
    }

    pub fn monitoring_sync_status(&self) -> MonitoringSyncStatus {
        match self {
            IntegrationOutcome::Succeeded => MonitoringSyncStatus::Synced,
            IntegrationOutcome::Failed => MonitoringSyncStatus::Failed,
        }
    }
}
