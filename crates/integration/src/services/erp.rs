//! ERP goods-receipt service trait and in-memory implementation.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use domain::document::GoodsReceiptRequest;

use crate::error::IntegrationError;

/// Result of a goods receipt posted in the ERP.
#[derive(Debug, Clone)]
pub struct GoodsReceiptResult {
    /// The receipt document number assigned by the ERP.
    pub receipt_number: String,
}

/// Trait for posting goods receipts.
#[async_trait]
pub trait ErpService: Send + Sync {
    /// Posts a goods receipt for an approved handover.
    async fn create_goods_receipt(
        &self,
        request: &GoodsReceiptRequest,
    ) -> Result<GoodsReceiptResult, IntegrationError>;
}

#[derive(Debug, Default)]
struct InMemoryErpState {
    receipts: Vec<(String, GoodsReceiptRequest)>,
    failures_left: u32,
    always_fail: bool,
}

/// In-memory ERP for offline operation and tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryErpService {
    state: Arc<Mutex<InMemoryErpState>>,
}

impl InMemoryErpService {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, InMemoryErpState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes the next `times` calls fail.
    pub fn fail_next(&self, times: u32) {
        self.state().failures_left = times;
    }

    /// Makes every call fail until switched off.
    pub fn set_always_fail(&self, fail: bool) {
        self.state().always_fail = fail;
    }

    /// Returns the number of receipts posted.
    pub fn receipt_count(&self) -> usize {
        self.state().receipts.len()
    }

    /// Returns the purchase order numbers of the posted receipts, in order.
    pub fn posted_orders(&self) -> Vec<String> {
        self.state()
            .receipts
            .iter()
            .map(|(_, request)| request.purchase_order_number.clone())
            .collect()
    }
}

#[async_trait]
impl ErpService for InMemoryErpService {
    async fn create_goods_receipt(
        &self,
        request: &GoodsReceiptRequest,
    ) -> Result<GoodsReceiptResult, IntegrationError> {
        let mut state = self.state();

        if state.always_fail {
            return Err(IntegrationError::Erp("ERP unavailable".to_string()));
        }
        if state.failures_left > 0 {
            state.failures_left -= 1;
            return Err(IntegrationError::Erp("ERP timeout".to_string()));
        }

        let receipt_number = format!("GR-{:07}", state.receipts.len() + 1);
        state.receipts.push((receipt_number.clone(), request.clone()));

        Ok(GoodsReceiptResult { receipt_number })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::AggregateId;

    fn request(po: &str) -> GoodsReceiptRequest {
        GoodsReceiptRequest {
            document_id: AggregateId::new(),
            document_number: "BAST/2026/10/0001".to_string(),
            purchase_order_number: po.to_string(),
            vendor_id: "V-1".to_string(),
            details: Vec::new(),
        }
    }

    #[tokio::test]
    async fn posts_sequential_receipts() {
        let erp = InMemoryErpService::new();

        let r1 = erp.create_goods_receipt(&request("PO-1")).await.unwrap();
        let r2 = erp.create_goods_receipt(&request("PO-2")).await.unwrap();

        assert_eq!(r1.receipt_number, "GR-0000001");
        assert_eq!(r2.receipt_number, "GR-0000002");
        assert_eq!(erp.posted_orders(), vec!["PO-1", "PO-2"]);
    }

    #[tokio::test]
    async fn fails_the_requested_number_of_times() {
        let erp = InMemoryErpService::new();
        erp.fail_next(2);

        assert!(erp.create_goods_receipt(&request("PO-1")).await.is_err());
        assert!(erp.create_goods_receipt(&request("PO-1")).await.is_err());
        assert!(erp.create_goods_receipt(&request("PO-1")).await.is_ok());
        assert_eq!(erp.receipt_count(), 1);
    }

    #[tokio::test]
    async fn always_fail_until_switched_off() {
        let erp = InMemoryErpService::new();
        erp.set_always_fail(true);
        assert!(erp.create_goods_receipt(&request("PO-1")).await.is_err());

        erp.set_always_fail(false);
        assert!(erp.create_goods_receipt(&request("PO-1")).await.is_ok());
    }
}
