//! Order monitoring service trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use domain::document::MonitoringSyncRequest;

use crate::error::IntegrationError;

/// Trait for moving purchase orders through their monitoring stages.
#[async_trait]
pub trait OrderMonitoringService: Send + Sync {
    /// Moves the order from the request's previous stage to its new stage.
    async fn sync_stage(&self, request: &MonitoringSyncRequest) -> Result<(), IntegrationError>;
}

#[derive(Debug, Default)]
struct InMemoryMonitoringState {
    stages: HashMap<String, String>,
    transitions: Vec<(String, String, String)>,
    always_fail: bool,
}

/// In-memory order monitoring for offline operation and tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderMonitoringService {
    state: Arc<Mutex<InMemoryMonitoringState>>,
}

impl InMemoryOrderMonitoringService {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, InMemoryMonitoringState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_always_fail(&self, fail: bool) {
        self.state().always_fail = fail;
    }

    /// Current stage of a purchase order, if it was ever synced.
    pub fn stage_of(&self, purchase_order_number: &str) -> Option<String> {
        self.state().stages.get(purchase_order_number).cloned()
    }

    /// Every (order, previous, new) stage change, in order.
    pub fn transitions(&self) -> Vec<(String, String, String)> {
        self.state().transitions.clone()
    }
}

#[async_trait]
impl OrderMonitoringService for InMemoryOrderMonitoringService {
    async fn sync_stage(&self, request: &MonitoringSyncRequest) -> Result<(), IntegrationError> {
        let mut state = self.state();

        if state.always_fail {
            return Err(IntegrationError::Monitoring(
                "order monitoring unavailable".to_string(),
            ));
        }

        state.stages.insert(
            request.purchase_order_number.clone(),
            request.new_stage.clone(),
        );
        state.transitions.push((
            request.purchase_order_number.clone(),
            request.previous_stage.clone(),
            request.new_stage.clone(),
        ));

        Ok(())
    }
}
