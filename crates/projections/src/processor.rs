//! Feeds the store's global event order into the BA read models.

use event_store::EventStore;
use futures_util::StreamExt;
use tokio::sync::Mutex;

use crate::Result;
use crate::projection::Projection;

/// Keeps the registered read models in step with the event log.
///
/// Catch-up runs one at a time: a view checks its position and then applies
/// the event, and two interleaved runs would both see the old position.
pub struct ProjectionProcessor<S: EventStore> {
    store: S,
    projections: Vec<Box<dyn Projection>>,
    catch_up: Mutex<()>,
}

impl<S: EventStore> ProjectionProcessor<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            projections: Vec::new(),
            catch_up: Mutex::new(()),
        }
    }

    pub fn register(&mut self, projection: Box<dyn Projection>) {
        self.projections.push(projection);
    }

    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    /// Applies every event a view has not seen yet. Returns how many
    /// deliveries were made across all views.
    #[tracing::instrument(skip(self))]
    pub async fn run_catch_up(&self) -> Result<u64> {
        let _guard = self.catch_up.lock().await;
        self.catch_up_locked().await
    }

    /// Empties every view and replays the whole log.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild_all(&self) -> Result<u64> {
        let _guard = self.catch_up.lock().await;
        for projection in &self.projections {
            projection.reset().await?;
            tracing::debug!(projection = projection.name(), "Projection reset");
        }
        self.catch_up_locked().await
    }

    async fn catch_up_locked(&self) -> Result<u64> {
        let mut stream = self.store.stream_all_events().await?;
        let mut index: u64 = 0;
        let mut delivered: u64 = 0;

        while let Some(event) = stream.next().await {
            let event = event?;
            index += 1;

            for projection in &self.projections {
                if projection.position().await.has_seen(index) {
                    continue;
                }
                projection.handle(&event).await?;
                delivered += 1;
                metrics::counter!(
                    "ba_projection_events_processed_total",
                    "projection" => projection.name()
                )
                .increment(1);
            }
        }

        if delivered > 0 {
            tracing::info!(events_in_log = index, delivered, "Read models caught up");
        }
        Ok(delivered)
    }
}
