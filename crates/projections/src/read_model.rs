//! Sizing queries every BA read model answers.

use async_trait::async_trait;

/// A query-side view over BA documents.
#[async_trait]
pub trait ReadModel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Rows currently held.
    async fn row_count(&self) -> usize;

    /// Distinct documents those rows describe.
    async fn document_count(&self) -> usize;
}
