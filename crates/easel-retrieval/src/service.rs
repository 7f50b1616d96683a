//! Context retrieval entry point: embed the question, search, or degrade
//! to a non-semantic gather when the embedding provider is down.

use tracing::warn;

use easel_core::{ContextEntry, Result};
use easel_ingest::EmbeddingBatcher;

use crate::aggregator::ContextAggregator;

/// Embeds queries and retrieves selection context with graceful fallback.
pub struct ContextService {
    aggregator: ContextAggregator,
    batcher: EmbeddingBatcher,
}

impl ContextService {
    pub fn new(aggregator: ContextAggregator, batcher: EmbeddingBatcher) -> Self {
        Self { aggregator, batcher }
    }

    /// Retrieve context for a question scoped to the selected shapes.
    ///
    /// An embedding failure downgrades this request to the first chunks of
    /// each parent rather than failing the whole ask.
    pub async fn retrieve(&self, shape_ids: &[String], question: &str) -> Result<Vec<ContextEntry>> {
        if shape_ids.is_empty() {
            return Ok(Vec::new());
        }

        match self.batcher.embed_one(question).await {
            Ok(query) => self.aggregator.search_context(shape_ids, &query).await,
            Err(e) => {
                warn!(
                    subsystem = "retrieval",
                    component = "service",
                    op = "retrieve",
                    error = %e,
                    "Query embedding failed, falling back to non-semantic gather"
                );
                self.aggregator.gather_context(shape_ids).await
            }
        }
    }
}
