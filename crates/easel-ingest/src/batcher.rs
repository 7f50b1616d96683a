//! Ordered embedding batching.
//!
//! Providers cap inputs per request and may return results in any order.
//! The batcher splits inputs into consecutive batches, re-sorts each
//! response by its index tags, and concatenates so output position i is
//! always the embedding of input i.

use std::sync::Arc;

use pgvector::Vector;
use tracing::debug;

use easel_core::defaults::EMBED_BATCH_SIZE;
use easel_core::{EmbeddingBackend, Error, Result};

/// Splits texts into provider-sized batches and restores input order.
#[derive(Clone)]
pub struct EmbeddingBatcher {
    backend: Arc<dyn EmbeddingBackend>,
    batch_size: usize,
}

impl EmbeddingBatcher {
    pub fn new(backend: Arc<dyn EmbeddingBackend>) -> Self {
        Self {
            backend,
            batch_size: EMBED_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn backend(&self) -> &Arc<dyn EmbeddingBackend> {
        &self.backend
    }

    /// Embed all texts, output aligned with input order. Any batch failure
    /// aborts the whole call.
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vector>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let mut results = self.backend.embed_texts(batch).await?;
            results.sort_by_key(|e| e.index);

            if results.len() != batch.len() {
                return Err(Error::Embedding(format!(
                    "Provider returned {} embeddings for {} inputs",
                    results.len(),
                    batch.len()
                )));
            }
            for (i, e) in results.iter().enumerate() {
                if e.index != i {
                    return Err(Error::Embedding(format!(
                        "Provider response missing index {} (got {})",
                        i, e.index
                    )));
                }
            }

            out.extend(results.into_iter().map(|e| Vector::from(e.vector)));
        }

        debug!(
            subsystem = "ingest",
            component = "batcher",
            op = "embed",
            text_count = texts.len(),
            model = self.backend.model_name(),
            "Embedded texts"
        );
        Ok(out)
    }

    /// Embed a single text (query embedding).
    pub async fn embed_one(&self, text: &str) -> Result<Vector> {
        let texts = [text.to_string()];
        let mut vectors = self.embed(&texts).await?;
        vectors
            .pop()
            .ok_or_else(|| Error::Embedding("Provider returned no embedding".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use easel_inference::MockEmbeddingBackend;

    #[tokio::test]
    async fn test_batches_split_at_batch_size() {
        let backend = MockEmbeddingBackend::new();
        let batcher = EmbeddingBatcher::new(Arc::new(backend.clone())).with_batch_size(100);

        let texts: Vec<String> = (0..250).map(|i| format!("text {}", i)).collect();
        let vectors = batcher.embed(&texts).await.unwrap();

        assert_eq!(vectors.len(), 250);
        assert_eq!(backend.call_sizes(), vec![100, 100, 50]);
    }

    #[tokio::test]
    async fn test_permuted_provider_order_is_restored() {
        let backend = MockEmbeddingBackend::new().with_permuted_order();
        let batcher = EmbeddingBatcher::new(Arc::new(backend.clone())).with_batch_size(10);

        let texts: Vec<String> = (0..25).map(|i| "x".repeat(i + 1)).collect();
        let vectors = batcher.embed(&texts).await.unwrap();

        // First vector component encodes text length in the mock.
        for (i, v) in vectors.iter().enumerate() {
            assert_eq!(v.as_slice()[0], (i + 1) as f32, "misaligned at {}", i);
        }
    }

    #[tokio::test]
    async fn test_backend_failure_aborts() {
        let backend = MockEmbeddingBackend::new().with_failure();
        let batcher = EmbeddingBatcher::new(Arc::new(backend));
        let err = batcher.embed(&["a".to_string()]).await.unwrap_err();
        assert!(matches!(err, Error::Embedding(_)));
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_calls() {
        let backend = MockEmbeddingBackend::new();
        let batcher = EmbeddingBatcher::new(Arc::new(backend.clone()));
        let vectors = batcher.embed(&[]).await.unwrap();
        assert!(vectors.is_empty());
        assert!(backend.call_sizes().is_empty());
    }

    #[tokio::test]
    async fn test_embed_one_returns_single_vector() {
        let backend = MockEmbeddingBackend::new().with_dimension(4);
        let batcher = EmbeddingBatcher::new(Arc::new(backend));
        let v = batcher.embed_one("query").await.unwrap();
        assert_eq!(v.as_slice().len(), 4);
    }
}
