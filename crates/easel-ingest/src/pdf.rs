//! PDF ingestion pipeline: extract → chunk per page → embed → store.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use easel_core::defaults::PAGE_LIMIT;
use easel_core::{
    has_pdf_magic, sanitize_filename, Document, DocumentRepository, Error, NewChunk, ParentStatus,
    PdfTextExtractor, Result,
};
use easel_db::Database;

use crate::batcher::EmbeddingBatcher;
use crate::chunker::{clean_text, ChunkerConfig, SlidingWindowChunker};

/// Outcome of one PDF ingestion.
#[derive(Debug, Clone, Serialize)]
pub struct PdfIngestReport {
    pub document_id: Uuid,
    pub filename: String,
    pub page_count: usize,
    pub chunk_count: usize,
    pub size_bytes: usize,
    pub status: String,
}

/// Ingests uploaded PDFs into the document tables.
pub struct PdfIngestPipeline {
    db: Database,
    extractor: Arc<dyn PdfTextExtractor>,
    batcher: EmbeddingBatcher,
    chunker: SlidingWindowChunker,
}

impl PdfIngestPipeline {
    pub fn new(db: Database, extractor: Arc<dyn PdfTextExtractor>, batcher: EmbeddingBatcher) -> Self {
        Self {
            db,
            extractor,
            batcher,
            chunker: SlidingWindowChunker::new(ChunkerConfig::document()),
        }
    }

    /// Ingest one uploaded PDF. The document row is created after the page
    /// count is known; failures past that point mark it `failed`.
    pub async fn ingest(&self, data: &[u8], filename: &str) -> Result<PdfIngestReport> {
        let start = Instant::now();

        if data.is_empty() {
            return Err(Error::InvalidInput("Empty upload".to_string()));
        }
        if !has_pdf_magic(data) {
            return Err(Error::InvalidInput(format!(
                "File '{}' is not a valid PDF",
                filename
            )));
        }
        let filename = sanitize_filename(filename);

        let pages = self.extractor.extract_pages(data).await?;
        let page_count = pages.len();

        let document_id = self
            .db
            .documents
            .insert(&filename, page_count as i32, data.len() as i64)
            .await?;

        let (status, chunk_count) = match self.chunk_and_store(document_id, &pages).await {
            Ok(0) => {
                self.db
                    .documents
                    .set_status(document_id, ParentStatus::NoText)
                    .await?;
                (ParentStatus::NoText, 0)
            }
            Ok(n) => {
                self.db
                    .documents
                    .set_status(document_id, ParentStatus::Processed)
                    .await?;
                (ParentStatus::Processed, n)
            }
            Err(e) => {
                warn!(
                    subsystem = "ingest",
                    component = "pdf",
                    document_id = %document_id,
                    error = %e,
                    "PDF ingestion failed after document row creation"
                );
                // Keep the ingestion error even if the status write fails too.
                if let Err(status_err) = self
                    .db
                    .documents
                    .set_status(document_id, ParentStatus::Failed)
                    .await
                {
                    warn!(
                        subsystem = "ingest",
                        component = "pdf",
                        document_id = %document_id,
                        error = %status_err,
                        "Failed to mark document as failed"
                    );
                }
                return Err(e);
            }
        };

        info!(
            subsystem = "ingest",
            component = "pdf",
            op = "ingest",
            document_id = %document_id,
            page_count,
            chunk_count,
            duration_ms = start.elapsed().as_millis() as u64,
            status = status.as_str(),
            "PDF ingested"
        );

        Ok(PdfIngestReport {
            document_id,
            filename,
            page_count,
            chunk_count,
            size_bytes: data.len(),
            status: status.as_str().to_string(),
        })
    }

    /// Chunk every page, embed, and insert; returns the chunk count.
    async fn chunk_and_store(&self, document_id: Uuid, pages: &[(u32, String)]) -> Result<usize> {
        let mut texts = Vec::new();
        let mut page_of = Vec::new();

        for (page, raw) in pages {
            let cleaned = clean_text(raw);
            for chunk in self.chunker.chunk(&cleaned) {
                texts.push(chunk.text);
                page_of.push(*page);
            }
        }
        if texts.is_empty() {
            return Ok(0);
        }

        let embeddings = self.batcher.embed(&texts).await?;

        let chunks: Vec<NewChunk> = texts
            .into_iter()
            .zip(embeddings)
            .zip(page_of)
            .enumerate()
            .map(|(i, ((text, embedding), page))| NewChunk {
                chunk_index: i as i32,
                chunk_text: text,
                embedding,
                metadata: json!({ "page": page }),
            })
            .collect();

        self.db.documents.insert_chunks(document_id, &chunks).await
    }

    /// Convenience wrapper over the document listing.
    pub async fn list_documents(&self, limit: Option<i64>, offset: Option<i64>) -> Result<Vec<Document>> {
        self.db
            .documents
            .list(limit.unwrap_or(PAGE_LIMIT), offset.unwrap_or(0))
            .await
    }
}
