//! Handwriting ingestion: OCR → chunk → embed → store.
//!
//! The upload handler registers the note and returns immediately; `process`
//! runs as a spawned background task and records the terminal status.

use std::sync::Arc;
use std::time::Instant;

use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use easel_core::{HandwritingRepository, NewChunk, OcrEngine, ParentStatus, Result};
use easel_db::Database;

use crate::batcher::EmbeddingBatcher;
use crate::chunker::{clean_text, ChunkerConfig, SlidingWindowChunker};

/// Ingests handwriting captures into the handwriting tables.
pub struct HandwritingPipeline {
    db: Database,
    ocr: Arc<dyn OcrEngine>,
    batcher: EmbeddingBatcher,
    chunker: SlidingWindowChunker,
}

impl HandwritingPipeline {
    pub fn new(db: Database, ocr: Arc<dyn OcrEngine>, batcher: EmbeddingBatcher) -> Self {
        Self {
            db,
            ocr,
            batcher,
            chunker: SlidingWindowChunker::new(ChunkerConfig::handwriting()),
        }
    }

    /// Insert the note row in `processing` status; the id is handed back to
    /// the client before OCR starts.
    pub async fn register(&self, frame_id: &str) -> Result<Uuid> {
        self.db.handwriting.insert(frame_id).await
    }

    /// Run the full OCR pipeline for a registered note. Errors are recorded
    /// as a `failed` status rather than propagated; this runs detached from
    /// any request.
    pub async fn process(&self, note_id: Uuid, frame_id: &str, image: Vec<u8>) -> ParentStatus {
        let start = Instant::now();

        let status = match self.run(note_id, frame_id, &image).await {
            Ok(status) => status,
            Err(e) => {
                warn!(
                    subsystem = "ingest",
                    component = "handwriting",
                    note_id = %note_id,
                    frame_id,
                    error = %e,
                    "Handwriting processing failed"
                );
                if let Err(db_err) = self
                    .db
                    .handwriting
                    .set_status(note_id, ParentStatus::Failed)
                    .await
                {
                    warn!(
                        subsystem = "ingest",
                        component = "handwriting",
                        note_id = %note_id,
                        error = %db_err,
                        "Could not record failed status"
                    );
                }
                ParentStatus::Failed
            }
        };

        info!(
            subsystem = "ingest",
            component = "handwriting",
            op = "process",
            note_id = %note_id,
            frame_id,
            status = status.as_str(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Handwriting note processed"
        );
        status
    }

    async fn run(&self, note_id: Uuid, frame_id: &str, image: &[u8]) -> Result<ParentStatus> {
        let raw_text = self.ocr.recognize(image).await?;
        let text = clean_text(&raw_text);

        if text.is_empty() {
            self.db
                .handwriting
                .set_status(note_id, ParentStatus::NoText)
                .await?;
            return Ok(ParentStatus::NoText);
        }

        self.db.handwriting.set_ocr_text(note_id, &text).await?;

        let chunks = self.chunker.chunk(&text);
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.batcher.embed(&texts).await?;

        let rows: Vec<NewChunk> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| NewChunk {
                chunk_index: chunk.index,
                chunk_text: chunk.text,
                embedding,
                metadata: json!({ "frame_id": frame_id }),
            })
            .collect();

        self.db.handwriting.insert_chunks(note_id, &rows).await?;
        self.db
            .handwriting
            .set_status(note_id, ParentStatus::Processed)
            .await?;
        Ok(ParentStatus::Processed)
    }
}
