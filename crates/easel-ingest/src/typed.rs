//! Typed note sync: canvas text shapes → typed note + block chunks.
//!
//! Each text shape becomes one chunk; shapes are ordered by their canvas
//! `order` before chunk indices are assigned. Re-syncing a frame replaces
//! its chunks wholesale. A sync with no embeddable text updates the note
//! row but leaves existing chunks in place.

use std::cmp::Ordering;

use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::{info, warn};
use uuid::Uuid;

use easel_core::{extract_plain_text, NewChunk, Result, TypedNoteRepository};
use easel_db::Database;

use crate::batcher::EmbeddingBatcher;

/// One text shape as sent by the canvas client.
#[derive(Debug, Clone, Deserialize)]
pub struct TextShape {
    pub shape_id: String,
    /// Canvas stacking order; sync sorts by this before chunking.
    #[serde(default)]
    pub order: f64,
    /// Rich-text tree, when the shape has one.
    #[serde(default)]
    pub rich_text: Option<JsonValue>,
    /// Plain-text fallback for shapes without rich text.
    #[serde(default)]
    pub raw_text: Option<String>,
}

/// Outcome of one sync.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TypedNoteSyncReport {
    pub note_id: Uuid,
    pub frame_id: String,
    pub block_count: usize,
    /// False when no embeddable text arrived and chunks were kept as-is.
    pub chunks_replaced: bool,
}

/// Syncs typed notes from the canvas.
pub struct TypedNoteSync {
    db: Database,
    batcher: EmbeddingBatcher,
}

impl TypedNoteSync {
    pub fn new(db: Database, batcher: EmbeddingBatcher) -> Self {
        Self { db, batcher }
    }

    /// Plain text for one shape: rich-text tree first, raw text fallback.
    fn shape_text(shape: &TextShape) -> Option<String> {
        if let Some(ref tree) = shape.rich_text {
            let text = extract_plain_text(tree);
            if !text.is_empty() {
                return Some(text);
            }
        }
        shape
            .raw_text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    }

    pub async fn sync(
        &self,
        frame_id: &str,
        mut shapes: Vec<TextShape>,
    ) -> Result<TypedNoteSyncReport> {
        shapes.sort_by(|a, b| a.order.partial_cmp(&b.order).unwrap_or(Ordering::Equal));

        let mut blocks: Vec<(String, String)> = Vec::new();
        for shape in &shapes {
            if let Some(text) = Self::shape_text(shape) {
                blocks.push((shape.shape_id.clone(), text));
            }
        }

        let full_text = blocks
            .iter()
            .map(|(_, t)| t.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let note_id = self.db.typed_notes.upsert(frame_id, &full_text).await?;

        if blocks.is_empty() {
            warn!(
                subsystem = "ingest",
                component = "typed",
                frame_id,
                shape_count = shapes.len(),
                "Sync carried no embeddable text, keeping existing chunks"
            );
            return Ok(TypedNoteSyncReport {
                note_id,
                frame_id: frame_id.to_string(),
                block_count: 0,
                chunks_replaced: false,
            });
        }

        let texts: Vec<String> = blocks.iter().map(|(_, t)| t.clone()).collect();
        let embeddings = self.batcher.embed(&texts).await?;

        let chunks: Vec<NewChunk> = blocks
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(i, ((shape_id, text), embedding))| NewChunk {
                chunk_index: i as i32,
                chunk_text: text,
                embedding,
                metadata: json!({ "shape_id": shape_id }),
            })
            .collect();

        let block_count = chunks.len();
        self.db.typed_notes.replace_chunks(note_id, &chunks).await?;

        info!(
            subsystem = "ingest",
            component = "typed",
            op = "sync",
            note_id = %note_id,
            frame_id,
            chunk_count = block_count,
            "Typed note synced"
        );

        Ok(TypedNoteSyncReport {
            note_id,
            frame_id: frame_id.to_string(),
            block_count,
            chunks_replaced: true,
        })
    }
}
