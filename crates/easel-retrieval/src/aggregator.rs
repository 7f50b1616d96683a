//! Selection-scoped context aggregation.
//!
//! A canvas selection is a set of shape ids. Handwriting and typed notes
//! are keyed by frame id (the selected frame shape), documents indirectly
//! through canvas links keyed by shape id. Semantic search runs per parent
//! and the hits merge into one list sorted by similarity; scores from
//! different sources are compared raw since every table uses the same
//! embedding model and metric.

use pgvector::Vector;
use tracing::{debug, trace};

use easel_core::defaults::{GATHER_CHUNK_LIMIT, MATCH_THRESHOLD, SEARCH_CHUNK_LIMIT};
use easel_core::{
    CanvasLinkRepository, ChunkMatch, ChunkRow, ContextEntry, ContextSource, Document,
    DocumentRepository, HandwritingNote, HandwritingRepository, Result, TypedNote,
    TypedNoteRepository,
};
use easel_db::Database;

/// Tuning knobs for context retrieval.
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Cosine similarity floor for semantic matches.
    pub match_threshold: f64,
    /// Chunks per parent for semantic search.
    pub search_limit: i64,
    /// Chunks per parent for non-semantic gather.
    pub gather_limit: i64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            match_threshold: MATCH_THRESHOLD,
            search_limit: SEARCH_CHUNK_LIMIT,
            gather_limit: GATHER_CHUNK_LIMIT,
        }
    }
}

/// The parents a selection resolves to.
#[derive(Debug, Default)]
struct ResolvedSelection {
    documents: Vec<Document>,
    handwriting: Vec<HandwritingNote>,
    typed: Vec<TypedNote>,
}

/// Collects context chunks for a canvas selection.
pub struct ContextAggregator {
    db: Database,
    config: RetrievalConfig,
}

impl ContextAggregator {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            config: RetrievalConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RetrievalConfig) -> Self {
        self.config = config;
        self
    }

    async fn resolve(&self, shape_ids: &[String]) -> Result<ResolvedSelection> {
        let mut resolved = ResolvedSelection {
            handwriting: self.db.handwriting.find_by_frame_ids(shape_ids).await?,
            typed: self.db.typed_notes.find_by_frame_ids(shape_ids).await?,
            ..Default::default()
        };

        for link in self.db.links.find_by_shape_ids(shape_ids).await? {
            if let Some(doc) = self.db.documents.get(link.document_id).await? {
                resolved.documents.push(doc);
            }
        }

        debug!(
            subsystem = "retrieval",
            component = "aggregator",
            op = "resolve",
            shape_count = shape_ids.len(),
            document_count = resolved.documents.len(),
            handwriting_count = resolved.handwriting.len(),
            typed_count = resolved.typed.len(),
            "Resolved canvas selection"
        );
        Ok(resolved)
    }

    fn entry_from_row(source: ContextSource, origin: &str, row: ChunkRow) -> ContextEntry {
        let page = row.metadata.get("page").and_then(|v| v.as_i64());
        ContextEntry {
            source,
            origin: origin.to_string(),
            chunk_index: row.chunk_index,
            text: row.chunk_text,
            similarity: None,
            page,
        }
    }

    fn entry_from_match(source: ContextSource, origin: &str, hit: ChunkMatch) -> ContextEntry {
        let page = hit.metadata.get("page").and_then(|v| v.as_i64());
        ContextEntry {
            source,
            origin: origin.to_string(),
            chunk_index: hit.chunk_index,
            text: hit.chunk_text,
            similarity: Some(hit.similarity),
            page,
        }
    }

    /// Non-semantic context: the first chunks of every selected parent in
    /// `chunk_index` order. Used when the query embedding is unavailable.
    pub async fn gather_context(&self, shape_ids: &[String]) -> Result<Vec<ContextEntry>> {
        let resolved = self.resolve(shape_ids).await?;
        let limit = self.config.gather_limit;
        let mut entries = Vec::new();

        for doc in &resolved.documents {
            for row in self.db.documents.list_chunks(doc.id, limit).await? {
                entries.push(Self::entry_from_row(
                    ContextSource::Document,
                    &doc.filename,
                    row,
                ));
            }
        }
        for note in &resolved.handwriting {
            for row in self.db.handwriting.list_chunks(note.id, limit).await? {
                entries.push(Self::entry_from_row(
                    ContextSource::Handwriting,
                    &note.frame_id,
                    row,
                ));
            }
        }
        for note in &resolved.typed {
            for row in self.db.typed_notes.list_chunks(note.id, limit).await? {
                entries.push(Self::entry_from_row(
                    ContextSource::TypedNote,
                    &note.frame_id,
                    row,
                ));
            }
        }

        Ok(entries)
    }

    /// Semantic context: per-parent similarity search merged into one list,
    /// best match first. The sort is stable, so equal scores keep their
    /// per-source ordering.
    pub async fn search_context(
        &self,
        shape_ids: &[String],
        query: &Vector,
    ) -> Result<Vec<ContextEntry>> {
        let resolved = self.resolve(shape_ids).await?;
        let threshold = self.config.match_threshold;
        let limit = self.config.search_limit;
        let mut entries = Vec::new();

        for doc in &resolved.documents {
            let hits = self
                .db
                .documents
                .match_chunks(query, threshold, limit, doc.id)
                .await?;
            for hit in hits {
                trace!(
                    subsystem = "retrieval",
                    component = "aggregator",
                    document_id = %doc.id,
                    similarity = hit.similarity,
                    "Document hit"
                );
                entries.push(Self::entry_from_match(
                    ContextSource::Document,
                    &doc.filename,
                    hit,
                ));
            }
        }
        for note in &resolved.handwriting {
            let hits = self
                .db
                .handwriting
                .match_chunks(query, threshold, limit, note.id)
                .await?;
            for hit in hits {
                entries.push(Self::entry_from_match(
                    ContextSource::Handwriting,
                    &note.frame_id,
                    hit,
                ));
            }
        }
        for note in &resolved.typed {
            let hits = self
                .db
                .typed_notes
                .match_chunks(query, threshold, limit, note.id)
                .await?;
            for hit in hits {
                entries.push(Self::entry_from_match(
                    ContextSource::TypedNote,
                    &note.frame_id,
                    hit,
                ));
            }
        }

        merge_ranked(&mut entries);
        Ok(entries)
    }
}

/// Stable sort by similarity descending. Entries without a score sink to
/// the end in their original order.
pub fn merge_ranked(entries: &mut [ContextEntry]) {
    entries.sort_by(|a, b| {
        b.similarity
            .unwrap_or(f64::NEG_INFINITY)
            .partial_cmp(&a.similarity.unwrap_or(f64::NEG_INFINITY))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}
