//! Provider traits: the seams between easel and the outside world.
//!
//! Concrete implementations live in `easel-inference` (HTTP backends) and
//! `easel-ingest` (subprocess extraction adapters); mocks live next to the
//! backends for tests.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::models::ChatMessage;
use crate::Result;

// =============================================================================
// EMBEDDINGS
// =============================================================================

/// One embedding tagged with the index of the input text it belongs to.
///
/// Providers may return results in any order; callers re-sort by `index`
/// before lining embeddings up with their inputs.
#[derive(Debug, Clone)]
pub struct IndexedEmbedding {
    pub index: usize,
    pub vector: Vec<f32>,
}

/// Backend capable of generating text embeddings.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Embed a slice of texts in one provider call. The result covers every
    /// input exactly once but in provider order.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<IndexedEmbedding>>;

    /// Model identifier for logging.
    fn model_name(&self) -> &str;

    /// Embedding vector dimension.
    fn dimension(&self) -> usize;
}

// =============================================================================
// STREAMED CHAT TURNS
// =============================================================================

/// Why the provider stopped streaming a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Other(String),
}

impl FinishReason {
    pub fn from_wire(s: &str) -> Self {
        match s {
            "stop" => FinishReason::Stop,
            "length" => FinishReason::Length,
            "tool_calls" => FinishReason::ToolCalls,
            "content_filter" => FinishReason::ContentFilter,
            other => FinishReason::Other(other.to_string()),
        }
    }

    pub fn is_tool_calls(&self) -> bool {
        matches!(self, FinishReason::ToolCalls)
    }
}

/// A fragment of a streamed tool call. Any field may be absent; arguments
/// arrive as raw JSON string pieces to be concatenated verbatim.
#[derive(Debug, Clone, Default)]
pub struct ToolCallFragment {
    pub id: Option<String>,
    pub name: Option<String>,
    pub arguments: Option<String>,
}

/// One delta from a streamed model turn.
#[derive(Debug, Clone)]
pub enum TurnDelta {
    /// Visible answer text, forwarded to the client as it arrives.
    Content(String),
    /// A piece of an in-progress tool call.
    ToolCall(ToolCallFragment),
    /// The provider's finish signal for this turn.
    Finish(FinishReason),
}

/// Declaration of a callable tool, serialized into the provider request.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionSpec,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionSpec {
    pub name: String,
    pub description: String,
    /// JSON Schema for the arguments object.
    pub parameters: JsonValue,
}

impl ToolDefinition {
    pub fn function(name: &str, description: &str, parameters: JsonValue) -> Self {
        Self {
            kind: "function".to_string(),
            function: FunctionSpec {
                name: name.to_string(),
                description: description.to_string(),
                parameters,
            },
        }
    }
}

/// Boxed stream of turn deltas.
pub type TurnStream = BoxStream<'static, Result<TurnDelta>>;

/// Backend capable of streaming chat completions with tool calling.
#[async_trait]
pub trait TurnProvider: Send + Sync {
    /// Open one streamed turn over the given transcript.
    async fn open_turn(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<TurnStream>;

    /// Model identifier for logging.
    fn model_name(&self) -> &str;
}

// =============================================================================
// EXTRACTION
// =============================================================================

/// Extracts per-page text from a PDF byte buffer.
#[async_trait]
pub trait PdfTextExtractor: Send + Sync {
    /// Returns `(page_number, text)` pairs, 1-based, in page order. Pages
    /// without a text layer come back empty rather than missing.
    async fn extract_pages(&self, data: &[u8]) -> Result<Vec<(u32, String)>>;
}

/// Recognizes text in an image (handwriting capture).
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Returns recognized text; empty string when nothing was legible.
    async fn recognize(&self, image: &[u8]) -> Result<String>;
}

// =============================================================================
// REPOSITORIES
// =============================================================================

use pgvector::Vector;
use uuid::Uuid;

use crate::models::{
    CanvasLink, ChunkMatch, ChunkRow, Document, HandwritingNote, NewChunk, ParentStatus, TypedNote,
};

/// Persistence for uploaded PDF documents and their chunks.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Insert a document row in `processing` status, returning its id.
    async fn insert(&self, filename: &str, page_count: i32, size_bytes: i64) -> Result<Uuid>;

    async fn get(&self, id: Uuid) -> Result<Option<Document>>;

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Document>>;

    /// Move a document out of `processing`. Terminal states are immutable;
    /// returns false when the guard rejected the update.
    async fn set_status(&self, id: Uuid, status: ParentStatus) -> Result<bool>;

    async fn insert_chunks(&self, document_id: Uuid, chunks: &[NewChunk]) -> Result<usize>;

    /// Chunks in `chunk_index` order.
    async fn list_chunks(&self, document_id: Uuid, limit: i64) -> Result<Vec<ChunkRow>>;

    /// Similarity search scoped to one document via the server-side
    /// `match_document_chunks` function.
    async fn match_chunks(
        &self,
        query: &Vector,
        threshold: f64,
        count: i64,
        document_id: Uuid,
    ) -> Result<Vec<ChunkMatch>>;
}

/// Persistence for handwriting captures and their chunks.
#[async_trait]
pub trait HandwritingRepository: Send + Sync {
    async fn insert(&self, frame_id: &str) -> Result<Uuid>;

    async fn set_ocr_text(&self, id: Uuid, text: &str) -> Result<()>;

    async fn set_status(&self, id: Uuid, status: ParentStatus) -> Result<bool>;

    async fn find_by_frame_ids(&self, frame_ids: &[String]) -> Result<Vec<HandwritingNote>>;

    async fn insert_chunks(&self, note_id: Uuid, chunks: &[NewChunk]) -> Result<usize>;

    async fn list_chunks(&self, note_id: Uuid, limit: i64) -> Result<Vec<ChunkRow>>;

    async fn match_chunks(
        &self,
        query: &Vector,
        threshold: f64,
        count: i64,
        note_id: Uuid,
    ) -> Result<Vec<ChunkMatch>>;
}

/// Persistence for typed notes synced from canvas text shapes.
#[async_trait]
pub trait TypedNoteRepository: Send + Sync {
    /// Insert or update by frame id, returning the note id.
    async fn upsert(&self, frame_id: &str, full_text: &str) -> Result<Uuid>;

    async fn find_by_frame_ids(&self, frame_ids: &[String]) -> Result<Vec<TypedNote>>;

    /// Delete all chunks for the note and insert the new set, in one
    /// transaction.
    async fn replace_chunks(&self, note_id: Uuid, chunks: &[NewChunk]) -> Result<usize>;

    async fn list_chunks(&self, note_id: Uuid, limit: i64) -> Result<Vec<ChunkRow>>;

    async fn match_chunks(
        &self,
        query: &Vector,
        threshold: f64,
        count: i64,
        note_id: Uuid,
    ) -> Result<Vec<ChunkMatch>>;
}

/// Persistence for shape → document canvas links.
#[async_trait]
pub trait CanvasLinkRepository: Send + Sync {
    /// Insert or re-point the link for a shape (shape_id is unique).
    async fn upsert(&self, shape_id: &str, document_id: Uuid) -> Result<Uuid>;

    /// Returns false when no link existed for the shape.
    async fn delete(&self, shape_id: &str) -> Result<bool>;

    async fn find_by_shape_ids(&self, shape_ids: &[String]) -> Result<Vec<CanvasLink>>;
}

// =============================================================================
// IMAGE SEARCH
// =============================================================================

/// Looks up an image URL for the assistant's `getImageSrc` tool.
#[async_trait]
pub trait ImageSearch: Send + Sync {
    /// First matching image URL, or None when the search came up empty.
    async fn search(&self, alt_text: &str) -> Result<Option<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_finish_reason_from_wire() {
        assert_eq!(FinishReason::from_wire("stop"), FinishReason::Stop);
        assert_eq!(FinishReason::from_wire("tool_calls"), FinishReason::ToolCalls);
        assert_eq!(
            FinishReason::from_wire("weird"),
            FinishReason::Other("weird".to_string())
        );
        assert!(FinishReason::from_wire("tool_calls").is_tool_calls());
        assert!(!FinishReason::from_wire("stop").is_tool_calls());
    }

    #[test]
    fn test_tool_definition_wire_shape() {
        let def = ToolDefinition::function(
            "getImageSrc",
            "Find an image",
            json!({"type": "object", "properties": {"altText": {"type": "string"}}}),
        );
        let wire = serde_json::to_value(&def).unwrap();
        assert_eq!(wire["type"], "function");
        assert_eq!(wire["function"]["name"], "getImageSrc");
        assert_eq!(wire["function"]["parameters"]["type"], "object");
    }
}
