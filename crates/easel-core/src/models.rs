//! Core data models for easel.
//!
//! These types are shared across all easel crates and represent the core
//! domain entities: indexed parents (documents, handwriting notes, typed
//! notes), their chunks, canvas links, and the assistant chat transcript.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

// =============================================================================
// PARENT STATUS
// =============================================================================

/// Processing status of an indexed parent.
///
/// Transitions are monotonic: `Processing` may move to any terminal state,
/// terminal states never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentStatus {
    /// Ingestion in flight.
    Processing,
    /// Text extracted, chunked, and embedded.
    Processed,
    /// Extraction ran but yielded no usable text.
    NoText,
    /// Ingestion failed.
    Failed,
    /// Typed notes are synced in one shot and land here directly.
    Ready,
}

impl ParentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParentStatus::Processing => "processing",
            ParentStatus::Processed => "processed",
            ParentStatus::NoText => "no_text",
            ParentStatus::Failed => "failed",
            ParentStatus::Ready => "ready",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ParentStatus::Processing)
    }

    /// Whether a transition to `next` is allowed.
    pub fn can_transition_to(&self, next: ParentStatus) -> bool {
        match self {
            ParentStatus::Processing => true,
            _ => *self == next,
        }
    }
}

impl std::str::FromStr for ParentStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "processing" => Ok(ParentStatus::Processing),
            "processed" => Ok(ParentStatus::Processed),
            "no_text" => Ok(ParentStatus::NoText),
            "failed" => Ok(ParentStatus::Failed),
            "ready" => Ok(ParentStatus::Ready),
            other => Err(crate::Error::InvalidInput(format!(
                "Unknown parent status: {}",
                other
            ))),
        }
    }
}

// =============================================================================
// PARENTS
// =============================================================================

/// An uploaded PDF document.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Document {
    pub id: Uuid,
    pub filename: String,
    pub page_count: i32,
    pub size_bytes: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// A handwriting capture from a canvas frame, OCR'd into text.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct HandwritingNote {
    pub id: Uuid,
    /// Canvas frame this capture came from.
    pub frame_id: String,
    pub ocr_text: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A typed text note synced from canvas text shapes, keyed by frame.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TypedNote {
    pub id: Uuid,
    pub frame_id: String,
    /// Extracted plain text of every block, newline-joined.
    pub full_text: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A link from a canvas shape to the document it renders.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CanvasLink {
    pub id: Uuid,
    /// Unique per shape; re-linking a shape replaces its target.
    pub shape_id: String,
    pub document_id: Uuid,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// CHUNKS
// =============================================================================

/// A stored chunk row, shared shape across all three chunk tables.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChunkRow {
    pub id: Uuid,
    pub parent_id: Uuid,
    pub chunk_index: i32,
    pub chunk_text: String,
    pub metadata: JsonValue,
    pub created_at: DateTime<Utc>,
}

/// A chunk ready for insertion: text plus its embedding and metadata.
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub chunk_index: i32,
    pub chunk_text: String,
    pub embedding: pgvector::Vector,
    pub metadata: JsonValue,
}

/// A similarity hit returned by a `match_*` stored function.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ChunkMatch {
    pub id: Uuid,
    pub parent_id: Uuid,
    pub chunk_index: i32,
    pub chunk_text: String,
    pub metadata: JsonValue,
    pub similarity: f64,
}

// =============================================================================
// CONTEXT
// =============================================================================

/// Which table a context entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextSource {
    Document,
    Handwriting,
    TypedNote,
}

impl ContextSource {
    pub fn label(&self) -> &'static str {
        match self {
            ContextSource::Document => "PDF",
            ContextSource::Handwriting => "Handwriting",
            ContextSource::TypedNote => "Note",
        }
    }
}

/// One retrieved chunk with enough provenance to cite it in a prompt.
#[derive(Debug, Clone, Serialize)]
pub struct ContextEntry {
    pub source: ContextSource,
    /// Filename for documents, frame id for notes.
    pub origin: String,
    pub chunk_index: i32,
    pub text: String,
    /// None for non-semantic gather results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
    /// Page number for document chunks, when recorded in metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<i64>,
}

// =============================================================================
// CHAT TRANSCRIPT
// =============================================================================

/// A tool call carried on an assistant message (OpenAI wire shape).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallPayload {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    pub function: ToolFunctionPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolFunctionPayload {
    pub name: String,
    /// Raw JSON string, exactly as accumulated from the stream.
    pub arguments: String,
}

/// One message in the assistant transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallPayload>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Synthetic assistant message recording an executed tool call.
    pub fn assistant_tool_calls(calls: Vec<ToolCallPayload>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: None,
            tool_calls: Some(calls),
            tool_call_id: None,
        }
    }

    /// Tool-role message carrying a tool's result back to the model.
    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: "tool".to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(call_id.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for s in ["processing", "processed", "no_text", "failed", "ready"] {
            let status: ParentStatus = s.parse().unwrap();
            assert_eq!(status.as_str(), s);
        }
    }

    #[test]
    fn test_status_unknown_rejected() {
        assert!("pending".parse::<ParentStatus>().is_err());
    }

    #[test]
    fn test_status_monotonic() {
        assert!(ParentStatus::Processing.can_transition_to(ParentStatus::Processed));
        assert!(ParentStatus::Processing.can_transition_to(ParentStatus::Failed));
        assert!(ParentStatus::Processing.can_transition_to(ParentStatus::NoText));
        assert!(!ParentStatus::Processed.can_transition_to(ParentStatus::Failed));
        assert!(!ParentStatus::Failed.can_transition_to(ParentStatus::Processing));
        // Self-transition on a terminal state is a no-op, allowed.
        assert!(ParentStatus::NoText.can_transition_to(ParentStatus::NoText));
    }

    #[test]
    fn test_terminal_states() {
        assert!(!ParentStatus::Processing.is_terminal());
        assert!(ParentStatus::Processed.is_terminal());
        assert!(ParentStatus::Ready.is_terminal());
    }

    #[test]
    fn test_chat_message_constructors() {
        let msg = ChatMessage::tool_result("call_1", "https://img.example/cat.png");
        assert_eq!(msg.role, "tool");
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));
        assert!(msg.tool_calls.is_none());

        let msg = ChatMessage::assistant_tool_calls(vec![ToolCallPayload {
            id: "call_1".to_string(),
            call_type: "function".to_string(),
            function: ToolFunctionPayload {
                name: "getImageSrc".to_string(),
                arguments: "{\"altText\":\"cat\"}".to_string(),
            },
        }]);
        assert_eq!(msg.role, "assistant");
        assert!(msg.content.is_none());
        assert_eq!(msg.tool_calls.as_ref().map(|c| c.len()), Some(1));
    }

    #[test]
    fn test_chat_message_serialization_skips_empty_fields() {
        let json = serde_json::to_value(ChatMessage::user("hi")).unwrap();
        assert!(json.get("tool_calls").is_none());
        assert!(json.get("tool_call_id").is_none());
    }

    #[test]
    fn test_context_source_labels() {
        assert_eq!(ContextSource::Document.label(), "PDF");
        assert_eq!(ContextSource::Handwriting.label(), "Handwriting");
        assert_eq!(ContextSource::TypedNote.label(), "Note");
    }
}
