//! Centralized default constants for the easel system.
//!
//! **This module is the single source of truth** for all shared default values.
//! All crates should reference these constants instead of defining their own
//! magic numbers.
//!
//! Organized by domain area. When adding new constants, place them in the
//! appropriate section and document the rationale for the chosen value.

// =============================================================================
// CHUNKING
// =============================================================================

/// Window size in characters for document (PDF) chunking.
pub const DOCUMENT_CHUNK_SIZE: usize = 1000;

/// Overlap characters between adjacent document chunks.
pub const DOCUMENT_CHUNK_OVERLAP: usize = 200;

/// Minimum trimmed length for a document chunk to be kept. Page fragments
/// at or below this length are mostly headers and page numbers.
pub const DOCUMENT_CHUNK_MIN_CHARS: usize = 50;

/// Window size for handwriting chunks. OCR text is noisier, so windows
/// are smaller to keep retrieval granular.
pub const HANDWRITING_CHUNK_SIZE: usize = 400;

/// Overlap for handwriting chunks.
pub const HANDWRITING_CHUNK_OVERLAP: usize = 80;

// =============================================================================
// EMBEDDING
// =============================================================================

/// Default embedding model name (OpenAI-compatible).
pub const EMBED_MODEL: &str = "text-embedding-3-small";

/// Embedding vector dimension for the default model.
pub const EMBED_DIMENSION: usize = 1536;

/// Texts per embedding API request.
pub const EMBED_BATCH_SIZE: usize = 100;

// =============================================================================
// STORAGE
// =============================================================================

/// Chunk rows per INSERT statement.
pub const CHUNK_INSERT_BATCH: usize = 50;

// =============================================================================
// RETRIEVAL
// =============================================================================

/// Cosine similarity floor for semantic matches.
pub const MATCH_THRESHOLD: f64 = 0.1;

/// Chunks per parent for semantic search.
pub const SEARCH_CHUNK_LIMIT: i64 = 5;

/// Default similarity floor for direct document search requests. Stricter
/// than the context threshold: callers ask for close matches, not recall.
pub const DOCUMENT_SEARCH_THRESHOLD: f64 = 0.7;

/// Chunks per parent for non-semantic gather (embedding fallback).
pub const GATHER_CHUNK_LIMIT: i64 = 5;

// =============================================================================
// ASSISTANT
// =============================================================================

/// Default chat model for the assistant.
pub const CHAT_MODEL: &str = "gpt-4o";

/// Maximum tool-call rounds per /ask request. A soft cap: reaching it
/// ends the loop normally rather than erroring.
pub const MAX_TOOL_ROUNDS: usize = 10;

/// Wall-clock budget in seconds for each provider stream read.
pub const TURN_TIMEOUT_SECS: u64 = 120;

/// Capacity of the assistant event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

// =============================================================================
// EXTRACTION
// =============================================================================

/// Per-invocation timeout for external extraction commands
/// (pdftotext, pdfinfo, tesseract).
pub const EXTRACTION_CMD_TIMEOUT_SECS: u64 = 120;

/// Maximum recursion depth when walking a rich-text tree.
pub const RICHTEXT_MAX_DEPTH: usize = 64;

// =============================================================================
// API
// =============================================================================

/// Maximum upload body size in bytes (32 MiB).
pub const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// Default page size for document listings.
pub const PAGE_LIMIT: i64 = 50;
