//! Structured logging schema and field name constants for easel.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation tools can query by standardized field names across
//! every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration, high-volume data (chunks, deltas) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID propagated across request → pipeline → sub-calls.
/// Format: UUIDv7 (time-ordered).
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "api", "ingest", "retrieval", "db", "inference", "assist"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "chunker", "batcher", "aggregator", "orchestrator", "openai"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "embed_texts", "match_chunks", "open_turn", "run_tool"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Document UUID being operated on.
pub const DOCUMENT_ID: &str = "document_id";

/// Handwriting/typed note UUID being operated on.
pub const NOTE_ID: &str = "note_id";

/// Canvas frame ID (editor-side identifier).
pub const FRAME_ID: &str = "frame_id";

/// Canvas shape ID (editor-side identifier).
pub const SHAPE_ID: &str = "shape_id";

/// Tool name for assistant tool calls.
pub const TOOL_NAME: &str = "tool";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of results returned by a search or query.
pub const RESULT_COUNT: &str = "result_count";

/// Number of chunks processed (embedding, chunking, storage).
pub const CHUNK_COUNT: &str = "chunk_count";

/// Number of input texts sent to an embedding model.
pub const TEXT_COUNT: &str = "text_count";

/// Tool-call round within an /ask request (1-based).
pub const ROUND: &str = "round";
