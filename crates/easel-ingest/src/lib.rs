//! # easel-ingest
//!
//! Text chunking, ordered embedding batching, and the three ingestion
//! pipelines (PDF, handwriting, typed-note sync).

pub mod batcher;
pub mod chunker;
pub mod extract;
pub mod handwriting;
pub mod pdf;
pub mod typed;

pub use batcher::EmbeddingBatcher;
pub use chunker::{clean_text, ChunkerConfig, SlidingWindowChunker, TextChunk};
pub use extract::{PdftotextExtractor, TesseractOcr};
pub use handwriting::HandwritingPipeline;
pub use pdf::{PdfIngestPipeline, PdfIngestReport};
pub use typed::{TextShape, TypedNoteSync, TypedNoteSyncReport};
