//! OpenAI-compatible backend: embeddings and streamed chat turns.

pub mod backend;
pub mod streaming;
pub mod types;

pub use backend::{OpenAIBackend, OpenAIConfig, DEFAULT_OPENAI_URL};
pub use streaming::parse_turn_stream;
