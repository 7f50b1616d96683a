//! # easel-inference
//!
//! HTTP inference backends for easel: an OpenAI-compatible embedding and
//! streaming chat backend, plus deterministic mocks for tests.

pub mod mock;
pub mod openai;

pub use mock::{MockEmbeddingBackend, MockTurnProvider};
pub use openai::{OpenAIBackend, OpenAIConfig};
