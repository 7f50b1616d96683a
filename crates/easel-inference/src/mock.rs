//! Mock backends for deterministic testing.
//!
//! `MockEmbeddingBackend` produces deterministic vectors and can permute
//! response order to exercise index re-sorting. `MockTurnProvider` replays
//! scripted turns so the orchestrator loop can be tested without a network.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use easel_core::{
    ChatMessage, EmbeddingBackend, Error, IndexedEmbedding, Result, ToolDefinition, TurnDelta,
    TurnProvider, TurnStream,
};

// =============================================================================
// EMBEDDINGS
// =============================================================================

/// Mock embedding backend with a call log.
#[derive(Clone)]
pub struct MockEmbeddingBackend {
    dimension: usize,
    /// Return batches in reversed index order, as a permuting provider would.
    permute: bool,
    /// Fail every call with an embedding error.
    fail: bool,
    call_log: Arc<Mutex<Vec<usize>>>,
}

impl MockEmbeddingBackend {
    pub fn new() -> Self {
        Self {
            dimension: 8,
            permute: false,
            fail: false,
            call_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    pub fn with_permuted_order(mut self) -> Self {
        self.permute = true;
        self
    }

    pub fn with_failure(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Batch sizes of every call received so far.
    pub fn call_sizes(&self) -> Vec<usize> {
        self.call_log.lock().unwrap().clone()
    }

    /// Deterministic vector for a text: first component is the text length,
    /// the rest a simple character checksum spread.
    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let sum: u32 = text.chars().map(|c| c as u32 % 97).sum();
        let mut v = vec![0.0f32; self.dimension];
        if !v.is_empty() {
            v[0] = text.len() as f32;
        }
        for (i, slot) in v.iter_mut().enumerate().skip(1) {
            *slot = ((sum + i as u32) % 101) as f32 / 101.0;
        }
        v
    }
}

impl Default for MockEmbeddingBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingBackend for MockEmbeddingBackend {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<IndexedEmbedding>> {
        self.call_log.lock().unwrap().push(texts.len());

        if self.fail {
            return Err(Error::Embedding("mock embedding failure".to_string()));
        }

        let mut out: Vec<IndexedEmbedding> = texts
            .iter()
            .enumerate()
            .map(|(index, text)| IndexedEmbedding {
                index,
                vector: self.vector_for(text),
            })
            .collect();

        if self.permute {
            out.reverse();
        }
        Ok(out)
    }

    fn model_name(&self) -> &str {
        "mock-embed"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

// =============================================================================
// TURNS
// =============================================================================

/// Mock turn provider replaying scripted delta sequences, one per round.
#[derive(Clone)]
pub struct MockTurnProvider {
    turns: Arc<Mutex<VecDeque<Vec<Result<TurnDelta>>>>>,
    call_log: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
}

impl MockTurnProvider {
    pub fn new() -> Self {
        Self {
            turns: Arc::new(Mutex::new(VecDeque::new())),
            call_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue the deltas for the next turn.
    pub fn push_turn(&self, deltas: Vec<Result<TurnDelta>>) {
        self.turns.lock().unwrap().push_back(deltas);
    }

    /// Builder-style variant of [`push_turn`](Self::push_turn).
    pub fn with_turn(self, deltas: Vec<Result<TurnDelta>>) -> Self {
        self.push_turn(deltas);
        self
    }

    /// Transcripts of every `open_turn` call so far.
    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.call_log.lock().unwrap().clone()
    }
}

impl Default for MockTurnProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TurnProvider for MockTurnProvider {
    async fn open_turn(
        &self,
        messages: &[ChatMessage],
        _tools: Option<&[ToolDefinition]>,
    ) -> Result<TurnStream> {
        self.call_log.lock().unwrap().push(messages.to_vec());

        let deltas = self
            .turns
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default();
        Ok(Box::pin(futures::stream::iter(deltas)))
    }

    fn model_name(&self) -> &str {
        "mock-chat"
    }
}
