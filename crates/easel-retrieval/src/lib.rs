//! # easel-retrieval
//!
//! Resolves a canvas selection to its indexed parents, runs per-parent
//! similarity search, and merges hits into one ranked context list.

pub mod aggregator;
pub mod format;
pub mod service;

pub use aggregator::{merge_ranked, ContextAggregator, RetrievalConfig};
pub use format::format_context;
pub use service::ContextService;
