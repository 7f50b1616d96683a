//! # easel-core
//!
//! Core types, traits, and abstractions for the easel canvas assistant.
//!
//! This crate provides the foundational data structures and trait definitions
//! that other easel crates depend on.

pub mod defaults;
pub mod error;
pub mod file_safety;
pub mod logging;
pub mod models;
pub mod richtext;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use file_safety::{has_pdf_magic, sanitize_filename};
pub use models::*;
pub use richtext::extract_plain_text;
pub use traits::*;
