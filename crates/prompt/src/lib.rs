//! Prompt system for ragprompt.
//!
//! This crate renders the two prompts of the query pipeline:
//! - The augmented RAG prompt combining retrieved context with the user's question
//! - The standalone-question prompt sent to the query preprocessor

pub mod builder;
pub mod types;

// Re-export main types
pub use builder::{
    assemble, build_standalone_prompt, format_history, CHUNK_SEPARATOR, NO_HISTORY_PLACEHOLDER,
};
pub use types::AugmentedPrompt;
