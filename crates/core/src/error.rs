//! Error types for the ragprompt pipeline.
//!
//! This module defines a unified error enum covering every stage of the
//! query-to-prompt pipeline: configuration, LLM calls, structured
//! translation, embedding, retrieval, and prompt assembly.

use thiserror::Error;

/// Unified error type for the ragprompt crates.
///
/// All fallible functions return `Result<T, AppError>`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// LLM provider errors (transport, HTTP status, malformed responses)
    #[error("LLM error: {0}")]
    Llm(String),

    /// Embedding provider errors
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Structured-output translation exhausted its retry budget
    #[error("Translation error: {0}")]
    Translation(String),

    /// Vector store query failures
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// Prompt template errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The pipeline exceeded its time budget
    #[error("Timed out after {0} ms")]
    Timeout(u64),

    /// The caller cancelled the request
    #[error("Request cancelled")]
    Cancelled,

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Whether the error was caused by a deadline or caller cancellation.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, AppError::Timeout(_) | AppError::Cancelled)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
