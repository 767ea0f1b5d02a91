//! ragprompt core library
//!
//! This crate provides the foundational utilities shared by every pipeline stage:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging infrastructure
//! - Configuration management
//! - Retry policy for remote calls
//! - Shared domain values (`ConversationTurn`, `ContentChunk`)

pub mod config;
pub mod error;
pub mod logging;
pub mod retry;
pub mod types;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use retry::RetryPolicy;
pub use types::{ContentChunk, ConversationTurn, Role};
