//! Command handlers for the ragprompt CLI.

pub mod ask;
pub mod input;
pub mod prompt;

// Re-export command types for convenience
pub use ask::AskCommand;
pub use prompt::PromptCommand;
