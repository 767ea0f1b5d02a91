//! Prompt types for ragprompt.

use serde::{Deserialize, Serialize};

/// A user message augmented with retrieved context.
///
/// `original_text` is the message exactly as the user sent it; `llm_text` is
/// what the language model receives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AugmentedPrompt {
    /// Raw user message, unchanged
    #[serde(rename = "originalText")]
    pub original_text: String,

    /// Retrieved chunk texts joined by the separator line
    #[serde(rename = "contextBlock")]
    pub context_block: String,

    /// Fully rendered message for the language model
    #[serde(rename = "llmText")]
    pub llm_text: String,

    /// Query embedding the context was retrieved with
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embedding: Vec<f32>,
}

impl AugmentedPrompt {
    /// Whether any retrieved context made it into the prompt.
    pub fn has_context(&self) -> bool {
        !self.context_block.is_empty()
    }
}
