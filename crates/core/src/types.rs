//! Domain values shared by every pipeline stage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One message of a prior conversation, oldest-first in a sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,

    pub text: String,

    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    /// Create a turn stamped with the current time.
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, text)
    }
}

/// A retrieved unit of source content with its similarity to the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentChunk {
    /// Chunk text
    pub text: String,

    /// Identifier of the source document (URL, path, or opaque id)
    #[serde(rename = "sourceId")]
    pub source_id: String,

    /// Stored embedding of the chunk text
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embedding: Vec<f32>,

    /// Similarity to the query vector, in [0, 1]
    #[serde(default)]
    pub score: f32,
}

impl ContentChunk {
    pub fn new(text: impl Into<String>, source_id: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            text: text.into(),
            source_id: source_id.into(),
            embedding,
            score: 0.0,
        }
    }

    /// Copy of this chunk carrying the given score.
    pub fn with_score(mut self, score: f32) -> Self {
        self.score = score;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_deserializes_without_timestamp() {
        let turn: ConversationTurn =
            serde_json::from_str(r#"{"role":"assistant","text":"hi"}"#).unwrap();
        assert_eq!(turn.role, Role::Assistant);
        assert_eq!(turn.text, "hi");
    }

    #[test]
    fn test_role_names() {
        assert_eq!(Role::System.as_str(), "system");
        assert_eq!(Role::User.as_str(), "user");
        assert_eq!(Role::Assistant.as_str(), "assistant");
    }

    #[test]
    fn test_chunk_serializes_source_id_camel_case() {
        let chunk = ContentChunk::new("body", "doc-1", vec![]).with_score(0.5);
        let json = serde_json::to_value(&chunk).unwrap();
        assert_eq!(json["sourceId"], "doc-1");
        assert!(json.get("embedding").is_none());
    }
}
