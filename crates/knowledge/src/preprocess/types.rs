//! Query preprocessing types.

use super::front_matter;
use ragprompt_core::AppResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Tags extracted from a query to sharpen vector search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub programming_languages: Option<BTreeSet<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub products: Option<BTreeSet<String>>,
}

impl QueryMetadata {
    /// Build from optional tag lists; empty lists count as absent.
    pub fn from_tags(
        programming_languages: Option<Vec<String>>,
        products: Option<Vec<String>>,
    ) -> Self {
        Self {
            programming_languages: to_set(programming_languages),
            products: to_set(products),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.programming_languages.is_none() && self.products.is_none()
    }
}

fn to_set(tags: Option<Vec<String>>) -> Option<BTreeSet<String>> {
    let set: BTreeSet<String> = tags?
        .into_iter()
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect();
    (!set.is_empty()).then_some(set)
}

/// A user message after preprocessing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    /// Message exactly as received
    pub raw_text: String,

    /// Query used for search; equals `raw_text` unless rewritten
    pub standalone_text: String,

    #[serde(default)]
    pub metadata: QueryMetadata,

    /// Advisory: the assistant should decline to answer
    #[serde(default)]
    pub rejected: bool,
}

impl UserQuery {
    /// Unmodified query: standalone text is the raw text, no tags, not rejected.
    pub fn pass_through(raw_text: impl Into<String>) -> Self {
        let raw_text = raw_text.into();
        Self {
            standalone_text: raw_text.clone(),
            raw_text,
            metadata: QueryMetadata::default(),
            rejected: false,
        }
    }

    /// Text handed to the embedder: the standalone query, prefixed with
    /// YAML front-matter when there are tags.
    pub fn search_text(&self) -> AppResult<String> {
        front_matter::render(&self.standalone_text, &self.metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_through() {
        let query = UserQuery::pass_through("vector search");

        assert_eq!(query.raw_text, "vector search");
        assert_eq!(query.standalone_text, "vector search");
        assert!(query.metadata.is_empty());
        assert!(!query.rejected);
        assert_eq!(query.search_text().unwrap(), "vector search");
    }

    #[test]
    fn test_from_tags_drops_empty_lists_and_duplicates() {
        let metadata = QueryMetadata::from_tags(
            Some(vec!["python".to_string(), " python ".to_string()]),
            Some(vec!["".to_string()]),
        );

        assert_eq!(
            metadata.programming_languages,
            Some(BTreeSet::from(["python".to_string()]))
        );
        assert_eq!(metadata.products, None);
        assert!(!metadata.is_empty());
        assert!(QueryMetadata::from_tags(None, Some(vec![])).is_empty());
    }

    #[test]
    fn test_serialized_shape() {
        let mut query = UserQuery::pass_through("q");
        query.metadata = QueryMetadata::from_tags(None, Some(vec!["Atlas".to_string()]));

        let json = serde_json::to_value(&query).unwrap();
        assert_eq!(json["rawText"], "q");
        assert_eq!(json["standaloneText"], "q");
        assert_eq!(json["metadata"], serde_json::json!({"products": ["Atlas"]}));
        assert_eq!(json["rejected"], false);
    }
}
