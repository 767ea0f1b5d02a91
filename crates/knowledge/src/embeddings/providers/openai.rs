//! OpenAI-compatible embedding provider (`POST {base}/embeddings`).

use crate::embeddings::EmbeddingProvider;
use async_trait::async_trait;
use ragprompt_core::{AppError, AppResult};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

pub const DEFAULT_MODEL: &str = "text-embedding-3-small";

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Embeddings client for OpenAI and compatible endpoints.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: Client,
    endpoint: String,
    model: String,
    dimensions: usize,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

impl OpenAiProvider {
    pub fn new(
        base_url: Option<&str>,
        api_key: &str,
        model: &str,
        dimensions: usize,
    ) -> AppResult<Self> {
        if api_key.trim().is_empty() {
            return Err(AppError::Config("missing OpenAI API key".to_string()));
        }

        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|_| AppError::Config("invalid OpenAI API key".to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .default_headers(headers)
            .build()
            .map_err(|e| {
                AppError::Embedding(format!("Failed to build OpenAI HTTP client: {}", e))
            })?;

        let endpoint = format!(
            "{}/embeddings",
            base_url.unwrap_or(DEFAULT_OPENAI_URL).trim_end_matches('/')
        );

        Ok(Self {
            client,
            endpoint,
            model: model.to_string(),
            dimensions,
        })
    }
}

/// Order embeddings by their `index` and check one came back per input, each
/// of `dimensions` length when that is non-zero.
fn into_ordered(
    mut response: EmbeddingResponse,
    expected: usize,
    dimensions: usize,
) -> AppResult<Vec<Vec<f32>>> {
    response.data.sort_by_key(|entry| entry.index);
    if response.data.len() != expected {
        return Err(AppError::Embedding(format!(
            "OpenAI returned {} embeddings for {} inputs",
            response.data.len(),
            expected
        )));
    }
    if let Some(entry) = response
        .data
        .iter()
        .find(|entry| dimensions > 0 && entry.embedding.len() != dimensions)
    {
        return Err(AppError::Embedding(format!(
            "Unexpected embedding dimensions: got {}, expected {}",
            entry.embedding.len(),
            dimensions
        )));
    }
    Ok(response.data.into_iter().map(|entry| entry.embedding).collect())
}

#[async_trait]
impl EmbeddingProvider for OpenAiProvider {
    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    #[instrument(skip(self, texts), fields(batch_size = texts.len(), provider = "openai", model = %self.model))]
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
            dimensions: (self.dimensions > 0).then_some(self.dimensions),
        };

        debug!("Sending embedding request to {}", self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Embedding(format!("OpenAI embeddings request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(AppError::Embedding(format!(
                "OpenAI embeddings request failed ({}): {}",
                status, body
            )));
        }

        let parsed: EmbeddingResponse = response.json().await.map_err(|e| {
            AppError::Embedding(format!("Failed to parse OpenAI embedding response: {}", e))
        })?;

        into_ordered(parsed, texts.len(), self.dimensions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_blank_api_key() {
        let result = OpenAiProvider::new(None, "  ", DEFAULT_MODEL, 1536);
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_endpoint_from_base_url() {
        let provider =
            OpenAiProvider::new(Some("http://localhost:8080/v1/"), "sk-test", DEFAULT_MODEL, 1536)
                .unwrap();
        assert_eq!(provider.endpoint, "http://localhost:8080/v1/embeddings");
        assert_eq!(provider.provider_name(), "openai");
    }

    #[test]
    fn test_response_is_reordered_by_index() {
        let response: EmbeddingResponse = serde_json::from_str(
            r#"{"data": [
                {"embedding": [0.2, 0.2], "index": 1},
                {"embedding": [0.1, 0.1], "index": 0}
            ]}"#,
        )
        .unwrap();

        let ordered = into_ordered(response, 2, 2).unwrap();
        assert_eq!(ordered, vec![vec![0.1, 0.1], vec![0.2, 0.2]]);
    }

    #[test]
    fn test_response_count_mismatch() {
        let response: EmbeddingResponse =
            serde_json::from_str(r#"{"data": [{"embedding": [0.1], "index": 0}]}"#).unwrap();

        assert!(matches!(into_ordered(response, 2, 0), Err(AppError::Embedding(_))));
    }

    #[test]
    fn test_request_payload_batches_inputs() {
        let texts = vec!["a".to_string(), "b".to_string()];
        let request = EmbeddingRequest {
            model: DEFAULT_MODEL,
            input: &texts,
            dimensions: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["input"], serde_json::json!(["a", "b"]));
        assert!(json.get("dimensions").is_none());
    }

    #[test]
    fn test_request_payload_carries_dimensions() {
        let texts = vec!["a".to_string()];
        let request = EmbeddingRequest {
            model: DEFAULT_MODEL,
            input: &texts,
            dimensions: Some(768),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["dimensions"], serde_json::json!(768));
    }

    #[test]
    fn test_response_dimension_mismatch() {
        let response: EmbeddingResponse = serde_json::from_str(
            r#"{"data": [{"embedding": [0.1, 0.2, 0.3], "index": 0}]}"#,
        )
        .unwrap();

        match into_ordered(response, 1, 768) {
            Err(AppError::Embedding(msg)) => {
                assert!(msg.contains("got 3, expected 768"));
            }
            other => panic!("Expected dimension error, got {:?}", other),
        }
    }
}
