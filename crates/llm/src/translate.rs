//! Schema-constrained structured-output translation.
//!
//! A `StructuredTranslator` turns a natural-language prompt into a JSON object
//! that conforms to a named schema. `LlmJsonTranslator` implements it on top
//! of any `LlmClient`: the schema definition is embedded in the request, the
//! model is asked for JSON output, and the reply is validated before it is
//! returned. Transport failures and schema violations share one retry budget;
//! when a reply fails validation, the next attempt asks the model to repair it.

use crate::client::{LlmClient, LlmRequest};
use ragprompt_core::{AppError, AppResult, RetryPolicy};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Validation hook run against every candidate object.
pub type SchemaValidator = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// Named schema a translation result must satisfy.
#[derive(Clone)]
pub struct TranslationSchema {
    /// Type name the model is asked to produce
    pub name: String,

    /// Schema source shown to the model (TypeScript-style declarations)
    pub definition: String,

    validator: SchemaValidator,
}

impl TranslationSchema {
    /// Schema with a custom validator.
    pub fn new(
        name: impl Into<String>,
        definition: impl Into<String>,
        validator: impl Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            definition: definition.into(),
            validator: Arc::new(validator),
        }
    }

    /// Schema validated by deserializing into `T`.
    pub fn for_type<T: DeserializeOwned>(
        name: impl Into<String>,
        definition: impl Into<String>,
    ) -> Self {
        Self::new(name, definition, |value| {
            serde_json::from_value::<T>(value.clone())
                .map(|_| ())
                .map_err(|e| e.to_string())
        })
    }

    pub fn validate(&self, value: &Value) -> Result<(), String> {
        (self.validator)(value)
    }
}

impl fmt::Debug for TranslationSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranslationSchema")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Remote structured-output service.
#[async_trait::async_trait]
pub trait StructuredTranslator: Send + Sync {
    /// Schema every result conforms to.
    fn schema(&self) -> &TranslationSchema;

    /// Translate `prompt` into a schema-conforming object.
    ///
    /// # Errors
    /// `AppError::Translation` once the retry budget is exhausted,
    /// `AppError::Cancelled` if `cancel` fires first.
    async fn translate(&self, prompt: &str, cancel: &CancellationToken) -> AppResult<Value>;
}

#[derive(Debug, Error)]
enum TranslateFailure {
    #[error("{0}")]
    Transport(String),

    #[error("response does not match schema: {reason}")]
    Schema { response: String, reason: String },
}

/// `StructuredTranslator` backed by a chat/completion model.
pub struct LlmJsonTranslator {
    client: Arc<dyn LlmClient>,
    model: String,
    schema: TranslationSchema,
    policy: RetryPolicy,
}

impl LlmJsonTranslator {
    pub fn new(
        client: Arc<dyn LlmClient>,
        model: impl Into<String>,
        schema: TranslationSchema,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            client,
            model: model.into(),
            schema,
            policy,
        }
    }

    fn request_prompt(&self, request: &str) -> String {
        format!(
            "You are a service that translates user requests into JSON objects of type \"{name}\" according to the following TypeScript definitions:\n\
             ```\n{definition}\n```\n\
             The following is a user request:\n\"\"\"\n{request}\n\"\"\"\n\
             The following is the user request translated into a JSON object with 2 spaces of indentation and no properties with the value undefined:\n",
            name = self.schema.name,
            definition = self.schema.definition.trim(),
            request = request,
        )
    }

    fn repair_prompt(&self, request: &str, response: &str, reason: &str) -> String {
        format!(
            "{}{}\n\
             The JSON object is invalid for the following reason:\n\"\"\"\n{}\n\"\"\"\n\
             The following is a revised JSON object:\n",
            self.request_prompt(request),
            response.trim(),
            reason
        )
    }

    async fn attempt(&self, prompt: &str) -> Result<Value, TranslateFailure> {
        let request = LlmRequest::new(prompt, &self.model)
            .with_temperature(0.0)
            .with_json_output();

        let response = self
            .client
            .complete(&request)
            .await
            .map_err(|e| TranslateFailure::Transport(e.to_string()))?;

        let schema_failure = |reason: String| TranslateFailure::Schema {
            response: response.content.clone(),
            reason,
        };

        let candidate = extract_json_object(&response.content)
            .ok_or_else(|| schema_failure("response is not a JSON object".to_string()))?;

        let value: Value = serde_json::from_str(candidate)
            .map_err(|e| schema_failure(format!("invalid JSON: {}", e)))?;

        self.schema.validate(&value).map_err(schema_failure)?;

        Ok(value)
    }
}

#[async_trait::async_trait]
impl StructuredTranslator for LlmJsonTranslator {
    fn schema(&self) -> &TranslationSchema {
        &self.schema
    }

    #[tracing::instrument(skip(self, prompt, cancel), fields(schema = %self.schema.name, model = %self.model, provider = self.client.provider_name()))]
    async fn translate(&self, prompt: &str, cancel: &CancellationToken) -> AppResult<Value> {
        let last_invalid: Mutex<Option<(String, String)>> = Mutex::new(None);

        let run = self.policy.run(
            "translation",
            |attempt| {
                let last_invalid = &last_invalid;
                async move {
                    let repair = last_invalid.lock().ok().and_then(|guard| (*guard).clone());
                    let text = match repair {
                        Some((response, reason)) => self.repair_prompt(prompt, &response, &reason),
                        None => self.request_prompt(prompt),
                    };

                    tracing::debug!("Translation attempt {}", attempt);
                    let result = self.attempt(&text).await;

                    if let Err(TranslateFailure::Schema { response, reason }) = &result {
                        if let Ok(mut guard) = last_invalid.lock() {
                            *guard = Some((response.clone(), reason.clone()));
                        }
                    }
                    result
                }
            },
            |_| true,
        );

        tokio::select! {
            _ = cancel.cancelled() => Err(AppError::Cancelled),
            result = run => result.map_err(|e| {
                tracing::error!("Translation to {} failed: {}", self.schema.name, e);
                AppError::Translation(format!("{}: {}", self.schema.name, e))
            }),
        }
    }
}

/// Slice out the outermost `{...}` of a model reply, tolerating code fences
/// and prose around it.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}
