//! Configuration management for ragprompt.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Built-in defaults (mirroring the reference deployment)
//! - Config file (`.ragprompt/config.yaml` in the workspace, or `RAGPROMPT_CONFIG`)
//! - Environment variables
//! - Command-line flags

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AppError, AppResult};
use crate::retry::RetryPolicy;

/// Providers the factories know how to build.
pub const KNOWN_PROVIDERS: [&str; 3] = ["ollama", "openai", "azure"];

/// Embedding providers; `trigram` needs no service.
pub const KNOWN_EMBEDDING_PROVIDERS: [&str; 4] = ["ollama", "openai", "azure", "trigram"];

/// Instruction turn handed to the chat model ahead of every assembled prompt.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant with great knowledge about movies.
Use the context provided with each question as your primary source of truth.
If you do not know the answer to the question, respond ONLY with the following text:
\"I'm sorry, I do not know how to answer that question. Please try to rephrase your query. You can also refer to the further reading to see if it helps.\"";

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .ragprompt/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Chat provider (e.g., "ollama", "openai")
    pub provider: String,

    /// Chat model identifier
    pub model: String,

    /// Explicit API key, takes precedence over provider-specific env vars
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Emit JSON log records
    pub json_logs: bool,

    /// LLM provider configurations
    pub llm: LlmConfig,

    pub retrieval: RetrievalSettings,

    pub embedding: EmbeddingSettings,

    pub preprocess: PreprocessSettings,

    pub pipeline: PipelineSettings,

    /// System prompt for the chat model
    pub system_prompt: String,
}

/// LLM configuration from config.yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(rename = "activeProvider")]
    pub active_provider: String,

    #[serde(rename = "activeEmbeddingProvider")]
    pub active_embedding_provider: String,

    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Sampling temperature for answers
    #[serde(default)]
    pub temperature: f32,

    #[serde(rename = "maxTokens", default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_max_tokens() -> u32 {
    1500
}

impl Default for LlmConfig {
    fn default() -> Self {
        let mut providers = HashMap::new();
        providers.insert(
            "ollama".to_string(),
            ProviderConfig::Ollama {
                endpoint: "http://localhost:11434".to_string(),
                model: "llama3.2".to_string(),
                embedding_model: Some("nomic-embed-text".to_string()),
                timeout: Some(30),
            },
        );

        Self {
            active_provider: "ollama".to_string(),
            active_embedding_provider: "ollama".to_string(),
            providers,
            temperature: 0.0,
            max_tokens: default_max_tokens(),
        }
    }
}

/// Provider-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderConfig {
    OpenAI {
        #[serde(rename = "apiKeyEnv")]
        api_key_env: String,
        model: String,
        #[serde(rename = "embeddingModel")]
        embedding_model: Option<String>,
        endpoint: Option<String>,
    },
    Ollama {
        endpoint: String,
        model: String,
        #[serde(rename = "embeddingModel")]
        embedding_model: Option<String>,
        /// Request timeout in seconds
        timeout: Option<u64>,
    },
}

impl ProviderConfig {
    /// Chat model configured for this provider.
    pub fn model(&self) -> &str {
        match self {
            Self::OpenAI { model, .. } | Self::Ollama { model, .. } => model,
        }
    }

    /// Embedding model configured for this provider, if any.
    pub fn embedding_model(&self) -> Option<&str> {
        match self {
            Self::OpenAI {
                embedding_model, ..
            }
            | Self::Ollama {
                embedding_model, ..
            } => embedding_model.as_deref(),
        }
    }

    /// Custom endpoint, if any.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            Self::OpenAI { endpoint, .. } => endpoint.as_deref(),
            Self::Ollama { endpoint, .. } => Some(endpoint.as_str()),
        }
    }

    /// Per-request timeout, if one is configured.
    pub fn timeout(&self) -> Option<Duration> {
        match self {
            Self::Ollama {
                timeout: Some(secs),
                ..
            } => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }
}

/// Nearest-neighbor retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct RetrievalSettings {
    /// Name of the vector index (LanceDB table) holding the content
    pub index_name: String,

    /// Vector database directory, relative paths resolve against the workspace
    pub db_path: PathBuf,

    /// Maximum number of chunks returned
    pub k: usize,

    /// Minimum similarity score for a chunk to be kept
    pub min_score: f32,

    /// Dimension of stored embeddings
    pub embedding_dim: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            index_name: "vector_index".to_string(),
            db_path: PathBuf::from(".ragprompt/index"),
            k: 5,
            min_score: 0.9,
            embedding_dim: 768,
        }
    }
}

/// Embedding stage settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct EmbeddingSettings {
    /// Total attempts per embedding call
    pub attempts: u32,

    pub initial_delay_ms: u64,

    pub max_delay_ms: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            attempts: 1,
            initial_delay_ms: 100,
            max_delay_ms: 5000,
        }
    }
}

impl EmbeddingSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.attempts,
            Duration::from_millis(self.initial_delay_ms),
            Duration::from_millis(self.max_delay_ms),
        )
    }
}

/// Query preprocessing settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct PreprocessSettings {
    /// Whether the standalone-question rewrite runs at all
    pub enabled: bool,

    /// Name of the domain; single-word queries get " for <domain>" appended
    pub domain_name: String,

    /// Number of non-system turns included in the rewrite prompt
    pub history_turns: usize,

    /// Retries after the first failed translation
    pub retries: u32,

    pub retry_delay_ms: u64,
}

impl Default for PreprocessSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            domain_name: "MongoDB".to_string(),
            history_turns: 4,
            retries: 0,
            retry_delay_ms: 4000,
        }
    }
}

impl PreprocessSettings {
    /// Fixed-delay policy for the translation service.
    pub fn retry_policy(&self) -> RetryPolicy {
        let delay = Duration::from_millis(self.retry_delay_ms);
        RetryPolicy::new(self.retries.saturating_add(1), delay, delay).with_multiplier(1.0)
    }
}

/// Whole-request settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct PipelineSettings {
    pub timeout_ms: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self { timeout_ms: 30_000 }
    }
}

impl PipelineSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    llm: Option<LlmConfig>,
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
    retrieval: Option<RetrievalSettings>,
    embedding: Option<EmbeddingSettings>,
    preprocess: Option<PreprocessSettings>,
    pipeline: Option<PipelineSettings>,
    system_prompt: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
    json: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "ollama".to_string(),
            model: "llama3.2".to_string(),
            api_key: None,
            log_level: None,
            verbose: false,
            no_color: false,
            json_logs: false,
            llm: LlmConfig::default(),
            retrieval: RetrievalSettings::default(),
            embedding: EmbeddingSettings::default(),
            preprocess: PreprocessSettings::default(),
            pipeline: PipelineSettings::default(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and defaults.
    ///
    /// Environment variables:
    /// - `RAGPROMPT_WORKSPACE`: Override workspace path
    /// - `RAGPROMPT_CONFIG`: Path to config file
    /// - `RAGPROMPT_PROVIDER`: Chat provider
    /// - `RAGPROMPT_MODEL`: Chat model identifier
    /// - `RAGPROMPT_API_KEY`: API key
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use ragprompt_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Index: {}", config.retrieval.index_name);
    /// ```
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("RAGPROMPT_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Ok(config_file) = std::env::var("RAGPROMPT_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        config = config.reload_file()?;

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("RAGPROMPT_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("RAGPROMPT_MODEL") {
            config.model = model;
        }

        config.api_key = std::env::var("RAGPROMPT_API_KEY").ok();

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge the config file (explicit path or workspace default) if present.
    pub fn reload_file(self) -> AppResult<Self> {
        let config_path = self
            .config_file
            .clone()
            .unwrap_or_else(|| self.ragprompt_dir().join("config.yaml"));

        if config_path.exists() {
            self.merge_yaml(&config_path)
        } else if self.config_file.is_some() {
            Err(AppError::Config(format!(
                "Config file not found: {:?}",
                config_path
            )))
        } else {
            Ok(self)
        }
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(ws) = config_file.workspace {
            if let Some(path) = ws.path {
                result.workspace = PathBuf::from(path);
            }
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(json) = logging.json {
                result.json_logs = json;
            }
        }

        if let Some(llm) = config_file.llm {
            result.provider = llm.active_provider.clone();

            if let Some(provider_config) = llm.providers.get(&llm.active_provider) {
                result.model = provider_config.model().to_string();
            }

            result.llm = llm;
        }

        if let Some(retrieval) = config_file.retrieval {
            result.retrieval = retrieval;
        }
        if let Some(embedding) = config_file.embedding {
            result.embedding = embedding;
        }
        if let Some(preprocess) = config_file.preprocess {
            result.preprocess = preprocess;
        }
        if let Some(pipeline) = config_file.pipeline {
            result.pipeline = pipeline;
        }
        if let Some(system_prompt) = config_file.system_prompt {
            result.system_prompt = system_prompt;
        }

        tracing::debug!("Merged config file {:?}", path);
        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the config file.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
        json_logs: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        if json_logs {
            self.json_logs = true;
        }

        self
    }

    /// Get the path to the .ragprompt directory.
    pub fn ragprompt_dir(&self) -> PathBuf {
        self.workspace.join(".ragprompt")
    }

    /// Resolved vector database directory.
    pub fn index_path(&self) -> PathBuf {
        if self.retrieval.db_path.is_absolute() {
            self.retrieval.db_path.clone()
        } else {
            self.workspace.join(&self.retrieval.db_path)
        }
    }

    /// Get a provider's configuration.
    pub fn get_provider_config(&self, provider: &str) -> Option<&ProviderConfig> {
        self.llm.providers.get(provider)
    }

    /// Endpoint configured for a provider, if any.
    pub fn endpoint_for(&self, provider: &str) -> Option<&str> {
        self.get_provider_config(provider)
            .and_then(ProviderConfig::endpoint)
    }

    /// Request timeout configured for a provider, if any.
    pub fn timeout_for(&self, provider: &str) -> Option<Duration> {
        self.get_provider_config(provider)
            .and_then(ProviderConfig::timeout)
    }

    /// Resolve API key from environment variable.
    pub fn resolve_api_key(&self, provider: &str) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }

        match self.get_provider_config(provider)? {
            ProviderConfig::OpenAI { api_key_env, .. } => std::env::var(api_key_env).ok(),
            ProviderConfig::Ollama { .. } => None,
        }
    }

    /// Validate configuration for the active providers and pipeline settings.
    pub fn validate(&self) -> AppResult<()> {
        if !KNOWN_PROVIDERS.contains(&self.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                self.provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        let embedding_provider = &self.llm.active_embedding_provider;
        if !KNOWN_EMBEDDING_PROVIDERS.contains(&embedding_provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown embedding provider: {}. Supported: {}",
                embedding_provider,
                KNOWN_EMBEDDING_PROVIDERS.join(", ")
            )));
        }

        for provider in [&self.provider, embedding_provider] {
            if let Some(ProviderConfig::OpenAI { api_key_env, .. }) =
                self.get_provider_config(provider)
            {
                if self.api_key.is_none() && std::env::var(api_key_env).is_err() {
                    return Err(AppError::Config(format!(
                        "API key not found in environment variable: {}",
                        api_key_env
                    )));
                }
            }
        }

        if self.retrieval.k == 0 {
            return Err(AppError::Config("retrieval.k must be at least 1".to_string()));
        }

        if !(0.0..=1.0).contains(&self.retrieval.min_score) {
            return Err(AppError::Config(format!(
                "retrieval.minScore must be within [0, 1], got {}",
                self.retrieval.min_score
            )));
        }

        if self.retrieval.index_name.trim().is_empty() {
            return Err(AppError::Config(
                "retrieval.indexName cannot be empty".to_string(),
            ));
        }

        if self.embedding.attempts == 0 {
            return Err(AppError::Config(
                "embedding.attempts must be at least 1".to_string(),
            ));
        }

        if self.pipeline.timeout_ms == 0 {
            return Err(AppError::Config(
                "pipeline.timeoutMs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
