//! TOML-based configuration for forum-rag
//!
//! All runtime parameters of the pipeline (tokenizer, chunking, retrieval,
//! context budget, providers, timeouts and retry policy) live in one file,
//! `forum-rag.toml`, parsed into [`ForumRagConfig`] and validated once at
//! process start. Secrets are never written into the file; it only names
//! the environment variables that hold them.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure loaded from forum-rag.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForumRagConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub rag: RagConfig,

    #[serde(default)]
    pub embedder: EmbedderConfig,

    pub index: IndexConfig,

    pub generator: GeneratorConfig,

    #[serde(default)]
    pub timeouts: TimeoutConfig,

    #[serde(default)]
    pub retry: RetryConfig,
}

// ============= Server Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

// ============= RAG Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    #[serde(default = "default_embedding_model")]
    pub embedding_model_name: String,

    /// Only "cpu" is supported by the bundled runtimes
    #[serde(default = "default_embedding_device")]
    pub embedding_device: String,

    #[serde(default = "default_true")]
    pub normalize_embeddings: bool,

    /// tokenizer.json of the embedding model; chunk sizes and the context
    /// budget are measured with it
    #[serde(default)]
    pub tokenizer_path: Option<PathBuf>,

    #[serde(default = "default_chunk_size")]
    pub chunk_size_tokens: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap_tokens: usize,

    #[serde(default = "default_retrieval_k")]
    pub retrieval_k: usize,

    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    #[serde(default = "default_context_budget")]
    pub context_token_budget: usize,

    #[serde(default = "default_generation_max_tokens")]
    pub generation_max_tokens: u32,

    #[serde(default = "default_batch_size")]
    pub embedding_batch_size: usize,
}

fn default_embedding_model() -> String {
    "intfloat/multilingual-e5-small".to_string()
}

fn default_embedding_device() -> String {
    "cpu".to_string()
}

fn default_true() -> bool {
    true
}

fn default_chunk_size() -> usize {
    512
}

fn default_chunk_overlap() -> usize {
    50
}

fn default_retrieval_k() -> usize {
    20
}

fn default_similarity_threshold() -> f32 {
    0.75
}

fn default_context_budget() -> usize {
    6000
}

fn default_generation_max_tokens() -> u32 {
    4096
}

fn default_batch_size() -> usize {
    32
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            embedding_model_name: default_embedding_model(),
            embedding_device: default_embedding_device(),
            normalize_embeddings: true,
            tokenizer_path: None,
            chunk_size_tokens: default_chunk_size(),
            chunk_overlap_tokens: default_chunk_overlap(),
            retrieval_k: default_retrieval_k(),
            similarity_threshold: default_similarity_threshold(),
            context_token_budget: default_context_budget(),
            generation_max_tokens: default_generation_max_tokens(),
            embedding_batch_size: default_batch_size(),
        }
    }
}

// ============= Embedder Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EmbedderConfig {
    /// In-process ONNX model (requires the `local-embeddings` feature)
    Local {
        #[serde(default)]
        cache_dir: Option<PathBuf>,
    },
    /// OpenAI-compatible `/embeddings` endpoint
    Remote {
        base_url: String,
        /// Environment variable containing API key
        #[serde(default)]
        api_key_env: Option<String>,
        #[serde(default)]
        dimensions: Option<usize>,
    },
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        EmbedderConfig::Local { cache_dir: None }
    }
}

// ============= Index Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum IndexConfig {
    /// Persisted artifact loaded into the serving process
    Local {
        /// Artifact file; relative paths are resolved inside `trusted_dir`
        path: PathBuf,
        /// The only directory index artifacts may be loaded from
        trusted_dir: PathBuf,
    },
    /// Remote Qdrant collection
    Qdrant {
        #[serde(default = "default_qdrant_url")]
        url: String,
        collection: String,
        #[serde(default)]
        api_key_env: Option<String>,
    },
}

impl IndexConfig {
    /// Backend name as written in the `type` key.
    pub fn backend_name(&self) -> &'static str {
        match self {
            IndexConfig::Local { .. } => "local",
            IndexConfig::Qdrant { .. } => "qdrant",
        }
    }
}

fn default_qdrant_url() -> String {
    "http://localhost:6334".to_string()
}

// ============= Generator Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GeneratorConfig {
    Anthropic {
        /// Environment variable containing API key
        api_key_env: String,
        #[serde(default = "default_anthropic_model")]
        model: String,
        #[serde(default = "default_anthropic_base")]
        api_base: String,
    },
    OpenAI {
        /// Environment variable containing API key
        api_key_env: String,
        model: String,
        #[serde(default = "default_openai_base")]
        api_base: String,
    },
    Ollama {
        #[serde(default = "default_ollama_url")]
        base_url: String,
        model: String,
    },
}

fn default_anthropic_model() -> String {
    "claude-3-haiku-20240307".to_string()
}

fn default_anthropic_base() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_openai_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

// ============= Timeouts & Retry =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_embedding_timeout")]
    pub embedding_secs: u64,

    #[serde(default = "default_search_timeout")]
    pub search_secs: u64,

    #[serde(default = "default_generation_timeout")]
    pub generation_secs: u64,
}

fn default_embedding_timeout() -> u64 {
    30
}

fn default_search_timeout() -> u64 {
    10
}

fn default_generation_timeout() -> u64 {
    120
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            embedding_secs: default_embedding_timeout(),
            search_secs: default_search_timeout(),
            generation_secs: default_generation_timeout(),
        }
    }
}

impl TimeoutConfig {
    pub fn embedding(&self) -> Duration {
        Duration::from_secs(self.embedding_secs)
    }

    pub fn search(&self) -> Duration {
        Duration::from_secs(self.search_secs)
    }

    pub fn generation(&self) -> Duration {
        Duration::from_secs(self.generation_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per external call, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_backoff_ms() -> u64 {
    500
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
        }
    }
}

impl RetryConfig {
    /// Exponential backoff before retry number `attempt` (1-based), capped at 2^5 steps.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(5);
        Duration::from_millis(self.base_backoff_ms.saturating_mul(1u64 << exp))
    }
}

// ============= Configuration Loading & Validation =============

/// Configuration warnings that don't prevent operation but may indicate issues
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub kind: ConfigWarningKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigWarningKind {
    /// No chunk can ever fit into the context budget
    BudgetBelowChunkSize,
    /// Vectors are trusted to arrive normalized
    NormalizationDisabled,
    /// Threshold so high that almost nothing will match
    StrictThreshold,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),
}

impl ForumRagConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        Ok(config)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ForumRagConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate parameter ranges and env var availability
    pub fn validate(&self) -> Result<(), ConfigError> {
        let rag = &self.rag;

        if rag.chunk_size_tokens == 0 {
            return Err(invalid("rag.chunk_size_tokens must be greater than 0"));
        }
        if rag.chunk_overlap_tokens >= rag.chunk_size_tokens {
            return Err(invalid(format!(
                "rag.chunk_overlap_tokens ({}) must be smaller than rag.chunk_size_tokens ({})",
                rag.chunk_overlap_tokens, rag.chunk_size_tokens
            )));
        }
        if rag.retrieval_k == 0 {
            return Err(invalid("rag.retrieval_k must be greater than 0"));
        }
        if !(-1.0..=1.0).contains(&rag.similarity_threshold) {
            return Err(invalid(format!(
                "rag.similarity_threshold ({}) must lie in [-1, 1]",
                rag.similarity_threshold
            )));
        }
        if rag.context_token_budget == 0 {
            return Err(invalid("rag.context_token_budget must be greater than 0"));
        }
        if rag.generation_max_tokens == 0 {
            return Err(invalid("rag.generation_max_tokens must be greater than 0"));
        }
        if rag.embedding_batch_size == 0 {
            return Err(invalid("rag.embedding_batch_size must be greater than 0"));
        }
        if !rag.embedding_device.eq_ignore_ascii_case("cpu") {
            return Err(invalid(format!(
                "rag.embedding_device '{}' is not supported (only \"cpu\")",
                rag.embedding_device
            )));
        }
        if rag.embedding_model_name.trim().is_empty() {
            return Err(invalid("rag.embedding_model_name must not be empty"));
        }

        if self.timeouts.embedding_secs == 0
            || self.timeouts.search_secs == 0
            || self.timeouts.generation_secs == 0
        {
            return Err(invalid("timeouts must be greater than 0 seconds"));
        }
        if self.retry.max_attempts == 0 {
            return Err(invalid("retry.max_attempts must be at least 1"));
        }

        if let EmbedderConfig::Remote {
            api_key_env: Some(env),
            ..
        } = &self.embedder
        {
            self.validate_env_var(env)?;
        }
        if let IndexConfig::Qdrant {
            api_key_env: Some(env),
            ..
        } = &self.index
        {
            self.validate_env_var(env)?;
        }
        match &self.generator {
            GeneratorConfig::Anthropic { api_key_env, .. }
            | GeneratorConfig::OpenAI { api_key_env, .. } => self.validate_env_var(api_key_env)?,
            GeneratorConfig::Ollama { .. } => {}
        }

        Ok(())
    }

    /// Validate and collect warnings about settings that work but look wrong
    pub fn validate_with_warnings(&self) -> Result<Vec<ConfigWarning>, ConfigError> {
        self.validate()?;

        let mut warnings = Vec::new();
        if self.rag.context_token_budget < self.rag.chunk_size_tokens {
            warnings.push(ConfigWarning {
                kind: ConfigWarningKind::BudgetBelowChunkSize,
                message: format!(
                    "rag.context_token_budget ({}) is smaller than rag.chunk_size_tokens ({}); full-size chunks will never fit",
                    self.rag.context_token_budget, self.rag.chunk_size_tokens
                ),
            });
        }
        if !self.rag.normalize_embeddings {
            warnings.push(ConfigWarning {
                kind: ConfigWarningKind::NormalizationDisabled,
                message: "rag.normalize_embeddings is false; index builds fail unless the model emits unit vectors".to_string(),
            });
        }
        if self.rag.similarity_threshold > 0.95 {
            warnings.push(ConfigWarning {
                kind: ConfigWarningKind::StrictThreshold,
                message: format!(
                    "rag.similarity_threshold ({}) will reject almost every match",
                    self.rag.similarity_threshold
                ),
            });
        }
        Ok(warnings)
    }

    fn validate_env_var(&self, name: &str) -> Result<(), ConfigError> {
        std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))?;
        Ok(())
    }

    /// Get a resolved value from an env var reference
    pub fn resolve_env(&self, env_name: &str) -> Option<String> {
        std::env::var(env_name).ok()
    }

    /// Resolve a required secret
    pub fn require_env(&self, env_name: &str) -> Result<String, ConfigError> {
        self.resolve_env(env_name)
            .ok_or_else(|| ConfigError::MissingEnvVar(env_name.to_string()))
    }

    /// Tokenizer file, required for chunking and context budgeting
    pub fn tokenizer_path(&self) -> Result<&Path, ConfigError> {
        self.rag
            .tokenizer_path
            .as_deref()
            .ok_or_else(|| invalid("rag.tokenizer_path is required"))
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(message.into())
}
