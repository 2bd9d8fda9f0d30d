//! LLM client abstraction and provider selection
//!
//! Every provider implements [`LLMClient`]: a single `generate` call taking
//! the rendered prompt and an output token limit. Failures are classified
//! into [`GenerationFailure`] kinds so the orchestrator can decide what is
//! worth retrying:
//!
//! | Upstream outcome          | Failure kind                  | Retried |
//! |---------------------------|-------------------------------|---------|
//! | HTTP 401 / 403            | `Auth`                        | no      |
//! | HTTP 429                  | `RateLimited`                 | yes     |
//! | Request timeout           | `Timeout`                     | yes     |
//! | HTTP 5xx, transport error | `Provider { transient: true }`| yes     |
//! | Other HTTP 4xx, bad body  | `Provider { transient: false }`| no     |

use crate::types::{AppError, GenerationFailure, Result};
use crate::utils::toml_config::{ForumRagConfig, GeneratorConfig};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::Arc;

/// Generic LLM client trait for provider abstraction
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Generate a completion for `prompt`, producing at most
    /// `max_output_tokens` tokens.
    async fn generate(&self, prompt: &str, max_output_tokens: u32) -> Result<String>;

    /// Get the model name/identifier
    fn model_name(&self) -> &str;
}

/// Classify an unsuccessful HTTP status.
pub fn classify_status(status: StatusCode) -> GenerationFailure {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GenerationFailure::Auth,
        StatusCode::TOO_MANY_REQUESTS => GenerationFailure::RateLimited,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => GenerationFailure::Timeout,
        s => GenerationFailure::Provider {
            transient: s.is_server_error(),
        },
    }
}

/// Map a transport-level error.
pub(crate) fn transport_error(provider: &str, err: reqwest::Error) -> AppError {
    let failure = if err.is_timeout() {
        GenerationFailure::Timeout
    } else {
        GenerationFailure::Provider { transient: true }
    };
    AppError::generation(failure, format!("{} request failed: {}", provider, err))
}

/// Turn a non-success response into a classified error.
pub(crate) async fn status_error(provider: &str, resp: reqwest::Response) -> AppError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    AppError::generation(
        classify_status(status),
        format!("{} returned {}: {}", provider, status, body),
    )
}

pub(crate) fn http_client(config: &ForumRagConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.timeouts.generation())
        .build()
        .map_err(|e| AppError::Configuration(format!("Failed to build HTTP client: {}", e)))
}

impl GeneratorConfig {
    /// Create the configured client.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key variable is unset or the provider's
    /// feature is not enabled.
    pub async fn create_client(&self, config: &ForumRagConfig) -> Result<Arc<dyn LLMClient>> {
        let require = |env: &str| {
            config
                .require_env(env)
                .map_err(|e| AppError::Configuration(e.to_string()))
        };

        match self {
            GeneratorConfig::Anthropic {
                api_key_env,
                model,
                api_base,
            } => Ok(Arc::new(super::anthropic::AnthropicClient::new(
                http_client(config)?,
                require(api_key_env)?,
                api_base.clone(),
                model.clone(),
            ))),

            #[cfg(feature = "openai")]
            GeneratorConfig::OpenAI {
                api_key_env,
                model,
                api_base,
            } => Ok(Arc::new(super::openai::OpenAIClient::new(
                http_client(config)?,
                require(api_key_env)?,
                api_base.clone(),
                model.clone(),
            ))),

            #[cfg(not(feature = "openai"))]
            GeneratorConfig::OpenAI { .. } => Err(AppError::Configuration(
                "OpenAI generator requires the 'openai' feature".to_string(),
            )),

            #[cfg(feature = "ollama")]
            GeneratorConfig::Ollama { base_url, model } => Ok(Arc::new(
                super::ollama::OllamaClient::new(base_url, model.clone())?,
            )),

            #[cfg(not(feature = "ollama"))]
            GeneratorConfig::Ollama { .. } => Err(AppError::Configuration(
                "Ollama generator requires the 'ollama' feature".to_string(),
            )),
        }
    }

    /// Get a human-readable name for this provider
    pub fn name(&self) -> &'static str {
        match self {
            GeneratorConfig::Anthropic { .. } => "Anthropic",
            GeneratorConfig::OpenAI { .. } => "OpenAI",
            GeneratorConfig::Ollama { .. } => "Ollama",
        }
    }

    /// Configured model identifier
    pub fn model(&self) -> &str {
        match self {
            GeneratorConfig::Anthropic { model, .. }
            | GeneratorConfig::OpenAI { model, .. }
            | GeneratorConfig::Ollama { model, .. } => model,
        }
    }
}
