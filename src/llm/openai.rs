//! OpenAI-compatible chat completions client.
//!
//! Works with any endpoint that speaks the `/chat/completions` protocol
//! (OpenAI, Azure OpenAI, OpenRouter, vLLM, llama.cpp server).

use crate::llm::client::LLMClient;
use crate::types::{AppError, GenerationFailure, Result};
use async_openai::{
    config::OpenAIConfig,
    error::{ApiError, OpenAIError},
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestUserMessage,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use std::time::Duration;

pub struct OpenAIClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAIClient {
    /// `http` carries the generation timeout. Retries are left to the
    /// orchestrator, so the SDK's own backoff is switched off.
    pub fn new(http: reqwest::Client, api_key: String, api_base: String, model: String) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(api_base.trim_end_matches('/'));

        let no_retry = backoff::ExponentialBackoffBuilder::new()
            .with_max_elapsed_time(Some(Duration::ZERO))
            .build();

        Self {
            client: Client::with_config(config)
                .with_http_client(http)
                .with_backoff(no_retry),
            model,
        }
    }
}

#[async_trait]
impl LLMClient for OpenAIClient {
    async fn generate(&self, prompt: &str, max_output_tokens: u32) -> Result<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .max_completion_tokens(max_output_tokens)
            .messages(vec![ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessage::from(prompt.to_string()),
            )])
            .build()
            .map_err(|e| {
                AppError::generation(
                    GenerationFailure::Provider { transient: false },
                    format!("Failed to build request: {}", e),
                )
            })?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| {
                AppError::generation(classify_error(&e), format!("OpenAI API error: {}", e))
            })?;

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| {
                AppError::generation(
                    GenerationFailure::Provider { transient: false },
                    "OpenAI response contained no message content",
                )
            })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Classify an SDK error.
///
/// The SDK drops the HTTP status, so the error object decides. Server errors
/// arrive as an [`ApiError`] carrying only the raw body as its message.
pub fn classify_error(err: &OpenAIError) -> GenerationFailure {
    match err {
        OpenAIError::ApiError(api) => classify_api_error(api),
        OpenAIError::Reqwest(e) if e.is_timeout() => GenerationFailure::Timeout,
        OpenAIError::Reqwest(_) => GenerationFailure::Provider { transient: true },
        _ => GenerationFailure::Provider { transient: false },
    }
}

fn classify_api_error(api: &ApiError) -> GenerationFailure {
    let kind = api.r#type.as_deref().unwrap_or_default();
    let code = api.code.as_deref().unwrap_or_default();

    match (kind, code) {
        (_, "invalid_api_key" | "invalid_organization")
        | ("authentication_error" | "permission_error", _) => GenerationFailure::Auth,
        (_, "rate_limit_exceeded") | ("requests" | "tokens" | "rate_limit_error", _) => {
            GenerationFailure::RateLimited
        }
        ("" | "server_error", "") => GenerationFailure::Provider { transient: true },
        _ => GenerationFailure::Provider { transient: false },
    }
}
