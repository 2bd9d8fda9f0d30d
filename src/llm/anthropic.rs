//! Anthropic Claude LLM client implementation
//!
//! Talks to the Messages API directly over `reqwest` so HTTP status codes
//! can be classified into retryable and fatal failures.
//!
//! # Example
//!
//! ```rust,ignore
//! use forum_rag::llm::{AnthropicClient, LLMClient};
//!
//! let client = AnthropicClient::new(
//!     reqwest::Client::new(),
//!     "sk-ant-...".to_string(),
//!     "https://api.anthropic.com".to_string(),
//!     "claude-3-haiku-20240307".to_string(),
//! );
//! let answer = client.generate("Hallo!", 1024).await?;
//! ```

use crate::llm::client::{status_error, transport_error, LLMClient};
use crate::types::{AppError, GenerationFailure, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Claude client for API-based inference
pub struct AnthropicClient {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [Message<'a>; 1],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

impl AnthropicClient {
    /// Create a new Anthropic client
    ///
    /// # Arguments
    ///
    /// * `api_key` - Anthropic API key
    /// * `api_base` - API root, e.g. `https://api.anthropic.com`
    /// * `model` - Model identifier (e.g., "claude-3-haiku-20240307")
    pub fn new(client: reqwest::Client, api_key: String, api_base: String, model: String) -> Self {
        Self {
            client,
            api_key,
            endpoint: format!("{}/v1/messages", api_base.trim_end_matches('/')),
            model,
        }
    }
}

#[async_trait]
impl LLMClient for AnthropicClient {
    async fn generate(&self, prompt: &str, max_output_tokens: u32) -> Result<String> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: max_output_tokens,
            messages: [Message {
                role: "user",
                content: prompt,
            }],
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error("Anthropic", e))?;

        if !resp.status().is_success() {
            return Err(status_error("Anthropic", resp).await);
        }

        let body: MessagesResponse = resp.json().await.map_err(|e| {
            AppError::generation(
                GenerationFailure::Provider { transient: false },
                format!("Invalid Anthropic response: {}", e),
            )
        })?;

        Ok(body
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join(""))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
