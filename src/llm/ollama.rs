use crate::llm::client::LLMClient;
use crate::types::{AppError, GenerationFailure, Result};
use async_trait::async_trait;
use ollama_rs::{
    generation::chat::{request::ChatMessageRequest, ChatMessage},
    models::ModelOptions,
    Ollama,
};

pub struct OllamaClient {
    client: Ollama,
    model: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: String) -> Result<Self> {
        let client = Ollama::try_new(base_url).map_err(|e| {
            AppError::Configuration(format!("Invalid Ollama URL '{}': {}", base_url, e))
        })?;
        Ok(Self { client, model })
    }
}

#[async_trait]
impl LLMClient for OllamaClient {
    async fn generate(&self, prompt: &str, max_output_tokens: u32) -> Result<String> {
        let messages = vec![ChatMessage::user(prompt.to_string())];
        let num_predict = i32::try_from(max_output_tokens).unwrap_or(i32::MAX);
        let request = ChatMessageRequest::new(self.model.clone(), messages)
            .options(ModelOptions::default().num_predict(num_predict));

        let response = self
            .client
            .send_chat_messages(request)
            .await
            .map_err(|e| {
                // ollama-rs does not expose status codes
                AppError::generation(
                    GenerationFailure::Provider { transient: true },
                    format!("Ollama error: {}", e),
                )
            })?;

        Ok(response.message.content)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
