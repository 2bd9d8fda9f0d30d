//! Text embedding.
//!
//! [`Embedder`] is the raw model capability (local ONNX via fastembed, or a
//! remote OpenAI-compatible endpoint). [`EmbeddingService`] wraps it with
//! the pipeline's policy: batching, timeouts and L2 normalization. Index
//! builds and queries both go through the same service so chunk and query
//! vectors always come from one model under one normalization policy.

use crate::types::{AppError, Result};
use crate::utils::toml_config::{EmbedderConfig, ForumRagConfig, RetryConfig};
use async_trait::async_trait;
use forum_vector::distance::{is_unit, normalize, UNIT_NORM_TOLERANCE};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

// ============================================================================
// Embedder Trait
// ============================================================================

/// A text embedding model.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts. Output order matches input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Vector dimensionality, when known before the first call.
    fn dimensions(&self) -> Option<usize>;

    /// Model identifier.
    fn model_name(&self) -> &str;
}

impl EmbedderConfig {
    /// Build the configured embedder.
    pub async fn create_embedder(&self, config: &ForumRagConfig) -> Result<Arc<dyn Embedder>> {
        let model_name = config.rag.embedding_model_name.clone();
        match self {
            #[cfg(feature = "local-embeddings")]
            EmbedderConfig::Local { cache_dir } => Ok(Arc::new(
                local::FastEmbedder::load(&model_name, cache_dir.clone()).await?,
            )),
            #[cfg(not(feature = "local-embeddings"))]
            EmbedderConfig::Local { .. } => Err(AppError::Configuration(
                "Local embeddings require the 'local-embeddings' feature; \
                 rebuild with --features local-embeddings or configure a remote embedder"
                    .to_string(),
            )),
            EmbedderConfig::Remote {
                base_url,
                api_key_env,
                dimensions,
            } => {
                let api_key = match api_key_env {
                    Some(env) => Some(
                        config
                            .require_env(env)
                            .map_err(|e| AppError::Configuration(e.to_string()))?,
                    ),
                    None => None,
                };
                Ok(Arc::new(RemoteEmbedder::new(
                    base_url,
                    api_key.as_deref(),
                    model_name,
                    *dimensions,
                    config.timeouts.embedding(),
                    config.retry.clone(),
                )?))
            }
        }
    }
}

// ============================================================================
// Embedding Service
// ============================================================================

/// Batching, timeout and normalization policy around an [`Embedder`].
#[derive(Clone)]
pub struct EmbeddingService {
    embedder: Arc<dyn Embedder>,
    normalize: bool,
    batch_size: usize,
    timeout: Duration,
}

impl EmbeddingService {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        normalize: bool,
        batch_size: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            embedder,
            normalize,
            batch_size: batch_size.max(1),
            timeout,
        }
    }

    pub fn from_config(embedder: Arc<dyn Embedder>, config: &ForumRagConfig) -> Self {
        Self::new(
            embedder,
            config.rag.normalize_embeddings,
            config.rag.embedding_batch_size,
            config.timeouts.embedding(),
        )
    }

    pub fn model_name(&self) -> &str {
        self.embedder.model_name()
    }

    pub fn dimensions(&self) -> Option<usize> {
        self.embedder.dimensions()
    }

    /// Embed a single query.
    pub async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_checked(&[query.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| AppError::Embedding("Embedder returned no vector for query".to_string()))
    }

    /// Embed many texts in batches, logging progress.
    pub async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let total_batches = texts.len().div_ceil(self.batch_size);
        let mut vectors = Vec::with_capacity(texts.len());

        for (i, batch) in texts.chunks(self.batch_size).enumerate() {
            vectors.extend(self.embed_checked(batch).await?);
            info!(
                batch = i + 1,
                total_batches,
                embedded = vectors.len(),
                total = texts.len(),
                "Embedded batch"
            );
        }
        Ok(vectors)
    }

    async fn embed_checked(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = tokio::time::timeout(self.timeout, self.embedder.embed_batch(texts))
            .await
            .map_err(|_| {
                AppError::Embedding(format!(
                    "Embedding timed out after {}s",
                    self.timeout.as_secs()
                ))
            })??;

        if vectors.len() != texts.len() {
            return Err(AppError::Embedding(format!(
                "Embedder returned {} vectors for {} inputs",
                vectors.len(),
                texts.len()
            )));
        }

        for (i, vector) in vectors.iter_mut().enumerate() {
            if vector.is_empty() || vector.iter().any(|x| !x.is_finite()) {
                return Err(AppError::Embedding(format!(
                    "Embedder returned an empty or non-finite vector for input {}",
                    i
                )));
            }
            if self.normalize {
                if !normalize(vector) {
                    return Err(AppError::Embedding(format!(
                        "Cannot normalize zero vector for input {}",
                        i
                    )));
                }
            } else if !is_unit(vector, UNIT_NORM_TOLERANCE) {
                return Err(AppError::Embedding(format!(
                    "Vector for input {} is not unit length and normalization is disabled",
                    i
                )));
            }
        }
        Ok(vectors)
    }
}

// ============================================================================
// Remote Embedder (OpenAI-compatible)
// ============================================================================

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

/// Embeddings client for OpenAI-compatible `/embeddings` endpoints.
pub struct RemoteEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    dimensions: Option<usize>,
    retry: RetryConfig,
}

impl RemoteEmbedder {
    pub fn new(
        base_url: &str,
        api_key: Option<&str>,
        model: String,
        dimensions: Option<usize>,
        timeout: Duration,
        retry: RetryConfig,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            let auth = format!("Bearer {}", key.trim());
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&auth)
                    .map_err(|e| AppError::Configuration(format!("Invalid API key: {}", e)))?,
            );
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| AppError::Embedding(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            model,
            dimensions,
            retry,
        })
    }

    fn should_retry(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
    }
}

/// Put response items back in input order. The indices must be exactly
/// `0..expected`, each once.
fn ordered_vectors(mut data: Vec<EmbeddingData>, expected: usize) -> Result<Vec<Vec<f32>>> {
    if data.len() != expected {
        return Err(AppError::Embedding(format!(
            "Embedding response has {} items for {} inputs",
            data.len(),
            expected
        )));
    }
    data.sort_by_key(|d| d.index);
    if let Some((position, item)) = data.iter().enumerate().find(|(i, d)| d.index != *i) {
        return Err(AppError::Embedding(format!(
            "Embedding response index {} at position {} is duplicated or out of range",
            item.index, position
        )));
    }
    Ok(data.into_iter().map(|d| d.embedding).collect())
}

#[async_trait]
impl Embedder for RemoteEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
            dimensions: self.dimensions,
        };

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let outcome = self.client.post(&self.endpoint).json(&request).send().await;
            let retryable = match outcome {
                Ok(resp) if resp.status().is_success() => {
                    let mut parsed: EmbeddingResponse = resp.json().await.map_err(|e| {
                        AppError::Embedding(format!("Failed to parse embedding response: {}", e))
                    })?;
                    let vectors = ordered_vectors(parsed.data, texts.len())?;
                    debug!(count = vectors.len(), attempt, "Remote embeddings received");
                    return Ok(vectors);
                }
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp
                        .text()
                        .await
                        .unwrap_or_else(|_| "<body unavailable>".to_string());
                    let err = AppError::Embedding(format!(
                        "Embedding request failed ({}): {}",
                        status, body
                    ));
                    if !Self::should_retry(status) {
                        return Err(err);
                    }
                    err
                }
                Err(e) => AppError::Embedding(format!("Embedding request failed: {}", e)),
            };

            if attempt >= self.retry.max_attempts {
                return Err(retryable);
            }
            let backoff = self.retry.backoff(attempt);
            warn!(
                attempt,
                backoff_ms = backoff.as_millis() as u64,
                error = %retryable,
                "Retrying embedding request"
            );
            tokio::time::sleep(backoff).await;
        }
    }

    fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Local Embedder (fastembed)
// ============================================================================

#[cfg(feature = "local-embeddings")]
pub mod local {
    use super::*;
    use fastembed::{InitOptions, TextEmbedding};
    use std::path::PathBuf;

    /// In-process ONNX embedding model.
    pub struct FastEmbedder {
        model_name: String,
        dimensions: usize,
        model: Arc<std::sync::Mutex<TextEmbedding>>,
    }

    impl FastEmbedder {
        /// Load a model by its HuggingFace code, e.g. `intfloat/multilingual-e5-small`.
        pub async fn load(model_name: &str, cache_dir: Option<PathBuf>) -> Result<Self> {
            let info = TextEmbedding::list_supported_models()
                .into_iter()
                .find(|m| m.model_code.eq_ignore_ascii_case(model_name))
                .ok_or_else(|| {
                    AppError::Embedding(format!(
                        "Embedding model '{}' is not supported by fastembed",
                        model_name
                    ))
                })?;

            let model_code = info.model_code.clone();
            let dimensions = info.dim;
            let model = tokio::task::spawn_blocking(move || {
                let mut options =
                    InitOptions::new(info.model).with_show_download_progress(true);
                if let Some(dir) = cache_dir {
                    options = options.with_cache_dir(dir);
                }
                TextEmbedding::try_new(options).map_err(|e| {
                    AppError::Embedding(format!("Failed to load embedding model: {}", e))
                })
            })
            .await
            .map_err(|e| AppError::Internal(format!("Model load task failed: {}", e)))??;

            info!(model = %model_code, dimensions, "Loaded local embedding model");
            Ok(Self {
                model_name: model_code,
                dimensions,
                model: Arc::new(std::sync::Mutex::new(model)),
            })
        }
    }

    #[async_trait]
    impl Embedder for FastEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            if texts.is_empty() {
                return Ok(Vec::new());
            }
            let model = Arc::clone(&self.model);
            let texts = texts.to_vec();
            tokio::task::spawn_blocking(move || {
                let mut model = model
                    .lock()
                    .map_err(|_| AppError::Internal("Embedding model lock poisoned".to_string()))?;
                model
                    .embed(texts, None)
                    .map_err(|e| AppError::Embedding(format!("Embedding failed: {}", e)))
            })
            .await
            .map_err(|e| AppError::Internal(format!("Embedding task failed: {}", e)))?
        }

        fn dimensions(&self) -> Option<usize> {
            Some(self.dimensions)
        }

        fn model_name(&self) -> &str {
            &self.model_name
        }
    }
}
