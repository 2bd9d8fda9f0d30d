//! Qdrant vector index over gRPC.
//!
//! Points are keyed by chunk ordinal and carry the chunk id, text, byte
//! offset and the embedding model name in their payload, so a serving
//! process can check on connect that the collection matches its model.

use crate::types::{AppError, Chunk, Result, RetrievalResult};
use async_trait::async_trait;
use forum_vector::IndexDescriptor;
use qdrant_client::{
    qdrant::{
        vectors_config::Config, CreateCollectionBuilder, Distance, GetCollectionInfoResponse,
        PointStruct, ScrollPointsBuilder, SearchPointsBuilder, UpsertPointsBuilder, Value,
        VectorParamsBuilder,
    },
    Qdrant, QdrantError,
};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

use super::vectorstore::{rank, VectorIndex};

const UPSERT_BATCH: usize = 256;

// gRPC status codes
const GRPC_CANCELLED: i32 = 1;
const GRPC_DEADLINE_EXCEEDED: i32 = 4;
const GRPC_NOT_FOUND: i32 = 5;
const GRPC_RESOURCE_EXHAUSTED: i32 = 8;
const GRPC_UNAVAILABLE: i32 = 14;

/// A Qdrant collection used as a read-only chunk index.
pub struct QdrantIndex {
    client: Qdrant,
    collection: String,
    dimensions: usize,
    embedding_model: String,
}

impl QdrantIndex {
    fn client(url: &str, api_key: Option<&str>, timeout: Duration) -> Result<Qdrant> {
        let builder = Qdrant::from_url(url).timeout(timeout);
        let builder = match api_key {
            Some(key) => builder.api_key(key.to_string()),
            None => builder,
        };
        builder
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to create Qdrant client: {}", e)))
    }

    /// Connect to an existing collection and check it was built with
    /// `expected_model`.
    pub async fn connect(
        url: &str,
        collection: &str,
        api_key: Option<&str>,
        expected_model: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Self::client(url, api_key, timeout)?;
        let info = client
            .collection_info(collection)
            .await
            .map_err(|e| qdrant_error("describe collection", collection, e))?;
        let dimensions = vector_size(&info).ok_or_else(|| {
            AppError::Index(format!(
                "Collection '{}' has no single unnamed vector configuration",
                collection
            ))
        })?;
        let points = info.result.and_then(|r| r.points_count).unwrap_or(0);

        let index = Self {
            client,
            collection: collection.to_string(),
            dimensions,
            embedding_model: expected_model.to_string(),
        };

        if let Some(model) = index.sample_model().await? {
            if model != expected_model {
                return Err(AppError::Index(format!(
                    "Collection '{}' was built with embedding model '{}' but '{}' is configured",
                    collection, model, expected_model
                )));
            }
        }

        info!(
            collection = %collection,
            points,
            dimensions,
            "Connected to Qdrant collection"
        );
        Ok(index)
    }

    /// Drop and recreate `collection`, then upload every chunk.
    pub async fn rebuild(
        url: &str,
        collection: &str,
        api_key: Option<&str>,
        descriptor: &IndexDescriptor,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
        timeout: Duration,
    ) -> Result<usize> {
        check_batch(descriptor, chunks, vectors)?;
        let client = Self::client(url, api_key, timeout)?;

        let exists = client
            .list_collections()
            .await
            .map_err(|e| qdrant_error("list collections", collection, e))?
            .collections
            .iter()
            .any(|c| c.name == collection);
        if exists {
            client
                .delete_collection(collection)
                .await
                .map_err(|e| qdrant_error("delete collection", collection, e))?;
        }

        client
            .create_collection(CreateCollectionBuilder::new(collection).vectors_config(
                VectorParamsBuilder::new(descriptor.dimensions as u64, Distance::Cosine),
            ))
            .await
            .map_err(|e| qdrant_error("create collection", collection, e))?;

        let mut stored = 0;
        for (batch_chunks, batch_vectors) in chunks
            .chunks(UPSERT_BATCH)
            .zip(vectors.chunks(UPSERT_BATCH))
        {
            let points: Vec<PointStruct> = batch_chunks
                .iter()
                .zip(batch_vectors)
                .map(|(chunk, vector)| {
                    PointStruct::new(
                        chunk.ordinal as u64,
                        vector.clone(),
                        chunk_payload(chunk, &descriptor.embedding_model),
                    )
                })
                .collect();

            client
                .upsert_points(UpsertPointsBuilder::new(collection, points).wait(true))
                .await
                .map_err(|e| qdrant_error("upsert points", collection, e))?;
            stored += batch_chunks.len();
            debug!(stored, total = chunks.len(), "Upserted Qdrant points");
        }

        Ok(stored)
    }

    async fn sample_model(&self) -> Result<Option<String>> {
        let response = self
            .client
            .scroll(
                ScrollPointsBuilder::new(&self.collection)
                    .limit(1)
                    .with_payload(true)
                    .with_vectors(false),
            )
            .await
            .map_err(|e| qdrant_error("scroll points", &self.collection, e))?;

        Ok(response
            .result
            .into_iter()
            .next()
            .and_then(|p| Some(p.payload.get("embedding_model")?.as_str()?.to_string())))
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    fn provider_name(&self) -> &'static str {
        "qdrant"
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<RetrievalResult>> {
        if query.len() != self.dimensions {
            return Err(AppError::Retrieval(format!(
                "Query dimension {} does not match collection dimension {}",
                query.len(),
                self.dimensions
            )));
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(&self.collection, query.to_vec(), k as u64)
                    .with_payload(true),
            )
            .await
            .map_err(|e| qdrant_error("search", &self.collection, e))?;

        let mut results = response
            .result
            .into_iter()
            .map(|point| {
                Ok(RetrievalResult {
                    chunk: chunk_from_payload(&point.payload)?,
                    score: point.score,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        // Qdrant does not order equal scores deterministically
        rank(&mut results);
        Ok(results)
    }

    async fn len(&self) -> Result<usize> {
        let info = self
            .client
            .collection_info(&self.collection)
            .await
            .map_err(|e| qdrant_error("describe collection", &self.collection, e))?;
        Ok(info.result.and_then(|r| r.points_count).unwrap_or(0) as usize)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embedding_model(&self) -> &str {
        &self.embedding_model
    }
}

fn check_batch(
    descriptor: &IndexDescriptor,
    chunks: &[Chunk],
    vectors: &[Vec<f32>],
) -> Result<()> {
    if chunks.len() != vectors.len() {
        return Err(AppError::Index(format!(
            "{} chunks but {} vectors",
            chunks.len(),
            vectors.len()
        )));
    }
    if let Some(bad) = vectors.iter().position(|v| v.len() != descriptor.dimensions) {
        return Err(AppError::Index(format!(
            "Vector {} has dimension {}, expected {}",
            bad,
            vectors[bad].len(),
            descriptor.dimensions
        )));
    }
    Ok(())
}

fn vector_size(info: &GetCollectionInfoResponse) -> Option<usize> {
    let vectors = info
        .result
        .as_ref()?
        .config
        .as_ref()?
        .params
        .as_ref()?
        .vectors_config
        .as_ref()?;
    match vectors.config.as_ref()? {
        Config::Params(params) => Some(params.size as usize),
        Config::ParamsMap(_) => None,
    }
}

fn chunk_payload(chunk: &Chunk, embedding_model: &str) -> HashMap<String, Value> {
    let mut payload: HashMap<String, Value> = HashMap::new();
    payload.insert("chunk_id".to_string(), chunk.id.clone().into());
    payload.insert("ordinal".to_string(), (chunk.ordinal as i64).into());
    payload.insert("text".to_string(), chunk.text.clone().into());
    if let Some(offset) = chunk.byte_offset {
        payload.insert("byte_offset".to_string(), (offset as i64).into());
    }
    payload.insert(
        "embedding_model".to_string(),
        embedding_model.to_string().into(),
    );
    payload
}

fn chunk_from_payload(payload: &HashMap<String, Value>) -> Result<Chunk> {
    let field = |name: &str| {
        payload.get(name).ok_or_else(|| {
            AppError::Retrieval(format!("Qdrant point payload is missing '{}'", name))
        })
    };
    let text_field = |name: &str| -> Result<String> {
        field(name)?
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| AppError::Retrieval(format!("Qdrant payload '{}' is not text", name)))
    };
    let ordinal = field("ordinal")?
        .as_integer()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| AppError::Retrieval("Qdrant payload 'ordinal' is invalid".to_string()))?;

    Ok(Chunk {
        id: text_field("chunk_id")?,
        ordinal,
        text: text_field("text")?,
        byte_offset: payload
            .get("byte_offset")
            .and_then(Value::as_integer)
            .and_then(|n| usize::try_from(n).ok()),
    })
}

/// Map a client error. Missing collections are index errors; overload and
/// transport failures are retryable.
fn qdrant_error(action: &str, collection: &str, err: QdrantError) -> AppError {
    let message = format!("Qdrant failed to {} on '{}': {}", action, collection, err);
    match err {
        QdrantError::ResponseError { status } => match status.code() as i32 {
            GRPC_NOT_FOUND => AppError::Index(message),
            GRPC_CANCELLED | GRPC_DEADLINE_EXCEEDED | GRPC_RESOURCE_EXHAUSTED
            | GRPC_UNAVAILABLE => AppError::RetrievalUnavailable(message),
            _ => AppError::Retrieval(message),
        },
        _ => AppError::RetrievalUnavailable(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qdrant_client::qdrant::{
        CollectionConfig, CollectionInfo, CollectionParams, VectorParams, VectorsConfig,
    };

    fn chunk(ordinal: usize, byte_offset: Option<usize>) -> Chunk {
        Chunk {
            id: format!("chunk-{}", ordinal),
            ordinal,
            text: "Thema: Schlafen\nAna: Mein Kind schläft schlecht".to_string(),
            byte_offset,
        }
    }

    fn descriptor(dimensions: usize) -> IndexDescriptor {
        IndexDescriptor::new("intfloat/multilingual-e5-small", dimensions)
    }

    #[test]
    fn test_payload_carries_chunk_and_model() {
        let payload = chunk_payload(&chunk(7, Some(120)), "e5");
        assert_eq!(
            payload["embedding_model"].as_str().map(|s| s.to_string()),
            Some("e5".to_string())
        );
        assert_eq!(chunk_from_payload(&payload).unwrap(), chunk(7, Some(120)));
    }

    #[test]
    fn test_payload_without_offset() {
        let payload = chunk_payload(&chunk(0, None), "e5");
        assert!(!payload.contains_key("byte_offset"));
        assert_eq!(chunk_from_payload(&payload).unwrap().byte_offset, None);
    }

    #[test]
    fn test_payload_missing_text_is_rejected() {
        let mut payload = chunk_payload(&chunk(1, None), "e5");
        payload.remove("text");
        let err = chunk_from_payload(&payload).unwrap_err();
        assert!(matches!(err, AppError::Retrieval(msg) if msg.contains("'text'")));
    }

    #[test]
    fn test_negative_ordinal_is_rejected() {
        let mut payload = chunk_payload(&chunk(1, None), "e5");
        payload.insert("ordinal".to_string(), (-3i64).into());
        assert!(chunk_from_payload(&payload).is_err());
    }

    #[test]
    fn test_vector_size_from_collection_info() {
        let info = GetCollectionInfoResponse {
            result: Some(CollectionInfo {
                config: Some(CollectionConfig {
                    params: Some(CollectionParams {
                        vectors_config: Some(VectorsConfig {
                            config: Some(Config::Params(VectorParams {
                                size: 384,
                                ..Default::default()
                            })),
                        }),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(vector_size(&info), Some(384));
        assert_eq!(vector_size(&GetCollectionInfoResponse::default()), None);
    }

    #[test]
    fn test_batch_length_mismatch() {
        let err = check_batch(&descriptor(2), &[chunk(0, None)], &[]).unwrap_err();
        assert!(matches!(err, AppError::Index(_)));
    }

    #[test]
    fn test_batch_dimension_mismatch() {
        let chunks = [chunk(0, None), chunk(1, None)];
        let vectors = [vec![1.0, 0.0], vec![1.0, 0.0, 0.0]];
        let err = check_batch(&descriptor(2), &chunks, &vectors).unwrap_err();
        assert!(matches!(err, AppError::Index(msg) if msg.contains("Vector 1")));
    }
}
