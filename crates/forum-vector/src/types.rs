//! Common types for forum-vector.

use serde::{Deserialize, Serialize};

/// Identifier of a stored chunk.
pub type EntryId = String;

/// One stored chunk: its identity, its text and its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Stable chunk identifier, unique within an index.
    pub id: EntryId,
    /// Position of the chunk in corpus order.
    pub ordinal: usize,
    /// Byte offset of the chunk start in the normalized corpus, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub byte_offset: Option<usize>,
    /// Chunk text.
    pub text: String,
    /// Unit-norm embedding.
    #[serde(with = "vector_hex")]
    pub vector: Vec<f32>,
}

/// Describes how the vectors of an index were produced.
///
/// Serving processes compare this against their own configuration before
/// accepting an index, since vectors from a different model are meaningless.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    /// Name of the embedding model.
    pub embedding_model: String,
    /// Hex sha256 of the tokenizer definition used for chunking.
    #[serde(default)]
    pub tokenizer_sha256: Option<String>,
    /// Vector dimensionality.
    pub dimensions: usize,
}

impl IndexDescriptor {
    /// Create a descriptor.
    pub fn new(embedding_model: impl Into<String>, dimensions: usize) -> Self {
        Self {
            embedding_model: embedding_model.into(),
            tokenizer_sha256: None,
            dimensions,
        }
    }

    /// Record the tokenizer digest.
    pub fn with_tokenizer_sha256(mut self, digest: impl Into<String>) -> Self {
        self.tokenizer_sha256 = Some(digest.into());
        self
    }
}

/// A scored search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// Chunk identifier.
    pub id: EntryId,
    /// Position of the chunk in corpus order.
    pub ordinal: usize,
    /// Byte offset in the normalized corpus, when known.
    pub byte_offset: Option<usize>,
    /// Chunk text.
    pub text: String,
    /// Similarity score (higher = more similar).
    pub score: f32,
}

/// Vectors are persisted as hex of their little-endian `f32` bytes so a
/// save/load cycle is bit exact and checksums stay stable.
mod vector_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(vector: &[f32], serializer: S) -> Result<S::Ok, S::Error> {
        let bytes: Vec<u8> = vector.iter().flat_map(|x| x.to_le_bytes()).collect();
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f32>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        let bytes = hex::decode(encoded).map_err(serde::de::Error::custom)?;
        if bytes.len() % 4 != 0 {
            return Err(serde::de::Error::custom(format!(
                "vector byte length {} is not a multiple of 4",
                bytes.len()
            )));
        }
        Ok(bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect())
    }
}
