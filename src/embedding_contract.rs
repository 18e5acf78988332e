//! The embedding contract: the embedding producer is an external
//! collaborator. The core only needs a batch interface and a model
//! identifier for provenance.

/// Fixed embedding dimension used throughout the store's vector index.
pub const VECTOR_DIMENSION_384: usize = 384;

#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("embedding batch failed: {reason}")]
pub struct EmbeddingError {
    pub reason: String,
}

/// An external embedding producer. Failures are recoverable: the file
/// proceeds without embeddings rather than failing the write.
pub trait EmbeddingGenerator: Send + Sync {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>, EmbeddingError>;

    fn model_id(&self) -> &str;

    fn dimension(&self) -> usize {
        VECTOR_DIMENSION_384
    }
}
