//! Embedding infrastructure for the hybrid retrieval core (spec §4.12).
//!
//! `EmbeddingService` abstracts over the backend used to turn a query or
//! chunk's text into a vector — the same swappable-backend role
//! `EmbeddingService` plays in the teacher repository. The only concrete
//! implementation shipped is a local candle-based BERT encoder; a noop
//! implementation stands in for tests and for the (out-of-scope) remote
//! embedder path.

pub mod candle_backend;
pub mod model;
pub mod provider;
pub mod reranker;

use async_trait::async_trait;

use crate::WorldRagError;

pub use model::{EmbeddingConfig, LocalEmbeddingService};
pub use provider::{create_embedding_service, load_provider_config, EmbeddingProviderConfig};
pub use reranker::{LocalRerankerService, NoopRerankerService, RerankerService};

/// Service trait for generating text embeddings, swappable between a local
/// candle backend and a remote API (not shipped — prompt/provider wiring is
/// out of scope per spec §1).
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, WorldRagError>;

    /// More efficient than repeated `embed_text` calls for chunk backfill.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, WorldRagError>;

    fn dimensions(&self) -> usize;

    /// Whether the model loaded successfully. Callers degrade gracefully
    /// (semantic search step is skipped, not a hard failure) when false.
    fn is_available(&self) -> bool;

    fn model_id(&self) -> &str;

    fn provider_name(&self) -> &str;
}

/// No-op embedding service. Always reports unavailable; used in tests and as
/// the default when no model could be loaded.
pub struct NoopEmbeddingService;

impl Default for NoopEmbeddingService {
    fn default() -> Self {
        Self::new()
    }
}

impl NoopEmbeddingService {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EmbeddingService for NoopEmbeddingService {
    async fn embed_text(&self, _text: &str) -> Result<Vec<f32>, WorldRagError> {
        Err(WorldRagError::Embedding(
            "embedding service is not available (noop)".to_string(),
        ))
    }

    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, WorldRagError> {
        Err(WorldRagError::Embedding(
            "embedding service is not available (noop)".to_string(),
        ))
    }

    fn dimensions(&self) -> usize {
        384
    }

    fn is_available(&self) -> bool {
        false
    }

    fn model_id(&self) -> &str {
        "noop"
    }

    fn provider_name(&self) -> &str {
        "noop"
    }
}
