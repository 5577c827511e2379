//! Embedding provider configuration and factory.
//!
//! A single local backend is shipped (candle BERT encoder). The tagged enum
//! shape mirrors the teacher's provider-config layering so a future remote
//! provider can be added without disturbing callers.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::embedding::{EmbeddingConfig, EmbeddingService, LocalEmbeddingService};
use crate::WorldRagError;

/// Embedding provider configuration.
///
/// Determines which embedding backend to use. Loaded from
/// `{data_path}/embedding.toml` or `WORLDRAG_EMBEDDING_PROVIDER` env var.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum EmbeddingProviderConfig {
    /// Local candle-backed model (default).
    Local {
        /// Short model name (default: "bge-small-en-v1.5")
        #[serde(default = "default_local_model")]
        model: String,
        /// Cache directory for downloaded model files
        #[serde(default)]
        cache_dir: Option<String>,
        /// Show download progress bar (default: true)
        #[serde(default = "default_true")]
        show_download_progress: bool,
    },
    // Future: a remote API-backed provider. Not shipped — out of scope per spec §1.
}

fn default_local_model() -> String {
    "bge-small-en-v1.5".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for EmbeddingProviderConfig {
    fn default() -> Self {
        Self::Local {
            model: default_local_model(),
            cache_dir: None,
            show_download_progress: true,
        }
    }
}

/// Stored metadata about the active embedding model in a world database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingMetadata {
    pub embedding_model: String,
    pub embedding_dimensions: usize,
    pub embedding_provider: String,
    pub last_backfill_at: Option<String>,
}

/// Result of comparing current provider config against stored world metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelMatch {
    /// No metadata stored yet (fresh database or pre-metadata world).
    NoMetadata,
    /// Current model matches stored metadata.
    Match,
    /// Model mismatch — semantic search unreliable until re-embedding.
    Mismatch {
        stored_model: String,
        stored_dimensions: usize,
        current_model: String,
        current_dimensions: usize,
    },
}

/// Load embedding provider config with priority:
/// 1. `{data_path}/embedding.toml` file
/// 2. `WORLDRAG_EMBEDDING_PROVIDER` env var (JSON)
/// 3. Default (local BGE-small-en-v1.5)
pub fn load_provider_config(data_path: &Path) -> EmbeddingProviderConfig {
    let config_path = data_path.join("embedding.toml");
    if config_path.exists() {
        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match toml::from_str::<EmbeddingProviderConfig>(&contents) {
                Ok(config) => {
                    info!("Loaded embedding config from {}", config_path.display());
                    return config;
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to parse {}: {}. Using default.",
                        config_path.display(),
                        e
                    );
                }
            },
            Err(e) => {
                tracing::warn!(
                    "Failed to read {}: {}. Using default.",
                    config_path.display(),
                    e
                );
            }
        }
    }

    if let Ok(json) = std::env::var("WORLDRAG_EMBEDDING_PROVIDER") {
        match serde_json::from_str::<EmbeddingProviderConfig>(&json) {
            Ok(config) => {
                info!("Loaded embedding config from WORLDRAG_EMBEDDING_PROVIDER env");
                return config;
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to parse WORLDRAG_EMBEDDING_PROVIDER: {}. Using default.",
                    e
                );
            }
        }
    }

    EmbeddingProviderConfig::default()
}

/// Maps a short model name to its HuggingFace repo id and output dimensions.
fn resolve_model(name: &str) -> Result<(&'static str, usize), WorldRagError> {
    match name {
        "bge-small-en-v1.5" => Ok(("BAAI/bge-small-en-v1.5", 384)),
        "bge-base-en-v1.5" => Ok(("BAAI/bge-base-en-v1.5", 768)),
        "bge-large-en-v1.5" => Ok(("BAAI/bge-large-en-v1.5", 1024)),
        other => Err(WorldRagError::Embedding(format!(
            "Unknown local embedding model: '{}'. Supported: bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5",
            other
        ))),
    }
}

/// Create an embedding service from provider configuration.
pub fn create_embedding_service(
    config: &EmbeddingProviderConfig,
) -> Result<Arc<dyn EmbeddingService + Send + Sync>, WorldRagError> {
    match config {
        EmbeddingProviderConfig::Local {
            model,
            cache_dir,
            show_download_progress,
        } => {
            let (model_repo, dimensions) = resolve_model(model)?;

            let embedding_config = EmbeddingConfig {
                model_repo: model_repo.to_string(),
                dimensions,
                model_id: model.clone(),
                cache_dir: cache_dir.clone(),
                show_download_progress: *show_download_progress,
            };

            let service = LocalEmbeddingService::new(embedding_config)?;
            Ok(Arc::new(service))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_model_known() {
        let (repo, dims) = resolve_model("bge-small-en-v1.5").unwrap();
        assert_eq!(repo, "BAAI/bge-small-en-v1.5");
        assert_eq!(dims, 384);
    }

    #[test]
    fn resolve_model_unknown_errors() {
        assert!(resolve_model("not-a-model").is_err());
    }

    #[test]
    fn default_provider_is_local_bge_small() {
        match EmbeddingProviderConfig::default() {
            EmbeddingProviderConfig::Local { model, .. } => {
                assert_eq!(model, "bge-small-en-v1.5");
            }
        }
    }
}
