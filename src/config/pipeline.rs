//! Pipeline-wide tunables: cost ceilings, retry/breaker profiles, router and
//! dedup thresholds. Loaded with the same `{data_path}/*.toml` -> env var ->
//! default precedence as [`crate::graph::connection::load_db_config`].

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::resilience::RetryProfile;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub cost_ceiling_per_chapter: f64,
    pub cost_ceiling_per_book: f64,
    pub dedup_fuzzy_auto_merge_threshold: f64,
    pub dedup_fuzzy_candidate_threshold: f64,
    pub router_min_keyword_hits: usize,
    /// Which [`crate::resilience::CircuitBreakerRegistry`] entry guards this
    /// book's LLM calls. The pipeline is wired to one provider's breaker at a
    /// time, not one breaker per pass.
    pub llm_provider: String,
    pub retrieval_rerank_top_n: usize,
    pub retrieval_min_relevance: f32,
    pub retrieval_kg_entity_limit: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cost_ceiling_per_chapter: 0.50,
            cost_ceiling_per_book: 50.00,
            dedup_fuzzy_auto_merge_threshold: 95.0,
            dedup_fuzzy_candidate_threshold: 85.0,
            router_min_keyword_hits: 1,
            llm_provider: "openai".to_string(),
            retrieval_rerank_top_n: 8,
            retrieval_min_relevance: 0.3,
            retrieval_kg_entity_limit: 30,
        }
    }
}

impl PipelineConfig {
    /// Retry/breaker profiles aren't part of the serialized shape (they're
    /// compile-time-tuned per upstream, per spec §4.10) — exposed as methods
    /// instead of fields so config files can't silently drift them.
    pub fn llm_retry_profile(&self) -> RetryProfile {
        RetryProfile::llm_call()
    }

    pub fn graph_write_retry_profile(&self) -> RetryProfile {
        RetryProfile::graph_write()
    }

    pub fn breaker_recovery_timeout_generation(&self) -> Duration {
        Duration::from_secs(60)
    }

    pub fn breaker_recovery_timeout_embedding(&self) -> Duration {
        Duration::from_secs(120)
    }
}

/// `{data_path}/pipeline.toml` -> `WORLDRAG_COST_CEILING_PER_CHAPTER` /
/// `WORLDRAG_COST_CEILING_PER_BOOK` env vars -> [`PipelineConfig::default`].
pub fn load_pipeline_config(data_path: &Path) -> PipelineConfig {
    let config_path = data_path.join("pipeline.toml");
    if config_path.exists() {
        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match toml::from_str::<PipelineConfig>(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded pipeline config from {}", config_path.display());
                    return config;
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}. Using default.", config_path.display(), e);
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read {}: {}. Using default.", config_path.display(), e);
            }
        }
    }

    let mut config = PipelineConfig::default();
    let mut from_env = false;
    if let Ok(value) = std::env::var("WORLDRAG_COST_CEILING_PER_CHAPTER") {
        if let Ok(parsed) = value.parse() {
            config.cost_ceiling_per_chapter = parsed;
            from_env = true;
        }
    }
    if let Ok(value) = std::env::var("WORLDRAG_COST_CEILING_PER_BOOK") {
        if let Ok(parsed) = value.parse() {
            config.cost_ceiling_per_book = parsed;
            from_env = true;
        }
    }
    if from_env {
        tracing::info!("Loaded pipeline config overrides from environment");
    }
    config
}
