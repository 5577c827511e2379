//! The LLM extraction passes (spec §4.3): characters, systems, events, lore,
//! and the optional series layer-3 pass.
//!
//! `LlmClient` is the injected collaborator every pass calls through — the
//! same swappable-backend role [`crate::embedding::EmbeddingService`] plays
//! for embeddings. No concrete network-calling implementation ships (prompt
//! text and provider wiring are out of scope per spec §1); [`FakeLlmClient`]
//! stands in for tests the way [`crate::embedding::NoopEmbeddingService`]
//! stands in for the embedding path.

pub mod characters;
pub mod events;
pub mod lore;
pub mod series;
pub mod systems;
pub mod types;

use async_trait::async_trait;

use crate::resilience::{
    llm_call_is_retryable, retry_with_backoff, CircuitBreaker, CostTracker, RetryProfile,
};
use crate::WorldRagError;

/// One chargeable LLM call's result: the parsed JSON payload plus the usage
/// figures the cost tracker needs. `model`/`provider` let the cost tracker
/// price the call correctly even when a client fans requests out across
/// providers.
#[derive(Debug, Clone)]
pub struct LlmCompletion {
    pub content: serde_json::Value,
    pub model: String,
    pub provider: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Structured-extraction collaborator every pass and the dedup Tier 3 /
/// retrieval generation step call through. Deliberately not generic over a
/// return type (unlike the Python source's `extract_structured[T]`) so the
/// trait stays object-safe — callers deserialize `LlmCompletion::content`
/// into the shape they expect.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete_json(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        operation: &str,
    ) -> Result<LlmCompletion, WorldRagError>;
}

/// Runs one chargeable LLM call through the full resilience stack: cost
/// ceiling check, circuit breaker, retry-with-backoff, then records the
/// spend. Every pass and the dedup/retrieval LLM call sites route through
/// this single chokepoint, resolving spec §9's open question on ceiling
/// check timing ("check before every chargeable call").
pub async fn call_llm_json(
    llm: &dyn LlmClient,
    breaker: &CircuitBreaker,
    cost_tracker: &CostTracker,
    book_id: &str,
    chapter: i64,
    operation: &str,
    system_prompt: &str,
    user_prompt: &str,
) -> Result<serde_json::Value, WorldRagError> {
    cost_tracker.enforce_ceilings(book_id, Some(chapter)).await?;

    let retry_profile = RetryProfile::llm_call();
    let completion = breaker
        .call(|| async {
            retry_with_backoff(&retry_profile, llm_call_is_retryable, || async {
                llm.complete_json(system_prompt, user_prompt, operation).await
            })
            .await
        })
        .await?;

    cost_tracker
        .record(
            &completion.model,
            &completion.provider,
            completion.input_tokens,
            completion.output_tokens,
            operation,
            Some(book_id),
            Some(chapter),
        )
        .await;

    Ok(completion.content)
}

/// In-memory fake used by tests and the reference binary — returns a
/// caller-supplied fixed response rather than calling a real provider,
/// playing the same role `NoopEmbeddingService` plays for the embedding path.
#[cfg(any(test, feature = "test-util"))]
pub struct FakeLlmClient {
    pub response: std::sync::Mutex<serde_json::Value>,
    pub model: String,
    pub provider: String,
}

#[cfg(any(test, feature = "test-util"))]
impl FakeLlmClient {
    pub fn new(response: serde_json::Value) -> Self {
        Self {
            response: std::sync::Mutex::new(response),
            model: "fake-model".to_string(),
            provider: "fake".to_string(),
        }
    }
}

#[cfg(any(test, feature = "test-util"))]
#[async_trait]
impl LlmClient for FakeLlmClient {
    async fn complete_json(
        &self,
        _system_prompt: &str,
        _user_prompt: &str,
        _operation: &str,
    ) -> Result<LlmCompletion, WorldRagError> {
        Ok(LlmCompletion {
            content: self.response.lock().expect("fake llm mutex poisoned").clone(),
            model: self.model.clone(),
            provider: self.provider.clone(),
            input_tokens: 100,
            output_tokens: 50,
        })
    }
}
