//! Pass 3: events and timeline (spec §4.3).

use super::types::EventExtractionResult;
use super::{call_llm_json, LlmClient};
use crate::models::Chapter;
use crate::resilience::{CircuitBreaker, CostTracker};
use crate::WorldRagError;

const SYSTEM_PROMPT: &str = "Extract significant narrative events from this chapter. Return a \
JSON object with an `events` array. Flag flashbacks explicitly via `is_flashback` rather than \
placing them at the chapter's chronological position.";

pub async fn run(
    llm: &dyn LlmClient,
    breaker: &CircuitBreaker,
    cost_tracker: &CostTracker,
    chapter: &Chapter,
    registry_context: &[String],
) -> Result<EventExtractionResult, WorldRagError> {
    let user_prompt = format!(
        "Known entities so far:\n{}\n\nChapter {} text:\n{}",
        registry_context.join("\n"),
        chapter.number,
        chapter.text
    );

    let content = call_llm_json(
        llm,
        breaker,
        cost_tracker,
        &chapter.book_id,
        chapter.number,
        "events",
        SYSTEM_PROMPT,
        &user_prompt,
    )
    .await?;

    serde_json::from_value(content)
        .map_err(|e| WorldRagError::Llm(format!("events pass returned malformed JSON: {e}")))
}
