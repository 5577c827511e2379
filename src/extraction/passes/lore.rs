//! Pass 4: lore and worldbuilding — locations, items, creatures, factions,
//! and concepts (spec §4.3).

use super::types::LoreExtractionResult;
use super::{call_llm_json, LlmClient};
use crate::models::Chapter;
use crate::resilience::{CircuitBreaker, CostTracker};
use crate::WorldRagError;

const SYSTEM_PROMPT: &str = "Extract locations, items, creatures, factions, and concepts from \
this chapter. Return a JSON object with `locations`, `items`, `creatures`, `factions`, and \
`concepts` arrays. Skip one-off scenery with no narrative weight.";

pub async fn run(
    llm: &dyn LlmClient,
    breaker: &CircuitBreaker,
    cost_tracker: &CostTracker,
    chapter: &Chapter,
    registry_context: &[String],
) -> Result<LoreExtractionResult, WorldRagError> {
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
        "lore",
        SYSTEM_PROMPT,
        &user_prompt,
    )
    .await?;

    serde_json::from_value(content)
        .map_err(|e| WorldRagError::Llm(format!("lore pass returned malformed JSON: {e}")))
}
