//! Pass 1: characters and their relationships (spec §4.3).

use super::types::CharacterExtractionResult;
use super::{call_llm_json, LlmClient};
use crate::models::Chapter;
use crate::resilience::{CircuitBreaker, CostTracker};
use crate::WorldRagError;

const SYSTEM_PROMPT: &str = "Extract characters and their relationships from this chapter. \
Return a JSON object with `characters` and `relationships` arrays matching the known schema. \
Prefer reusing names already present in the registry context over inventing new surface forms.";

/// Runs the character pass over one chapter, given the registry context
/// (already-known entities, for prompt grounding) built by the caller.
pub async fn run(
    llm: &dyn LlmClient,
    breaker: &CircuitBreaker,
    cost_tracker: &CostTracker,
    chapter: &Chapter,
    registry_context: &[String],
) -> Result<CharacterExtractionResult, WorldRagError> {
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
        "characters",
        SYSTEM_PROMPT,
        &user_prompt,
    )
    .await?;

    serde_json::from_value(content)
        .map_err(|e| WorldRagError::Llm(format!("characters pass returned malformed JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::extraction::passes::FakeLlmClient;
    use crate::models::ChapterStatus;
    use std::time::Duration;

    fn chapter() -> Chapter {
        Chapter {
            book_id: "b1".into(),
            number: 3,
            title: None,
            text: "Jake fought the slime.".into(),
            word_count: 4,
            status: ChapterStatus::Pending,
            regex_matches: vec![],
            mention_summary: None,
            batch_id: None,
        }
    }

    #[tokio::test]
    async fn parses_well_formed_response() {
        let llm = FakeLlmClient::new(json!({
            "characters": [{"name": "Jake", "first_appearance_chapter": 3}],
            "relationships": []
        }));
        let breaker = CircuitBreaker::new("test", 5, Duration::from_secs(60), 3);
        let cost_tracker = CostTracker::new(10.0, 100.0);

        let result = run(&llm, &breaker, &cost_tracker, &chapter(), &[]).await.unwrap();
        assert_eq!(result.characters.len(), 1);
        assert_eq!(result.characters[0].name, "Jake");
    }

    #[tokio::test]
    async fn malformed_response_surfaces_as_llm_error() {
        let llm = FakeLlmClient::new(json!({"characters": "not an array"}));
        let breaker = CircuitBreaker::new("test", 5, Duration::from_secs(60), 3);
        let cost_tracker = CostTracker::new(10.0, 100.0);

        let result = run(&llm, &breaker, &cost_tracker, &chapter(), &[]).await;
        assert!(matches!(result, Err(WorldRagError::Llm(_))));
    }
}
