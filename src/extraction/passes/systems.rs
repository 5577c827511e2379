//! Pass 2: systems and progression — skills, classes, titles, level and stat
//! changes (spec §4.3).

use super::types::SystemExtractionResult;
use super::{call_llm_json, LlmClient};
use crate::models::{Chapter, RegexMatch};
use crate::resilience::{CircuitBreaker, CostTracker};
use crate::WorldRagError;

const SYSTEM_PROMPT: &str = "Extract skills, classes, titles, level changes, and stat changes \
from this chapter. Return a JSON object with `skills`, `classes`, `titles`, `level_changes`, \
and `stat_changes` arrays. The regex pre-extraction hints are candidate spans already found by \
pattern matching — confirm, correct, or discard them rather than re-deriving from scratch.";

/// Runs the systems pass, seeded with the chapter's Passe 0 regex matches as
/// extraction hints (spec §4.2's router feeds the same matches into routing;
/// this pass reuses them as prompt context rather than re-scanning).
pub async fn run(
    llm: &dyn LlmClient,
    breaker: &CircuitBreaker,
    cost_tracker: &CostTracker,
    chapter: &Chapter,
    regex_hints: &[RegexMatch],
) -> Result<SystemExtractionResult, WorldRagError> {
    let hints: Vec<String> = regex_hints
        .iter()
        .map(|m| format!("{:?} @ {:?}: {}", m.entity_type, m.captures, m.raw_text))
        .collect();

    let user_prompt = format!(
        "Regex pre-extraction hints:\n{}\n\nChapter {} text:\n{}",
        hints.join("\n"),
        chapter.number,
        chapter.text
    );

    let content = call_llm_json(
        llm,
        breaker,
        cost_tracker,
        &chapter.book_id,
        chapter.number,
        "systems",
        SYSTEM_PROMPT,
        &user_prompt,
    )
    .await?;

    serde_json::from_value(content)
        .map_err(|e| WorldRagError::Llm(format!("systems pass returned malformed JSON: {e}")))
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
            number: 1,
            title: None,
            text: "[Skill Acquired: Iron Fist]".into(),
            word_count: 3,
            status: ChapterStatus::Pending,
            regex_matches: vec![],
            mention_summary: None,
            batch_id: None,
        }
    }

    #[tokio::test]
    async fn parses_well_formed_response() {
        let llm = FakeLlmClient::new(json!({
            "skills": [{"name": "Iron Fist", "acquired_chapter": 1}],
            "classes": [], "titles": [], "level_changes": [], "stat_changes": []
        }));
        let breaker = CircuitBreaker::new("test", 5, Duration::from_secs(60), 3);
        let cost_tracker = CostTracker::new(10.0, 100.0);

        let result = run(&llm, &breaker, &cost_tracker, &chapter(), &[]).await.unwrap();
        assert_eq!(result.skills.len(), 1);
        assert_eq!(result.skills[0].name, "Iron Fist");
    }
}
