//! Context assembly and LLM generation, steps 5-6 of spec §4.12. Grounded in
//! `original_source/backend/app/services/chat_service.py`'s `_SYSTEM_PROMPT`
//! and `_build_context` (labeled passages with chapter/title/relevance, then
//! a bulleted related-entity list) and `_generate_answer`.

use crate::extraction::passes::LlmClient;
use crate::extraction::call_llm_json;
use crate::resilience::{CircuitBreaker, CostTracker};
use crate::retrieval::types::RelatedEntity;
use crate::WorldRagError;

/// System prompt forbidding uncited claims, per spec §4.12 step 6.
pub const SYSTEM_PROMPT: &str = "You are WorldRAG, an expert assistant for fiction novel \
universes. Answer the user's question using ONLY the provided context from the \
knowledge graph and source passages. If the context doesn't contain enough information, \
say so honestly.\n\nRules:\n- Ground every claim in the provided sources.\n- Reference \
chapters when possible (e.g. \"In Chapter 5, ...\").\n- Keep answers concise but \
thorough.\n- If asked about character progression (levels, skills, classes), be precise \
with numbers.\n- Never invent information not present in the context.";

/// One surviving chunk paired with the chapter metadata needed to label it
/// in the prompt (the chunk model itself only carries a `chapter_id`, not a
/// number/title — those live on the Chapter the chunk belongs to).
pub struct ContextChunk {
    pub text: String,
    pub chapter_number: i64,
    pub chapter_title: String,
    pub relevance_score: f32,
}

/// Builds the labeled-passage-then-related-entities prompt body, mirroring
/// `_build_context` structurally.
pub fn build_context(chunks: &[ContextChunk], entities: &[RelatedEntity]) -> String {
    let mut parts = Vec::new();
    parts.push("## Source Passages\n".to_string());
    for (i, chunk) in chunks.iter().enumerate() {
        let mut header = format!("Chapter {}", chunk.chapter_number);
        if !chunk.chapter_title.is_empty() {
            header.push_str(&format!(" — {}", chunk.chapter_title));
        }
        parts.push(format!("### [{}] {} (relevance: {:.2})", i + 1, header, chunk.relevance_score));
        parts.push(chunk.text.clone());
        parts.push(String::new());
    }

    if !entities.is_empty() {
        parts.push("\n## Related Knowledge Graph Entities\n".to_string());
        for entity in entities {
            let desc = if entity.description.is_empty() {
                String::new()
            } else {
                format!(": {}", entity.description)
            };
            parts.push(format!("- **{}** ({}){desc}", entity.name, entity.label));
        }
    }

    parts.join("\n")
}

/// Generates the final answer through the shared chargeable-call chokepoint
/// (cost ceiling, breaker, retry), same as every extraction pass. The LLM is
/// asked for `{"answer": "..."}` so the call routes through
/// [`call_llm_json`] like every other chargeable call in the pipeline
/// (spec §9's "check before every chargeable call" resolution applies here
/// too — there's no separate unprotected generation path).
pub async fn generate_answer(
    llm: &dyn LlmClient,
    breaker: &CircuitBreaker,
    cost_tracker: &CostTracker,
    book_id: &str,
    query: &str,
    context: &str,
) -> Result<String, WorldRagError> {
    let user_prompt = format!("{context}\n\n---\n\nQuestion: {query}\n\nRespond with JSON: {{\"answer\": \"...\"}}");
    let result = call_llm_json(
        llm,
        breaker,
        cost_tracker,
        book_id,
        i64::MAX,
        "retrieval_generate",
        SYSTEM_PROMPT,
        &user_prompt,
    )
    .await;

    match result {
        Ok(value) => Ok(value
            .get("answer")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| "I wasn't able to generate an answer.".to_string())),
        Err(WorldRagError::CircuitOpen { .. }) | Err(WorldRagError::Transient(_)) => {
            Ok("I wasn't able to generate an answer right now — please try again shortly.".to_string())
        }
        Err(other) => Err(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_context_labels_chunks_with_chapter_and_relevance() {
        let chunks = vec![ContextChunk {
            text: "Jake drew his bow.".into(),
            chapter_number: 5,
            chapter_title: "The Hunt".into(),
            relevance_score: 0.87,
        }];
        let entities = vec![RelatedEntity {
            name: "Jake Thayne".into(),
            label: "character".into(),
            description: "the primal hunter".into(),
        }];

        let context = build_context(&chunks, &entities);
        assert!(context.contains("Chapter 5 — The Hunt"));
        assert!(context.contains("relevance: 0.87"));
        assert!(context.contains("Jake drew his bow."));
        assert!(context.contains("**Jake Thayne** (character): the primal hunter"));
    }

    #[test]
    fn build_context_omits_entity_section_when_empty() {
        let chunks = vec![ContextChunk {
            text: "text".into(),
            chapter_number: 1,
            chapter_title: String::new(),
            relevance_score: 0.5,
        }];
        let context = build_context(&chunks, &[]);
        assert!(!context.contains("Related Knowledge Graph Entities"));
    }

    #[tokio::test]
    async fn generate_answer_extracts_answer_field() {
        use crate::extraction::passes::FakeLlmClient;
        use std::time::Duration;

        let llm = FakeLlmClient::new(serde_json::json!({"answer": "Jake is level 88."}));
        let breaker = CircuitBreaker::new("test", 5, Duration::from_secs(60), 1);
        let cost_tracker = CostTracker::new(10.0, 50.0);

        let answer = generate_answer(&llm, &breaker, &cost_tracker, "book1", "what level is Jake?", "context").await.unwrap();
        assert_eq!(answer, "Jake is level 88.");
    }
}
