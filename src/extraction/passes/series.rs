//! Layer-3 pass: series-specific entity types (bloodlines, professions,
//! churches) that only apply when a series ontology layer registers them
//! (spec §4.2, §4.3). Skipped entirely when no series layer is loaded.

use super::types::Layer3ExtractionResult;
use super::{call_llm_json, LlmClient};
use crate::models::Chapter;
use crate::ontology::Ontology;
use crate::resilience::{CircuitBreaker, CostTracker};
use crate::WorldRagError;

const SYSTEM_PROMPT: &str = "Extract series-specific entities (bloodlines, professions, church \
affiliations) from this chapter, using only the vocabulary defined by the loaded series \
ontology layer. Return a JSON object with `bloodlines`, `professions`, and `churches` arrays.";

/// Returns `Ok(None)` without calling the LLM when no series layer is loaded,
/// so books without a registered series never pay for this pass.
pub async fn run(
    llm: &dyn LlmClient,
    breaker: &CircuitBreaker,
    cost_tracker: &CostTracker,
    chapter: &Chapter,
    ontology: &Ontology,
) -> Result<Option<Layer3ExtractionResult>, WorldRagError> {
    let has_series_layer = ontology
        .layers_loaded
        .iter()
        .any(|layer| layer != "core" && !is_genre_layer(layer, ontology));
    if !has_series_layer {
        return Ok(None);
    }

    let user_prompt = format!("Chapter {} text:\n{}", chapter.number, chapter.text);

    let content = call_llm_json(
        llm,
        breaker,
        cost_tracker,
        &chapter.book_id,
        chapter.number,
        "series",
        SYSTEM_PROMPT,
        &user_prompt,
    )
    .await?;

    let parsed = serde_json::from_value(content)
        .map_err(|e| WorldRagError::Llm(format!("series pass returned malformed JSON: {e}")))?;
    Ok(Some(parsed))
}

/// `layers_loaded` records layer names in load order (core, genre, series);
/// the genre layer is always the second entry when present.
fn is_genre_layer(layer: &str, ontology: &Ontology) -> bool {
    ontology.layers_loaded.get(1).map(String::as_str) == Some(layer)
}
