//! Combines the independent per-pass extraction results into one
//! [`ChapterExtractionResult`] (spec §4.4). A pass that failed or was routed
//! out entirely contributes nothing rather than failing the whole chapter —
//! partial extraction is the expected steady state, not an error path.

use super::passes::types::{
    CharacterExtractionResult, ChapterExtractionResult, EventExtractionResult,
    Layer3ExtractionResult, LoreExtractionResult, SystemExtractionResult,
};

/// One pass's outcome: `Ran(value)` when it executed and parsed cleanly,
/// `Failed` when it was routed in but the call errored (logged by the
/// caller before this is constructed), `Skipped` when the router never
/// selected it for this chapter.
pub enum PassOutcome<T> {
    Ran(T),
    Failed,
    Skipped,
}

impl<T> PassOutcome<T> {
    fn into_value(self) -> Option<T> {
        match self {
            PassOutcome::Ran(value) => Some(value),
            PassOutcome::Failed | PassOutcome::Skipped => None,
        }
    }

    fn completed(&self, name: &str) -> Option<String> {
        matches!(self, PassOutcome::Ran(_)).then(|| name.to_string())
    }
}

/// Merges the orchestrator's collected pass outcomes into one chapter
/// result, computing `total_entities`, `passes_completed`, and
/// `total_cost_usd` (the latter supplied by the caller, since cost
/// accounting lives in [`crate::resilience::CostTracker`], not here).
#[allow(clippy::too_many_arguments)]
pub fn merge_pass_results(
    book_id: &str,
    chapter_number: i64,
    characters: PassOutcome<CharacterExtractionResult>,
    systems: PassOutcome<SystemExtractionResult>,
    events: PassOutcome<EventExtractionResult>,
    lore: PassOutcome<LoreExtractionResult>,
    series: PassOutcome<Layer3ExtractionResult>,
    total_cost_usd: f64,
) -> ChapterExtractionResult {
    let mut passes_completed = Vec::new();
    passes_completed.extend(characters.completed("characters"));
    passes_completed.extend(systems.completed("systems"));
    passes_completed.extend(events.completed("events"));
    passes_completed.extend(lore.completed("lore"));
    passes_completed.extend(series.completed("series"));

    let mut result = ChapterExtractionResult {
        book_id: book_id.to_string(),
        chapter_number,
        characters: characters.into_value().unwrap_or_default(),
        systems: systems.into_value().unwrap_or_default(),
        events: events.into_value().unwrap_or_default(),
        lore: lore.into_value().unwrap_or_default(),
        series: series.into_value(),
        grounded_entities: Vec::new(),
        alias_map: Default::default(),
        total_entities: 0,
        total_cost_usd,
        passes_completed,
    };
    result.count_entities();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::passes::types::ExtractedCharacter;

    #[test]
    fn skipped_and_failed_passes_contribute_nothing() {
        let result = merge_pass_results(
            "b1",
            1,
            PassOutcome::Ran(CharacterExtractionResult {
                characters: vec![ExtractedCharacter {
                    name: "Jake".into(),
                    canonical_name: "Jake Thayne".into(),
                    aliases: vec![],
                    description: "".into(),
                    role: "protagonist".into(),
                    species: "".into(),
                    first_appearance_chapter: Some(1),
                    status: "alive".into(),
                    last_seen_chapter: None,
                    evolution_of: None,
                }],
                relationships: vec![],
            }),
            PassOutcome::Failed,
            PassOutcome::Skipped,
            PassOutcome::Skipped,
            PassOutcome::Skipped,
            0.02,
        );

        assert_eq!(result.passes_completed, vec!["characters".to_string()]);
        assert_eq!(result.total_entities, 1);
        assert!(result.systems.skills.is_empty());
        assert_eq!(result.total_cost_usd, 0.02);
    }
}
