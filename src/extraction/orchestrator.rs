//! Per-chapter extraction DAG (spec §2, §5): regex pre-extract → conditional
//! fan-out → parallel LLM passes → merge → reconcile → quality filter →
//! transactional write → mention detection → registry update.
//!
//! This is one attempt at one chapter. Retry, DLQ, and chapter/book status
//! transitions live one level up in [`crate::pipeline`] — a pass failing
//! here degrades to an empty result per spec §4.3/§7, it never aborts the
//! whole chapter; only a cost-ceiling breach or a write-path error does.

use std::collections::BTreeMap;

use crate::config::PipelineConfig;
use crate::graph::GraphStore;
use crate::ledger::writer::{write_chapter, WriteCounts};
use crate::models::chapter::MentionSummary;
use crate::models::entity::EntityKind;
use crate::models::mention::Mention;
use crate::models::{Chapter, EntityRegistry};
use crate::ontology::Ontology;
use crate::resilience::{CircuitBreaker, CostTracker};
use crate::WorldRagError;

use super::mention_detector::detect_mentions;
use super::merge::{merge_pass_results, PassOutcome};
use super::passes::types::ChapterExtractionResult;
use super::passes::{characters, events, lore, series, systems, LlmClient};
use super::quality_filter::{filter_extraction_result, FilterCounts};
use super::reconciler::reconcile;
use super::regex_extractor;
use super::router::{route_extraction_passes, ExtractionPass};

/// Everything one `extract_chapter` call produced, for the chapter handler to
/// log or surface.
#[derive(Debug)]
pub struct ChapterExtractionOutcome {
    pub result: ChapterExtractionResult,
    pub write_counts: WriteCounts,
    pub filter_counts: FilterCounts,
    pub mentions_written: usize,
    pub batch_id: String,
}

/// Runs the full per-chapter pipeline once and persists its output. `genre`
/// and `series_registry` (the merged registry of prior books in the series,
/// if any) are per-book context the caller threads in; `registry` is this
/// book's own growing [`EntityRegistry`], updated in place.
#[allow(clippy::too_many_arguments)]
pub async fn extract_chapter(
    graph: &dyn GraphStore,
    llm: &dyn LlmClient,
    breaker: &CircuitBreaker,
    cost_tracker: &CostTracker,
    config: &PipelineConfig,
    ontology: &Ontology,
    chapter: &Chapter,
    genre: &str,
    registry: &mut EntityRegistry,
    series_registry: Option<&EntityRegistry>,
) -> Result<ChapterExtractionOutcome, WorldRagError> {
    let regex_matches = regex_extractor::extract(&ontology.patterns, &chapter.text, chapter.number);
    let passes = route_extraction_passes(&chapter.text, genre, &regex_matches);
    let registry_context = registry.to_prompt_context(50);

    let run_characters = passes.contains(&ExtractionPass::Characters);
    let run_systems = passes.contains(&ExtractionPass::Systems);
    let run_events = passes.contains(&ExtractionPass::Events);
    let run_lore = passes.contains(&ExtractionPass::Lore);

    let (characters_outcome, systems_outcome, events_outcome, lore_outcome, series_outcome) = tokio::join!(
        run_characters_pass(run_characters, llm, breaker, cost_tracker, chapter, &registry_context),
        run_systems_pass(run_systems, llm, breaker, cost_tracker, chapter, &regex_matches),
        run_events_pass(run_events, llm, breaker, cost_tracker, chapter, &registry_context),
        run_lore_pass(run_lore, llm, breaker, cost_tracker, chapter, &registry_context),
        run_series_pass(llm, breaker, cost_tracker, chapter, ontology),
    );

    let total_cost_usd = cost_tracker.cost_for_chapter(&chapter.book_id, chapter.number).await;

    let mut result = merge_pass_results(
        &chapter.book_id,
        chapter.number,
        characters_outcome,
        systems_outcome,
        events_outcome,
        lore_outcome,
        series_outcome,
        total_cost_usd,
    );

    reconcile(&mut result, config, Some(llm), Some(breaker), Some(cost_tracker), series_registry).await?;
    let filter_counts = filter_extraction_result(&mut result);

    let batch_id = uuid::Uuid::new_v4().to_string();
    let write_profile = config.graph_write_retry_profile();
    let write_counts = crate::resilience::retry_with_backoff(
        &write_profile,
        crate::resilience::graph_write_is_retryable,
        || write_chapter(graph, &result, &batch_id),
    )
    .await?;

    register_extracted_entities(registry, &result, chapter.number);

    let scan_entities = registry_scan_entities(registry);
    let mentions = detect_mentions(&chapter.text, &scan_entities, &chapter.book_id, chapter.number);
    let mentions_written = mentions.len();
    if !mentions.is_empty() {
        graph.create_mentions(mentions.clone()).await?;
    }

    let summary = mention_summary(&mentions);
    graph.set_chapter_mention_summary(&chapter.book_id, chapter.number, summary).await?;
    graph.save_registry(&chapter.book_id, registry).await?;

    Ok(ChapterExtractionOutcome { result, write_counts, filter_counts, mentions_written, batch_id })
}

async fn run_characters_pass(
    enabled: bool,
    llm: &dyn LlmClient,
    breaker: &CircuitBreaker,
    cost_tracker: &CostTracker,
    chapter: &Chapter,
    registry_context: &[String],
) -> PassOutcome<super::passes::types::CharacterExtractionResult> {
    if !enabled {
        return PassOutcome::Skipped;
    }
    match characters::run(llm, breaker, cost_tracker, chapter, registry_context).await {
        Ok(value) => PassOutcome::Ran(value),
        Err(error) => {
            tracing::warn!(pass = "characters", chapter = chapter.number, %error, "extraction_pass_failed");
            PassOutcome::Failed
        }
    }
}

async fn run_systems_pass(
    enabled: bool,
    llm: &dyn LlmClient,
    breaker: &CircuitBreaker,
    cost_tracker: &CostTracker,
    chapter: &Chapter,
    regex_matches: &[crate::models::RegexMatch],
) -> PassOutcome<super::passes::types::SystemExtractionResult> {
    if !enabled {
        return PassOutcome::Skipped;
    }
    match systems::run(llm, breaker, cost_tracker, chapter, regex_matches).await {
        Ok(value) => PassOutcome::Ran(value),
        Err(error) => {
            tracing::warn!(pass = "systems", chapter = chapter.number, %error, "extraction_pass_failed");
            PassOutcome::Failed
        }
    }
}

async fn run_events_pass(
    enabled: bool,
    llm: &dyn LlmClient,
    breaker: &CircuitBreaker,
    cost_tracker: &CostTracker,
    chapter: &Chapter,
    registry_context: &[String],
) -> PassOutcome<super::passes::types::EventExtractionResult> {
    if !enabled {
        return PassOutcome::Skipped;
    }
    match events::run(llm, breaker, cost_tracker, chapter, registry_context).await {
        Ok(value) => PassOutcome::Ran(value),
        Err(error) => {
            tracing::warn!(pass = "events", chapter = chapter.number, %error, "extraction_pass_failed");
            PassOutcome::Failed
        }
    }
}

async fn run_lore_pass(
    enabled: bool,
    llm: &dyn LlmClient,
    breaker: &CircuitBreaker,
    cost_tracker: &CostTracker,
    chapter: &Chapter,
    registry_context: &[String],
) -> PassOutcome<super::passes::types::LoreExtractionResult> {
    if !enabled {
        return PassOutcome::Skipped;
    }
    match lore::run(llm, breaker, cost_tracker, chapter, registry_context).await {
        Ok(value) => PassOutcome::Ran(value),
        Err(error) => {
            tracing::warn!(pass = "lore", chapter = chapter.number, %error, "extraction_pass_failed");
            PassOutcome::Failed
        }
    }
}

async fn run_series_pass(
    llm: &dyn LlmClient,
    breaker: &CircuitBreaker,
    cost_tracker: &CostTracker,
    chapter: &Chapter,
    ontology: &Ontology,
) -> PassOutcome<super::passes::types::Layer3ExtractionResult> {
    match series::run(llm, breaker, cost_tracker, chapter, ontology).await {
        Ok(Some(value)) => PassOutcome::Ran(value),
        Ok(None) => PassOutcome::Skipped,
        Err(error) => {
            tracing::warn!(pass = "series", chapter = chapter.number, %error, "extraction_pass_failed");
            PassOutcome::Failed
        }
    }
}

/// Folds every surviving entity from this chapter's (reconciled, filtered)
/// result into the book's growing registry, so the mention scan below and
/// the next chapter's prompt context both see them.
fn register_extracted_entities(registry: &mut EntityRegistry, result: &ChapterExtractionResult, chapter_number: i64) {
    for character in &result.characters.characters {
        let canonical = if character.canonical_name.is_empty() { &character.name } else { &character.canonical_name };
        registry.add(
            canonical,
            EntityKind::Character,
            &character.aliases,
            &character.role,
            chapter_number,
            &character.description,
        );
    }
    for skill in &result.systems.skills {
        registry.add(&skill.name, EntityKind::Skill, &[], "", chapter_number, &skill.description);
    }
    for class in &result.systems.classes {
        registry.add(&class.name, EntityKind::Class, &[], "", chapter_number, &class.description);
    }
    for title in &result.systems.titles {
        registry.add(&title.name, EntityKind::Title, &[], "", chapter_number, &title.description);
    }
    for location in &result.lore.locations {
        registry.add(&location.name, EntityKind::Location, &[], "", chapter_number, &location.description);
    }
    for item in &result.lore.items {
        registry.add(&item.name, EntityKind::Item, &[], "", chapter_number, &item.description);
    }
    for creature in &result.lore.creatures {
        registry.add(&creature.name, EntityKind::Creature, &[], "", chapter_number, &creature.description);
    }
    for faction in &result.lore.factions {
        registry.add(&faction.name, EntityKind::Faction, &[], "", chapter_number, &faction.description);
    }
    for concept in &result.lore.concepts {
        registry.add(&concept.name, EntityKind::Concept, &[], "", chapter_number, &concept.description);
    }
    if let Some(series) = &result.series {
        for bloodline in &series.bloodlines {
            registry.add(&bloodline.name, EntityKind::Bloodline, &[], "", chapter_number, &bloodline.description);
        }
        for profession in &series.professions {
            registry.add(&profession.name, EntityKind::Profession, &[], "", chapter_number, "");
        }
        for church in &series.churches {
            registry.add(&church.deity_name, EntityKind::PrimordialChurch, &[], "", chapter_number, &church.blessing);
        }
    }
}

/// Flattens the registry into the `(name, kind, is_alias)` scan vocabulary
/// [`detect_mentions`] needs — one entry for the canonical name, one per
/// known alias, per spec §4.9.
fn registry_scan_entities(registry: &EntityRegistry) -> Vec<(String, EntityKind, bool)> {
    let mut entries = Vec::new();
    for entry in registry.entities.values() {
        entries.push((entry.canonical_name.clone(), entry.entity_type, false));
        for alias in &entry.aliases {
            entries.push((alias.clone(), entry.entity_type, true));
        }
    }
    entries
}

fn mention_summary(mentions: &[Mention]) -> MentionSummary {
    let mut by_type: BTreeMap<String, usize> = BTreeMap::new();
    let mut distinct_entities = std::collections::HashSet::new();
    for mention in mentions {
        *by_type.entry(mention.entity_kind.table_name().to_string()).or_insert(0) += 1;
        distinct_entities.insert(mention.entity_name.to_lowercase());
    }
    MentionSummary {
        total_mentions: mentions.len(),
        entities_mentioned: distinct_entities.len(),
        by_type,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::passes::types::{CharacterExtractionResult, ChapterExtractionResult as Result_, ExtractedCharacter};

    #[test]
    fn register_extracted_entities_adds_character_with_description() {
        let mut registry = EntityRegistry::new();
        let mut result = Result_ { book_id: "b1".into(), chapter_number: 3, ..Default::default() };
        result.characters = CharacterExtractionResult {
            characters: vec![ExtractedCharacter {
                name: "Jake".into(),
                canonical_name: "Jake Thayne".into(),
                aliases: vec!["Jake".into()],
                description: "the primal hunter".into(),
                role: "protagonist".into(),
                species: "".into(),
                first_appearance_chapter: Some(3),
                status: "alive".into(),
                last_seen_chapter: None,
                evolution_of: None,
            }],
            relationships: vec![],
        };

        register_extracted_entities(&mut registry, &result, 3);
        let entry = registry.lookup("Jake Thayne").unwrap();
        assert_eq!(entry.description, "the primal hunter");

        let scan = registry_scan_entities(&registry);
        assert!(scan.contains(&("Jake Thayne".to_string(), EntityKind::Character, false)));
        assert!(scan.contains(&("Jake".to_string(), EntityKind::Character, true)));
    }

    #[test]
    fn mention_summary_counts_distinct_entities_and_types() {
        let mentions = vec![
            Mention {
                entity_name: "Jake".into(),
                entity_kind: EntityKind::Character,
                book_id: "b1".into(),
                chapter: 1,
                char_start: 0,
                char_end: 4,
                mention_text: "Jake".into(),
                mention_type: crate::models::MentionType::DirectName,
                confidence: 1.0,
                alignment_status: crate::models::AlignmentStatus::Exact,
                pass_name: "mention_detector".into(),
            },
            Mention {
                entity_name: "Jake".into(),
                entity_kind: EntityKind::Character,
                book_id: "b1".into(),
                chapter: 1,
                char_start: 20,
                char_end: 24,
                mention_text: "Jake".into(),
                mention_type: crate::models::MentionType::DirectName,
                confidence: 1.0,
                alignment_status: crate::models::AlignmentStatus::Exact,
                pass_name: "mention_detector".into(),
            },
        ];
        let summary = mention_summary(&mentions);
        assert_eq!(summary.total_mentions, 2);
        assert_eq!(summary.entities_mentioned, 1);
        assert_eq!(summary.by_type["character"], 2);
    }
}
