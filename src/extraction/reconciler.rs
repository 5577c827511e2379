//! Reconciler (spec §4.6): runs dedup independently per entity type, unions
//! the resulting alias maps, rewrites every cross-reference in the chapter
//! result, and folds in a cross-book registry lookup for characters.

use std::collections::{BTreeMap, BTreeSet};

use super::dedup::dedup_entities;
use super::passes::types::{ChapterExtractionResult, ReconciliationResult};
use super::passes::LlmClient;
use crate::config::PipelineConfig;
use crate::models::EntityRegistry;
use crate::resilience::{CircuitBreaker, CostTracker};
use crate::WorldRagError;

struct LlmCollaborators<'a> {
    llm: Option<&'a dyn LlmClient>,
    breaker: Option<&'a CircuitBreaker>,
    cost_tracker: Option<&'a CostTracker>,
}

/// Reconciles one chapter's merged extraction result in place, returning the
/// union alias map plus any unresolved conflicts. `registry` is the prior
/// books' merged [`EntityRegistry`] for cross-book character tying — `None`
/// for a book's first chapter or a standalone (non-series) book.
pub async fn reconcile(
    result: &mut ChapterExtractionResult,
    config: &PipelineConfig,
    llm: Option<&dyn LlmClient>,
    breaker: Option<&CircuitBreaker>,
    cost_tracker: Option<&CostTracker>,
    registry: Option<&EntityRegistry>,
) -> Result<ReconciliationResult, WorldRagError> {
    let collaborators = LlmCollaborators { llm, breaker, cost_tracker };

    let character_names: Vec<String> = result
        .characters
        .characters
        .iter()
        .map(|c| if c.canonical_name.is_empty() { c.name.clone() } else { c.canonical_name.clone() })
        .collect();
    let skill_names: Vec<String> = result.systems.skills.iter().map(|s| s.name.clone()).collect();
    let class_names: Vec<String> = result.systems.classes.iter().map(|c| c.name.clone()).collect();
    let location_names: Vec<String> = result.lore.locations.iter().map(|l| l.name.clone()).collect();
    let item_names: Vec<String> = result.lore.items.iter().map(|i| i.name.clone()).collect();
    let faction_names: Vec<String> = result.lore.factions.iter().map(|f| f.name.clone()).collect();

    let mut raw_alias_map: BTreeMap<String, String> = BTreeMap::new();
    for (names, entity_type) in [
        (&character_names, "character"),
        (&skill_names, "skill"),
        (&class_names, "class"),
        (&location_names, "location"),
        (&item_names, "item"),
        (&faction_names, "faction"),
    ] {
        let outcome = dedup_entities(
            names,
            entity_type,
            config,
            collaborators.llm,
            collaborators.breaker,
            collaborators.cost_tracker,
            &result.book_id,
            result.chapter_number,
        )
        .await?;
        raw_alias_map.extend(outcome.alias_map);
    }

    let mut conflicts = Vec::new();

    if let Some(registry) = registry {
        for name in &character_names {
            let resolved_so_far = raw_alias_map.get(name).cloned().unwrap_or_else(|| name.clone());
            if let Some(entry) = registry.lookup(&resolved_so_far) {
                if entry.canonical_name != resolved_so_far {
                    if let Some(existing) = raw_alias_map.get(name) {
                        if existing != &entry.canonical_name {
                            conflicts.push(format!(
                                "ambiguous merge for {name:?}: local dedup picked {existing:?}, registry has {:?}",
                                entry.canonical_name
                            ));
                            continue;
                        }
                    }
                    raw_alias_map.insert(name.clone(), entry.canonical_name.clone());
                }
            }
        }
    }

    let alias_map = collapse_chains(&raw_alias_map);
    apply_alias_map(result, &alias_map);

    result.alias_map = alias_map.clone();
    result.count_entities();

    Ok(ReconciliationResult { merges: Vec::new(), alias_map, conflicts })
}

/// The per-type dedup passes each guarantee a single-step map, but the union
/// across types can chain (e.g. a name that's both a filtered item owner and
/// a character alias). Collapses every chain to its final root via
/// path-compressed lookups, per the spec's note on alias chains.
fn collapse_chains(raw: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    fn resolve(raw: &BTreeMap<String, String>, start: &str, seen: &mut BTreeSet<String>) -> String {
        let mut current = start.to_string();
        while let Some(next) = raw.get(&current) {
            if !seen.insert(current.clone()) {
                break; // cycle guard; shouldn't occur with well-formed input
            }
            current = next.clone();
        }
        current
    }

    raw.keys()
        .map(|k| {
            let mut seen = BTreeSet::new();
            (k.clone(), resolve(raw, k, &mut seen))
        })
        .filter(|(k, v)| k != v)
        .collect()
}

fn apply_alias_map(result: &mut ChapterExtractionResult, alias_map: &BTreeMap<String, String>) {
    let resolve = |name: &str| -> String { alias_map.get(name).cloned().unwrap_or_else(|| name.to_string()) };

    for character in &mut result.characters.characters {
        character.name = resolve(&character.name);
        if !character.canonical_name.is_empty() {
            character.canonical_name = resolve(&character.canonical_name);
        }
    }
    for relationship in &mut result.characters.relationships {
        relationship.source = resolve(&relationship.source);
        relationship.target = resolve(&relationship.target);
    }

    for skill in &mut result.systems.skills {
        skill.owner = resolve(&skill.owner);
    }
    for class in &mut result.systems.classes {
        class.owner = resolve(&class.owner);
    }
    for title in &mut result.systems.titles {
        title.owner = resolve(&title.owner);
    }
    for level_change in &mut result.systems.level_changes {
        level_change.character = resolve(&level_change.character);
    }
    for stat_change in &mut result.systems.stat_changes {
        stat_change.character = resolve(&stat_change.character);
    }

    for event in &mut result.events.events {
        for participant in &mut event.participants {
            *participant = resolve(participant);
        }
    }

    for item in &mut result.lore.items {
        item.owner = resolve(&item.owner);
    }

    if let Some(series) = &mut result.series {
        for bloodline in &mut series.bloodlines {
            bloodline.owner = resolve(&bloodline.owner);
        }
        for profession in &mut series.professions {
            profession.owner = resolve(&profession.owner);
        }
        for church in &mut series.churches {
            church.worshipper = resolve(&church.worshipper);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::passes::types::{ExtractedCharacter, ExtractedRelationship, ExtractedSkill};
    use crate::models::EntityKind;

    fn base_result() -> ChapterExtractionResult {
        ChapterExtractionResult {
            book_id: "b1".into(),
            chapter_number: 4,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn rewrites_owner_references_after_character_merge() {
        let mut result = base_result();
        // A one-character misspelling lands in the 85-94 fuzzy candidate
        // band, so without an LLM the fallback path resolves the merge.
        result.characters.characters.push(ExtractedCharacter {
            name: "Jake Thayne".into(),
            canonical_name: "Jake Thayne".into(),
            aliases: vec![],
            description: "".into(),
            role: "protagonist".into(),
            species: "".into(),
            first_appearance_chapter: Some(1),
            status: "alive".into(),
            last_seen_chapter: None,
            evolution_of: None,
        });
        result.characters.characters.push(ExtractedCharacter {
            name: "Jake Thahne".into(),
            canonical_name: "Jake Thahne".into(),
            aliases: vec![],
            description: "the primal hunter".into(),
            role: "protagonist".into(),
            species: "".into(),
            first_appearance_chapter: Some(4),
            status: "alive".into(),
            last_seen_chapter: None,
            evolution_of: None,
        });
        result.systems.skills.push(ExtractedSkill {
            name: "Predator Sense".into(),
            description: "".into(),
            skill_type: "passive".into(),
            rank: "".into(),
            owner: "Jake Thahne".into(),
            acquired_chapter: Some(4),
        });
        result.characters.relationships.push(ExtractedRelationship {
            source: "Jake Thahne".into(),
            target: "Mira".into(),
            rel_type: "ally".into(),
            subtype: "".into(),
            context: "".into(),
            since_chapter: Some(4),
        });

        let config = PipelineConfig::default();
        let reconciliation = reconcile(&mut result, &config, None, None, None, None).await.unwrap();

        assert!(!reconciliation.alias_map.is_empty());
        assert_eq!(result.systems.skills[0].owner, result.characters.relationships[0].source);
        assert_eq!(result.characters.characters.len(), 2);
        assert_eq!(result.characters.characters[0].canonical_name, result.characters.characters[1].canonical_name);
    }

    #[tokio::test]
    async fn cross_book_registry_ties_returning_character() {
        let mut result = base_result();
        result.characters.characters.push(ExtractedCharacter {
            name: "Jake Thayne".into(),
            canonical_name: "Jake Thayne".into(),
            aliases: vec![],
            description: "".into(),
            role: "protagonist".into(),
            species: "".into(),
            first_appearance_chapter: Some(1),
            status: "alive".into(),
            last_seen_chapter: None,
            evolution_of: None,
        });

        let mut registry = EntityRegistry::new();
        registry.add("Jake Thayne, the Primal Hunter", EntityKind::Character, &["Jake Thayne".to_string()], "protagonist", 1, "");

        let config = PipelineConfig::default();
        reconcile(&mut result, &config, None, None, None, Some(&registry)).await.unwrap();

        assert_eq!(result.characters.characters[0].canonical_name, "Jake Thayne, the Primal Hunter");
    }

    #[test]
    fn collapse_chains_follows_transitive_aliases() {
        let mut raw = BTreeMap::new();
        raw.insert("a".to_string(), "b".to_string());
        raw.insert("b".to_string(), "c".to_string());
        let collapsed = collapse_chains(&raw);
        assert_eq!(collapsed.get("a"), Some(&"c".to_string()));
    }
}
