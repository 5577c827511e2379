use std::collections::BTreeMap;

use crate::extraction::passes::types::ChapterExtractionResult;
use crate::ontology::filters;

/// Per-entity-type counts of entities removed by [`filter_extraction_result`],
/// for logging (`entity_filter.py::filter_extraction_result`).
pub type FilterCounts = BTreeMap<&'static str, usize>;

fn filter_characters(result: &mut ChapterExtractionResult) -> usize {
    let mut removed = 0;
    let original = std::mem::take(&mut result.characters.characters);
    let mut kept = Vec::with_capacity(original.len());
    for character in original {
        let name = character.name.trim();
        if filters::is_common_reject(name) || filters::is_generic_character(name) {
            removed += 1;
            continue;
        }
        if filters::is_all_lowercase_single_word(name) && name.chars().count() < 4 {
            removed += 1;
            continue;
        }
        kept.push(character);
    }
    result.characters.characters = kept;

    let kept_names: std::collections::HashSet<String> = result
        .characters
        .characters
        .iter()
        .flat_map(|c| {
            std::iter::once(c.name.to_lowercase()).chain(
                (!c.canonical_name.is_empty())
                    .then(|| c.canonical_name.to_lowercase())
                    .into_iter(),
            )
        })
        .collect();

    let original_rels = std::mem::take(&mut result.characters.relationships);
    let mut kept_rels = Vec::with_capacity(original_rels.len());
    for rel in original_rels {
        if kept_names.contains(&rel.source.trim().to_lowercase())
            && kept_names.contains(&rel.target.trim().to_lowercase())
        {
            kept_rels.push(rel);
        } else {
            removed += 1;
        }
    }
    result.characters.relationships = kept_rels;
    removed
}

fn filter_skills(result: &mut ChapterExtractionResult) -> usize {
    let mut removed = 0;
    let original = std::mem::take(&mut result.systems.skills);
    result.systems.skills = original
        .into_iter()
        .filter(|skill| {
            let name = skill.name.trim();
            let reject = filters::is_common_reject(name)
                || filters::is_generic_skill(name)
                || (filters::is_all_lowercase_single_word(name) && name.chars().count() < 5);
            if reject {
                removed += 1;
            }
            !reject
        })
        .collect();
    removed
}

fn filter_items(result: &mut ChapterExtractionResult) -> usize {
    let mut removed = 0;
    let original = std::mem::take(&mut result.lore.items);
    result.lore.items = original
        .into_iter()
        .filter(|item| {
            let name = item.name.trim();
            let reject = filters::is_common_reject(name)
                || filters::is_generic_item(name)
                || filters::is_all_lowercase_single_word(name);
            if reject {
                removed += 1;
            }
            !reject
        })
        .collect();
    removed
}

fn filter_locations(result: &mut ChapterExtractionResult) -> usize {
    let mut removed = 0;
    let original = std::mem::take(&mut result.lore.locations);
    result.lore.locations = original
        .into_iter()
        .filter(|loc| {
            let name = loc.name.trim();
            let reject = filters::is_common_reject(name)
                || filters::is_generic_location(name)
                || filters::is_all_lowercase_single_word(name);
            if reject {
                removed += 1;
            }
            !reject
        })
        .collect();
    removed
}

fn filter_creatures(result: &mut ChapterExtractionResult) -> usize {
    let mut removed = 0;
    let original = std::mem::take(&mut result.lore.creatures);
    result.lore.creatures = original
        .into_iter()
        .filter(|creature| {
            let name = creature.name.trim();
            let reject = filters::is_common_reject(name)
                || (filters::is_all_lowercase_single_word(name) && name.chars().count() < 4);
            if reject {
                removed += 1;
            }
            !reject
        })
        .collect();
    removed
}

fn filter_factions(result: &mut ChapterExtractionResult) -> usize {
    let mut removed = 0;
    let original = std::mem::take(&mut result.lore.factions);
    result.lore.factions = original
        .into_iter()
        .filter(|faction| {
            let name = faction.name.trim();
            let reject = filters::is_common_reject(name) || filters::is_generic_faction(name);
            if reject {
                removed += 1;
            }
            !reject
        })
        .collect();
    removed
}

fn filter_concepts(result: &mut ChapterExtractionResult) -> usize {
    let mut removed = 0;
    let original = std::mem::take(&mut result.lore.concepts);
    result.lore.concepts = original
        .into_iter()
        .filter(|concept| {
            let name = concept.name.trim();
            let reject = filters::is_common_reject(name)
                || filters::is_generic_concept(name)
                || filters::is_all_lowercase_single_word(name);
            if reject {
                removed += 1;
            }
            !reject
        })
        .collect();
    removed
}

fn filter_events(result: &mut ChapterExtractionResult) -> usize {
    let mut removed = 0;
    let original = std::mem::take(&mut result.events.events);
    result.events.events = original
        .into_iter()
        .filter(|event| {
            let name = event.name.trim();
            let reject = filters::is_common_reject(name) || filters::is_trivial_event(name);
            if reject {
                removed += 1;
            }
            !reject
        })
        .collect();
    removed
}

/// Applies all quality filters to a [`ChapterExtractionResult`] in place,
/// rejecting pronouns, LLM artifacts, and generic descriptors per entity
/// type. Returns removed counts per type for logging.
pub fn filter_extraction_result(result: &mut ChapterExtractionResult) -> FilterCounts {
    let mut removed = FilterCounts::new();
    removed.insert("characters", filter_characters(result));
    removed.insert("skills", filter_skills(result));
    removed.insert("items", filter_items(result));
    removed.insert("locations", filter_locations(result));
    removed.insert("creatures", filter_creatures(result));
    removed.insert("factions", filter_factions(result));
    removed.insert("concepts", filter_concepts(result));
    removed.insert("events", filter_events(result));

    let total_removed: usize = removed.values().sum();
    if total_removed > 0 {
        tracing::info!(
            book_id = %result.book_id,
            chapter = result.chapter_number,
            total_removed,
            "entity_quality_filter_applied",
        );
    }
    result.count_entities();
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::passes::types::*;

    fn base_result() -> ChapterExtractionResult {
        ChapterExtractionResult {
            book_id: "b1".into(),
            chapter_number: 1,
            ..Default::default()
        }
    }

    #[test]
    fn drops_pronoun_and_generic_characters_keeps_named_ones() {
        let mut result = base_result();
        result.characters.characters = vec![
            ExtractedCharacter {
                name: "he".into(),
                canonical_name: "".into(),
                aliases: vec![],
                description: "".into(),
                role: "minor".into(),
                species: "".into(),
                first_appearance_chapter: None,
                status: "alive".into(),
                last_seen_chapter: None,
                evolution_of: None,
            },
            ExtractedCharacter {
                name: "the warrior".into(),
                canonical_name: "".into(),
                aliases: vec![],
                description: "".into(),
                role: "minor".into(),
                species: "".into(),
                first_appearance_chapter: None,
                status: "alive".into(),
                last_seen_chapter: None,
                evolution_of: None,
            },
            ExtractedCharacter {
                name: "Jake Thayne".into(),
                canonical_name: "Jake Thayne".into(),
                aliases: vec![],
                description: "".into(),
                role: "protagonist".into(),
                species: "human".into(),
                first_appearance_chapter: Some(1),
                status: "alive".into(),
                last_seen_chapter: None,
                evolution_of: None,
            },
        ];
        let removed = filter_extraction_result(&mut result);
        assert_eq!(result.characters.characters.len(), 1);
        assert_eq!(result.characters.characters[0].name, "Jake Thayne");
        assert_eq!(removed["characters"], 2);
    }

    #[test]
    fn drops_relationships_referencing_removed_characters() {
        let mut result = base_result();
        result.characters.characters = vec![ExtractedCharacter {
            name: "Jake Thayne".into(),
            canonical_name: "Jake Thayne".into(),
            aliases: vec![],
            description: "".into(),
            role: "protagonist".into(),
            species: "".into(),
            first_appearance_chapter: None,
            status: "alive".into(),
            last_seen_chapter: None,
            evolution_of: None,
        }];
        result.characters.relationships = vec![ExtractedRelationship {
            source: "Jake Thayne".into(),
            target: "the warrior".into(),
            rel_type: "enemy".into(),
            ..Default::default()
        }];
        filter_extraction_result(&mut result);
        assert!(result.characters.relationships.is_empty());
    }

    #[test]
    fn drops_generic_items_and_trivial_events() {
        let mut result = base_result();
        result.lore.items.push(ExtractedItem {
            name: "a sword".into(),
            description: "".into(),
            item_type: "weapon".into(),
            rarity: "".into(),
            owner: "".into(),
        });
        result.events.events.push(ExtractedEvent {
            name: "he walked".into(),
            description: "".into(),
            event_type: "action".into(),
            significance: "minor".into(),
            participants: vec![],
            location: "".into(),
            chapter: Some(1),
            is_flashback: false,
            causes: vec![],
        });
        let removed = filter_extraction_result(&mut result);
        assert!(result.lore.items.is_empty());
        assert!(result.events.events.is_empty());
        assert_eq!(removed["items"], 1);
        assert_eq!(removed["events"], 1);
    }
}
